//! The guest address space: a 32-bit flat address space backed by host memory,
//! either as one contiguous run or through a page table.
//!
//! Guest addresses are plain [`Address`] values (or typed [`Ptr`]s) that are
//! resolved against a [`MemState`] at the time of use. Zero is the reserved
//! null address and is never handed out by [`MemState::alloc`].

use std::collections::BTreeMap;
use std::sync::Mutex;

use log::*;

mod ptr;
mod translate;

pub use ptr::{GuestAtomic, GuestValue, HostRef, Ptr};

use translate::{FlatTranslator, PagedTranslator, Translate};

/// A 32-bit guest address.
pub type Address = u32;

/// Default guest page size (4 KiB).
pub const DEFAULT_PAGE_SIZE: u32 = 4096;

/// How guest addresses are turned into host locations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressingMode {
    /// `host_base + address`
    Flat,
    /// `page_table[address / page_size] + address % page_size`
    Paged,
}

/// Layout of a [`MemState`].
#[derive(Debug, Clone)]
pub struct MemConfig {
    /// Size of the guest address space in bytes. Rounded down to a whole
    /// number of pages.
    pub size: u32,
    /// Must be a power of two.
    pub page_size: u32,
    /// Subtracted from guest addresses by validated resolution
    /// ([`Ptr::get_guest`]).
    pub base_offset: Address,
    pub mode: AddressingMode,
}

impl Default for MemConfig {
    fn default() -> MemConfig {
        MemConfig {
            size: 0x0100_0000,
            page_size: DEFAULT_PAGE_SIZE,
            base_offset: 0,
            mode: AddressingMode::Flat,
        }
    }
}

#[derive(Debug)]
struct Allocation {
    pages: u32,
    name: String,
}

/// Guest memory.
pub struct MemState {
    page_size: u32,
    page_count: u32,
    base_offset: Address,
    translator: Box<dyn Translate>,
    allocations: Mutex<BTreeMap<Address, Allocation>>,
}

impl core::fmt::Debug for MemState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("MemState")
            .field("mode", &self.translator.mode())
            .field("page_size", &self.page_size)
            .field("page_count", &self.page_count)
            .field("base_offset", &self.base_offset)
            .finish()
    }
}

impl MemState {
    /// Create a new, entirely unbacked, guest address space.
    ///
    /// # Panics
    ///
    /// Panics if `config.page_size` is not a power of two.
    pub fn new(config: MemConfig) -> MemState {
        assert!(
            config.page_size.is_power_of_two(),
            "page size must be a power of two"
        );

        let page_count = config.size / config.page_size;
        let size = page_count * config.page_size;
        let translator: Box<dyn Translate> = match config.mode {
            AddressingMode::Flat => Box::new(FlatTranslator::new(size, config.page_size)),
            AddressingMode::Paged => Box::new(PagedTranslator::new(size, config.page_size)),
        };

        MemState {
            page_size: config.page_size,
            page_count,
            base_offset: config.base_offset,
            translator,
            allocations: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn mode(&self) -> AddressingMode {
        self.translator.mode()
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn base_offset(&self) -> Address {
        self.base_offset
    }

    /// Size of the guest address space, in bytes.
    pub fn size(&self) -> u64 {
        self.page_count as u64 * self.page_size as u64
    }

    pub(crate) fn translator(&self) -> &dyn Translate {
        &*self.translator
    }

    fn allocations(&self) -> std::sync::MutexGuard<'_, BTreeMap<Address, Allocation>> {
        match self.allocations.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Allocate `size` bytes of zeroed guest memory, rounded up to whole
    /// pages. Returns `None` (and logs) if no large enough free span exists.
    pub fn alloc(&self, size: u32, name: &str) -> Option<Address> {
        let pages = size.max(1).div_ceil(self.page_size);
        let allocations = &mut *self.allocations();

        // page 0 is never handed out, so a valid allocation is never null
        let mut run_start = 1;
        let mut run_len = 0;
        for page in 1..self.page_count {
            if self.translator.is_backed(page) {
                run_start = page + 1;
                run_len = 0;
                continue;
            }

            run_len += 1;
            if run_len == pages {
                for p in run_start..run_start + pages {
                    self.translator.map(p);
                }
                let addr = run_start * self.page_size;
                trace!(
                    "alloc {:?}: {:#010x} ({} pages)",
                    name,
                    addr,
                    pages
                );
                allocations.insert(
                    addr,
                    Allocation {
                        pages,
                        name: name.to_owned(),
                    },
                );
                return Some(addr);
            }
        }

        error!(
            "Out of guest memory allocating {:#x} bytes for {:?}",
            size, name
        );
        None
    }

    /// Release an allocation previously returned by [`MemState::alloc`].
    ///
    /// Any [`Ptr`] into the released span stops validating immediately.
    pub fn free(&self, addr: Address) -> bool {
        let Some(allocation) = self.allocations().remove(&addr) else {
            warn!("Freeing unknown guest allocation at {:#010x}", addr);
            return false;
        };

        trace!("free {:?}: {:#010x}", allocation.name, addr);
        let first = addr / self.page_size;
        for page in first..first + allocation.pages {
            self.translator.unmap(page);
        }
        true
    }

    /// Check if the page containing `addr` is backed.
    #[inline]
    pub fn is_valid_addr(&self, addr: Address) -> bool {
        let page = addr / self.page_size;
        page < self.page_count && self.translator.is_backed(page)
    }

    /// Check that the half-open range `[start, end)` is non-null and lies
    /// within the guest address space.
    pub fn is_valid_addr_range(&self, start: Address, end: u64) -> bool {
        start != 0 && start as u64 <= end && end <= self.size()
    }

    /// Confirm every page touched by `[addr, addr + len)` is backed.
    ///
    /// The null address is never valid. An empty range at a non-null address
    /// touches no page and is trivially valid.
    pub fn check_memory_region(&self, addr: Address, len: u32) -> bool {
        if addr == 0 {
            return false;
        }
        if len == 0 {
            return true;
        }

        let end = addr as u64 + len as u64;
        if end > self.size() {
            return false;
        }

        let first = addr / self.page_size;
        let last = ((end - 1) / self.page_size as u64) as u32;
        (first..=last).all(|page| self.translator.is_backed(page))
    }

    /// Name of the allocation containing `addr`, if any.
    pub fn allocation_name(&self, addr: Address) -> Option<String> {
        let allocations = self.allocations();
        let (&start, alloc) = allocations.range(..=addr).next_back()?;
        let end = start as u64 + alloc.pages as u64 * self.page_size as u64;
        ((addr as u64) < end).then(|| alloc.name.clone())
    }
}
