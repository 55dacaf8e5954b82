//! Host backing for the guest address space.
//!
//! Exactly one [`Translate`] implementation is picked when a
//! [`MemState`](super::MemState) is constructed. Neither implementation ever
//! releases host memory before it is dropped: unmapping a page only makes it
//! invisible to the guest, so a host location that was resolved a moment ago
//! never dangles (it may just be stale).

use core::cell::UnsafeCell;
use core::ptr::{self, NonNull};
use core::sync::atomic::{AtomicBool, AtomicPtr, Ordering};
use std::sync::Mutex;

use super::{Address, AddressingMode};

/// Guest address to host location translation.
///
/// Crate-private: callers go through [`Ptr`](super::Ptr) and
/// [`MemState`](super::MemState), which never hand out raw host pointers.
pub(crate) trait Translate: Send + Sync {
    fn mode(&self) -> AddressingMode;

    /// Resolve `[addr, addr + len)` to a single contiguous host run.
    ///
    /// Returns `None` if the run is not backed by host memory, or if it
    /// straddles two host runs (paged mode, across a page boundary).
    /// Allocation state is *not* checked in flat mode.
    fn host_span(&self, addr: Address, len: usize) -> Option<NonNull<u8>>;

    fn is_backed(&self, page: u32) -> bool;

    /// Back `page` with zeroed host memory.
    fn map(&self, page: u32);

    fn unmap(&self, page: u32);
}

/// Zeroed host memory, in 8-byte cells so that every naturally aligned guest
/// address is naturally aligned on the host too.
type HostBlock = Box<[UnsafeCell<u64>]>;

fn zeroed_block(len: usize) -> HostBlock {
    (0..len.div_ceil(8)).map(|_| UnsafeCell::new(0)).collect()
}

#[inline]
fn block_base(block: &HostBlock) -> *mut u8 {
    // `UnsafeCell<u64>` is `repr(transparent)`, and the base pointer carries
    // provenance over the whole block.
    block.as_ptr() as *mut u8
}

/// `host_base + address` over one contiguous allocation.
pub(crate) struct FlatTranslator {
    memory: HostBlock,
    len: usize,
    page_size: u32,
    backed: Box<[AtomicBool]>,
}

// SAFETY: guest memory is shared with the emulated threads by design. The
// translator itself never forms references into `memory`, only raw pointers,
// and the consistency of concurrent guest accesses is the emulator's concern.
unsafe impl Sync for FlatTranslator {}

impl FlatTranslator {
    pub fn new(size: u32, page_size: u32) -> FlatTranslator {
        FlatTranslator {
            memory: zeroed_block(size as usize),
            len: size as usize,
            page_size,
            backed: (0..size / page_size)
                .map(|_| AtomicBool::new(false))
                .collect(),
        }
    }
}

impl Translate for FlatTranslator {
    fn mode(&self) -> AddressingMode {
        AddressingMode::Flat
    }

    #[inline]
    fn host_span(&self, addr: Address, len: usize) -> Option<NonNull<u8>> {
        let start = addr as usize;
        let end = start.checked_add(len)?;
        if end > self.len {
            return None;
        }

        // SAFETY: `start + len <= self.len` was checked above.
        NonNull::new(unsafe { block_base(&self.memory).add(start) })
    }

    fn is_backed(&self, page: u32) -> bool {
        self.backed
            .get(page as usize)
            .map(|b| b.load(Ordering::Acquire))
            .unwrap_or(false)
    }

    fn map(&self, page: u32) {
        let Some(flag) = self.backed.get(page as usize) else {
            return;
        };
        if let Some(host) = self.host_span(page * self.page_size, self.page_size as usize) {
            // SAFETY: the span was bounds checked by `host_span`.
            unsafe { ptr::write_bytes(host.as_ptr(), 0, self.page_size as usize) };
        }
        flag.store(true, Ordering::Release);
    }

    fn unmap(&self, page: u32) {
        if let Some(flag) = self.backed.get(page as usize) {
            flag.store(false, Ordering::Release);
        }
    }
}

struct HostPages {
    pages: Vec<HostBlock>,
    spare: Vec<usize>,
    assigned: Vec<Option<usize>>,
}

/// `page_table[address / page_size] + address % page_size`, letting a
/// contiguous guest space sit on discontiguous host pages.
pub(crate) struct PagedTranslator {
    page_size: u32,
    page_table: Box<[AtomicPtr<u8>]>,
    host: Mutex<HostPages>,
}

impl PagedTranslator {
    pub fn new(size: u32, page_size: u32) -> PagedTranslator {
        let page_count = (size / page_size) as usize;
        PagedTranslator {
            page_size,
            page_table: (0..page_count)
                .map(|_| AtomicPtr::new(ptr::null_mut()))
                .collect(),
            host: Mutex::new(HostPages {
                pages: Vec::new(),
                spare: Vec::new(),
                assigned: vec![None; page_count],
            }),
        }
    }
}

impl Translate for PagedTranslator {
    fn mode(&self) -> AddressingMode {
        AddressingMode::Paged
    }

    #[inline]
    fn host_span(&self, addr: Address, len: usize) -> Option<NonNull<u8>> {
        let page_index = (addr / self.page_size) as usize;
        let page_offset = (addr % self.page_size) as usize;
        if page_offset.checked_add(len)? > self.page_size as usize {
            return None;
        }

        let base = NonNull::new(self.page_table.get(page_index)?.load(Ordering::Acquire))?;
        // SAFETY: every host page is `page_size` bytes long, and
        // `page_offset + len <= page_size`.
        NonNull::new(unsafe { base.as_ptr().add(page_offset) })
    }

    fn is_backed(&self, page: u32) -> bool {
        self.page_table
            .get(page as usize)
            .map(|p| !p.load(Ordering::Acquire).is_null())
            .unwrap_or(false)
    }

    fn map(&self, page: u32) {
        let Some(entry) = self.page_table.get(page as usize) else {
            return;
        };

        let mut host = match self.host.lock() {
            Ok(host) => host,
            Err(poisoned) => poisoned.into_inner(),
        };
        if host.assigned[page as usize].is_some() {
            return;
        }

        let idx = match host.spare.pop() {
            Some(idx) => {
                let recycled = block_base(&host.pages[idx]);
                // SAFETY: spare pages are unmapped, so no guest access can
                // observe the reset; the page is `page_size` bytes long.
                unsafe { ptr::write_bytes(recycled, 0, self.page_size as usize) };
                idx
            }
            None => {
                host.pages.push(zeroed_block(self.page_size as usize));
                host.pages.len() - 1
            }
        };

        host.assigned[page as usize] = Some(idx);
        entry.store(block_base(&host.pages[idx]), Ordering::Release);
    }

    fn unmap(&self, page: u32) {
        let Some(entry) = self.page_table.get(page as usize) else {
            return;
        };

        let mut host = match self.host.lock() {
            Ok(host) => host,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(idx) = host.assigned[page as usize].take() {
            entry.store(ptr::null_mut(), Ordering::Release);
            host.spare.push(idx);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_span_ignores_allocation_state() {
        let t = FlatTranslator::new(0x4000, 0x1000);
        assert!(t.host_span(0x1ffc, 8).is_some());
        assert!(!t.is_backed(1));
        assert!(t.host_span(0x3ffc, 8).is_none());
    }

    #[test]
    fn paged_span_requires_mapping() {
        let t = PagedTranslator::new(0x4000, 0x1000);
        assert!(t.host_span(0x1000, 4).is_none());

        t.map(1);
        assert!(t.is_backed(1));
        assert!(t.host_span(0x1000, 4).is_some());
        // straddles into an unmapped page
        assert!(t.host_span(0x1ffe, 4).is_none());

        t.unmap(1);
        assert!(t.host_span(0x1000, 4).is_none());
    }

    #[test]
    fn paged_pages_are_recycled_zeroed() {
        let t = PagedTranslator::new(0x4000, 0x1000);
        t.map(2);
        let p = t.host_span(0x2010, 1).unwrap();
        unsafe { *p.as_ptr() = 0xaa };
        t.unmap(2);

        t.map(3);
        let q = t.host_span(0x3010, 1).unwrap();
        assert_eq!(p, q);
        assert_eq!(unsafe { *q.as_ptr() }, 0);
    }
}
