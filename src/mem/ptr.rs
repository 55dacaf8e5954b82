use core::cmp::Ordering;
use core::fmt;
use core::hash::{Hash, Hasher};
use core::marker::PhantomData;
use core::mem::{size_of, MaybeUninit};
use core::ops::Add;
use core::ptr::NonNull;

use log::*;

use super::{Address, MemState};

/// Plain-old-data that may live in guest memory.
///
/// # Safety
///
/// Every bit pattern of `size_of::<Self>()` bytes must be a valid `Self`.
pub unsafe trait GuestValue: Copy + Send + Sync + 'static {}

/// A [`GuestValue`] which supports a hardware compare-and-swap.
pub trait GuestAtomic: GuestValue {
    /// Atomically replace `*ptr` with `new` if it equals `current`.
    ///
    /// Returns `false` (without touching memory) if `ptr` is not suitably
    /// aligned for the matching atomic type.
    ///
    /// # Safety
    ///
    /// `ptr` must be valid for reads and writes of `Self`.
    #[doc(hidden)]
    unsafe fn compare_exchange_at(ptr: *mut Self, current: Self, new: Self) -> bool;
}

macro_rules! impl_guest_value {
    ($($num:ty)*) => {
        $(
            // SAFETY: primitive numeric types have no invalid bit patterns
            unsafe impl GuestValue for $num {}
        )*
    };
}

impl_guest_value!(u8 u16 u32 u64 i8 i16 i32 i64 f32 f64);

macro_rules! impl_guest_atomic {
    ($($num:ident)*) => {
        $(paste::paste! {
            impl GuestAtomic for $num {
                unsafe fn compare_exchange_at(ptr: *mut Self, current: Self, new: Self) -> bool {
                    use core::sync::atomic::{self, [<Atomic $num:camel>]};

                    if (ptr as usize) % core::mem::align_of::<[<Atomic $num:camel>]>() != 0 {
                        error!("Misaligned atomic access at host {:p}", ptr);
                        return false;
                    }

                    // SAFETY: alignment was checked above, validity is
                    // guaranteed by the caller
                    let atomic = unsafe { [<Atomic $num:camel>]::from_ptr(ptr) };
                    atomic
                        .compare_exchange(
                            current,
                            new,
                            atomic::Ordering::SeqCst,
                            atomic::Ordering::SeqCst,
                        )
                        .is_ok()
                }
            }
        })*
    };
}

impl_guest_atomic!(u8 u16 u32 u64 i8 i16 i32 i64);

/// A typed pointer into guest memory.
///
/// A `Ptr` is just a 32-bit guest address: it owns nothing, and is resolved
/// against a [`MemState`] every time it is dereferenced. A `Ptr` may outlive
/// the allocation it points into, so it must be (re)validated before use.
#[repr(transparent)]
pub struct Ptr<T> {
    addr: Address,
    _marker: PhantomData<fn() -> T>,
}

const _: () = assert!(size_of::<Ptr<u64>>() == 4);

impl<T> Ptr<T> {
    pub const fn new(addr: Address) -> Ptr<T> {
        Ptr {
            addr,
            _marker: PhantomData,
        }
    }

    pub const fn null() -> Ptr<T> {
        Ptr::new(0)
    }

    pub const fn address(&self) -> Address {
        self.addr
    }

    pub const fn is_null(&self) -> bool {
        self.addr == 0
    }

    pub fn cast<U>(self) -> Ptr<U> {
        Ptr::new(self.addr)
    }

    pub fn reset(&mut self) {
        self.addr = 0;
    }

    /// Check if the page containing this pointer is backed.
    pub fn valid(&self, mem: &MemState) -> bool {
        mem.is_valid_addr(self.addr)
    }
}

impl<T: GuestValue> Ptr<T> {
    /// Direct resolution.
    ///
    /// Returns `None` for the null pointer or when no host memory sits behind
    /// the address. Allocation state is *not* checked: validate the address
    /// (e.g: via [`MemState::check_memory_region`]) before dereferencing
    /// addresses that came from the guest or the debugger.
    #[inline]
    pub fn get<'m>(&self, mem: &'m MemState) -> Option<HostRef<'m, T>> {
        if self.addr == 0 {
            return None;
        }
        HostRef::resolve(mem, self.addr)
    }

    /// Validated resolution: subtracts the configured base offset, checks the
    /// resulting address is backed, and resolves it.
    pub fn get_guest<'m>(&self, mem: &'m MemState) -> Option<HostRef<'m, T>> {
        if self.addr == 0 {
            error!("Accessing null pointer.");
            return None;
        }

        let relative = self.addr.wrapping_sub(mem.base_offset());
        if !mem.is_valid_addr(relative) {
            error!(
                "Accessing invalid host address {:#010x} for guest address {:#010x}",
                relative, self.addr
            );
            return None;
        }

        HostRef::resolve(mem, relative)
    }

    /// Shorthand for `self.get(mem).map(|r| r.read())`.
    pub fn read(&self, mem: &MemState) -> Option<T> {
        self.get(mem).map(|r| r.read())
    }

    /// Shorthand for `self.get(mem).map(|r| r.write(value))`, returning
    /// whether the write happened.
    pub fn write(&self, mem: &MemState, value: T) -> bool {
        self.get(mem).map(|r| r.write(value)).is_some()
    }

    /// Allocate guest memory for a single zero-initialized `T`.
    pub fn alloc(mem: &MemState, name: &str) -> Option<Ptr<T>> {
        mem.alloc(size_of::<T>() as u32, name).map(Ptr::new)
    }

    /// Release memory obtained via [`Ptr::alloc`].
    pub fn free(self, mem: &MemState) -> bool {
        mem.free(self.addr)
    }
}

impl<T: GuestAtomic> Ptr<T> {
    /// Atomically store `value` if the guest-resident value equals
    /// `expected`. Returns whether the swap happened.
    ///
    /// Uses the same translation as [`Ptr::get`], in either addressing mode.
    pub fn atomic_compare_and_swap(&self, mem: &MemState, value: T, expected: T) -> bool {
        if self.addr == 0 {
            error!("Atomic access through null pointer.");
            return false;
        }

        let Some(host) = mem.translator().host_span(self.addr, size_of::<T>()) else {
            error!(
                "Atomic access at unbacked or page-straddling guest address {:#010x}",
                self.addr
            );
            return false;
        };

        // SAFETY: `host_span` guarantees `size_of::<T>()` bytes of live host
        // memory behind `host`.
        unsafe { T::compare_exchange_at(host.as_ptr() as *mut T, expected, value) }
    }
}

impl<T> Clone for Ptr<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Ptr<T> {}

impl<T> Default for Ptr<T> {
    fn default() -> Self {
        Ptr::null()
    }
}

impl<T> fmt::Debug for Ptr<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Ptr({:#010x})", self.addr)
    }
}

impl<T> PartialEq for Ptr<T> {
    fn eq(&self, other: &Self) -> bool {
        self.addr == other.addr
    }
}

impl<T> Eq for Ptr<T> {}

impl<T> PartialOrd for Ptr<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Ptr<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.addr.cmp(&other.addr)
    }
}

impl<T> Hash for Ptr<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.addr.hash(state)
    }
}

/// Offset by a number of `T`-sized elements (wrapping).
impl<T> Add<i32> for Ptr<T> {
    type Output = Ptr<T>;

    fn add(self, offset: i32) -> Ptr<T> {
        let bytes = offset.wrapping_mul(size_of::<T>() as i32);
        Ptr::new(self.addr.wrapping_add(bytes as u32))
    }
}

impl<T> From<Address> for Ptr<T> {
    fn from(addr: Address) -> Ptr<T> {
        Ptr::new(addr)
    }
}

/// A resolved guest location, borrowed from its [`MemState`].
///
/// The host location is only reachable through [`HostRef::read`] and
/// [`HostRef::write`]. Values straddling two host pages (paged mode) are
/// accessed a byte at a time.
pub struct HostRef<'m, T> {
    mem: &'m MemState,
    addr: Address,
    contiguous: Option<NonNull<u8>>,
    _marker: PhantomData<T>,
}

impl<'m, T: GuestValue> HostRef<'m, T> {
    fn resolve(mem: &'m MemState, addr: Address) -> Option<HostRef<'m, T>> {
        let translator = mem.translator();
        let contiguous = translator.host_span(addr, size_of::<T>());
        if contiguous.is_none() {
            // either unbacked, or split across host pages
            let all_bytes_backed = (0..size_of::<T>() as u32)
                .all(|i| translator.host_span(addr.wrapping_add(i), 1).is_some());
            if !all_bytes_backed {
                return None;
            }
        }

        Some(HostRef {
            mem,
            addr,
            contiguous,
            _marker: PhantomData,
        })
    }

    /// The (base-offset adjusted) guest address this reference resolved.
    pub fn address(&self) -> Address {
        self.addr
    }

    pub fn read(&self) -> T {
        if let Some(host) = self.contiguous {
            // SAFETY: `host_span` vouched for `size_of::<T>()` bytes, and any
            // bit pattern is a valid `T`.
            return unsafe { (host.as_ptr() as *const T).read_unaligned() };
        }

        let mut out = MaybeUninit::<T>::zeroed();
        let out_bytes = out.as_mut_ptr() as *mut u8;
        for i in 0..size_of::<T>() {
            match self
                .mem
                .translator()
                .host_span(self.addr.wrapping_add(i as u32), 1)
            {
                // SAFETY: both pointers are valid for a single byte
                Some(src) => unsafe { *out_bytes.add(i) = *src.as_ptr() },
                None => warn!(
                    "Guest page under {:#010x} was unmapped mid-read",
                    self.addr.wrapping_add(i as u32)
                ),
            }
        }
        // SAFETY: zero-initialized, and any bit pattern is a valid `T`
        unsafe { out.assume_init() }
    }

    pub fn write(&self, value: T) {
        if let Some(host) = self.contiguous {
            // SAFETY: `host_span` vouched for `size_of::<T>()` bytes
            unsafe { (host.as_ptr() as *mut T).write_unaligned(value) };
            return;
        }

        let bytes = &value as *const T as *const u8;
        for i in 0..size_of::<T>() {
            match self
                .mem
                .translator()
                .host_span(self.addr.wrapping_add(i as u32), 1)
            {
                // SAFETY: both pointers are valid for a single byte
                Some(dst) => unsafe { *dst.as_ptr() = *bytes.add(i) },
                None => warn!(
                    "Guest page under {:#010x} was unmapped mid-write",
                    self.addr.wrapping_add(i as u32)
                ),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mem::{AddressingMode, MemConfig};

    fn mem(mode: AddressingMode) -> MemState {
        MemState::new(MemConfig {
            size: 0x10000,
            mode,
            ..Default::default()
        })
    }

    #[test]
    fn null_never_resolves() {
        let mem = mem(AddressingMode::Flat);
        let p = Ptr::<u32>::null();
        assert!(p.get(&mem).is_none());
        assert!(p.get_guest(&mem).is_none());
        assert!(!p.atomic_compare_and_swap(&mem, 1, 0));
    }

    #[test]
    fn direct_resolve_skips_allocation_check() {
        let mem = mem(AddressingMode::Flat);
        let p = Ptr::<u32>::new(0x2000);
        // flat mode: host memory exists, even though nothing is allocated
        assert!(p.write(&mem, 7));
        assert_eq!(p.read(&mem), Some(7));
        assert!(p.get_guest(&mem).is_none());

        // paged mode: no host page, nothing to resolve
        let mem = self::mem(AddressingMode::Paged);
        assert!(p.get(&mem).is_none());
    }

    #[test]
    fn validated_resolve_applies_base_offset() {
        let mem = MemState::new(MemConfig {
            size: 0x10000,
            base_offset: 0x8100_0000,
            ..Default::default()
        });
        let addr = mem.alloc(4, "x").unwrap();

        let guest = Ptr::<u32>::new(0x8100_0000 + addr);
        guest.get_guest(&mem).unwrap().write(0xdead_beef);
        assert_eq!(Ptr::<u32>::new(addr).read(&mem), Some(0xdead_beef));
        assert!(Ptr::<u32>::new(addr).get_guest(&mem).is_none());
    }

    #[test]
    fn paged_value_straddling_pages() {
        let mem = mem(AddressingMode::Paged);
        let a = mem.alloc(0x2000, "two pages").unwrap();
        let p = Ptr::<u64>::new(a + 0xffc);
        assert!(p.write(&mem, 0x0102_0304_0506_0708));
        assert_eq!(p.read(&mem), Some(0x0102_0304_0506_0708));
        assert_eq!(Ptr::<u8>::new(a + 0xffc).read(&mem), Some(0x08));
        assert_eq!(Ptr::<u8>::new(a + 0x1003).read(&mem), Some(0x01));
    }

    #[test]
    fn compare_and_swap_in_both_modes() {
        for mode in [AddressingMode::Flat, AddressingMode::Paged] {
            let mem = mem(mode);
            let p = Ptr::<u32>::alloc(&mem, "lock").unwrap();
            let p = p + 3;

            assert!(p.atomic_compare_and_swap(&mem, 5, 0));
            assert!(!p.atomic_compare_and_swap(&mem, 9, 0));
            assert_eq!(p.read(&mem), Some(5));
            assert!(p.atomic_compare_and_swap(&mem, 9, 5));
            assert_eq!(p.read(&mem), Some(9));
        }
    }

    #[test]
    fn compare_and_swap_ignores_base_offset() {
        let mem = MemState::new(MemConfig {
            size: 0x10000,
            base_offset: 0x8100_0000,
            ..Default::default()
        });
        let addr = mem.alloc(4, "lock").unwrap();

        let p = Ptr::<u32>::new(addr);
        assert!(p.atomic_compare_and_swap(&mem, 7, 0));
        assert_eq!(p.get(&mem).unwrap().read(), 7);
        let offset = Ptr::<u32>::new(0x8100_0000 + addr);
        assert!(!offset.atomic_compare_and_swap(&mem, 9, 7));
        assert_eq!(p.read(&mem), Some(7));
    }

    #[test]
    fn compare_and_swap_rejects_misaligned() {
        let mem = mem(AddressingMode::Flat);
        let base = mem.alloc(16, "buf").unwrap();
        let p = Ptr::<u32>::new(base + 1);
        assert!(!p.atomic_compare_and_swap(&mem, 1, 0));
    }

    #[test]
    fn freed_pointer_stops_validating() {
        let mem = mem(AddressingMode::Paged);
        let p = Ptr::<u16>::alloc(&mem, "short").unwrap();
        assert!(p.valid(&mem));
        assert!(p.free(&mem));
        assert!(!p.valid(&mem));
        assert!(p.get(&mem).is_none());
    }

    #[test]
    fn arithmetic_and_ordering() {
        let p = Ptr::<u32>::new(0x1000);
        assert_eq!((p + 2).address(), 0x1008);
        assert_eq!((p + -1).address(), 0x0ffc);
        assert!(p < p + 1);
        assert_eq!(p.cast::<u8>().address(), 0x1000);

        let mut q = p;
        q.reset();
        assert!(q.is_null());
    }
}
