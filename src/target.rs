//! The emulator, as seen by the debug server.
//!
//! Instruction emulation, the thread scheduler, and breakpoint detection all
//! live outside this crate. The server only reaches them through the
//! [`Target`], [`GuestThread`] and [`Cpu`] traits defined here.
//!
//! ### Locking
//!
//! The thread collection returned by [`Target::threads`] is guarded by a
//! single coarse lock, and every thread's run state is guarded by its own
//! [`StatusCell`]. Locks are always taken in the order
//!
//! 1. thread collection
//! 2. thread status
//! 3. thread CPU (via [`GuestThread::with_cpu`])
//!
//! and implementations must never acquire an earlier lock while holding a
//! later one (e.g: an emulated thread must not update its status while it
//! holds its own CPU lock).

use std::collections::BTreeMap;
use std::sync::{Arc, MutexGuard};

use crate::mem::{Address, MemState};

mod cpu;
mod thread;

#[cfg(test)]
pub(crate) mod mock;

pub use cpu::{fetch_reg, modify_reg, Cpu};
pub use thread::{GuestThread, StatusCell, ThreadId, ThreadStatus};

/// Every live thread, ordered by id.
pub type ThreadMap<T> = BTreeMap<ThreadId, Arc<T>>;

/// The emulated process being debugged.
pub trait Target: Send + Sync + 'static {
    /// The scheduler's thread type.
    type Thread: GuestThread;

    /// The process' guest memory.
    fn mem(&self) -> &MemState;

    /// Lock the thread collection.
    fn threads(&self) -> MutexGuard<'_, ThreadMap<Self::Thread>>;

    /// Register a software breakpoint at `addr`.
    ///
    /// `thumb` is set when the client asked for a 2-byte (Thumb) breakpoint.
    fn add_breakpoint(&self, addr: Address, thumb: bool);

    /// Remove a software breakpoint previously registered at `addr`.
    fn remove_breakpoint(&self, addr: Address);
}
