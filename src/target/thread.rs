use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::Duration;

use super::Cpu;

/// Scheduler thread identifier.
pub type ThreadId = i32;

/// Run state of an emulated thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadStatus {
    /// Created but not started, or exited.
    Dormant,
    /// Executing guest code.
    Run,
    /// Blocked on a guest synchronization primitive.
    Wait,
    /// Stopped by the scheduler (or the debugger).
    Suspend,
}

/// A thread's run state, guarded by the thread's own lock, plus a condition
/// variable signalled on every status change.
#[derive(Debug)]
pub struct StatusCell {
    status: Mutex<ThreadStatus>,
    changed: Condvar,
}

impl StatusCell {
    pub fn new(status: ThreadStatus) -> StatusCell {
        StatusCell {
            status: Mutex::new(status),
            changed: Condvar::new(),
        }
    }

    /// Take the thread's lock.
    ///
    /// Writers holding the guard must call [`StatusCell::notify`] after
    /// mutating the status, or simply use [`StatusCell::set`].
    pub fn lock(&self) -> MutexGuard<'_, ThreadStatus> {
        match self.status.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn get(&self) -> ThreadStatus {
        *self.lock()
    }

    pub fn set(&self, status: ThreadStatus) {
        *self.lock() = status;
        self.notify();
    }

    pub fn notify(&self) {
        self.changed.notify_all();
    }

    /// Block until `pred` holds for the current status, or `timeout` elapses.
    ///
    /// Returns whether `pred` held when this method returned.
    pub fn wait_until(
        &self,
        mut pred: impl FnMut(ThreadStatus) -> bool,
        timeout: Duration,
    ) -> bool {
        let guard = self.lock();
        let (guard, _) = match self
            .changed
            .wait_timeout_while(guard, timeout, |status| !pred(*status))
        {
            Ok(res) => res,
            Err(poisoned) => poisoned.into_inner(),
        };
        pred(*guard)
    }
}

/// An emulated thread, owned by the scheduler.
pub trait GuestThread: Send + Sync + 'static {
    type Cpu: Cpu;

    fn id(&self) -> ThreadId;

    fn name(&self) -> &str;

    /// The thread's status, and the lock guarding it.
    fn status(&self) -> &StatusCell;

    /// Resume a suspended thread, optionally for a single instruction.
    ///
    /// Must move the status away from [`ThreadStatus::Suspend`] before
    /// returning. A single step ends with the thread back in
    /// [`ThreadStatus::Suspend`].
    fn resume(&self, step: bool);

    /// Ask a running thread to stop. The thread reports
    /// [`ThreadStatus::Suspend`] once it has.
    fn suspend(&self);

    /// Run `f` with exclusive access to the thread's CPU state.
    fn with_cpu<R>(&self, f: impl FnOnce(&mut Self::Cpu) -> R) -> R;

    /// Guest call stack, for diagnostics.
    fn stack_traceback(&self) -> String {
        String::new()
    }
}
