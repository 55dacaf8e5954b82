use std::sync::Arc;

use super::prelude::*;
use super::DisconnectReason;
use crate::protocol::commands::vCont;
use crate::target::{Cpu, ThreadId, ThreadStatus};

/// Run-control variants advertised in reply to `vCont?`.
const VCONT_SUPPORTED: &str = "vCont;c;C;s;S";

/// The termination flag was raised while waiting on the emulator.
struct Terminated;

impl<T: Target> GdbStubImpl<T> {
    pub(crate) fn handle_stop_resume(
        &mut self,
        res: &mut String,
        target: &T,
        kind: CommandKind,
        buf: PacketBuf<'_>,
    ) -> Result<HandlerStatus, HandlerError> {
        let cmd = match kind {
            CommandKind::VContSupported => {
                res.push_str(VCONT_SUPPORTED);
                return Ok(HandlerStatus::Handled);
            }
            CommandKind::VCont => {
                vCont::from_packet(buf).or_errno(HandlerError::INVALID_THREAD)?
            }
            _ => return Ok(HandlerStatus::Handled),
        };

        // Only the first resume action is carried out: the reply reports
        // where that run stopped.
        for action in cmd.actions.iter() {
            let kind = match action.kind {
                Ok(kind) if kind.is_resume() => kind,
                Ok(kind) => {
                    info!("Unsupported vCont action {:?}", kind);
                    continue;
                }
                Err(letter) => {
                    info!("Unsupported vCont command '{}'", letter as char);
                    continue;
                }
            };

            if let Some(thread) = action.thread {
                debug!(
                    "vCont action scoped to thread {} applies to every thread",
                    thread
                );
            }

            return match self.run(target, kind.is_step()) {
                Ok(()) => {
                    res.push_str("S05");
                    Ok(HandlerStatus::Handled)
                }
                Err(Terminated) => Ok(HandlerStatus::Disconnect(DisconnectReason::Terminated)),
            };
        }

        Ok(HandlerStatus::Handled)
    }

    /// Step the inferior thread, or let the whole process run until some
    /// thread hits a breakpoint.
    fn run(&mut self, target: &T, step: bool) -> Result<(), Terminated> {
        self.resume_inferior(target, step)?;

        if !step {
            self.resume_all(target)?;

            let (id, thread) = self.wait_for_breakpoint(target)?;
            let (pc, lr) = thread.with_cpu(|cpu| (cpu.read_pc(), cpu.read_lr()));
            info!(
                "GDB Breakpoint trigger (thread name: {}, thread_id: {})",
                thread.name(),
                id
            );
            info!("PC: {:#010x} LR: {:#010x}", pc, lr);
            let traceback = thread.stack_traceback();
            if !traceback.is_empty() {
                info!("{}", traceback);
            }
            self.inferior_thread = Some(id);

            self.stop_all(target)?;
        }

        self.current_thread = self.inferior_thread;
        Ok(())
    }

    /// Every live thread. The collection lock is only held while copying.
    fn snapshot_threads(target: &T) -> Vec<Arc<T::Thread>> {
        target.threads().values().cloned().collect()
    }

    fn resume_inferior(&self, target: &T, step: bool) -> Result<(), Terminated> {
        let Some(id) = self.inferior_thread else {
            return Ok(());
        };
        let Some(thread) = target.threads().get(&id).cloned() else {
            warn!("Halted thread {} no longer exists", id);
            return Ok(());
        };

        thread.resume(step);
        if step {
            self.wait_for_status(&*thread, |s| s == ThreadStatus::Suspend)?;
        }
        Ok(())
    }

    fn resume_all(&self, target: &T) -> Result<(), Terminated> {
        for thread in Self::snapshot_threads(target) {
            if thread.status().get() != ThreadStatus::Suspend {
                continue;
            }
            thread.resume(false);
            self.wait_for_status(&*thread, |s| s != ThreadStatus::Suspend)?;
        }
        Ok(())
    }

    /// Poll until some suspended thread sits on an active breakpoint.
    fn wait_for_breakpoint(&self, target: &T) -> Result<(ThreadId, Arc<T::Thread>), Terminated> {
        loop {
            if self.is_terminated() {
                return Err(Terminated);
            }

            {
                let threads = target.threads();
                for (&id, thread) in threads.iter() {
                    let status = thread.status().lock();
                    if *status != ThreadStatus::Suspend {
                        continue;
                    }
                    if thread.with_cpu(|cpu| cpu.hit_breakpoint()) {
                        return Ok((id, Arc::clone(thread)));
                    }
                }
            }

            std::thread::sleep(self.config.breakpoint_poll_interval);
        }
    }

    fn stop_all(&self, target: &T) -> Result<(), Terminated> {
        for thread in Self::snapshot_threads(target) {
            if thread.status().get() != ThreadStatus::Run {
                continue;
            }
            thread.suspend();
            self.wait_for_status(&*thread, |s| {
                matches!(s, ThreadStatus::Suspend | ThreadStatus::Dormant)
            })?;
        }
        Ok(())
    }

    /// Block until `pred` holds for the thread's status, re-checking the
    /// termination flag every status poll interval.
    fn wait_for_status(
        &self,
        thread: &T::Thread,
        mut pred: impl FnMut(ThreadStatus) -> bool,
    ) -> Result<(), Terminated> {
        loop {
            if thread
                .status()
                .wait_until(&mut pred, self.config.status_poll_interval)
            {
                return Ok(());
            }
            if self.is_terminated() {
                return Err(Terminated);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    use super::super::tests::{framed, Harness};
    use super::super::DisconnectReason;
    use crate::target::mock::{MockTarget, MockThread};
    use crate::target::{GuestThread, ThreadStatus};

    #[test]
    fn supported_variants() {
        let mut h = Harness::new(MockTarget::new());
        assert_eq!(h.request("vCont?"), "vCont;c;C;s;S");
    }

    #[test]
    fn continue_until_breakpoint() {
        let target = MockTarget::new()
            .with_thread(MockThread::new(1, ThreadStatus::Suspend))
            .with_thread(
                MockThread::new(2, ThreadStatus::Suspend)
                    .breakpoint_after(Duration::from_millis(20)),
            )
            .with_thread(MockThread::new(3, ThreadStatus::Dormant));
        let mut h = Harness::new(target);

        assert_eq!(h.request("vCont;c"), "S05");
        assert_eq!(h.stub.inferior_thread(), Some(2));
        assert_eq!(h.stub.current_thread(), Some(2));
        assert_eq!(h.request("qC"), "QC00000002");

        // everything that was running got stopped again
        assert_eq!(h.target.thread(1).status().get(), ThreadStatus::Suspend);
        assert_eq!(h.target.thread(2).status().get(), ThreadStatus::Suspend);
        // dormant threads are left alone
        assert_eq!(h.target.thread(3).status().get(), ThreadStatus::Dormant);
        assert!(h.target.thread(3).resumes().is_empty());
    }

    #[test]
    fn step_inferior_thread() {
        let target = MockTarget::new()
            .with_thread(MockThread::new(1, ThreadStatus::Suspend))
            .with_thread(
                MockThread::new(2, ThreadStatus::Suspend)
                    .breakpoint_after(Duration::from_millis(5)),
            );
        let mut h = Harness::new(target);
        assert_eq!(h.request("vCont;c"), "S05");
        let pc = h.target.thread(2).with_cpu(|cpu| cpu.pc);

        assert_eq!(h.request("vCont;s:2"), "S05");
        assert_eq!(h.target.thread(2).with_cpu(|cpu| cpu.pc), pc + 4);
        assert_eq!(h.target.thread(2).resumes(), vec![false, true]);
        // a step does not touch the other threads
        assert_eq!(h.target.thread(1).resumes(), vec![false]);
        assert_eq!(h.stub.current_thread(), Some(2));
    }

    #[test]
    fn step_without_inferior_thread() {
        let mut h = Harness::new(
            MockTarget::new()
                .with_thread(MockThread::new(1, ThreadStatus::Suspend)),
        );
        assert_eq!(h.request("vCont;s"), "S05");
        assert!(h.target.thread(1).resumes().is_empty());
        assert_eq!(h.stub.current_thread(), None);
    }

    #[test]
    fn unsupported_actions_are_skipped() {
        let mut h = Harness::new(MockTarget::new());
        assert_eq!(h.request("vCont;t"), "");
        assert_eq!(h.request("vCont;q;s"), "S05");
    }

    #[test]
    fn termination_interrupts_breakpoint_wait() {
        // nothing ever hits a breakpoint
        let mut h = Harness::new(
            MockTarget::new()
                .with_thread(MockThread::new(1, ThreadStatus::Suspend)),
        );

        let die = std::sync::Arc::clone(&h.die);
        let killer = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            die.store(true, Ordering::SeqCst);
        });

        let (out, reason) = h.feed(framed("vCont;c").as_bytes());
        killer.join().unwrap();

        assert_eq!(out, "+");
        assert_eq!(reason, Some(DisconnectReason::Terminated));
        assert_eq!(h.target.thread(1).status().get(), ThreadStatus::Run);
    }
}
