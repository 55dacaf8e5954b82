use super::prelude::*;
use super::DisconnectReason;
use crate::arch::arm::reg::ArmCoreRegId;
use crate::mem::Ptr;
use crate::protocol::commands::{m, G, H, M, T as ThreadAliveCmd};
use crate::protocol::common::{encode_hex_buf, encode_reg_le};
use crate::target::{fetch_reg, modify_reg, ThreadId, ThreadMap};

/// Features advertised in reply to `qSupported`.
const SUPPORTED_FEATURES: &str = "multiprocess-;swbreak+;hwbreak-;qRelocInsn-;fork-events-;\
vfork-events-;exec-events-;vContSupported+;QThreadEvents-;no-resumed-;xmlRegisters=arm";

/// Format a thread id the way thread queries report it.
fn write_thread_id(res: &mut String, id: ThreadId) {
    res.push_str(&format!("{:08x}", id));
}

impl<T: Target> GdbStubImpl<T> {
    /// Resolve an `H` thread selector against the live threads.
    fn select_thread(threads: &ThreadMap<T::Thread>, id: ThreadId) -> Option<ThreadId> {
        match id {
            0 => threads.keys().next().copied(),
            -1 => None,
            id => Some(id),
        }
    }

    pub(crate) fn handle_base(
        &mut self,
        res: &mut String,
        target: &T,
        kind: CommandKind,
        buf: PacketBuf<'_>,
    ) -> Result<HandlerStatus, HandlerError> {
        let handler_status = match kind {
            CommandKind::HaltReason => {
                res.push_str("S05");
                HandlerStatus::Handled
            }

            CommandKind::SetThread => {
                let cmd = H::from_packet(buf).or_errno(HandlerError::INVALID_THREAD)?;
                match cmd.op {
                    b'g' => {
                        let threads = target.threads();
                        self.current_thread = Self::select_thread(&threads, cmd.thread);
                    }
                    b'c' => info!("GDB client used deprecated Hc{:x}", cmd.thread),
                    op => info!("Unknown H operation '{}'", op as char),
                }
                HandlerStatus::NeedsOk
            }
            CommandKind::ThreadAlive => {
                let cmd = ThreadAliveCmd::from_packet(buf)
                    .or_errno(HandlerError::INVALID_THREAD)?;
                target
                    .threads()
                    .contains_key(&cmd.thread)
                    .or_errno(HandlerError::INVALID_THREAD)?;
                HandlerStatus::NeedsOk
            }

            CommandKind::ReadRegisters => {
                let threads = target.threads();
                let thread = self.lookup_current(&threads)?;
                thread.with_cpu(|cpu| {
                    for reg in 0..ArmCoreRegId::COUNT {
                        encode_reg_le(res, fetch_reg(cpu, reg));
                    }
                });
                HandlerStatus::Handled
            }
            CommandKind::WriteRegisters => {
                let cmd = G::from_packet(buf).or_errno(HandlerError::INVALID_THREAD)?;
                let threads = target.threads();
                let thread = self.lookup_current(&threads)?;
                thread.with_cpu(|cpu| {
                    for (reg, val) in cmd.vals.iter().enumerate() {
                        modify_reg(cpu, reg, *val);
                    }
                });
                HandlerStatus::NeedsOk
            }

            CommandKind::ReadMemory => {
                let cmd = m::from_packet(buf).or_errno(HandlerError::INVALID_MEMORY)?;
                let mem = target.mem();

                let end = cmd.addr as u64 + cmd.len as u64;
                if !mem.is_valid_addr_range(cmd.addr, end) {
                    error!(
                        "GDB client read outside of guest memory: {:#010x}..{:#010x}",
                        cmd.addr, end
                    );
                    return Err(HandlerError::INVALID_MEMORY);
                }
                if !mem.check_memory_region(cmd.addr, cmd.len) {
                    warn!(
                        "GDB client read unmapped memory: {:#010x}, {} bytes",
                        cmd.addr, cmd.len
                    );
                    return Err(HandlerError::INVALID_MEMORY);
                }

                let data = (0..cmd.len)
                    .map(|i| Ptr::<u8>::new(cmd.addr + i).read(mem))
                    .collect::<Option<Vec<u8>>>()
                    .or_errno(HandlerError::INVALID_MEMORY)?;
                encode_hex_buf(res, &data);
                HandlerStatus::Handled
            }
            CommandKind::WriteMemory => {
                let cmd = M::from_packet(buf).or_errno(HandlerError::INVALID_MEMORY)?;
                let mem = target.mem();

                if cmd.val.len() != cmd.len as usize {
                    warn!(
                        "GDB client sent {} bytes for a {} byte write",
                        cmd.val.len(),
                        cmd.len
                    );
                    return Err(HandlerError::INVALID_MEMORY);
                }
                if !mem.check_memory_region(cmd.addr, cmd.len) {
                    warn!(
                        "GDB client wrote unmapped memory: {:#010x}, {} bytes",
                        cmd.addr, cmd.len
                    );
                    return Err(HandlerError::INVALID_MEMORY);
                }

                // resolve everything first, so a failure leaves memory untouched
                let dest = (0..cmd.len)
                    .map(|i| Ptr::<u8>::new(cmd.addr + i).get(mem))
                    .collect::<Option<Vec<_>>>()
                    .or_errno(HandlerError::INVALID_MEMORY)?;
                for (host, byte) in dest.iter().zip(cmd.val) {
                    host.write(byte);
                }
                HandlerStatus::NeedsOk
            }

            CommandKind::FirstThreadInfo => {
                let threads = target.threads();
                self.thread_info_index = 0;
                match threads.keys().next() {
                    Some(&id) => {
                        res.push('m');
                        write_thread_id(res, id);
                    }
                    None => res.push('l'),
                }
                HandlerStatus::Handled
            }
            CommandKind::NextThreadInfo => {
                let threads = target.threads();
                self.thread_info_index += 1;
                match threads.keys().nth(self.thread_info_index) {
                    Some(&id) => {
                        res.push('m');
                        write_thread_id(res, id);
                    }
                    None => res.push('l'),
                }
                HandlerStatus::Handled
            }
            CommandKind::CurrentThread => {
                res.push_str("QC");
                write_thread_id(res, self.current_thread.unwrap_or(-1));
                HandlerStatus::Handled
            }

            CommandKind::Supported => {
                res.push_str(SUPPORTED_FEATURES);
                HandlerStatus::Handled
            }
            CommandKind::Attached => {
                res.push('1');
                HandlerStatus::Handled
            }
            CommandKind::TraceStatus => {
                res.push_str("T0");
                HandlerStatus::Handled
            }

            CommandKind::Detach => {
                info!("GDB client detached");
                HandlerStatus::NeedsOk
            }
            CommandKind::Kill => {
                info!("GDB client requested the server to shut down");
                HandlerStatus::Disconnect(DisconnectReason::Kill)
            }
            CommandKind::VKill => HandlerStatus::NeedsOk,
            CommandKind::MustReplyEmpty => HandlerStatus::Handled,

            // routed to their own handlers by `handle_command`
            CommandKind::Unimplemented
            | CommandKind::Deprecated
            | CommandKind::ReadRegister
            | CommandKind::WriteRegister
            | CommandKind::VContSupported
            | CommandKind::VCont
            | CommandKind::RemoveBreakpoint
            | CommandKind::AddBreakpoint => HandlerStatus::Handled,
        };
        Ok(handler_status)
    }

    /// The thread selected with `Hg`, if it still exists.
    pub(crate) fn lookup_current<'a>(
        &self,
        threads: &'a ThreadMap<T::Thread>,
    ) -> Result<&'a T::Thread, HandlerError> {
        self.current_thread
            .and_then(|id| threads.get(&id))
            .map(|thread| &**thread)
            .or_errno(HandlerError::INVALID_THREAD)
    }
}
