use super::prelude::*;
use crate::protocol::commands::BasicBreakpoint;

impl<T: Target> GdbStubImpl<T> {
    pub(crate) fn handle_breakpoints(
        &mut self,
        target: &T,
        kind: CommandKind,
        buf: PacketBuf<'_>,
    ) -> Result<HandlerStatus, HandlerError> {
        let cmd =
            BasicBreakpoint::from_packet(buf).or_errno(HandlerError::INVALID_MEMORY)?;

        if !target.mem().is_valid_addr(cmd.addr) {
            warn!(
                "GDB client asked for a breakpoint at invalid address {:#010x}",
                cmd.addr
            );
            return Err(HandlerError::INVALID_MEMORY);
        }

        if cmd.type_ != 0 {
            // every kind of breakpoint is emulated by a software one
            debug!(
                "Treating type {} breakpoint as a software breakpoint",
                cmd.type_
            );
        }

        match kind {
            CommandKind::AddBreakpoint => {
                info!(
                    "New breakpoint at {:#010x} ({})",
                    cmd.addr,
                    if cmd.is_thumb() { "thumb" } else { "arm" }
                );
                target.add_breakpoint(cmd.addr, cmd.is_thumb());
            }
            CommandKind::RemoveBreakpoint => {
                info!("Removing breakpoint at {:#010x}", cmd.addr);
                target.remove_breakpoint(cmd.addr);
            }
            _ => return Ok(HandlerStatus::Handled),
        }

        Ok(HandlerStatus::NeedsOk)
    }
}
