use super::prelude::*;
use crate::protocol::commands::{p, P};
use crate::protocol::common::encode_reg_le;
use crate::target::{fetch_reg, modify_reg};

impl<T: Target> GdbStubImpl<T> {
    pub(crate) fn handle_single_register_access(
        &mut self,
        res: &mut String,
        target: &T,
        kind: CommandKind,
        buf: PacketBuf<'_>,
    ) -> Result<HandlerStatus, HandlerError> {
        let handler_status = match kind {
            CommandKind::ReadRegister => {
                let cmd = p::from_packet(buf).or_errno(HandlerError::INVALID_THREAD)?;
                let threads = target.threads();
                let thread = self.lookup_current(&threads)?;
                let val = thread.with_cpu(|cpu| fetch_reg(cpu, cmd.reg_id));
                encode_reg_le(res, val);
                HandlerStatus::Handled
            }
            CommandKind::WriteRegister => {
                let cmd = P::from_packet(buf).or_errno(HandlerError::INVALID_THREAD)?;
                let threads = target.threads();
                let thread = self.lookup_current(&threads)?;
                thread.with_cpu(|cpu| modify_reg(cpu, cmd.reg_id, cmd.val));
                HandlerStatus::NeedsOk
            }
            _ => HandlerStatus::Handled,
        };

        Ok(handler_status)
    }
}
