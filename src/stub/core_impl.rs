use core::marker::PhantomData;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::*;

use crate::conn::Connection;
use crate::protocol::commands::{self, CommandKind};
use crate::protocol::{write_ack, Frame, PacketBuf, ResponseWriter};
use crate::stub::error::{GdbServerError as Error, HandlerError};
use crate::stub::SessionConfig;
use crate::target::{Target, ThreadId};

/// Common imports used by every handler module.
mod prelude {
    pub(super) use log::*;

    pub(super) use crate::protocol::commands::{CommandKind, ParseCommand};
    pub(super) use crate::protocol::PacketBuf;
    pub(super) use crate::stub::core_impl::{GdbStubImpl, HandlerStatus};
    pub(super) use crate::stub::error::{HandlerError, HandlerResultExt};
    pub(super) use crate::target::{GuestThread, Target};
}

mod base;
mod breakpoints;
mod resume;
mod single_register_access;

/// Describes why the GDB session ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DisconnectReason {
    /// GDB issued a kill command
    Kill,
    /// The termination flag was raised (e.g: by [`ServerHandle::shutdown`])
    ///
    /// [`ServerHandle::shutdown`]: crate::stub::ServerHandle::shutdown
    Terminated,
    /// The client closed the connection
    PeerClosed,
}

pub enum State {
    Pump,
    Disconnect(DisconnectReason),
}

pub(crate) enum HandlerStatus {
    Handled,
    NeedsOk,
    Disconnect(DisconnectReason),
}

/// Per-connection session state.
pub(crate) struct GdbStubImpl<T: Target> {
    _target: PhantomData<T>,

    pub(crate) config: SessionConfig,
    die: Arc<AtomicBool>,

    /// Thread targeted by register and memory commands (`Hg`).
    current_thread: Option<ThreadId>,
    /// Thread most recently found halted at a breakpoint.
    inferior_thread: Option<ThreadId>,
    /// `qsThreadInfo` cursor.
    thread_info_index: usize,
    /// Body of the last reply, resent when the client nacks it.
    last_reply: String,
}

impl<T: Target> GdbStubImpl<T> {
    pub fn new(config: SessionConfig, die: Arc<AtomicBool>) -> GdbStubImpl<T> {
        GdbStubImpl {
            _target: PhantomData,

            config,
            die,

            current_thread: None,
            inferior_thread: None,
            thread_info_index: 0,
            last_reply: String::new(),
        }
    }

    pub fn is_terminated(&self) -> bool {
        self.die.load(Ordering::SeqCst)
    }

    #[cfg(test)]
    pub fn current_thread(&self) -> Option<ThreadId> {
        self.current_thread
    }

    #[cfg(test)]
    pub fn inferior_thread(&self) -> Option<ThreadId> {
        self.inferior_thread
    }

    pub fn handle_frame<C: Connection>(
        &mut self,
        target: &T,
        conn: &mut C,
        frame: Frame<'_>,
    ) -> Result<State, Error<C::Error>> {
        match frame {
            Frame::Ack => Ok(State::Pump),
            Frame::Nack => {
                debug!("<-- nack, resending last reply");
                self.send_reply(conn)?;
                Ok(State::Pump)
            }
            Frame::Garbage(byte) => {
                debug!("Skipping unexpected byte {:#04x} outside of a packet", byte);
                Ok(State::Pump)
            }
            Frame::Packet(raw) => {
                // Acknowledge the frame
                write_ack(conn, true)?;

                match PacketBuf::new(raw) {
                    Ok(pkt) => self.handle_packet(target, conn, pkt),
                    Err(e) => {
                        warn!("Dropping invalid packet: {}", e);
                        write_ack(conn, false)?;
                        Ok(State::Pump)
                    }
                }
            }
        }
    }

    fn handle_packet<C: Connection>(
        &mut self,
        target: &T,
        conn: &mut C,
        pkt: PacketBuf<'_>,
    ) -> Result<State, Error<C::Error>> {
        let mut res = String::new();

        let status = match commands::lookup(pkt.as_body()) {
            Some((prefix, kind)) => {
                debug!("Recognized command {:?}: {}", prefix, pkt.body_lossy());
                self.handle_command(&mut res, target, kind, pkt, prefix.len())
            }
            None => {
                info!("Unrecognized GDB command: {}", pkt.body_lossy());
                Ok(HandlerStatus::Handled)
            }
        };

        match status {
            Ok(HandlerStatus::Handled) => {}
            Ok(HandlerStatus::NeedsOk) => res.push_str("OK"),
            Ok(HandlerStatus::Disconnect(reason)) => return Ok(State::Disconnect(reason)),
            Err(HandlerError::Errno(code)) => {
                res.clear();
                res.push_str(&format!("E{:02X}", code));
            }
        }

        // no more replies once the session is being torn down
        if self.is_terminated() {
            return Ok(State::Disconnect(DisconnectReason::Terminated));
        }

        self.last_reply = res;
        self.send_reply(conn)?;
        Ok(State::Pump)
    }

    fn handle_command(
        &mut self,
        res: &mut String,
        target: &T,
        kind: CommandKind,
        pkt: PacketBuf<'_>,
        prefix_len: usize,
    ) -> Result<HandlerStatus, HandlerError> {
        let args = pkt.clone().trim_start_body_bytes(prefix_len);

        match kind {
            CommandKind::Unimplemented => {
                info!("Unimplemented GDB command: {}", pkt.body_lossy());
                Ok(HandlerStatus::Handled)
            }
            CommandKind::Deprecated => {
                info!(
                    "Deprecated GDB command (use vCont instead): {}",
                    pkt.body_lossy()
                );
                Ok(HandlerStatus::Handled)
            }
            CommandKind::ReadRegister | CommandKind::WriteRegister => {
                self.handle_single_register_access(res, target, kind, args)
            }
            CommandKind::AddBreakpoint | CommandKind::RemoveBreakpoint => {
                self.handle_breakpoints(target, kind, args)
            }
            CommandKind::VContSupported | CommandKind::VCont => {
                self.handle_stop_resume(res, target, kind, args)
            }
            _ => self.handle_base(res, target, kind, args),
        }
    }

    fn send_reply<C: Connection>(&self, conn: &mut C) -> Result<(), Error<C::Error>> {
        let mut res = ResponseWriter::new(conn);
        res.write_str(&self.last_reply);
        res.flush()?;
        Ok(())
    }
}
