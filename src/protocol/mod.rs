//! Wire-level GDB Remote Serial Protocol plumbing: framing, checksums, and
//! command argument parsing.

pub(crate) mod commands;
pub(crate) mod common;
mod packet;
mod recv_packet;
mod response_writer;

pub use packet::{checksum, PacketBuf, PacketParseError};
pub use recv_packet::{Frame, RecvPacketFramer};
pub use response_writer::{write_ack, Error as ResponseWriterError, ResponseWriter};
