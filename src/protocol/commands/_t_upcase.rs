use super::prelude::*;

/// `T thread-id`: is the thread still alive?
#[derive(PartialEq, Eq, Debug)]
pub struct T {
    pub thread: i32,
}

impl<'a> ParseCommand<'a> for T {
    fn from_packet(buf: PacketBuf<'a>) -> Option<Self> {
        let thread = decode_thread_id(buf.as_body()).ok()?;
        Some(T { thread })
    }
}
