use super::prelude::*;

/// `H op thread-id`: select the thread subsequent operations apply to.
#[derive(PartialEq, Eq, Debug)]
pub struct H {
    /// `g` for register/memory operations, `c` for (deprecated) `c`/`s`.
    pub op: u8,
    /// `0` picks any thread, `-1` means all of them.
    pub thread: i32,
}

impl<'a> ParseCommand<'a> for H {
    fn from_packet(buf: PacketBuf<'a>) -> Option<Self> {
        let (&op, thread) = buf.as_body().split_first()?;
        let thread = decode_thread_id(thread).ok()?;
        Some(H { op, thread })
    }
}
