use super::prelude::*;

#[derive(PartialEq, Eq, Debug)]
pub struct m {
    pub addr: u32,
    pub len: u32,
}

impl<'a> ParseCommand<'a> for m {
    fn from_packet(buf: PacketBuf<'a>) -> Option<Self> {
        let mut body = buf.as_body().split(|&b| b == b',');
        let addr = decode_hex(body.next()?).ok()?;
        let len = decode_hex(body.next()?).ok()?;
        Some(m { addr, len })
    }
}
