use super::prelude::*;

/// `M addr,length:XX...`
#[derive(PartialEq, Eq, Debug)]
pub struct M {
    pub addr: u32,
    pub len: u32,
    pub val: Vec<u8>,
}

impl<'a> ParseCommand<'a> for M {
    fn from_packet(buf: PacketBuf<'a>) -> Option<Self> {
        let mut body = buf.as_body().splitn(2, |&b| b == b':');
        let mut range = body.next()?.split(|&b| b == b',');
        let addr = decode_hex(range.next()?).ok()?;
        let len = decode_hex(range.next()?).ok()?;
        let val = decode_hex_buf(body.next()?).ok()?;

        Some(M { addr, len, val })
    }
}
