use super::prelude::*;
use crate::protocol::common::decode_reg_le;

#[derive(PartialEq, Eq, Debug)]
pub struct P {
    pub reg_id: usize,
    pub val: u32,
}

impl<'a> ParseCommand<'a> for P {
    fn from_packet(buf: PacketBuf<'a>) -> Option<Self> {
        let mut body = buf.as_body().splitn(2, |&b| b == b'=');
        let reg_id = decode_hex(body.next()?).ok()?;
        let val = decode_reg_le(body.next()?).ok()?;
        Some(P { reg_id, val })
    }
}
