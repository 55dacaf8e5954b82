use super::prelude::*;
use crate::protocol::common::decode_reg_le;

/// Digits per register in a `g`/`G` register dump.
pub const REG_DIGITS: usize = 8;

/// `G XX...`: overwrite registers 0, 1, ... with the given values.
///
/// Only whole registers are taken; trailing digits that do not make up a full
/// register are ignored.
#[derive(PartialEq, Eq, Debug)]
pub struct G {
    pub vals: Vec<u32>,
}

impl<'a> ParseCommand<'a> for G {
    fn from_packet(buf: PacketBuf<'a>) -> Option<Self> {
        let vals = buf
            .as_body()
            .chunks_exact(REG_DIGITS)
            .map(|reg| decode_reg_le(reg).ok())
            .collect::<Option<Vec<_>>>()?;
        Some(G { vals })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse() {
        test_buf!(buf, b"G", b"G0100000002000000ff");
        assert_eq!(G::from_packet(buf), Some(G { vals: vec![1, 2] }));

        test_buf!(buf, b"G", b"G");
        assert_eq!(G::from_packet(buf), Some(G { vals: vec![] }));
    }

    #[test]
    fn malformed() {
        test_buf!(buf, b"G", b"G01000000zz000000");
        assert_eq!(G::from_packet(buf), None);
    }
}
