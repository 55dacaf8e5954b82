use super::prelude::*;

/// Breakpoint kind the client uses for a 16-bit Thumb instruction.
pub const KIND_THUMB: u32 = 2;

/// `Z type,addr,kind` / `z type,addr,kind`
///
/// Any trailing condition or command lists are ignored.
#[derive(PartialEq, Eq, Debug)]
pub struct BasicBreakpoint {
    pub type_: u8,
    pub addr: u32,
    /// architecture dependent
    pub kind: u32,
}

impl<'a> ParseCommand<'a> for BasicBreakpoint {
    fn from_packet(buf: PacketBuf<'a>) -> Option<Self> {
        let mut body = buf.as_body().splitn(4, |&b| matches!(b, b',' | b';'));
        let type_ = decode_hex(body.next()?).ok()?;
        let addr = decode_hex(body.next()?).ok()?;
        let kind = decode_hex(body.next()?).ok()?;

        Some(BasicBreakpoint { type_, addr, kind })
    }
}

impl BasicBreakpoint {
    pub fn is_thumb(&self) -> bool {
        self.kind == KIND_THUMB
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse() {
        test_buf!(buf, b"Z", b"Z0,81000a3c,2");
        let bp = BasicBreakpoint::from_packet(buf).unwrap();
        assert_eq!(
            bp,
            BasicBreakpoint {
                type_: 0,
                addr: 0x8100_0a3c,
                kind: 2
            }
        );
        assert!(bp.is_thumb());

        test_buf!(buf, b"z", b"z0,1000,4;X1,0");
        let bp = BasicBreakpoint::from_packet(buf).unwrap();
        assert_eq!(bp.addr, 0x1000);
        assert!(!bp.is_thumb());
    }

    #[test]
    fn malformed() {
        test_buf!(buf, b"Z", b"Z0,1000");
        assert_eq!(BasicBreakpoint::from_packet(buf), None);
    }
}
