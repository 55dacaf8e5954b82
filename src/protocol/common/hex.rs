use num_traits::{CheckedAdd, CheckedMul, FromPrimitive, Zero};

#[derive(Debug, PartialEq, Eq)]
pub enum DecodeHexError {
    NotAscii,
    Empty,
    Overflow,
    InvalidOutput,
}

/// Decode a GDB hex string into the specified integer.
///
/// GDB hex strings may include "xx", which represent "missing" data. This
/// method simply treats "xx" as 0x00.
pub fn decode_hex<I>(buf: &[u8]) -> Result<I, DecodeHexError>
where
    I: FromPrimitive + Zero + CheckedAdd + CheckedMul,
{
    use DecodeHexError::*;

    let radix = I::from_u8(16).ok_or(InvalidOutput)?;

    if buf.is_empty() {
        return Err(Empty);
    }

    let mut result = I::zero();

    for &digit in buf {
        let x = I::from_u8(ascii2byte(digit).ok_or(NotAscii)?)
            .ok_or(InvalidOutput)?;
        result = result.checked_mul(&radix).ok_or(Overflow)?;
        result = result.checked_add(&x).ok_or(Overflow)?
    }

    Ok(result)
}

/// Decode a thread id, as sent by the client.
///
/// Thread ids are hex encoded, and may be negative (`-1` meaning "all" or
/// "none" depending on the command).
pub fn decode_thread_id(buf: &[u8]) -> Result<i32, DecodeHexError> {
    match buf {
        [b'-', rest @ ..] => {
            let magnitude: u32 = decode_hex(rest)?;
            0i32.checked_sub_unsigned(magnitude)
                .ok_or(DecodeHexError::Overflow)
        }
        _ => decode_hex::<u32>(buf).map(|id| id as i32),
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum DecodeHexBufError {
    NotAscii,
    BadLength,
}

fn ascii2byte(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        b'x' | b'X' => Some(0),
        _ => None,
    }
}

/// Decode a GDB hex string into a freshly allocated byte buffer.
///
/// Unlike [`decode_hex`], the string must contain whole bytes (i.e: an even
/// number of digits).
pub fn decode_hex_buf(buf: &[u8]) -> Result<Vec<u8>, DecodeHexBufError> {
    if buf.len() % 2 != 0 {
        return Err(DecodeHexBufError::BadLength);
    }

    buf.chunks_exact(2)
        .map(|pair| {
            let hi = ascii2byte(pair[0]).ok_or(DecodeHexBufError::NotAscii)?;
            let lo = ascii2byte(pair[1]).ok_or(DecodeHexBufError::NotAscii)?;
            Ok(hi << 4 | lo)
        })
        .collect()
}

/// Decode a register value sent as 8 hex digits of its little-endian bytes.
pub fn decode_reg_le(buf: &[u8]) -> Result<u32, DecodeHexBufError> {
    let bytes: [u8; 4] = decode_hex_buf(buf)?
        .try_into()
        .map_err(|_| DecodeHexBufError::BadLength)?;
    Ok(u32::from_le_bytes(bytes))
}

fn nibble2ascii(nibble: u8) -> char {
    match nibble {
        0x0..=0x9 => (b'0' + nibble) as char,
        _ => (b'a' + (nibble - 0xa)) as char,
    }
}

/// Append the lowercase hex encoding of `data` to `out`.
pub fn encode_hex_buf(out: &mut String, data: &[u8]) {
    out.reserve(data.len() * 2);
    for &byte in data {
        out.push(nibble2ascii(byte >> 4));
        out.push(nibble2ascii(byte & 0x0f));
    }
}

/// Append a register value as 8 hex digits of its little-endian bytes.
pub fn encode_reg_le(out: &mut String, value: u32) {
    encode_hex_buf(out, &value.to_le_bytes())
}
