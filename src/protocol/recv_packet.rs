#[cfg(feature = "trace-pkt")]
use log::trace;

/// A single unit of client traffic, as split off the byte stream.
#[derive(Debug, PartialEq, Eq)]
pub enum Frame<'a> {
    /// `+`
    Ack,
    /// `-`: the client wants the last reply again.
    Nack,
    /// A complete `$...#xx` frame. The checksum has _not_ been validated yet.
    Packet(&'a [u8]),
    /// Anything else found outside of a packet.
    Garbage(u8),
}

/// Reassembles frames out of arbitrarily chunked stream data.
///
/// Data is appended with [`RecvPacketFramer::push`], and complete frames are
/// pulled out with [`RecvPacketFramer::next_frame`]. An incomplete trailing
/// packet stays buffered until the rest of it arrives, so the sequence of
/// frames does not depend on how the stream was chunked.
#[derive(Debug, Default)]
pub struct RecvPacketFramer {
    buf: Vec<u8>,
    pos: usize,
}

impl RecvPacketFramer {
    pub fn new() -> RecvPacketFramer {
        RecvPacketFramer::default()
    }

    /// Append freshly received data.
    pub fn push(&mut self, data: &[u8]) {
        if self.pos != 0 {
            self.buf.drain(..self.pos);
            self.pos = 0;
        }
        self.buf.extend_from_slice(data);
    }

    /// Bytes received but not yet consumed as a frame.
    pub fn pending(&self) -> &[u8] {
        &self.buf[self.pos..]
    }

    /// Split the next complete frame off the buffered data, if there is one.
    pub fn next_frame(&mut self) -> Option<Frame<'_>> {
        let start = self.pos;
        let byte = *self.buf.get(start)?;

        let frame = match byte {
            b'+' => {
                self.pos += 1;
                Frame::Ack
            }
            b'-' => {
                self.pos += 1;
                Frame::Nack
            }
            b'$' => {
                // body, '#', and exactly two checksum characters
                let hash = self.buf[start + 1..].iter().position(|&b| b == b'#')? + start + 1;
                let end = hash + 3;
                if end > self.buf.len() {
                    return None;
                }
                self.pos = end;
                let packet = &self.buf[start..end];

                #[cfg(feature = "trace-pkt")]
                trace!("<-- {}", String::from_utf8_lossy(packet));

                Frame::Packet(packet)
            }
            other => {
                self.pos += 1;
                Frame::Garbage(other)
            }
        };

        Some(frame)
    }
}
