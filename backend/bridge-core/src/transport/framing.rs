//! Line framing used on the daemon socket.
//!
//! A frame is the UTF-8 text, its byte length as a 4-byte big-endian suffix,
//! then `\n`:
//!
//! ```text
//! {"event_type":"pong"} 00 00 00 15 \n
//! ```
//!
//! The suffix lets the reader reject torn or interleaved lines. Because the
//! suffix is binary it may itself contain a `0x0A` byte, so a newline only
//! terminates a frame when the four bytes before it encode the length of
//! everything before them.

use crate::error::TransportError;

use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

const SUFFIX_LEN: usize = 4;
const NEWLINE: u8 = b'\n';

pub const DEFAULT_MAX_FRAME_LENGTH: usize = 1024 * 1024;

/// One decoded unit from the socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    /// Bytes that were skipped: length mismatch, oversize or invalid UTF-8.
    Dropped { reason: String },
}

enum Scan {
    Complete(usize),
    Corrupt(usize),
    /// No frame yet; the next scan may resume at this offset.
    Incomplete(usize),
}

#[derive(Debug, Clone)]
pub struct LineFrameCodec {
    max_length: usize,
    /// Offset up to which the buffered bytes have already been scanned.
    next_index: usize,
    discarding: bool,
}

impl LineFrameCodec {
    pub fn new() -> Self {
        Self::with_max_length(DEFAULT_MAX_FRAME_LENGTH)
    }

    pub fn with_max_length(max_length: usize) -> Self {
        Self {
            max_length,
            next_index: 0,
            discarding: false,
        }
    }

    pub fn max_length(&self) -> usize {
        self.max_length
    }
}

impl Default for LineFrameCodec {
    fn default() -> Self {
        Self::new()
    }
}

/// True when the newline at `index` closes a frame starting at offset 0.
fn is_terminator(buf: &[u8], index: usize) -> bool {
    if buf[index] != NEWLINE || index < SUFFIX_LEN {
        return false;
    }
    let mut suffix = [0u8; SUFFIX_LEN];
    suffix.copy_from_slice(&buf[index - SUFFIX_LEN..index]);
    u32::from_be_bytes(suffix) as usize == index - SUFFIX_LEN
}

fn scan(buf: &[u8], from: usize) -> Scan {
    for index in from..buf.len() {
        if buf[index] != NEWLINE {
            continue;
        }
        if is_terminator(buf, index) {
            return Scan::Complete(index);
        }

        // A newline inside a suffix is followed by the real terminator
        // within SUFFIX_LEN bytes; wait until those bytes are here.
        let window_end = (index + SUFFIX_LEN).min(buf.len() - 1);
        if (index + 1..=window_end).any(|next| is_terminator(buf, next)) {
            continue;
        }
        if index + SUFFIX_LEN >= buf.len() {
            return Scan::Incomplete(index);
        }
        return Scan::Corrupt(index);
    }
    Scan::Incomplete(buf.len())
}

impl Decoder for LineFrameCodec {
    type Item = Frame;
    type Error = TransportError;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<Frame>, TransportError> {
        if self.discarding {
            match buf.iter().position(|byte| *byte == NEWLINE) {
                Some(index) => {
                    buf.advance(index + 1);
                    self.discarding = false;
                    return Ok(Some(Frame::Dropped {
                        reason: format!("frame exceeded {} bytes", self.max_length),
                    }));
                }
                None => {
                    buf.clear();
                    return Ok(None);
                }
            }
        }

        match scan(buf, self.next_index.min(buf.len())) {
            Scan::Complete(index) => {
                self.next_index = 0;
                let frame = buf.split_to(index + 1);
                let text = &frame[..index - SUFFIX_LEN];
                if text.len() > self.max_length {
                    return Ok(Some(Frame::Dropped {
                        reason: format!("frame exceeded {} bytes", self.max_length),
                    }));
                }
                match std::str::from_utf8(text) {
                    Ok(text) => Ok(Some(Frame::Text(text.to_string()))),
                    Err(e) => Ok(Some(Frame::Dropped {
                        reason: format!("frame is not UTF-8: {e}"),
                    })),
                }
            }
            Scan::Corrupt(index) => {
                self.next_index = 0;
                buf.advance(index + 1);
                Ok(Some(Frame::Dropped {
                    reason: "length suffix does not match frame".to_string(),
                }))
            }
            Scan::Incomplete(_) if buf.len() > self.max_length + SUFFIX_LEN + 1 => {
                buf.clear();
                self.next_index = 0;
                self.discarding = true;
                Ok(None)
            }
            Scan::Incomplete(resume) => {
                self.next_index = resume;
                Ok(None)
            }
        }
    }
}

impl Encoder<String> for LineFrameCodec {
    type Error = TransportError;

    fn encode(&mut self, text: String, buf: &mut BytesMut) -> Result<(), TransportError> {
        if text.len() > self.max_length {
            return Err(TransportError::frame(format!(
                "frame of {} bytes exceeds {} bytes",
                text.len(),
                self.max_length
            )));
        }
        if text.as_bytes().contains(&NEWLINE) {
            return Err(TransportError::frame("frame text contains a newline"));
        }

        let length = u32::try_from(text.len())
            .map_err(|_| TransportError::frame("frame length does not fit in 32 bits"))?;
        buf.reserve(text.len() + SUFFIX_LEN + 1);
        buf.put_slice(text.as_bytes());
        buf.put_u32(length);
        buf.put_u8(NEWLINE);
        Ok(())
    }
}
