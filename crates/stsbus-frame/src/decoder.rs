use bytes::{BufMut, BytesMut};
use tracing::trace;

use crate::codec::{checksum, Frame, FRAME_OVERHEAD, HEADER, MAX_PARAMS};
use crate::error::{FrameError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Looking for two consecutive 0xFF bytes.
    Scan { last: Option<u8> },
    /// Collecting id and length.
    Header { remaining: u8 },
    /// Collecting code, params and checksum.
    Body { remaining: u8 },
}

/// Incremental frame decoder.
///
/// Fed one byte at a time; state persists between calls so a frame may be
/// spread over any number of reads. Bytes outside a frame are skipped until
/// the next `0xFF 0xFF` header. A frame that fails validation is dropped as a
/// whole and scanning restarts after its last byte.
#[derive(Debug)]
pub struct FrameDecoder {
    state: State,
    buf: BytesMut,
    position: u64,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self {
            state: State::Scan { last: None },
            buf: BytesMut::with_capacity(FRAME_OVERHEAD + MAX_PARAMS),
            position: 0,
        }
    }

    /// Push one byte through the state machine.
    ///
    /// Returns `Ok(Some(frame))` when the byte completes a valid frame,
    /// `Ok(None)` when more bytes are needed, and a recoverable error when the
    /// byte completes a malformed frame.
    pub fn feed(&mut self, byte: u8) -> Result<Option<Frame>> {
        self.position += 1;
        match self.state {
            State::Scan { last } => {
                if byte == HEADER[1] && last == Some(HEADER[0]) {
                    self.buf.clear();
                    self.buf.put_slice(&HEADER);
                    self.state = State::Header { remaining: 2 };
                } else {
                    self.state = State::Scan { last: Some(byte) };
                }
                Ok(None)
            }
            State::Header { remaining } => {
                self.buf.put_u8(byte);
                if remaining > 1 {
                    self.state = State::Header {
                        remaining: remaining - 1,
                    };
                    return Ok(None);
                }
                // Code byte and checksum are mandatory.
                if byte < 2 {
                    self.reset();
                    return Err(FrameError::InvalidLength(byte));
                }
                self.state = State::Body { remaining: byte };
                Ok(None)
            }
            State::Body { remaining } => {
                self.buf.put_u8(byte);
                if remaining > 1 {
                    self.state = State::Body {
                        remaining: remaining - 1,
                    };
                    return Ok(None);
                }
                self.finish()
            }
        }
    }

    /// Push a chunk of bytes, yielding every completed frame or error.
    pub fn decode<'a>(
        &'a mut self,
        chunk: &'a [u8],
    ) -> impl Iterator<Item = Result<Frame>> + 'a {
        chunk.iter().filter_map(move |byte| self.feed(*byte).transpose())
    }

    /// Drop any partial frame and go back to scanning.
    pub fn reset(&mut self) {
        self.buf.clear();
        self.state = State::Scan { last: None };
    }

    /// True while the decoder is between frames.
    pub fn is_idle(&self) -> bool {
        matches!(self.state, State::Scan { .. })
    }

    /// Total number of bytes fed so far.
    pub fn position(&self) -> u64 {
        self.position
    }

    fn finish(&mut self) -> Result<Option<Frame>> {
        let end = self.buf.len() - 1;
        let expected = checksum(&self.buf[HEADER.len()..end]);
        let actual = self.buf[end];
        let id = self.buf[2];

        if expected != actual {
            self.reset();
            return Err(FrameError::ChecksumMismatch {
                id,
                expected,
                actual,
            });
        }

        let raw = self.buf.split().freeze();
        self.state = State::Scan { last: None };
        trace!(id, len = raw.len(), "frame decoded");
        Ok(Some(Frame::from_validated(raw)))
    }
}
