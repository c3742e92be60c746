use std::io::{ErrorKind, Write};

use tracing::trace;

use crate::codec::{Frame, FrameConfig};
use crate::error::{FrameError, Result};
use crate::instruction::Instruction;

/// Writes complete frames to any `Write` stream.
///
/// Each frame goes out in a single `write`/`flush` sequence; callers that
/// share a stream must hold a lock around [`FrameWriter::send`] so frames are
/// never interleaved on the wire.
pub struct FrameWriter<T> {
    inner: T,
    config: FrameConfig,
}

impl<T: Write> FrameWriter<T> {
    /// Create a new frame writer with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame writer with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self { inner, config }
    }

    /// Write a complete frame (blocking).
    pub fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        let bytes = frame.as_bytes();
        let mut offset = 0usize;
        while offset < bytes.len() {
            match self.inner.write(&bytes[offset..]) {
                Ok(0) => return Err(FrameError::ConnectionClosed),
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }

        trace!(id = frame.id(), len = bytes.len(), "frame sent");
        self.flush()
    }

    /// Encode and send an instruction to a device.
    ///
    /// Returns the frame exactly as written so the caller can recognize its
    /// echo.
    pub fn send(&mut self, id: u8, instruction: Instruction, params: &[u8]) -> Result<Frame> {
        if params.len() > self.config.max_params {
            return Err(FrameError::PayloadTooLarge {
                size: params.len(),
                max: self.config.max_params,
            });
        }

        let frame = Frame::request(id, instruction, params)?;
        self.write_frame(&frame)?;
        Ok(frame)
    }

    /// Flush the underlying stream.
    pub fn flush(&mut self) -> Result<()> {
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the writer and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Update maximum parameter block size for subsequent sends.
    pub fn set_max_params(&mut self, max_params: usize) {
        self.config.max_params = max_params;
    }

    /// Current frame writer configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}
