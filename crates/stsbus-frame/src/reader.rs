use std::io::{ErrorKind, Read};

use bytes::{Buf, BytesMut};
use stsbus_transport::BusStream;

use crate::codec::{Frame, FrameConfig};
use crate::decoder::FrameDecoder;
use crate::error::{FrameError, Result};

const READ_CHUNK_SIZE: usize = 256;

/// Reads complete frames from any `Read` stream.
///
/// Handles partial reads internally; callers always get complete frames.
/// Malformed frames surface as recoverable errors; the next call continues
/// with the bytes that follow them.
pub struct FrameReader<T> {
    inner: T,
    decoder: FrameDecoder,
    buf: BytesMut,
    config: FrameConfig,
}

impl<T: Read> FrameReader<T> {
    /// Create a new frame reader with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame reader with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            decoder: FrameDecoder::new(),
            buf: BytesMut::with_capacity(READ_CHUNK_SIZE),
            config,
        }
    }

    /// Read the next complete frame (blocking).
    ///
    /// Returns `Err(FrameError::ConnectionClosed)` when EOF is reached.
    /// Checksum and length failures are returned as they happen; check
    /// [`FrameError::is_recoverable`] and keep reading.
    pub fn read_frame(&mut self) -> Result<Frame> {
        loop {
            while self.buf.has_remaining() {
                let byte = self.buf.get_u8();
                if let Some(frame) = self.decoder.feed(byte)? {
                    return Ok(frame);
                }
            }

            let mut chunk = [0u8; READ_CHUNK_SIZE];
            let read = match self.inner.read(&mut chunk) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            };

            if read == 0 {
                return Err(FrameError::ConnectionClosed);
            }

            self.buf.extend_from_slice(&chunk[..read]);
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

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Number of bytes handed to the decoder so far.
    pub fn position(&self) -> u64 {
        self.decoder.position()
    }

    /// Current frame reader configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

impl FrameReader<BusStream> {
    /// Create a frame reader for `BusStream` and apply read timeout from config.
    pub fn with_config_bus(mut inner: BusStream, config: FrameConfig) -> Result<Self> {
        inner
            .set_read_timeout(config.read_timeout)
            .map_err(transport_to_frame_error)?;
        Ok(Self::with_config(inner, config))
    }
}

fn transport_to_frame_error(err: stsbus_transport::TransportError) -> FrameError {
    match err {
        stsbus_transport::TransportError::Io(io) => FrameError::Io(io),
        stsbus_transport::TransportError::Serial(serial) => FrameError::Io(serial.into()),
        other => FrameError::Io(std::io::Error::other(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::io::Write;

    use super::*;
    use crate::instruction::Instruction;

    fn wire(frames: &[Frame]) -> Vec<u8> {
        frames.iter().flat_map(|f| f.as_bytes().to_vec()).collect()
    }

    #[test]
    fn read_single_frame() {
        let frame = Frame::new(2, 0x00, &[0x1A, 0x05]).unwrap();
        let mut reader = FrameReader::new(Cursor::new(wire(&[frame.clone()])));

        assert_eq!(reader.read_frame().unwrap(), frame);
    }

    #[test]
    fn read_multiple_frames() {
        let frames = [
            Frame::request(1, Instruction::Ping, &[]).unwrap(),
            Frame::new(1, 0x00, &[]).unwrap(),
            Frame::new(2, 0x00, &[0x00, 0x01]).unwrap(),
        ];
        let mut reader = FrameReader::new(Cursor::new(wire(&frames)));

        for expected in &frames {
            assert_eq!(&reader.read_frame().unwrap(), expected);
        }
    }

    #[test]
    fn partial_read_handling() {
        let frame = Frame::new(4, 0x00, &[0x10, 0x20]).unwrap();
        let byte_reader = ByteByByteReader {
            bytes: frame.as_bytes().to_vec(),
            pos: 0,
        };
        let mut reader = FrameReader::new(byte_reader);

        assert_eq!(reader.read_frame().unwrap(), frame);
    }

    #[test]
    fn connection_closed_cleanly() {
        let mut reader = FrameReader::new(Cursor::new(Vec::<u8>::new()));
        let err = reader.read_frame().unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed));
    }

    #[test]
    fn connection_closed_mid_frame() {
        let frame = Frame::new(4, 0x00, &[0x10, 0x20]).unwrap();
        let partial = frame.as_bytes()[..5].to_vec();

        let mut reader = FrameReader::new(Cursor::new(partial));
        let err = reader.read_frame().unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed));
    }

    #[test]
    fn checksum_error_then_next_frame() {
        let bad = Frame::new(1, 0x00, &[0x01]).unwrap();
        let good = Frame::new(1, 0x00, &[0x02]).unwrap();
        let mut bytes = wire(&[bad, good.clone()]);
        bytes[6] ^= 0x55;

        let mut reader = FrameReader::new(Cursor::new(bytes));
        let err = reader.read_frame().unwrap_err();
        assert!(err.is_recoverable());
        assert_eq!(reader.read_frame().unwrap(), good);
    }

    #[test]
    fn noise_before_frame_is_skipped() {
        let frame = Frame::new(9, 0x00, &[]).unwrap();
        let mut bytes = vec![0x01, 0xFF, 0x00, 0x7F];
        bytes.extend_from_slice(frame.as_bytes());

        let mut reader = FrameReader::new(Cursor::new(bytes));
        assert_eq!(reader.read_frame().unwrap(), frame);
        assert_eq!(reader.position(), 4 + frame.wire_size() as u64);
    }

    #[test]
    fn read_would_block_propagates_io_error() {
        let frame = Frame::new(7, 0x00, &[]).unwrap();
        let reader = WouldBlockThenData {
            state: 0,
            bytes: frame.as_bytes().to_vec(),
            pos: 0,
        };
        let mut framed = FrameReader::new(reader);
        let err = framed.read_frame().unwrap_err();
        assert!(err.is_timeout());

        // The stream stays usable after a timeout.
        assert_eq!(framed.read_frame().unwrap(), frame);
    }

    #[test]
    fn interrupted_read_retries() {
        let frame = Frame::new(8, 0x00, &[0x01]).unwrap();
        let reader = InterruptedThenData {
            state: 0,
            bytes: frame.as_bytes().to_vec(),
            pos: 0,
        };
        let mut framed = FrameReader::new(reader);
        assert_eq!(framed.read_frame().unwrap(), frame);
    }

    #[test]
    fn accessors_and_into_inner() {
        let cursor = Cursor::new(Vec::<u8>::new());
        let mut reader = FrameReader::new(cursor);

        let _ = reader.get_ref();
        let _ = reader.get_mut();
        assert_eq!(reader.config().max_params, crate::codec::MAX_PARAMS);
        let _inner = reader.into_inner();
    }

    #[test]
    #[cfg(unix)]
    fn roundtrip_over_bus_stream() {
        let (left, mut right) = BusStream::pair().unwrap();
        let config = FrameConfig {
            read_timeout: Some(std::time::Duration::from_millis(500)),
            ..FrameConfig::default()
        };
        let mut reader = FrameReader::with_config_bus(left, config).unwrap();

        let frame = Frame::request(3, Instruction::ReadData, &[0x38, 0x02]).unwrap();
        let bytes = frame.as_bytes().to_vec();
        let writer = std::thread::spawn(move || {
            for byte in bytes {
                right.write_all(&[byte]).unwrap();
            }
        });

        assert_eq!(reader.read_frame().unwrap(), frame);
        writer.join().unwrap();
    }

    #[test]
    #[cfg(unix)]
    fn bus_stream_read_timeout_applies() {
        let (left, _right) = BusStream::pair().unwrap();
        let config = FrameConfig {
            read_timeout: Some(std::time::Duration::from_millis(10)),
            ..FrameConfig::default()
        };
        let mut reader = FrameReader::with_config_bus(left, config).unwrap();
        assert!(reader.read_frame().unwrap_err().is_timeout());
    }

    #[derive(Debug)]
    struct ByteByByteReader {
        bytes: Vec<u8>,
        pos: usize,
    }

    impl Read for ByteByByteReader {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.pos >= self.bytes.len() || buf.is_empty() {
                return Ok(0);
            }
            buf[0] = self.bytes[self.pos];
            self.pos += 1;
            Ok(1)
        }
    }

    struct WouldBlockThenData {
        state: u8,
        bytes: Vec<u8>,
        pos: usize,
    }

    impl Read for WouldBlockThenData {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.state == 0 {
                self.state = 1;
                return Err(std::io::Error::from(ErrorKind::WouldBlock));
            }
            if self.pos >= self.bytes.len() {
                return Ok(0);
            }
            let remaining = self.bytes.len() - self.pos;
            let n = remaining.min(buf.len());
            buf[..n].copy_from_slice(&self.bytes[self.pos..self.pos + n]);
            self.pos += n;
            Ok(n)
        }
    }

    struct InterruptedThenData {
        state: u8,
        bytes: Vec<u8>,
        pos: usize,
    }

    impl Read for InterruptedThenData {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.state == 0 {
                self.state = 1;
                return Err(std::io::Error::from(ErrorKind::Interrupted));
            }
            if self.pos >= self.bytes.len() {
                return Ok(0);
            }
            let remaining = self.bytes.len() - self.pos;
            let n = remaining.min(buf.len());
            buf[..n].copy_from_slice(&self.bytes[self.pos..self.pos + n]);
            self.pos += n;
            Ok(n)
        }
    }
}
