/// Errors that can occur during frame encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The device id is outside the addressable range (0-253, 254 = broadcast).
    #[error("invalid device id {0} (max 254)")]
    InvalidId(u8),

    /// The parameter block exceeds the configured maximum size.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// The length byte cannot describe a frame (must be at least 2).
    #[error("invalid frame length byte {0}")]
    InvalidLength(u8),

    /// The received checksum does not match the computed one.
    #[error("checksum mismatch for id {id} (expected 0x{expected:02X}, got 0x{actual:02X})")]
    ChecksumMismatch { id: u8, expected: u8, actual: u8 },

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The connection was closed before a complete frame was received.
    #[error("connection closed (incomplete frame)")]
    ConnectionClosed,
}

impl FrameError {
    /// True for malformed input the decoder has already recovered from.
    ///
    /// The offending bytes are dropped and decoding resumes with the next
    /// header; the stream itself is still usable.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            FrameError::InvalidLength(_) | FrameError::ChecksumMismatch { .. }
        )
    }

    /// True when a read gave up because its timeout elapsed.
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            FrameError::Io(err) if matches!(
                err.kind(),
                std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock
            )
        )
    }
}

pub type Result<T> = std::result::Result<T, FrameError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checksum_and_length_errors_are_recoverable() {
        assert!(FrameError::InvalidLength(0).is_recoverable());
        assert!(FrameError::ChecksumMismatch {
            id: 1,
            expected: 0x10,
            actual: 0x11
        }
        .is_recoverable());
        assert!(!FrameError::ConnectionClosed.is_recoverable());
        assert!(!FrameError::InvalidId(255).is_recoverable());
    }

    #[test]
    fn timeout_detection() {
        let timed_out = FrameError::Io(std::io::Error::from(std::io::ErrorKind::TimedOut));
        let would_block = FrameError::Io(std::io::Error::from(std::io::ErrorKind::WouldBlock));
        let broken = FrameError::Io(std::io::Error::from(std::io::ErrorKind::BrokenPipe));

        assert!(timed_out.is_timeout());
        assert!(would_block.is_timeout());
        assert!(!broken.is_timeout());
        assert!(!FrameError::ConnectionClosed.is_timeout());
    }

    #[test]
    fn checksum_message_is_hex() {
        let err = FrameError::ChecksumMismatch {
            id: 2,
            expected: 0xBE,
            actual: 0x0F,
        };
        assert_eq!(
            err.to_string(),
            "checksum mismatch for id 2 (expected 0xBE, got 0x0F)"
        );
    }
}
