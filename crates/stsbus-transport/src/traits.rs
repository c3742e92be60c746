use std::io::{Read, Write};
use std::time::Duration;

use serialport::SerialPort;

use crate::error::Result;

/// Read timeout applied to serial ports when no timeout is requested.
pub const SERIAL_BLOCKING_TIMEOUT: Duration = Duration::from_secs(3600);

/// A connected bus stream, readable and writable.
///
/// This is the fundamental I/O type returned by transport operations.
/// For hardware it wraps a serial port; for simulated buses it wraps one end
/// of a Unix socket pair. Bytes are delivered in arbitrary chunk sizes.
pub struct BusStream {
    inner: BusStreamInner,
}

enum BusStreamInner {
    Serial(Box<dyn SerialPort>),
    #[cfg(unix)]
    Unix(std::os::unix::net::UnixStream),
}

impl Read for BusStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            BusStreamInner::Serial(port) => port.read(buf),
            #[cfg(unix)]
            BusStreamInner::Unix(stream) => stream.read(buf),
        }
    }
}

impl Write for BusStream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            BusStreamInner::Serial(port) => port.write(buf),
            #[cfg(unix)]
            BusStreamInner::Unix(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match &mut self.inner {
            BusStreamInner::Serial(port) => port.flush(),
            #[cfg(unix)]
            BusStreamInner::Unix(stream) => stream.flush(),
        }
    }
}

impl BusStream {
    /// Create a BusStream from an opened serial port.
    pub(crate) fn from_serial(port: Box<dyn SerialPort>) -> Self {
        Self {
            inner: BusStreamInner::Serial(port),
        }
    }

    /// Create a connected pair of in-memory bus streams.
    ///
    /// Bytes written to one end are readable from the other. Used to attach
    /// simulated devices to a bus.
    #[cfg(unix)]
    pub fn pair() -> Result<(Self, Self)> {
        let (left, right) = std::os::unix::net::UnixStream::pair()?;
        Ok((
            Self {
                inner: BusStreamInner::Unix(left),
            },
            Self {
                inner: BusStreamInner::Unix(right),
            },
        ))
    }

    /// Set read timeout on the underlying stream.
    ///
    /// `None` blocks indefinitely. Serial ports have no "infinite" setting, so
    /// `None` maps to [`SERIAL_BLOCKING_TIMEOUT`] there.
    pub fn set_read_timeout(&mut self, timeout: Option<Duration>) -> Result<()> {
        match &mut self.inner {
            BusStreamInner::Serial(port) => port
                .set_timeout(timeout.unwrap_or(SERIAL_BLOCKING_TIMEOUT))
                .map_err(Into::into),
            #[cfg(unix)]
            BusStreamInner::Unix(stream) => stream.set_read_timeout(timeout).map_err(Into::into),
        }
    }

    /// Try to clone this stream (creates a new handle to the same port).
    ///
    /// The bus uses one clone for the receiver thread and keeps the other for
    /// writing.
    pub fn try_clone(&self) -> Result<Self> {
        match &self.inner {
            BusStreamInner::Serial(port) => Ok(Self::from_serial(port.try_clone()?)),
            #[cfg(unix)]
            BusStreamInner::Unix(stream) => Ok(Self {
                inner: BusStreamInner::Unix(stream.try_clone()?),
            }),
        }
    }

    /// Transport name for diagnostics.
    pub fn transport_name(&self) -> &'static str {
        match &self.inner {
            BusStreamInner::Serial(_) => "serial",
            #[cfg(unix)]
            BusStreamInner::Unix(_) => "socket-pair",
        }
    }
}

impl std::fmt::Debug for BusStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.inner {
            BusStreamInner::Serial(port) => f
                .debug_struct("BusStream")
                .field("type", &"serial")
                .field("name", &port.name())
                .finish(),
            #[cfg(unix)]
            BusStreamInner::Unix(_) => f
                .debug_struct("BusStream")
                .field("type", &"socket-pair")
                .finish(),
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn pair_carries_bytes_both_ways() {
        let (mut left, mut right) = BusStream::pair().unwrap();

        left.write_all(&[0xFF, 0xFF, 0x01]).unwrap();
        let mut buf = [0u8; 3];
        right.read_exact(&mut buf).unwrap();
        assert_eq!(buf, [0xFF, 0xFF, 0x01]);

        right.write_all(b"ok").unwrap();
        let mut buf = [0u8; 2];
        left.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"ok");
    }

    #[test]
    fn clone_shares_the_same_endpoint() {
        let (left, mut right) = BusStream::pair().unwrap();
        let mut writer = left.try_clone().unwrap();

        writer.write_all(&[0x42]).unwrap();
        let mut buf = [0u8; 1];
        right.read_exact(&mut buf).unwrap();
        assert_eq!(buf, [0x42]);
    }

    #[test]
    fn read_timeout_expires_without_data() {
        let (mut left, _right) = BusStream::pair().unwrap();
        left.set_read_timeout(Some(Duration::from_millis(10)))
            .unwrap();

        let mut buf = [0u8; 1];
        let err = left.read(&mut buf).unwrap_err();
        assert!(matches!(
            err.kind(),
            std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
        ));
    }

    #[test]
    fn debug_names_transport() {
        let (left, _right) = BusStream::pair().unwrap();
        assert_eq!(left.transport_name(), "socket-pair");
        assert!(format!("{left:?}").contains("socket-pair"));
    }
}
