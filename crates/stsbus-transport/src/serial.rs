use std::path::Path;
use std::time::Duration;

use tracing::debug;

use crate::error::{Result, TransportError};
use crate::traits::BusStream;

/// Default line rate of STS-series servos.
pub const DEFAULT_BAUD_RATE: u32 = 1_000_000;

/// Serial line settings used when opening a bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SerialConfig {
    /// Line rate in baud. Default: 1 Mbaud.
    pub baud_rate: u32,
    /// Read timeout. Bounds how long a receiver blocks before it can notice a
    /// shutdown request.
    pub read_timeout: Duration,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            baud_rate: DEFAULT_BAUD_RATE,
            read_timeout: Duration::from_millis(20),
        }
    }
}

/// Serial port transport.
///
/// Opens a TTY (8N1, no flow control) and hands it out as a [`BusStream`].
/// The half-duplex adapter is expected to reflect every transmitted byte back
/// to the receiver; handling that echo is left to the layers above.
pub struct SerialBus;

impl SerialBus {
    /// Open a serial port with default settings.
    pub fn open(path: impl AsRef<Path>) -> Result<BusStream> {
        Self::open_with_config(path, &SerialConfig::default())
    }

    /// Open a serial port with explicit settings.
    pub fn open_with_config(path: impl AsRef<Path>, config: &SerialConfig) -> Result<BusStream> {
        let path = path.as_ref();
        let port = serialport::new(path.to_string_lossy(), config.baud_rate)
            .data_bits(serialport::DataBits::Eight)
            .parity(serialport::Parity::None)
            .stop_bits(serialport::StopBits::One)
            .flow_control(serialport::FlowControl::None)
            .timeout(config.read_timeout)
            .open()
            .map_err(|e| TransportError::Open {
                path: path.to_path_buf(),
                source: e,
            })?;

        debug!(?path, baud = config.baud_rate, "opened serial port");
        Ok(BusStream::from_serial(port))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SerialConfig::default();
        assert_eq!(config.baud_rate, 1_000_000);
        assert_eq!(config.read_timeout, Duration::from_millis(20));
    }

    #[test]
    fn test_open_missing_port() {
        let path = format!("/dev/stsbus-missing-{}", std::process::id());
        let result = SerialBus::open(&path);
        match result {
            Err(TransportError::Open { path: reported, .. }) => {
                assert_eq!(reported, Path::new(&path));
            }
            other => panic!("expected open error, got {other:?}"),
        }
    }

    #[test]
    fn test_open_error_names_path() {
        let path = format!("/dev/stsbus-missing-name-{}", std::process::id());
        let err = SerialBus::open(&path).unwrap_err();
        assert!(err.to_string().contains(&path));
    }
}
