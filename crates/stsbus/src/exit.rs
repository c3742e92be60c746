use std::fmt;
use std::io;

use stsbus_frame::FrameError;
use stsbus_servo::ServoError;
use stsbus_transport::TransportError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
/// A query got no reply within its timeout.
pub const NO_REPLY: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn no_reply(id: u8) -> Self {
        Self::new(NO_REPLY, format!("no reply from servo {id}"))
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::NotFound => FAILURE,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    match err {
        TransportError::Io(source) if source.kind() == io::ErrorKind::PermissionDenied => {
            CliError::new(PERMISSION_DENIED, format!("{context}: {source}"))
        }
        other => CliError::new(TRANSPORT_ERROR, format!("{context}: {other}")),
    }
}

pub fn frame_error(context: &str, err: FrameError) -> CliError {
    match err {
        FrameError::InvalidId(_) | FrameError::PayloadTooLarge { .. } => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
        FrameError::Io(_) | FrameError::ConnectionClosed => {
            CliError::new(TRANSPORT_ERROR, format!("{context}: {err}"))
        }
        other => CliError::new(INTERNAL, format!("{context}: {other}")),
    }
}

pub fn servo_error(context: &str, err: ServoError) -> CliError {
    match err {
        ServoError::Transport(err) => transport_error(context, err),
        ServoError::Frame(err) => frame_error(context, err),
        ServoError::BusClosed => CliError::new(TRANSPORT_ERROR, format!("{context}: {err}")),
        ServoError::InvalidValue { .. } => CliError::new(DATA_INVALID, format!("{context}: {err}")),
        other => CliError::new(INTERNAL, format!("{context}: {other}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stsbus_servo::Register;

    #[test]
    fn servo_errors_map_to_exit_codes() {
        let invalid = ServoError::InvalidValue {
            register: Register::Id,
            value: 300,
        };
        assert_eq!(servo_error("set-id", invalid).code, DATA_INVALID);
        assert_eq!(servo_error("ping", ServoError::BusClosed).code, TRANSPORT_ERROR);

        let write = ServoError::Frame(FrameError::Io(io::Error::from(io::ErrorKind::BrokenPipe)));
        assert_eq!(servo_error("move", write).code, TRANSPORT_ERROR);
    }

    #[test]
    fn error_message_carries_context() {
        let err = frame_error("decode", FrameError::InvalidId(0xFF));
        assert!(err.to_string().starts_with("decode: "));
    }

    #[test]
    fn permission_denied_is_distinct() {
        let err = io_error(
            "open",
            io::Error::from(io::ErrorKind::PermissionDenied),
        );
        assert_eq!(err.code, PERMISSION_DENIED);
    }
}
