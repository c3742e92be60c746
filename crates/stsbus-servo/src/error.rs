use crate::register::Register;

/// Errors that can occur in servo bus operations.
///
/// A device that does not answer is not an error: query verbs return
/// `Ok(None)` when their timeout elapses.
#[derive(Debug, thiserror::Error)]
pub enum ServoError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] stsbus_transport::TransportError),

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] stsbus_frame::FrameError),

    /// The correlator has stopped; the bus is no longer usable.
    #[error("bus closed")]
    BusClosed,

    /// The value does not fit the register width.
    #[error("value {value} does not fit {register} ({width} byte register)", width = register.width())]
    InvalidValue { register: Register, value: u16 },

    /// A background thread could not be started.
    #[error("failed to start bus thread: {0}")]
    Spawn(std::io::Error),
}

pub type Result<T> = std::result::Result<T, ServoError>;
