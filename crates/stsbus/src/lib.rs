//! Command and query STS-series serial servos.
//!
//! stsbus drives servos that share one half-duplex serial line: it frames
//! commands, decodes the reply stream, filters out the echo of its own
//! transmissions and matches each reply to the request that caused it.
//!
//! # Crate Structure
//!
//! - [`transport`]: serial ports and in-process socket pairs
//! - [`frame`]: wire grammar, incremental decoder, frame reader and writer
//! - [`servo`]: reply correlation and register verbs (behind `servo` feature)

/// Re-export transport types.
pub mod transport {
    pub use stsbus_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use stsbus_frame::*;
}

/// Re-export servo types (requires `servo` feature).
#[cfg(feature = "servo")]
pub mod servo {
    pub use stsbus_servo::*;
}
