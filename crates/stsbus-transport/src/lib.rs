//! Byte transport for half-duplex servo buses.
//!
//! Provides a single [`BusStream`] type over the ways a bus can be reached:
//! - Serial ports (USB adapters, on-board UARTs)
//! - Unix socket pairs (simulated buses and tests)
//!
//! This is the lowest layer of stsbus. It moves raw bytes and knows nothing
//! about frames; everything else builds on top of [`BusStream`].

pub mod error;
pub mod serial;
pub mod traits;

pub use error::{Result, TransportError};
pub use serial::{SerialBus, SerialConfig, DEFAULT_BAUD_RATE};
pub use traits::BusStream;
