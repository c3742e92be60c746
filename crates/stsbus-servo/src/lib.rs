//! Register commands for STS-series serial servos.
//!
//! [`ServoBus`] turns the half-duplex byte stream into blocking verbs:
//! it writes request frames, drops the echoes of its own transmissions,
//! and hands each device reply to the caller that asked for it.
//!
//! ```no_run
//! use stsbus_servo::{BusConfig, ServoBus};
//! use stsbus_transport::SerialConfig;
//!
//! let bus = ServoBus::open("/dev/ttyUSB0", &SerialConfig::default(), BusConfig::default())?;
//! bus.move_to(1, 2048)?;
//! if let Some(position) = bus.read_position(1)? {
//!     println!("at {position}");
//! }
//! # Ok::<(), stsbus_servo::ServoError>(())
//! ```

pub mod bus;
pub mod config;
pub mod correlator;
mod eprom;
pub mod error;
mod receiver;
pub mod register;

pub use bus::ServoBus;
pub use config::{BusConfig, DEFAULT_REPLY_TIMEOUT, DEFAULT_SETTLE_DELAY};
pub use correlator::{Reply, Request};
pub use error::{Result, ServoError};
pub use register::Register;
