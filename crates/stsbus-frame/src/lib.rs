//! Wire framing for STS-series serial servo buses.
//!
//! Every frame on the bus has the same shape:
//! - A 2-byte header `0xFF 0xFF` for stream synchronization
//! - A 1-byte device id and a 1-byte length (`2 + params`)
//! - An instruction (requests) or status (replies) byte, then parameters
//! - A 1-byte checksum over everything after the header
//!
//! Decoding is incremental and resynchronizes on the next header after any
//! malformed frame.

#[cfg(feature = "async")]
pub mod async_codec;
pub mod codec;
pub mod decoder;
pub mod error;
pub mod instruction;
pub mod reader;
pub mod writer;

#[cfg(feature = "async")]
pub use async_codec::StsCodec;
pub use codec::{checksum, encode_frame, Frame, FrameConfig, FRAME_OVERHEAD, HEADER, MAX_PARAMS};
pub use decoder::FrameDecoder;
pub use error::{FrameError, Result};
pub use instruction::{Instruction, Status, BROADCAST_ID, MAX_DEVICE_ID};
pub use reader::FrameReader;
pub use writer::FrameWriter;
