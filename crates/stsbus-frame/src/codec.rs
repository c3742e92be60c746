use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{FrameError, Result};
use crate::instruction::{Instruction, Status, BROADCAST_ID};

/// Header bytes that open every frame.
pub const HEADER: [u8; 2] = [0xFF, 0xFF];

/// Bytes around the parameter block: header (2) + id + length + code + checksum.
pub const FRAME_OVERHEAD: usize = 6;

/// Maximum parameter block size.
pub const MAX_PARAMS: usize = 250;

/// Offset of the instruction (request) or status (reply) byte.
pub const CODE_OFFSET: usize = 4;

/// A validated frame as it appears on the wire.
///
/// The raw bytes are kept intact so a received frame can be compared
/// byte-for-byte against what was sent. Instances only come from
/// [`encode_frame`]-backed constructors or from the decoder after checksum
/// validation, so the accessors never index out of range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    raw: Bytes,
}

impl Frame {
    /// Build a frame from an id, an instruction/status code and parameters.
    pub fn new(id: u8, code: u8, params: &[u8]) -> Result<Self> {
        let mut buf = BytesMut::with_capacity(FRAME_OVERHEAD + params.len());
        encode_frame(id, code, params, &mut buf)?;
        Ok(Self { raw: buf.freeze() })
    }

    /// Build a request frame.
    pub fn request(id: u8, instruction: Instruction, params: &[u8]) -> Result<Self> {
        Self::new(id, instruction.into(), params)
    }

    /// Wrap bytes the decoder has already validated.
    pub(crate) fn from_validated(raw: Bytes) -> Self {
        Self { raw }
    }

    /// Device id.
    pub fn id(&self) -> u8 {
        self.raw[2]
    }

    /// Length byte (`2 + params.len()`).
    pub fn length(&self) -> u8 {
        self.raw[3]
    }

    /// Instruction on requests, status on replies.
    pub fn code(&self) -> u8 {
        self.raw[CODE_OFFSET]
    }

    /// The code interpreted as an instruction, if it is one.
    pub fn instruction(&self) -> Option<Instruction> {
        Instruction::try_from(self.code()).ok()
    }

    /// The code interpreted as a reply status.
    pub fn status(&self) -> Status {
        Status::new(self.code())
    }

    /// Parameter bytes between the code and the checksum.
    pub fn params(&self) -> &[u8] {
        &self.raw[CODE_OFFSET + 1..self.raw.len() - 1]
    }

    /// Trailing checksum byte.
    pub fn checksum(&self) -> u8 {
        self.raw[self.raw.len() - 1]
    }

    /// The complete wire bytes, header through checksum.
    pub fn as_bytes(&self) -> &[u8] {
        &self.raw
    }

    /// The total wire size of this frame.
    pub fn wire_size(&self) -> usize {
        self.raw.len()
    }
}

/// Compute the checksum over everything after the header.
///
/// `checksum = 255 - (sum mod 256)`, i.e. the bitwise complement of the
/// wrapping byte sum.
pub fn checksum(body: &[u8]) -> u8 {
    !body.iter().fold(0u8, |acc, b| acc.wrapping_add(*b))
}

/// Encode a frame into the wire format.
///
/// Wire format:
/// ```text
/// ┌───────────┬──────┬────────────┬────────────┬───────────┬──────────┐
/// │ Header    │ Id   │ Length     │ Instr/Stat │ Params    │ Checksum │
/// │ 0xFF 0xFF │ (1B) │ 2 + params │ (1B)       │ (0..250B) │ (1B)     │
/// └───────────┴──────┴────────────┴────────────┴───────────┴──────────┘
/// ```
pub fn encode_frame(id: u8, code: u8, params: &[u8], dst: &mut BytesMut) -> Result<()> {
    if id > BROADCAST_ID {
        return Err(FrameError::InvalidId(id));
    }
    if params.len() > MAX_PARAMS {
        return Err(FrameError::PayloadTooLarge {
            size: params.len(),
            max: MAX_PARAMS,
        });
    }

    let start = dst.len();
    dst.reserve(FRAME_OVERHEAD + params.len());
    dst.put_slice(&HEADER);
    dst.put_u8(id);
    dst.put_u8((params.len() + 2) as u8);
    dst.put_u8(code);
    dst.put_slice(params);
    let chk = checksum(&dst[start + HEADER.len()..]);
    dst.put_u8(chk);
    Ok(())
}

/// Configuration for frame readers and writers.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum parameter block accepted by the writer. Default: 250 bytes.
    pub max_params: usize,
    /// Read timeout applied to bus streams.
    pub read_timeout: Option<std::time::Duration>,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_params: MAX_PARAMS,
            read_timeout: None,
        }
    }
}
