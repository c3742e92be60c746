use bytes::{Buf, BytesMut};
use tokio_util::codec::{Decoder, Encoder};
use tracing::warn;

use crate::codec::Frame;
use crate::decoder::FrameDecoder;
use crate::error::FrameError;

/// `tokio_util` codec over the same state machine as [`FrameReader`].
///
/// Malformed frames are logged and skipped instead of being returned:
/// `FramedRead` ends the stream after the first decode error, and a bus
/// monitor has to survive line noise.
///
/// [`FrameReader`]: crate::FrameReader
#[derive(Debug, Default)]
pub struct StsCodec {
    decoder: FrameDecoder,
}

impl StsCodec {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Decoder for StsCodec {
    type Item = Frame;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Frame>, FrameError> {
        while src.has_remaining() {
            match self.decoder.feed(src.get_u8()) {
                Ok(Some(frame)) => return Ok(Some(frame)),
                Ok(None) => {}
                Err(err) if err.is_recoverable() => {
                    warn!(error = %err, "dropping malformed frame");
                }
                Err(err) => return Err(err),
            }
        }
        Ok(None)
    }
}

impl Encoder<Frame> for StsCodec {
    type Error = FrameError;

    fn encode(&mut self, frame: Frame, dst: &mut BytesMut) -> Result<(), FrameError> {
        dst.extend_from_slice(frame.as_bytes());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use futures_util::{SinkExt, StreamExt};
    use tokio_util::codec::{FramedRead, FramedWrite};

    use super::*;
    use crate::instruction::Instruction;

    #[tokio::test]
    async fn framed_read_skips_corrupt_frames() {
        let good = Frame::new(2, 0x00, &[0x1A, 0x05]).unwrap();
        let mut bad = Frame::new(2, 0x00, &[0x00, 0x00]).unwrap().as_bytes().to_vec();
        bad[5] = 0x01;

        let mut wire = vec![0x00, 0x42];
        wire.extend_from_slice(&bad);
        wire.extend_from_slice(good.as_bytes());

        let mut framed = FramedRead::new(wire.as_slice(), StsCodec::new());
        let frame = framed.next().await.unwrap().unwrap();
        assert_eq!(frame, good);
        assert!(framed.next().await.is_none());
    }

    #[tokio::test]
    async fn framed_write_emits_wire_bytes() {
        let frame = Frame::request(2, Instruction::ReadData, &[0x38, 0x02]).unwrap();
        let mut framed = FramedWrite::new(Vec::new(), StsCodec::new());

        framed.send(frame.clone()).await.unwrap();

        assert_eq!(framed.get_ref().as_slice(), frame.as_bytes());
    }
}
