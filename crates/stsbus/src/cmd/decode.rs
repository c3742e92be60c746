use std::io::Read;
use std::path::Path;

use stsbus_frame::{Frame, FrameDecoder, FrameError, Instruction};
use tracing::warn;

use crate::cmd::DecodeArgs;
use crate::exit::{io_error, CliResult, DATA_INVALID, SUCCESS};
use crate::output::{print_decoded, DecodedEntry, OutputFormat};

/// Exits with `DATA_INVALID` when any frame was rejected, after printing
/// everything that was found.
pub fn run(args: DecodeArgs, format: OutputFormat) -> CliResult<i32> {
    let bytes = read_input(args.input.as_deref())?;
    let entries = analyze(&bytes);
    print_decoded(&entries, format);

    let rejected = entries.iter().filter(|entry| entry.error.is_some()).count();
    if rejected > 0 {
        warn!(
            rejected,
            frames = entries.len() - rejected,
            "capture contains malformed frames"
        );
        return Ok(DATA_INVALID);
    }
    Ok(SUCCESS)
}

fn read_input(path: Option<&Path>) -> CliResult<Vec<u8>> {
    match path {
        Some(path) if path != Path::new("-") => std::fs::read(path)
            .map_err(|err| io_error(&format!("failed reading {}", path.display()), err)),
        _ => {
            let mut bytes = Vec::new();
            std::io::stdin()
                .lock()
                .read_to_end(&mut bytes)
                .map_err(|err| io_error("failed reading stdin", err))?;
            Ok(bytes)
        }
    }
}

/// Run a capture through the decoder, recording every frame and every
/// rejected frame with its byte offset.
pub fn analyze(bytes: &[u8]) -> Vec<DecodedEntry> {
    let mut decoder = FrameDecoder::new();
    let mut entries = Vec::new();

    for &byte in bytes {
        match decoder.feed(byte) {
            Ok(None) => {}
            Ok(Some(frame)) => {
                let offset = decoder.position() - frame.wire_size() as u64;
                entries.push(frame_entry(offset, &frame));
            }
            Err(err) => entries.push(error_entry(decoder.position() - 1, &err)),
        }
    }

    if !decoder.is_idle() {
        entries.push(DecodedEntry {
            offset: decoder.position(),
            id: None,
            code: None,
            instruction: None,
            params: None,
            error: Some("incomplete frame at end of input".to_string()),
        });
    }
    entries
}

fn frame_entry(offset: u64, frame: &Frame) -> DecodedEntry {
    DecodedEntry {
        offset,
        id: Some(frame.id()),
        code: Some(frame.code()),
        instruction: frame.instruction().map(Instruction::name),
        params: Some(hex(frame.params())),
        error: None,
    }
}

fn error_entry(offset: u64, err: &FrameError) -> DecodedEntry {
    let id = match err {
        FrameError::ChecksumMismatch { id, .. } => Some(*id),
        _ => None,
    };
    DecodedEntry {
        offset,
        id,
        code: None,
        instruction: None,
        params: None,
        error: Some(err.to_string()),
    }
}

fn hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{b:02X}"))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reports_frames_and_rejections_with_offsets() {
        let mut capture = vec![0x00, 0x13];
        capture.extend_from_slice(&[0xFF, 0xFF, 0x02, 0x04, 0x02, 0x38, 0x02, 0xBD]);
        capture.extend_from_slice(&[0xFF, 0xFF, 0x02, 0x04, 0x00, 0x1A, 0x05, 0x00]);
        capture.extend_from_slice(&[0xFF, 0xFF, 0x02, 0x04, 0x00, 0x1A, 0x05, 0xDA]);

        let entries = analyze(&capture);
        assert_eq!(entries.len(), 3);

        assert_eq!(entries[0].offset, 2);
        assert_eq!(entries[0].id, Some(2));
        assert_eq!(entries[0].instruction, Some("READ_DATA"));
        assert_eq!(entries[0].params.as_deref(), Some("38 02"));

        assert_eq!(entries[1].offset, 17);
        assert_eq!(entries[1].id, Some(2));
        assert!(entries[1].error.as_deref().unwrap().contains("checksum"));

        assert_eq!(entries[2].offset, 18);
        assert_eq!(entries[2].code, Some(0x00));
        assert_eq!(entries[2].instruction, None);
        assert_eq!(entries[2].params.as_deref(), Some("1A 05"));
    }

    #[test]
    fn truncated_tail_is_reported() {
        let entries = analyze(&[0xFF, 0xFF, 0x01, 0x04, 0x00]);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].offset, 5);
        assert!(entries[0].error.is_some());
    }

    #[test]
    fn bad_length_byte_is_reported() {
        let entries = analyze(&[0xFF, 0xFF, 0x01, 0x01, 0xFF, 0xFF, 0x01, 0x02, 0x01, 0xFB]);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].offset, 3);
        assert!(entries[0].error.as_deref().unwrap().contains("length"));
        assert_eq!(entries[1].offset, 4);
        assert_eq!(entries[1].instruction, Some("PING"));
    }

    #[test]
    fn noise_only_capture_is_empty() {
        assert!(analyze(&[0x01, 0x02, 0x03]).is_empty());
    }
}
