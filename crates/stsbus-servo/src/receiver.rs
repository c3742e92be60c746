use std::io::Read;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Arc;

use stsbus_frame::{FrameError, FrameReader};
use tracing::{debug, error, warn};

use crate::correlator::Event;

/// Drain the byte stream into the correlator until shutdown.
///
/// Malformed input never stops the loop; only loss of the stream does, in
/// which case the correlator is told to shut down so callers see
/// [`ServoError::BusClosed`](crate::ServoError::BusClosed).
pub(crate) fn run<R: Read>(
    mut reader: FrameReader<R>,
    events: Sender<Event>,
    running: Arc<AtomicBool>,
) {
    while running.load(Ordering::Acquire) {
        match reader.read_frame() {
            Ok(frame) => {
                if events.send(Event::Received(frame)).is_err() {
                    break;
                }
            }
            Err(err) if err.is_recoverable() => {
                warn!(error = %err, offset = reader.position(), "dropping malformed frame");
            }
            Err(err) if err.is_timeout() => {}
            Err(FrameError::ConnectionClosed) => {
                error!("bus stream closed");
                let _ = events.send(Event::Shutdown);
                break;
            }
            Err(err) => {
                error!(error = %err, "bus read failed");
                let _ = events.send(Event::Shutdown);
                break;
            }
        }
    }
    debug!("receiver stopped");
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::sync::mpsc;

    use stsbus_frame::Frame;

    use super::*;

    #[test]
    fn forwards_valid_frames_and_skips_corrupt_ones() {
        let good = Frame::new(2, 0x00, &[0x1A, 0x05]).unwrap();
        let mut bad = Frame::new(2, 0x00, &[0x00]).unwrap().as_bytes().to_vec();
        bad[5] ^= 0x80;

        let mut wire = vec![0x13, 0x37];
        wire.extend_from_slice(&bad);
        wire.extend_from_slice(good.as_bytes());

        let (tx, rx) = mpsc::channel();
        run(
            FrameReader::new(Cursor::new(wire)),
            tx,
            Arc::new(AtomicBool::new(true)),
        );

        let events: Vec<Event> = rx.try_iter().collect();
        assert_eq!(events.len(), 2);
        assert!(matches!(&events[0], Event::Received(frame) if *frame == good));
        assert!(matches!(events[1], Event::Shutdown));
    }

    #[test]
    fn stops_when_flag_cleared() {
        let (tx, rx) = mpsc::channel();
        let running = Arc::new(AtomicBool::new(false));
        run(FrameReader::new(Cursor::new(vec![0xFF; 4])), tx, running);
        assert!(rx.try_iter().next().is_none());
    }

    #[test]
    fn timeouts_keep_the_loop_alive() {
        let frame = Frame::new(1, 0x00, &[]).unwrap();
        let reader = TimeoutThenData {
            timeouts: 3,
            bytes: frame.as_bytes().to_vec(),
            pos: 0,
        };

        let (tx, rx) = mpsc::channel();
        run(FrameReader::new(reader), tx, Arc::new(AtomicBool::new(true)));

        let events: Vec<Event> = rx.try_iter().collect();
        assert!(matches!(&events[0], Event::Received(f) if *f == frame));
    }

    struct TimeoutThenData {
        timeouts: u8,
        bytes: Vec<u8>,
        pos: usize,
    }

    impl Read for TimeoutThenData {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.timeouts > 0 {
                self.timeouts -= 1;
                return Err(std::io::Error::from(std::io::ErrorKind::TimedOut));
            }
            let n = (self.bytes.len() - self.pos).min(buf.len());
            buf[..n].copy_from_slice(&self.bytes[self.pos..self.pos + n]);
            self.pos += n;
            Ok(n)
        }
    }
}
