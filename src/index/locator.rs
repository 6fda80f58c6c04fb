//! Frame locator: scans raw log bytes and emits the offset of every frame
//! start.
//!
//! The file is streamed in fixed-size segments through a reusable buffer and
//! fed byte-wise to a four-state matcher for the frame magic `D` `L` `T`
//! 0x01. The matcher state survives segment boundaries, so a magic sequence
//! straddling two reads is still found. On any byte that does not continue a
//! partial match the matcher drops back to its start state without
//! re-examining that byte; an overlapping start such as `DDLT\x01` is
//! therefore not recognized. Downstream decoding tolerates the occasional
//! false positive from payload bytes that happen to contain the magic.

use crate::events::EventSink;
use anyhow::{Context, Result};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

/// Bytes per read segment.
pub const SEGMENT_SIZE: usize = 1024 * 1024;

/// Result of a scan that did not fail.
#[derive(Debug)]
pub enum ScanOutcome {
    /// Every frame offset in the file, strictly increasing.
    Complete(Vec<i64>),
    /// The stop flag was observed; no partial index is returned.
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MatchState {
    Start,
    GotD,
    GotDl,
    GotDlt,
}

/// Streaming scanner with a reusable segment buffer.
pub struct FrameLocator {
    buf: Vec<u8>,
}

impl Default for FrameLocator {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameLocator {
    pub fn new() -> Self {
        Self {
            buf: vec![0u8; SEGMENT_SIZE],
        }
    }

    /// Scan one file. Emits `progress_text(run_label)` and `progress_max`
    /// before the walk and one `progress` per segment with the byte position
    /// before that segment was read. The stop flag is checked on every byte.
    ///
    /// An empty file yields an empty index without progress events.
    pub fn scan(
        &mut self,
        path: &Path,
        run_label: &str,
        sink: &dyn EventSink,
        stop: &AtomicBool,
    ) -> Result<ScanOutcome> {
        let mut file = File::open(path)
            .with_context(|| format!("Cannot open log file {}", path.display()))?;
        let size = file
            .metadata()
            .with_context(|| format!("Failed to stat {}", path.display()))?
            .len();

        let mut frames = Vec::new();
        if size == 0 {
            return Ok(ScanOutcome::Complete(frames));
        }

        sink.progress_text(run_label);
        sink.progress_max(size);

        let mut state = MatchState::Start;
        let mut total_read: u64 = 0;
        loop {
            let pos = total_read;
            let n = file
                .read(&mut self.buf)
                .with_context(|| format!("Read failed on {}", path.display()))?;

            for i in 0..n {
                state = match (state, self.buf[i]) {
                    (MatchState::Start, b'D') => MatchState::GotD,
                    (MatchState::GotD, b'L') => MatchState::GotDl,
                    (MatchState::GotDl, b'T') => MatchState::GotDlt,
                    (MatchState::GotDlt, 0x01) => {
                        frames.push(pos as i64 + i as i64 - 3);
                        MatchState::Start
                    }
                    _ => MatchState::Start,
                };

                if stop.load(Ordering::Relaxed) {
                    return Ok(ScanOutcome::Cancelled);
                }
            }

            total_read += n as u64;
            sink.progress(pos);
            if n == 0 {
                break;
            }
        }

        Ok(ScanOutcome::Complete(frames))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::NullEventSink;
    use std::io::Write;
    use std::path::PathBuf;

    const MAGIC: [u8; 4] = [0x44, 0x4c, 0x54, 0x01];

    fn write_bytes(data: &[u8]) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trace.dlt");
        let mut file = File::create(&path).unwrap();
        file.write_all(data).unwrap();
        (dir, path)
    }

    fn scan(path: &Path) -> ScanOutcome {
        let stop = AtomicBool::new(false);
        FrameLocator::new()
            .scan(path, "1/1", &NullEventSink, &stop)
            .unwrap()
    }

    fn offsets(outcome: ScanOutcome) -> Vec<i64> {
        match outcome {
            ScanOutcome::Complete(frames) => frames,
            ScanOutcome::Cancelled => panic!("scan was cancelled"),
        }
    }

    #[test]
    fn test_empty_file() {
        let (_dir, path) = write_bytes(&[]);
        assert!(offsets(scan(&path)).is_empty());
    }

    #[test]
    fn test_single_magic_at_start() {
        let mut data = MAGIC.to_vec();
        data.extend_from_slice(b"payload bytes");
        let (_dir, path) = write_bytes(&data);
        assert_eq!(offsets(scan(&path)), vec![0]);
    }

    #[test]
    fn test_offsets_strictly_increasing() {
        let mut data = Vec::new();
        for gap in [0usize, 7, 100, 3] {
            data.extend_from_slice(&vec![b'x'; gap]);
            data.extend_from_slice(&MAGIC);
        }
        let (_dir, path) = write_bytes(&data);
        let found = offsets(scan(&path));
        assert_eq!(found.len(), 4);
        assert!(found.windows(2).all(|w| w[0] < w[1]));
        for &offset in &found {
            let offset = offset as usize;
            assert_eq!(&data[offset..offset + 4], &MAGIC);
        }
    }

    #[test]
    fn test_magic_straddles_segment_boundary() {
        // second magic begins 2 bytes before the 1 MiB segment boundary
        let mut data = vec![0u8; SEGMENT_SIZE + 2];
        data[0..4].copy_from_slice(&MAGIC);
        data[SEGMENT_SIZE - 2..SEGMENT_SIZE + 2].copy_from_slice(&MAGIC);
        let (_dir, path) = write_bytes(&data);
        assert_eq!(offsets(scan(&path)), vec![0, (SEGMENT_SIZE - 2) as i64]);
    }

    #[test]
    fn test_overlapping_start_is_not_recognized() {
        // The matcher resets on the second 'D' without re-latching it, so
        // the frame starting at offset 1 goes unseen.
        let data = [b'D', b'D', b'L', b'T', 0x01];
        let (_dir, path) = write_bytes(&data);
        assert!(offsets(scan(&path)).is_empty());
    }

    #[test]
    fn test_no_magic_no_frames() {
        let (_dir, path) = write_bytes(b"DLTDLTDLT no frame here");
        assert!(offsets(scan(&path)).is_empty());
    }

    #[test]
    fn test_cancellation_returns_no_partial_index() {
        let mut data = MAGIC.to_vec();
        data.extend_from_slice(&[0u8; 1000]);
        let (_dir, path) = write_bytes(&data);

        let stop = AtomicBool::new(true);
        let outcome = FrameLocator::new()
            .scan(&path, "1/1", &NullEventSink, &stop)
            .unwrap();
        assert!(matches!(outcome, ScanOutcome::Cancelled));
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let stop = AtomicBool::new(false);
        let result =
            FrameLocator::new().scan(Path::new("/nonexistent/log.dlt"), "1/1", &NullEventSink, &stop);
        assert!(result.is_err());
    }
}
