//! The file-set collaborator an indexing job works against.
//!
//! [`LogFile`] is the surface the indexer core consumes: file enumeration,
//! message reads by global index, and the write-back points for computed
//! indexes. [`DltFileSet`] is the disk-backed implementation used by the CLI
//! and the integration tests.

use crate::dlt::filter::DltFilterList;
use crate::dlt::message::{self, DltMessage, FRAME_PREFIX_SIZE};
use crate::utils::read_fully;
use anyhow::{Context, Result};
use std::fs::File;
use std::io::{Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// A set of log files opened for one indexing job.
///
/// Messages are addressed by global index: position in the concatenation of
/// all files' frame sequences, in file order then offset order. Callers must
/// not run two jobs against the same handle at once; the indexer writes its
/// computed indexes back between phases.
pub trait LogFile: Send + Sync {
    fn number_of_files(&self) -> usize;

    /// Full path of file `num`.
    fn file_name(&self, num: usize) -> String;

    /// Sum of the byte sizes of all files.
    fn total_size(&self) -> i64;

    /// Number of messages across all files (frames located so far).
    fn message_count(&self) -> i64;

    /// Decode the message at a global index. `None` for out-of-range indexes
    /// and for frames the decoder rejects (broken messages).
    fn get_msg(&self, index: i64) -> Option<DltMessage>;

    /// Publish a freshly computed primary index for file `num`.
    fn set_frame_index(&self, frames: Vec<i64>, num: usize);

    /// Publish the filtered index for the whole set.
    fn set_filter_index(&self, filter_index: Vec<i64>);

    /// The active filter list for this set.
    fn filter_list(&self) -> DltFilterList;
}

struct FileEntry {
    path: PathBuf,
    size: i64,
    file: File,
    frames: Vec<i64>,
}

struct Inner {
    files: Vec<FileEntry>,
    filter_index: Vec<i64>,
    filters: DltFilterList,
}

/// Disk-backed [`LogFile`] implementation.
pub struct DltFileSet {
    inner: Mutex<Inner>,
}

impl DltFileSet {
    /// Open every path read-only. Order defines file order for global
    /// indexes.
    pub fn open<P: AsRef<Path>>(paths: &[P]) -> Result<Self> {
        let mut files = Vec::with_capacity(paths.len());
        for path in paths {
            let path = path.as_ref().to_path_buf();
            let file = File::open(&path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            let size = file
                .metadata()
                .with_context(|| format!("Failed to stat {}", path.display()))?
                .len() as i64;
            files.push(FileEntry {
                path,
                size,
                file,
                frames: Vec::new(),
            });
        }

        Ok(Self {
            inner: Mutex::new(Inner {
                files,
                filter_index: Vec::new(),
                filters: DltFilterList::default(),
            }),
        })
    }

    pub fn set_filters(&self, filters: DltFilterList) {
        self.lock().filters = filters;
    }

    /// Primary index of file `num`, as last published.
    pub fn frame_index(&self, num: usize) -> Vec<i64> {
        self.lock().files.get(num).map(|f| f.frames.clone()).unwrap_or_default()
    }

    /// Filtered index, as last published.
    pub fn filter_index(&self) -> Vec<i64> {
        self.lock().filter_index.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().expect("file set poisoned")
    }
}

impl LogFile for DltFileSet {
    fn number_of_files(&self) -> usize {
        self.lock().files.len()
    }

    fn file_name(&self, num: usize) -> String {
        self.lock()
            .files
            .get(num)
            .map(|f| f.path.display().to_string())
            .unwrap_or_default()
    }

    fn total_size(&self) -> i64 {
        self.lock().files.iter().map(|f| f.size).sum()
    }

    fn message_count(&self) -> i64 {
        self.lock().files.iter().map(|f| f.frames.len() as i64).sum()
    }

    fn get_msg(&self, index: i64) -> Option<DltMessage> {
        if index < 0 {
            return None;
        }

        let mut inner = self.lock();
        let mut local = index;
        for num in 0..inner.files.len() {
            let count = inner.files[num].frames.len() as i64;
            if local < count {
                let offset = inner.files[num].frames[local as usize];
                let frame = read_frame(&mut inner.files[num].file, offset)?;
                return DltMessage::parse(&frame).ok();
            }
            local -= count;
        }
        None
    }

    fn set_frame_index(&self, frames: Vec<i64>, num: usize) {
        let mut inner = self.lock();
        if let Some(entry) = inner.files.get_mut(num) {
            entry.frames = frames;
        }
    }

    fn set_filter_index(&self, filter_index: Vec<i64>) {
        self.lock().filter_index = filter_index;
    }

    fn filter_list(&self) -> DltFilterList {
        self.lock().filters.clone()
    }
}

/// Read one complete frame starting at `offset`. `None` if the frame runs
/// past EOF or the offset is bogus.
fn read_frame(file: &mut File, offset: i64) -> Option<Vec<u8>> {
    if offset < 0 {
        return None;
    }

    file.seek(SeekFrom::Start(offset as u64)).ok()?;

    let mut prefix = [0u8; FRAME_PREFIX_SIZE];
    if read_fully(file, &mut prefix).ok()? < FRAME_PREFIX_SIZE {
        return None;
    }

    let total = message::frame_size_from_prefix(&prefix).ok()?;
    let mut frame = vec![0u8; total];
    frame[..FRAME_PREFIX_SIZE].copy_from_slice(&prefix);
    if read_fully(file, &mut frame[FRAME_PREFIX_SIZE..]).ok()? < total - FRAME_PREFIX_SIZE {
        return None;
    }

    Some(frame)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dlt::testframe::FrameBuilder;
    use std::io::Write;

    fn write_log(frames: &[Vec<u8>]) -> (tempfile::TempDir, PathBuf, Vec<i64>) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trace.dlt");
        let mut file = File::create(&path).unwrap();
        let mut offsets = Vec::new();
        let mut pos = 0i64;
        for frame in frames {
            offsets.push(pos);
            file.write_all(frame).unwrap();
            pos += frame.len() as i64;
        }
        file.flush().unwrap();
        (dir, path, offsets)
    }

    #[test]
    fn test_get_msg_by_global_index() {
        let frames = vec![
            FrameBuilder::new("ECU1").payload(b"first").build(),
            FrameBuilder::new("ECU2").payload(b"second").build(),
        ];
        let (_dir, path, offsets) = write_log(&frames);

        let set = DltFileSet::open(&[&path]).unwrap();
        set.set_frame_index(offsets, 0);

        assert_eq!(set.message_count(), 2);
        assert_eq!(set.get_msg(0).unwrap().payload, b"first");
        assert_eq!(set.get_msg(1).unwrap().ecu_id, "ECU2");
        assert!(set.get_msg(2).is_none());
        assert!(set.get_msg(-1).is_none());
    }

    #[test]
    fn test_global_index_spans_files() {
        let first = vec![FrameBuilder::new("ECU1").payload(b"a").build()];
        let second = vec![
            FrameBuilder::new("ECU2").payload(b"b").build(),
            FrameBuilder::new("ECU3").payload(b"c").build(),
        ];
        let (_d1, path1, offsets1) = write_log(&first);
        let (_d2, path2, offsets2) = write_log(&second);

        let set = DltFileSet::open(&[&path1, &path2]).unwrap();
        set.set_frame_index(offsets1, 0);
        set.set_frame_index(offsets2, 1);

        assert_eq!(set.number_of_files(), 2);
        assert_eq!(set.message_count(), 3);
        assert_eq!(set.get_msg(1).unwrap().ecu_id, "ECU2");
        assert_eq!(set.get_msg(2).unwrap().ecu_id, "ECU3");
    }

    #[test]
    fn test_broken_frame_is_none() {
        // offset points into the middle of a frame, not at a storage header
        let frames = vec![FrameBuilder::new("ECU1").payload(b"payload").build()];
        let (_dir, path, _offsets) = write_log(&frames);

        let set = DltFileSet::open(&[&path]).unwrap();
        set.set_frame_index(vec![4], 0);
        assert!(set.get_msg(0).is_none());
    }

    #[test]
    fn test_open_missing_file_fails() {
        assert!(DltFileSet::open(&["/nonexistent/trace.dlt"]).is_err());
    }

    #[test]
    fn test_total_size() {
        let frames = vec![FrameBuilder::new("ECU1").payload(b"12345").build()];
        let (_dir, path, _) = write_log(&frames);
        let set = DltFileSet::open(&[&path]).unwrap();
        assert_eq!(set.total_size(), frames[0].len() as i64);
    }
}
