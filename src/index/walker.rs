//! Message walker: iterates the located frames of a file set as decoded
//! messages.

use crate::dlt::file::LogFile;
use crate::dlt::message::DltMessage;

/// Iterator over `(global_index, message)` pairs for every located frame.
///
/// Frames the decoder rejects yield `None` in the message slot; consumers
/// skip them, so broken frames never reach a filter index or a side channel,
/// while the global index keeps counting them.
pub struct MessageWalker<'a> {
    file: &'a dyn LogFile,
    next: i64,
    total: i64,
}

impl<'a> MessageWalker<'a> {
    pub fn new(file: &'a dyn LogFile) -> Self {
        Self {
            file,
            next: 0,
            total: file.message_count(),
        }
    }
}

impl Iterator for MessageWalker<'_> {
    type Item = (i64, Option<DltMessage>);

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.total {
            return None;
        }
        let index = self.next;
        self.next += 1;
        Some((index, self.file.get_msg(index)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dlt::file::DltFileSet;
    use crate::dlt::testframe::FrameBuilder;
    use std::io::Write;

    #[test]
    fn test_walker_skips_nothing_but_flags_broken() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trace.dlt");
        let mut file = std::fs::File::create(&path).unwrap();

        let good = FrameBuilder::new("ECU1").payload(b"ok").build();
        file.write_all(&good).unwrap();
        file.flush().unwrap();

        let set = DltFileSet::open(&[&path]).unwrap();
        // one real frame plus a bogus offset mid-frame
        set.set_frame_index(vec![0, 4], 0);

        let walked: Vec<_> = MessageWalker::new(&set).collect();
        assert_eq!(walked.len(), 2);
        assert_eq!(walked[0].0, 0);
        assert!(walked[0].1.is_some());
        assert_eq!(walked[1].0, 1);
        assert!(walked[1].1.is_none());
    }

    #[test]
    fn test_walker_empty_index() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trace.dlt");
        std::fs::write(&path, b"").unwrap();

        let set = DltFileSet::open(&[&path]).unwrap();
        assert_eq!(MessageWalker::new(&set).count(), 0);
    }
}
