//! On-disk cache for computed index vectors.
//!
//! A cache entry is a `.dix` file: a little-endian u32 format version
//! followed by packed signed 64-bit entries until EOF. File names are derived
//! from input identity (MD5 over basenames and total byte size) and, for
//! filter indexes, the filter list fingerprint; a `_S` suffix marks indexes
//! in time order. Every cache failure is treated as a miss and the caller
//! computes from scratch.

use crate::dlt::filter::DltFilterList;
use crate::utils::{read_fully, read_u32_le, write_i64_le, write_u32_le};
use anyhow::{Context, Result};
use md5::{Digest, Md5};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

/// Version tag written at the start of every cache file.
pub const CACHE_FORMAT_VERSION: u32 = 1;

fn md5_hex(data: &[u8]) -> String {
    Md5::digest(data).iter().map(|b| format!("{b:02x}")).collect()
}

fn basename(path: &str) -> String {
    Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string())
}

/// Cache handle. Disabled (all loads miss, all saves are no-ops) when no
/// directory is configured.
pub struct IndexCache {
    dir: Option<PathBuf>,
}

impl IndexCache {
    pub fn new(dir: Option<PathBuf>) -> Self {
        Self { dir }
    }

    pub fn enabled(&self) -> bool {
        self.dir.is_some()
    }

    /// Cache file name for the primary index of one file.
    pub fn primary_file_name(&self, file_name: &str, total_size: i64) -> String {
        let key = format!("{}_{}", basename(file_name), total_size);
        format!("{}.dix", md5_hex(key.as_bytes()))
    }

    /// Cache file name for a filter index over a set of files. With
    /// sort-by-time the basenames are joined in lexicographic order and the
    /// name carries a `_S` suffix; otherwise job order is kept.
    pub fn filter_file_name(
        &self,
        file_names: &[String],
        total_size: i64,
        filters: &DltFilterList,
        sort_by_time: bool,
    ) -> String {
        let mut names: Vec<String> = file_names.iter().map(|n| basename(n)).collect();
        if sort_by_time {
            names.sort();
        }
        let key = format!("{}_{}", names.join("_"), total_size);
        let suffix = if sort_by_time { "_S.dix" } else { ".dix" };
        format!(
            "{}_{}{}",
            md5_hex(key.as_bytes()),
            filters.fingerprint_hex(),
            suffix
        )
    }

    /// Load a cache entry. `None` covers every reason the entry cannot be
    /// used: caching disabled, file absent, unreadable, wrong version, or a
    /// truncated trailing entry.
    pub fn load(&self, name: &str) -> Option<Vec<i64>> {
        let dir = self.dir.as_ref()?;
        let path = dir.join(name);

        let file = File::open(&path).ok()?;
        let mut reader = BufReader::new(file);

        let version = read_u32_le(&mut reader).ok()?;
        if version != CACHE_FORMAT_VERSION {
            log::debug!("rejecting cache {} with version {}", path.display(), version);
            return None;
        }

        let mut index = Vec::new();
        loop {
            let mut entry = [0u8; 8];
            let n = read_fully(&mut reader, &mut entry).ok()?;
            if n == 0 {
                break;
            }
            if n < 8 {
                // trailing partial entry: the file is truncated
                log::debug!("rejecting truncated cache {}", path.display());
                return None;
            }
            index.push(i64::from_le_bytes(entry));
        }

        Some(index)
    }

    /// Write a cache entry, truncating any previous one. A no-op when
    /// caching is disabled. Errors are returned for logging but never abort
    /// a job.
    pub fn save(&self, name: &str, index: &[i64]) -> Result<()> {
        let Some(dir) = self.dir.as_ref() else {
            return Ok(());
        };
        let path = dir.join(name);

        let file = File::create(&path)
            .with_context(|| format!("Failed to create cache file {}", path.display()))?;
        let mut writer = BufWriter::new(file);

        write_u32_le(&mut writer, CACHE_FORMAT_VERSION)?;
        for &entry in index {
            write_i64_le(&mut writer, entry)?;
        }

        use std::io::Write;
        writer
            .flush()
            .with_context(|| format!("Failed to flush cache file {}", path.display()))?;
        Ok(())
    }
}
