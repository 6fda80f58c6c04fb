//! # dltix - DLT trace log indexer
//!
//! dltix locates every message frame in binary DLT automotive trace logs,
//! evaluates filter sets over the decoded messages and persists both kinds
//! of index to disk, so reopening the same logs with the same filters costs
//! one cache load instead of a full scan.
//!
//! ## Architecture
//!
//! The crate is organized into these main modules:
//!
//! - [`index`] - The indexing core: frame locator, filter pipeline, cache,
//!   job controller
//! - [`dlt`] - The log-format model: frame decoding, file access, filters
//! - [`plugin`] - Viewer and decoder plug-in seams
//! - [`events`] - The event sink a job reports through
//! - [`utils`] - Little-endian codec helpers, cache directory resolution
//!
//! ## Quick Start
//!
//! ```ignore
//! use dltix::dlt::DltFileSet;
//! use dltix::dlt::filter::DefaultFilterStore;
//! use dltix::events::NullEventSink;
//! use dltix::index::{FileIndexer, JobConfig};
//! use dltix::plugin::PluginManager;
//! use std::sync::Arc;
//!
//! let set = Arc::new(DltFileSet::open(&["trace.dlt"]).unwrap());
//! let indexer = FileIndexer::new(
//!     set.clone(),
//!     Arc::new(PluginManager::new()),
//!     Arc::new(DefaultFilterStore::new()),
//!     Arc::new(NullEventSink),
//!     JobConfig::default(),
//! );
//! let mut job = indexer.start();
//! job.wait();
//! println!("{} messages match", job.results().index_filter.len());
//! ```
//!
//! ## Indexing model
//!
//! Primary indexes hold the byte offset of every frame in one file. Filter
//! indexes hold global message indexes: positions in the concatenation of
//! all files of a job. Both are cached as `.dix` files named by MD5 over the
//! input identity (and, for filter indexes, the filter fingerprint), so a
//! cache entry is only ever reused for an identical job.

pub mod dlt;
pub mod events;
pub mod index;
pub mod plugin;
pub mod utils;
