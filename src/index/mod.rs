//! Index engine for DLT trace logs.
//!
//! This module provides the core indexing pipeline:
//!
//! - [`locator`] - Byte-scanning frame locator (primary index)
//! - [`cache`] - On-disk `.dix` cache for index vectors
//! - [`walker`] - Iteration of located frames as decoded messages
//! - [`pipeline`] - Filter/decode walk producing the filtered index
//! - [`default_filter`] - One walk filling every default filter's index
//! - [`job`] - Background job controller (modes, progress, cancellation)
//!
//! ## Data flow
//!
//! ```text
//! raw bytes ──locator──► primary index ──walker──► messages
//!     ──pipeline──► filtered index (+ side-channel events)
//! ```
//!
//! The cache sits beside the locator and the pipeline and short-circuits
//! either walk when a valid entry exists for the same input identity and
//! filter fingerprint.

pub mod cache;
pub mod default_filter;
pub mod job;
pub mod locator;
pub mod pipeline;
pub mod walker;

pub use cache::{IndexCache, CACHE_FORMAT_VERSION};
pub use job::{FileIndexer, IndexingMode, JobConfig, JobHandle, JobResults, JobTimings};
pub use locator::{FrameLocator, ScanOutcome, SEGMENT_SIZE};
pub use pipeline::{FilterWalkResult, TimeKey, WalkOutcome};
pub use walker::MessageWalker;
