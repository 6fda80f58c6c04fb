//! Event sink capability handed to an indexing job at construction.
//!
//! The worker thread reports progress, control-message side channels and
//! phase completion through this trait. Implementations are responsible for
//! any cross-thread hop (channel, queued UI update, ...); the worker calls
//! the methods directly from its own thread.

/// Receiver for everything an indexing job emits.
///
/// All methods have empty default bodies so a sink only implements what it
/// cares about. Within one job the calls arrive in walk order, progress
/// values are monotonic within a phase, and the `finish_*` calls come
/// strictly after all data events of their phase.
pub trait EventSink: Send + Sync {
    /// Total work units of the phase that is about to run.
    fn progress_max(&self, _max: u64) {}

    /// Work units completed so far in the current phase.
    fn progress(&self, _value: u64) {}

    /// Label for the current phase, formatted `<current_run>/<max_run>`.
    fn progress_text(&self, _text: &str) {}

    /// A software version announcement was found in the log.
    fn version_string(&self, _ecu_id: &str, _version: &str) {}

    /// A get-log-info control response was found at the given global index.
    fn get_log_info(&self, _index: i64) {}

    /// A timezone control response: offset in seconds plus DST flag.
    fn timezone(&self, _offset_secs: i32, _is_dst: bool) {}

    /// A context was unregistered on the given ECU.
    fn unregister_context(&self, _ecu_id: &str, _app_id: &str, _context_id: &str) {}

    /// Primary indexing finished for all files of the job.
    fn finish_index(&self) {}

    /// Filter indexing finished.
    fn finish_filter(&self) {}

    /// Default-filter indexing finished.
    fn finish_default_filter(&self) {}
}

/// Sink that drops every event. Useful for headless runs and tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullEventSink;

impl EventSink for NullEventSink {}
