//! Indexing job controller.
//!
//! A [`FileIndexer`] bundles the collaborators and configuration for one job
//! and runs it on a background worker thread. The worker drives the phases
//! for the configured mode, reports through the [`EventSink`], polls the
//! stop flag at the granularities of the phase implementations (per byte
//! while locating, per message while filtering) and publishes result vectors
//! only at phase completion. External consumers serialize access to
//! published vectors through the handle's public mutex; the worker itself
//! never takes it.

use crate::dlt::file::LogFile;
use crate::dlt::filter::DefaultFilterStore;
use crate::events::EventSink;
use crate::index::cache::IndexCache;
use crate::index::default_filter::{default_filter_walk, DefaultWalkOutcome};
use crate::index::locator::{FrameLocator, ScanOutcome};
use crate::index::pipeline::{filter_walk, WalkOutcome};
use crate::plugin::{PluginManager, PluginSnapshot};
use anyhow::Result;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Sleep between polls while waiting for the worker to observe a stop
/// request.
pub const STOP_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// What an indexing job does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IndexingMode {
    /// Run no phase, just signal that the view is current.
    None,
    /// Primary indexing only.
    Index,
    /// Primary indexing per file, then one filter pass over all files.
    #[default]
    IndexAndFilter,
    /// Filter pass over already-located frames.
    Filter,
    /// Fill the index of every registered default filter.
    DefaultFilter,
}

/// Per-job configuration. The silent flag travels here instead of being read
/// from a process-wide option store.
#[derive(Debug, Clone)]
pub struct JobConfig {
    pub mode: IndexingMode,
    /// Directory for `.dix` cache entries; `None` disables caching.
    pub cache_dir: Option<PathBuf>,
    pub plugins_enabled: bool,
    pub filters_enabled: bool,
    pub sort_by_time: bool,
    pub silent: bool,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            mode: IndexingMode::default(),
            cache_dir: None,
            plugins_enabled: true,
            filters_enabled: true,
            sort_by_time: false,
            silent: false,
        }
    }
}

/// Elapsed milliseconds per phase of the last job.
#[derive(Debug, Clone, Copy, Default)]
pub struct JobTimings {
    pub index_ms: u64,
    pub filter_ms: u64,
    pub default_filter_ms: u64,
}

/// Result vectors published by a finished job.
#[derive(Debug, Clone, Default)]
pub struct JobResults {
    /// Primary index of the last file indexed.
    pub index_all: Vec<i64>,
    /// Filtered index over the whole file set.
    pub index_filter: Vec<i64>,
    /// Global indexes of get-log-info responses.
    pub get_log_info: Vec<i64>,
    pub timings: JobTimings,
}

struct SharedState {
    /// Public mutex for external consumers inspecting published vectors.
    consumer_lock: Mutex<()>,
    results: Mutex<JobResults>,
}

/// One indexing job, ready to start.
pub struct FileIndexer {
    file: Arc<dyn LogFile>,
    plugins: Arc<PluginManager>,
    default_filters: Arc<DefaultFilterStore>,
    sink: Arc<dyn EventSink>,
    config: JobConfig,
}

impl FileIndexer {
    pub fn new(
        file: Arc<dyn LogFile>,
        plugins: Arc<PluginManager>,
        default_filters: Arc<DefaultFilterStore>,
        sink: Arc<dyn EventSink>,
        config: JobConfig,
    ) -> Self {
        Self {
            file,
            plugins,
            default_filters,
            sink,
            config,
        }
    }

    /// Spawn the worker thread. Plug-in lists are snapshotted here, so
    /// registrations after this point only affect the next job.
    pub fn start(self) -> JobHandle {
        let stop = Arc::new(AtomicBool::new(false));
        let shared = Arc::new(SharedState {
            consumer_lock: Mutex::new(()),
            results: Mutex::new(JobResults::default()),
        });

        let worker = Worker {
            file: self.file,
            plugins: self.plugins.snapshot(),
            default_filters: self.default_filters,
            sink: self.sink,
            cache: IndexCache::new(self.config.cache_dir.clone()),
            config: self.config,
            stop: stop.clone(),
            shared: shared.clone(),
            current_run: 1,
            max_run: 1,
            index_all: Vec::new(),
            index_filter: Vec::new(),
            get_log_info: Vec::new(),
            timings: JobTimings::default(),
        };
        let thread = thread::spawn(move || worker.run());

        JobHandle {
            stop,
            thread: Some(thread),
            shared,
        }
    }
}

/// Handle to a running (or finished) job.
pub struct JobHandle {
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
    shared: Arc<SharedState>,
}

impl JobHandle {
    /// Request cancellation and block until the worker has returned. After
    /// this no further events are emitted for the job; events already in
    /// flight may still be delivered.
    pub fn stop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(thread) = self.thread.take() {
            while !thread.is_finished() {
                thread::sleep(STOP_POLL_INTERVAL);
            }
            let _ = thread.join();
        }
    }

    /// Block until the job completes on its own.
    pub fn wait(&mut self) {
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }

    pub fn is_running(&self) -> bool {
        self.thread.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Public mutex serializing external consumers of the published index
    /// vectors. The worker never takes it.
    pub fn lock(&self) -> MutexGuard<'_, ()> {
        self.shared.consumer_lock.lock().expect("consumer lock poisoned")
    }

    pub fn try_lock(&self) -> Option<MutexGuard<'_, ()>> {
        self.shared.consumer_lock.try_lock().ok()
    }

    /// Snapshot of the vectors published so far.
    pub fn results(&self) -> JobResults {
        self.shared.results.lock().expect("results poisoned").clone()
    }
}

impl Drop for JobHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

enum PhaseStatus {
    Done,
    Cancelled,
}

struct Worker {
    file: Arc<dyn LogFile>,
    plugins: PluginSnapshot,
    default_filters: Arc<DefaultFilterStore>,
    sink: Arc<dyn EventSink>,
    cache: IndexCache,
    config: JobConfig,
    stop: Arc<AtomicBool>,
    shared: Arc<SharedState>,
    current_run: usize,
    max_run: usize,
    index_all: Vec<i64>,
    index_filter: Vec<i64>,
    get_log_info: Vec<i64>,
    timings: JobTimings,
}

impl Worker {
    fn run(mut self) {
        let files = self.file.number_of_files();
        self.max_run = match self.config.mode {
            IndexingMode::IndexAndFilter => files + 1,
            IndexingMode::Index => files.max(1),
            _ => 1,
        };
        self.current_run = 1;

        match self.config.mode {
            IndexingMode::IndexAndFilter | IndexingMode::Index => {
                for num in 0..files {
                    match self.index_file(num) {
                        Ok(PhaseStatus::Done) => {}
                        Ok(PhaseStatus::Cancelled) => return,
                        Err(err) => {
                            log::warn!("primary indexing failed: {err:#}");
                            return;
                        }
                    }
                    self.file.set_frame_index(self.index_all.clone(), num);
                    self.current_run += 1;
                }
                self.publish();
                self.sink.finish_index();
            }
            IndexingMode::None => {
                // only update the view
                self.sink.finish_index();
            }
            _ => {}
        }

        if matches!(
            self.config.mode,
            IndexingMode::IndexAndFilter | IndexingMode::Filter
        ) {
            match self.index_filter() {
                PhaseStatus::Done => {}
                PhaseStatus::Cancelled => return,
            }
            self.file.set_filter_index(self.index_filter.clone());
            self.publish();
            self.sink.finish_filter();
        }

        if self.config.mode == IndexingMode::DefaultFilter {
            match self.index_default_filter() {
                PhaseStatus::Done => {}
                PhaseStatus::Cancelled => return,
            }
            self.publish();
            self.sink.finish_default_filter();
        }

        log::debug!("duration indexing: {} ms", self.timings.index_ms);
        log::debug!("duration filter indexing: {} ms", self.timings.filter_ms);
        log::debug!(
            "duration default filter indexing: {} ms",
            self.timings.default_filter_ms
        );
    }

    /// Publish the worker-private vectors. Runs at phase completion only, so
    /// observers never see a half-built index.
    fn publish(&self) {
        let mut results = self.shared.results.lock().expect("results poisoned");
        results.index_all = self.index_all.clone();
        results.index_filter = self.index_filter.clone();
        results.get_log_info = self.get_log_info.clone();
        results.timings = self.timings;
    }

    fn index_file(&mut self, num: usize) -> Result<PhaseStatus> {
        let started = Instant::now();
        let path = self.file.file_name(num);

        let cache_name = self.cache.primary_file_name(&path, self.file.total_size());
        if let Some(cached) = self.cache.load(&cache_name) {
            log::debug!("loaded index cache for {path}");
            self.index_all = cached;
            self.timings.index_ms += started.elapsed().as_millis() as u64;
            return Ok(PhaseStatus::Done);
        }

        let run_label = format!("{}/{}", self.current_run, self.max_run);
        let mut locator = FrameLocator::new();
        match locator.scan(Path::new(&path), &run_label, self.sink.as_ref(), &self.stop)? {
            ScanOutcome::Complete(frames) => self.index_all = frames,
            ScanOutcome::Cancelled => return Ok(PhaseStatus::Cancelled),
        }
        log::debug!("created index for {path}");
        self.timings.index_ms += started.elapsed().as_millis() as u64;

        if self.cache.enabled() {
            match self.cache.save(&cache_name, &self.index_all) {
                Ok(()) => log::debug!("saved index cache for {path}"),
                Err(err) => log::warn!("failed to save index cache for {path}: {err:#}"),
            }
        }

        Ok(PhaseStatus::Done)
    }

    fn index_filter(&mut self) -> PhaseStatus {
        let started = Instant::now();
        let filters = self.file.filter_list();

        let file_names: Vec<String> = (0..self.file.number_of_files())
            .map(|num| self.file.file_name(num))
            .collect();
        let cache_name = self.cache.filter_file_name(
            &file_names,
            self.file.total_size(),
            &filters,
            self.config.sort_by_time,
        );
        if let Some(cached) = self.cache.load(&cache_name) {
            log::debug!("loaded filter index cache");
            self.index_filter = cached;
            self.get_log_info.clear();
            self.timings.filter_ms += started.elapsed().as_millis() as u64;
            return PhaseStatus::Done;
        }

        let run_label = format!("{}/{}", self.current_run, self.max_run);
        match filter_walk(
            self.file.as_ref(),
            &filters,
            &self.plugins,
            &self.config,
            &run_label,
            self.sink.as_ref(),
            &self.stop,
        ) {
            WalkOutcome::Complete(result) => {
                self.index_filter = result.filter_index;
                self.get_log_info = result.get_log_info;
            }
            WalkOutcome::Cancelled => return PhaseStatus::Cancelled,
        }
        log::debug!("created filter index");
        self.timings.filter_ms += started.elapsed().as_millis() as u64;

        if self.cache.enabled() {
            match self.cache.save(&cache_name, &self.index_filter) {
                Ok(()) => log::debug!("saved filter index cache"),
                Err(err) => log::warn!("failed to save filter index cache: {err:#}"),
            }
        }

        PhaseStatus::Done
    }

    fn index_default_filter(&mut self) -> PhaseStatus {
        let started = Instant::now();
        let run_label = format!("{}/{}", self.current_run, self.max_run);

        let outcome = default_filter_walk(
            self.file.as_ref(),
            &self.default_filters,
            &self.plugins,
            &self.config,
            &run_label,
            self.sink.as_ref(),
            &self.stop,
            &self.cache,
        );
        match outcome {
            DefaultWalkOutcome::Complete => {}
            DefaultWalkOutcome::Cancelled => return PhaseStatus::Cancelled,
        }

        self.timings.default_filter_ms += started.elapsed().as_millis() as u64;
        PhaseStatus::Done
    }
}
