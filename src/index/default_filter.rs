//! Default-filter indexer: one walk, one filter index per registered
//! default filter.
//!
//! Unlike the single-filter pipeline there is no side-channel extraction and
//! no time sorting; each decoded message is offered to every default filter
//! and lands in the index of each one that matches. After the walk every
//! index records the source file name and the total message count for later
//! plausibility checks, and is persisted to the cache when enabled.

use crate::dlt::file::LogFile;
use crate::dlt::filter::DefaultFilterStore;
use crate::events::EventSink;
use crate::index::cache::IndexCache;
use crate::index::job::JobConfig;
use crate::index::pipeline::PROGRESS_STEP;
use crate::index::walker::MessageWalker;
use crate::plugin::PluginSnapshot;
use std::sync::atomic::{AtomicBool, Ordering};

/// Result of a default-filter walk that did not fail.
#[derive(Debug)]
pub enum DefaultWalkOutcome {
    Complete,
    Cancelled,
}

/// Walk the whole file set once and fill every registered default filter's
/// index. Results live in the store; on cancellation the walk returns before
/// the plausibility stamps and cache writes, and the caller discards the
/// partial indexes.
pub fn default_filter_walk(
    file: &dyn LogFile,
    store: &DefaultFilterStore,
    plugins: &PluginSnapshot,
    config: &JobConfig,
    run_label: &str,
    sink: &dyn EventSink,
    stop: &AtomicBool,
    cache: &IndexCache,
) -> DefaultWalkOutcome {
    sink.progress_text(run_label);
    let total = file.message_count().max(0);
    sink.progress_max(total as u64);

    store.clear_filter_indexes();
    let mut entries = store.lock();

    for (index, msg) in MessageWalker::new(file) {
        if let Some(mut msg) = msg {
            plugins.decode_msg(&mut msg, config.silent);

            for entry in entries.iter_mut() {
                if entry.filters.check(&msg) {
                    entry.index.index.push(index);
                }
            }
        }

        if index % PROGRESS_STEP == 0 {
            sink.progress(index as u64);
        }

        if stop.load(Ordering::Relaxed) {
            return DefaultWalkOutcome::Cancelled;
        }
    }

    // plausibility stamps for stored caches
    let file_name = file.file_name(0);
    let message_count = file.message_count();
    let total_size = file.total_size();
    for entry in entries.iter_mut() {
        entry.index.set_file_name(file_name.clone());
        entry.index.set_all_index_size(message_count);

        if cache.enabled() {
            let name =
                cache.filter_file_name(&[file_name.clone()], total_size, &entry.filters, false);
            if let Err(err) = cache.save(&name, &entry.index.index) {
                log::warn!("failed to save default filter cache {name}: {err:#}");
            }
        }
    }

    DefaultWalkOutcome::Complete
}
