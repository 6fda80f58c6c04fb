mod dlt;
mod events;
mod index;
mod plugin;
mod utils;

use crate::dlt::file::{DltFileSet, LogFile};
use crate::dlt::filter::{DefaultFilterStore, DltFilterList};
use crate::events::EventSink;
use crate::index::job::{FileIndexer, IndexingMode, JobConfig};
use crate::plugin::PluginManager;
use crate::utils::progress::ProgressBar;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "dltix")]
#[command(about = "Indexer for DLT automotive trace logs")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Index one or more trace files and apply a filter set
    Index {
        /// Trace files, in job order
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Filter list (JSON) to evaluate against each message
        #[arg(short, long)]
        filters: Option<PathBuf>,

        /// Default filter registrations (JSON); runs the default-filter
        /// indexer after primary indexing
        #[arg(long)]
        default_filters: Option<PathBuf>,

        /// Order the filtered index by message timestamp
        #[arg(short, long)]
        sort_by_time: bool,

        /// Directory for .dix cache entries (defaults to the app data dir)
        #[arg(long)]
        cache_dir: Option<PathBuf>,

        /// Disable the index cache entirely
        #[arg(long)]
        no_cache: bool,

        /// Skip viewer plug-ins during the walk
        #[arg(long)]
        no_plugins: bool,

        /// Treat every message as matching, ignoring the filter set
        #[arg(long)]
        no_filters: bool,

        /// Suppress decoder plug-in reporting
        #[arg(long)]
        silent: bool,
    },
    /// Remove all .dix entries from the cache directory
    ClearCache {
        /// Cache directory (defaults to the app data dir)
        #[arg(long)]
        cache_dir: Option<PathBuf>,
    },
}

/// Sink driving the terminal progress bar; side-channel findings go to the
/// log.
struct ConsoleSink {
    bar: ProgressBar,
}

impl ConsoleSink {
    fn new() -> Self {
        Self {
            bar: ProgressBar::new(0),
        }
    }
}

impl EventSink for ConsoleSink {
    fn progress_max(&self, max: u64) {
        self.bar.set_length(max);
        self.bar.set_position(0);
    }

    fn progress(&self, value: u64) {
        self.bar.set_position(value);
    }

    fn progress_text(&self, text: &str) {
        self.bar.set_message(text.to_string());
    }

    fn version_string(&self, ecu_id: &str, version: &str) {
        log::info!("ECU {ecu_id} software version: {version}");
    }

    fn timezone(&self, offset_secs: i32, is_dst: bool) {
        log::info!("timezone offset {offset_secs} s (DST: {is_dst})");
    }

    fn unregister_context(&self, ecu_id: &str, app_id: &str, context_id: &str) {
        log::info!("context unregistered: {ecu_id}/{app_id}/{context_id}");
    }
}

fn resolve_cache_dir(cache_dir: Option<PathBuf>, no_cache: bool) -> Result<Option<PathBuf>> {
    if no_cache {
        return Ok(None);
    }
    match cache_dir {
        Some(dir) => {
            std::fs::create_dir_all(&dir)
                .with_context(|| format!("Failed to create cache dir {}", dir.display()))?;
            Ok(Some(dir))
        }
        None => Ok(Some(utils::get_default_cache_dir()?)),
    }
}

#[allow(clippy::too_many_arguments)]
fn cmd_index(
    files: Vec<PathBuf>,
    filters: Option<PathBuf>,
    default_filters: Option<PathBuf>,
    sort_by_time: bool,
    cache_dir: Option<PathBuf>,
    no_cache: bool,
    no_plugins: bool,
    no_filters: bool,
    silent: bool,
) -> Result<()> {
    let set = Arc::new(DltFileSet::open(&files)?);
    if let Some(path) = &filters {
        set.set_filters(DltFilterList::from_file(path)?);
    }

    let plugins = Arc::new(PluginManager::new());
    let store = match &default_filters {
        Some(path) => Arc::new(DefaultFilterStore::from_file(path)?),
        None => Arc::new(DefaultFilterStore::new()),
    };
    let sink = Arc::new(ConsoleSink::new());

    let config = JobConfig {
        mode: IndexingMode::IndexAndFilter,
        cache_dir: resolve_cache_dir(cache_dir, no_cache)?,
        plugins_enabled: !no_plugins,
        filters_enabled: !no_filters,
        sort_by_time,
        silent,
    };

    let indexer = FileIndexer::new(
        set.clone(),
        plugins.clone(),
        store.clone(),
        sink.clone(),
        config.clone(),
    );
    let mut job = indexer.start();
    job.wait();
    let results = job.results();

    if default_filters.is_some() {
        let indexer = FileIndexer::new(
            set.clone(),
            plugins,
            store.clone(),
            sink.clone(),
            JobConfig {
                mode: IndexingMode::DefaultFilter,
                ..config
            },
        );
        let mut job = indexer.start();
        job.wait();
    }

    sink.bar.finish_and_clear();

    let total_messages = set.message_count();
    println!("Indexed {} file(s): {} messages", files.len(), total_messages);
    println!(
        "Filter matches: {} ({} ms indexing, {} ms filtering)",
        results.index_filter.len(),
        results.timings.index_ms,
        results.timings.filter_ms
    );
    if !results.get_log_info.is_empty() {
        println!("Log info responses: {}", results.get_log_info.len());
    }
    if default_filters.is_some() {
        for entry in store.lock().iter() {
            println!("Default filter '{}': {} messages", entry.name, entry.index.index.len());
        }
    }

    Ok(())
}

fn cmd_clear_cache(cache_dir: Option<PathBuf>) -> Result<()> {
    let dir = match cache_dir {
        Some(dir) => dir,
        None => utils::get_default_cache_dir()?,
    };
    let removed = utils::clear_cache_dir(&dir)?;
    println!("Removed {} cache entr{} from {}", removed, if removed == 1 { "y" } else { "ies" }, dir.display());
    Ok(())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Index {
            files,
            filters,
            default_filters,
            sort_by_time,
            cache_dir,
            no_cache,
            no_plugins,
            no_filters,
            silent,
        } => cmd_index(
            files,
            filters,
            default_filters,
            sort_by_time,
            cache_dir,
            no_cache,
            no_plugins,
            no_filters,
            silent,
        ),
        Commands::ClearCache { cache_dir } => cmd_clear_cache(cache_dir),
    }
}
