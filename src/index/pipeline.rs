//! Filter/decode pipeline: walks a primary index and produces the filtered
//! index plus the control-message side channels.
//!
//! Per-message processing order is fixed: decode, side channels, viewer
//! plug-ins (raw), decoder chain, filter evaluation, viewer plug-ins
//! (decoded). Side channels and viewer plug-ins only run on a full
//! `IndexAndFilter` walk. The message is exclusively owned by the walk while
//! a frame is processed; plug-ins see it as a borrow in that order.

use crate::dlt::file::LogFile;
use crate::dlt::filter::DltFilterList;
use crate::dlt::message::{
    self, DltMessage, TIMEZONE_PAYLOAD_SIZE, UNREGISTER_CONTEXT_PAYLOAD_SIZE,
};
use crate::events::EventSink;
use crate::index::job::{IndexingMode, JobConfig};
use crate::index::walker::MessageWalker;
use crate::plugin::PluginSnapshot;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};

/// Messages between progress reports.
pub(crate) const PROGRESS_STEP: i64 = 1000;

/// Sort key when sort-by-time is enabled. Ties are broken by global index,
/// which the ordered container carries alongside the key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct TimeKey {
    pub seconds: u32,
    pub microseconds: u32,
}

/// What a completed filter walk produced.
#[derive(Debug, Default)]
pub struct FilterWalkResult {
    /// Global indexes of matching messages, in frame order or time order.
    pub filter_index: Vec<i64>,
    /// Global indexes of get-log-info responses seen during the walk.
    pub get_log_info: Vec<i64>,
}

/// Result of a filter walk that did not fail.
#[derive(Debug)]
pub enum WalkOutcome {
    Complete(FilterWalkResult),
    Cancelled,
}

/// Walk every located message and build the filtered index.
///
/// Progress is reported every [`PROGRESS_STEP`] messages; the stop flag is
/// checked after each message and cancellation returns without a result.
pub fn filter_walk(
    file: &dyn LogFile,
    filters: &DltFilterList,
    plugins: &PluginSnapshot,
    config: &JobConfig,
    run_label: &str,
    sink: &dyn EventSink,
    stop: &AtomicBool,
) -> WalkOutcome {
    sink.progress_text(run_label);
    let total = file.message_count().max(0);
    sink.progress_max(total as u64);

    // sized up front so appends never reallocate
    let mut filter_index: Vec<i64> = Vec::with_capacity(total as usize);
    let mut time_ordered: BTreeSet<(TimeKey, i64)> = BTreeSet::new();
    let mut get_log_info: Vec<i64> = Vec::new();

    let full_walk = config.mode == IndexingMode::IndexAndFilter;

    for (index, msg) in MessageWalker::new(file) {
        if let Some(mut msg) = msg {
            if full_walk {
                side_channels(index, &msg, &mut get_log_info, sink);
            }

            if full_walk && config.plugins_enabled {
                for plugin in &plugins.viewer {
                    plugin.init_msg(index, &msg);
                }
            }

            plugins.decode_msg(&mut msg, config.silent);

            let matched = !config.filters_enabled || filters.check(&msg);
            if matched {
                if config.sort_by_time {
                    time_ordered.insert((
                        TimeKey {
                            seconds: msg.seconds,
                            microseconds: msg.microseconds,
                        },
                        index,
                    ));
                } else {
                    filter_index.push(index);
                }
            }

            if full_walk && config.plugins_enabled {
                for plugin in &plugins.viewer {
                    plugin.init_msg_decoded(index, &msg);
                }
            }
        }

        if index % PROGRESS_STEP == 0 {
            sink.progress(index as u64);
        }

        if stop.load(Ordering::Relaxed) {
            return WalkOutcome::Cancelled;
        }
    }

    if config.sort_by_time {
        filter_index = time_ordered.into_iter().map(|(_, index)| index).collect();
    }

    WalkOutcome::Complete(FilterWalkResult {
        filter_index,
        get_log_info,
    })
}

/// Inspect a message for the four control-response side channels. None of
/// them affects the filtered index.
fn side_channels(index: i64, msg: &DltMessage, get_log_info: &mut Vec<i64>, sink: &dyn EventSink) {
    if !msg.is_control_response() {
        return;
    }

    match msg.ctrl_service_id() {
        Some(message::SERVICE_GET_SOFTWARE_VERSION) => {
            let payload = &msg.payload;
            let version = if payload.len() > 9 {
                let end = payload.len().min(265);
                message::to_ascii(&payload[9..end]).trim().to_string()
            } else {
                String::new()
            };
            sink.version_string(&msg.ecu_id, &version);
        }
        Some(message::SERVICE_TIMEZONE) if msg.payload.len() == TIMEZONE_PAYLOAD_SIZE => {
            if let Some(offset) = msg.payload_i32(5) {
                sink.timezone(offset, msg.payload[9] != 0);
            }
        }
        Some(message::SERVICE_UNREGISTER_CONTEXT)
            if msg.payload.len() == UNREGISTER_CONTEXT_PAYLOAD_SIZE =>
        {
            let app_id = message::id_string(&msg.payload[5..9]);
            let context_id = message::id_string(&msg.payload[9..13]);
            sink.unregister_context(&msg.ecu_id, &app_id, &context_id);
        }
        Some(message::SERVICE_GET_LOG_INFO) => {
            get_log_info.push(index);
            sink.get_log_info(index);
        }
        _ => {}
    }
}
