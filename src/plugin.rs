//! Viewer and decoder plug-in seams.
//!
//! Viewer plug-ins observe every message twice during an `IndexAndFilter`
//! walk: once raw, once after the decoder chain ran. Decoder plug-ins may
//! rewrite the message in place (attach decoded payload text, fix up
//! identifiers). Registration is open at any time, but a job snapshots both
//! lists when it starts, so changes only affect the next job.

use crate::dlt::message::DltMessage;
use std::sync::{Arc, Mutex};

/// Observer plug-in fed during the filter walk.
pub trait ViewerPlugin: Send + Sync {
    fn name(&self) -> &str;

    /// Called with the raw message before the decoder chain ran.
    fn init_msg(&self, index: i64, msg: &DltMessage);

    /// Called with the decoded message after the decoder chain ran.
    fn init_msg_decoded(&self, index: i64, msg: &DltMessage);
}

/// Transformation plug-in applied to each message before filtering.
pub trait DecoderPlugin: Send + Sync {
    fn name(&self) -> &str;

    /// Decode `msg` in place. Returns true if this plug-in handled the
    /// message; the chain stops at the first handler.
    fn decode_msg(&self, msg: &mut DltMessage, silent: bool) -> bool;
}

/// Registry of active plug-ins.
#[derive(Default)]
pub struct PluginManager {
    viewer: Mutex<Vec<Arc<dyn ViewerPlugin>>>,
    decoder: Mutex<Vec<Arc<dyn DecoderPlugin>>>,
}

impl PluginManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_viewer(&self, plugin: Arc<dyn ViewerPlugin>) {
        self.viewer.lock().expect("plugin registry poisoned").push(plugin);
    }

    pub fn register_decoder(&self, plugin: Arc<dyn DecoderPlugin>) {
        self.decoder.lock().expect("plugin registry poisoned").push(plugin);
    }

    /// Clone the current plug-in lists. A job takes one snapshot at start and
    /// works from it for its whole lifetime.
    pub fn snapshot(&self) -> PluginSnapshot {
        PluginSnapshot {
            viewer: self.viewer.lock().expect("plugin registry poisoned").clone(),
            decoder: self.decoder.lock().expect("plugin registry poisoned").clone(),
        }
    }
}

/// Owned copy of the plug-in lists taken at job start.
#[derive(Default, Clone)]
pub struct PluginSnapshot {
    pub viewer: Vec<Arc<dyn ViewerPlugin>>,
    pub decoder: Vec<Arc<dyn DecoderPlugin>>,
}

impl PluginSnapshot {
    /// Run the decoder chain on a message. The first plug-in that reports the
    /// message as handled ends the chain.
    pub fn decode_msg(&self, msg: &mut DltMessage, silent: bool) {
        for plugin in &self.decoder {
            if plugin.decode_msg(msg, silent) {
                break;
            }
        }
    }
}
