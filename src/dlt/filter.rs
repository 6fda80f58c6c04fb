//! Message filters and the default-filter registry.
//!
//! A filter list is the unit the indexer works with: an ordered set of
//! positive and negative predicates plus an MD5 fingerprint over its
//! canonical form (compact JSON), which keys the on-disk filter index cache.

use crate::dlt::message::DltMessage;
use anyhow::{Context, Result};
use md5::{Digest, Md5};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// Whether a filter selects or vetoes matching messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FilterKind {
    #[default]
    Positive,
    Negative,
}

fn default_true() -> bool {
    true
}

/// One predicate over a decoded message. Unset fields match anything;
/// set fields must all match.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DltFilter {
    #[serde(default)]
    pub kind: FilterKind,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub ecu_id: Option<String>,
    #[serde(default)]
    pub app_id: Option<String>,
    #[serde(default)]
    pub context_id: Option<String>,
    #[serde(default)]
    pub payload_text: Option<String>,
    /// Interpret `payload_text` as a regular expression instead of a
    /// substring.
    #[serde(default)]
    pub use_regex: bool,
    #[serde(skip)]
    pub payload_regex: Option<Regex>,
}

impl Default for DltFilter {
    fn default() -> Self {
        Self {
            kind: FilterKind::default(),
            enabled: true,
            ecu_id: None,
            app_id: None,
            context_id: None,
            payload_text: None,
            use_regex: false,
            payload_regex: None,
        }
    }
}

impl DltFilter {
    /// Precompile the payload regex if one is configured.
    fn compile(&mut self) -> Result<()> {
        self.payload_regex = match (&self.payload_text, self.use_regex) {
            (Some(pattern), true) => Some(
                Regex::new(pattern)
                    .with_context(|| format!("invalid payload regex {pattern:?}"))?,
            ),
            _ => None,
        };
        Ok(())
    }

    /// Does this single filter match the message? Ignores `kind`.
    pub fn matches(&self, msg: &DltMessage) -> bool {
        if let Some(ecu) = &self.ecu_id {
            if msg.ecu_id != *ecu {
                return false;
            }
        }
        if let Some(app) = &self.app_id {
            if msg.app_id != *app {
                return false;
            }
        }
        if let Some(ctx) = &self.context_id {
            if msg.context_id != *ctx {
                return false;
            }
        }
        if let Some(text) = &self.payload_text {
            let payload = msg.payload_text();
            let hit = match &self.payload_regex {
                Some(regex) => regex.is_match(&payload),
                None => payload.contains(text.as_str()),
            };
            if !hit {
                return false;
            }
        }
        true
    }
}

/// Ordered filter set with positive/negative semantics.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DltFilterList {
    #[serde(default)]
    pub filters: Vec<DltFilter>,
}

impl DltFilterList {
    /// Load a filter list from a JSON file and compile its regexes.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read filter file {}", path.display()))?;
        let mut list: DltFilterList = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse filter file {}", path.display()))?;
        list.compile()?;
        Ok(list)
    }

    /// Precompile all regex predicates.
    pub fn compile(&mut self) -> Result<()> {
        for filter in &mut self.filters {
            filter.compile()?;
        }
        Ok(())
    }

    /// Evaluate the list against a message: with no enabled positive filters
    /// every message passes, otherwise one of them must match; any enabled
    /// negative match vetoes.
    pub fn check(&self, msg: &DltMessage) -> bool {
        let mut have_positive = false;
        let mut positive_hit = false;

        for filter in self.filters.iter().filter(|f| f.enabled) {
            match filter.kind {
                FilterKind::Positive => {
                    have_positive = true;
                    if !positive_hit && filter.matches(msg) {
                        positive_hit = true;
                    }
                }
                FilterKind::Negative => {
                    if filter.matches(msg) {
                        return false;
                    }
                }
            }
        }

        !have_positive || positive_hit
    }

    /// MD5 over the canonical form (compact JSON). Two lists with equal
    /// fingerprints are interchangeable for indexing.
    pub fn fingerprint(&self) -> [u8; 16] {
        let canonical =
            serde_json::to_vec(self).expect("filter list is always serializable");
        Md5::digest(&canonical).into()
    }

    /// Hex rendering of [`fingerprint`](Self::fingerprint), as used in cache
    /// file names.
    pub fn fingerprint_hex(&self) -> String {
        self.fingerprint().iter().map(|b| format!("{b:02x}")).collect()
    }
}

/// Per-filter index with the plausibility stamps recorded after a
/// default-filter walk.
#[derive(Debug, Clone, Default)]
pub struct FilterIndex {
    pub index: Vec<i64>,
    pub file_name: String,
    pub all_index_size: i64,
}

impl FilterIndex {
    pub fn set_file_name(&mut self, name: String) {
        self.file_name = name;
    }

    pub fn set_all_index_size(&mut self, size: i64) {
        self.all_index_size = size;
    }
}

/// One registered default filter: a name, its filter list, its index.
#[derive(Debug, Default)]
pub struct DefaultFilterEntry {
    pub name: String,
    pub filters: DltFilterList,
    pub index: FilterIndex,
}

/// On-disk shape of a default-filter registration.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct NamedFilterList {
    name: String,
    #[serde(default)]
    filters: Vec<DltFilter>,
}

/// Registry of default filters. The default-filter indexer fills one index
/// vector per entry in a single walk.
#[derive(Default)]
pub struct DefaultFilterStore {
    entries: Mutex<Vec<DefaultFilterEntry>>,
}

impl DefaultFilterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load default filters from a JSON file: an array of
    /// `{ "name": ..., "filters": [...] }` records.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read default filter file {}", path.display()))?;
        let named: Vec<NamedFilterList> = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse default filter file {}", path.display()))?;

        let store = Self::new();
        for record in named {
            let mut filters = DltFilterList { filters: record.filters };
            filters.compile()?;
            store.register(&record.name, filters);
        }
        Ok(store)
    }

    pub fn register(&self, name: &str, filters: DltFilterList) {
        self.lock().push(DefaultFilterEntry {
            name: name.to_string(),
            filters,
            index: FilterIndex::default(),
        });
    }

    /// Drop all accumulated filter indexes, keeping the registrations.
    pub fn clear_filter_indexes(&self) {
        for entry in self.lock().iter_mut() {
            entry.index = FilterIndex::default();
        }
    }

    pub fn lock(&self) -> MutexGuard<'_, Vec<DefaultFilterEntry>> {
        self.entries.lock().expect("default filter store poisoned")
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
