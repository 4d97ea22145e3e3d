//! User settings consumed by the core.
//!
//! Persistence lives in the host binary; the core only defines the shape
//! and the compound update semantics (see the controller).

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use spyglass_types::SortColumn;

pub const PLACEHOLDER_API_KEY: &str = "insert-your-key-here";

/// A nick the user has bound to a real player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnownNick {
    pub uuid: String,
    /// Free-form note, usually the real username at bind time.
    pub comment: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub api_key: String,
    /// Run the autodenick heuristic when a game starts.
    pub autodenick_teammates: bool,
    pub sort_column: SortColumn,
    /// Number of concurrent stats fetch workers.
    pub worker_count: usize,
    /// Outgoing request budget: at most `rate_limit` calls per
    /// `rate_window_secs` seconds.
    pub rate_limit: usize,
    pub rate_window_secs: u64,
    pub known_nicks: HashMap<String, KnownNick>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_key: PLACEHOLDER_API_KEY.to_string(),
            autodenick_teammates: true,
            sort_column: SortColumn::default(),
            worker_count: 8,
            rate_limit: 120,
            rate_window_secs: 60,
            known_nicks: HashMap::new(),
        }
    }
}

/// Permissive plausibility check, not a guarantee of validity.
pub fn api_key_is_valid(key: &str) -> bool {
    key != PLACEHOLDER_API_KEY && key.len() > 5
}
