pub mod formatting;

use serde::{Deserialize, Serialize};

/// Column the lobby table is sorted by.
///
/// `Username` means "no stat": rows fall back to the alphabetical tiebreak.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortColumn {
    Stars,
    #[default]
    Fkdr,
    Wlr,
    Winstreak,
    Username,
}

/// Severity of an informational banner cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// A short status message shown above the lobby table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InfoCell {
    pub text: String,
    pub severity: Severity,
}

impl InfoCell {
    pub fn warning(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            severity: Severity::Warning,
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            severity: Severity::Error,
        }
    }
}

/// One rendered lobby row. All stat values are pre-formatted strings so the
/// display layer never needs to know about the player model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverlayRow {
    pub username: String,
    pub stars: String,
    pub fkdr: String,
    pub wlr: String,
    pub winstreak: String,
    /// True for members of the user's own party.
    pub is_party: bool,
    /// True when the stats are intentionally hidden (nicked player).
    pub stats_hidden: bool,
}

/// Snapshot handed to the polling display driver.
///
/// `rows` is `None` when nothing changed since the previous poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverlayUpdate {
    pub in_queue: bool,
    pub info_cells: Vec<InfoCell>,
    pub rows: Option<Vec<OverlayRow>>,
}
