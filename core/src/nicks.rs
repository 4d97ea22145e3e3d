//! Nick to uuid mapping, merged from multiple tables.
//!
//! The first table is the user-editable default; any tables after it are
//! read-only once loaded. Lookup is first-match-wins across the list.

use hashbrown::HashMap;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("failed to decode nick database: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("invalid nick database: {0}")]
    Invalid(String),
}

/// Ordered list of nick → uuid tables.
#[derive(Debug)]
pub struct NickDatabase {
    databases: Vec<HashMap<String, String>>,
}

impl Default for NickDatabase {
    fn default() -> Self {
        Self::new(HashMap::new())
    }
}

/// Parse one JSON table. Must be an object with string values.
pub fn parse_table(json: &str) -> Result<HashMap<String, String>, DatabaseError> {
    let value: serde_json::Value = serde_json::from_str(json)?;
    let serde_json::Value::Object(map) = value else {
        return Err(DatabaseError::Invalid("must be a mapping".to_string()));
    };

    let mut table = HashMap::with_capacity(map.len());
    for (nick, uuid) in map {
        let serde_json::Value::String(uuid) = uuid else {
            return Err(DatabaseError::Invalid(format!(
                "value for '{nick}' must be a string"
            )));
        };
        table.insert(nick, uuid);
    }
    Ok(table)
}

impl NickDatabase {
    /// Database holding only the (possibly empty) default table.
    pub fn new(default_table: HashMap<String, String>) -> Self {
        Self {
            databases: vec![default_table],
        }
    }

    /// Build from JSON sources: the required default table first, then
    /// best-effort supplementary tables. A supplementary table that fails to
    /// parse is logged and skipped; a broken default table is an error.
    pub fn from_sources<'a>(
        default_json: &str,
        supplementary_jsons: impl IntoIterator<Item = &'a str>,
    ) -> Result<Self, DatabaseError> {
        let mut db = Self::new(parse_table(default_json)?);
        for (idx, json) in supplementary_jsons.into_iter().enumerate() {
            match parse_table(json) {
                Ok(table) => db.add_supplementary(table),
                Err(err) => warn!(table = idx, %err, "skipping unreadable nick table"),
            }
        }
        Ok(db)
    }

    /// Append a read-only table. Consulted after every table added before it.
    pub fn add_supplementary(&mut self, table: HashMap<String, String>) {
        self.databases.push(table);
    }

    /// True if any table knows this nick.
    pub fn knows(&self, nick: &str) -> bool {
        self.databases.iter().any(|db| db.contains_key(nick))
    }

    /// Resolve a nick to a uuid, first table wins.
    pub fn denick(&self, nick: &str) -> Option<&str> {
        self.databases
            .iter()
            .find_map(|db| db.get(nick))
            .map(String::as_str)
    }

    /// Bind a nick in the user-editable default table.
    pub fn insert_default(&mut self, nick: &str, uuid: &str) {
        self.databases[0].insert(nick.to_string(), uuid.to_string());
    }

    /// Remove a nick from the user-editable default table. Supplementary
    /// tables are never touched.
    pub fn remove_default(&mut self, nick: &str) {
        self.databases[0].remove(nick);
    }
}
