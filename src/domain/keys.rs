//! Typed cache keys
//!
//! The dictionary's derived indexes are keyed by value types rather than
//! formatted strings, so a source database named `a.b` can never collide with
//! a table named `b` in a database named `a`.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Composite key identifying one table in one source database.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SourceTableKey {
    /// Source database name (the configured alias, not the SQL schema name)
    pub db: String,
    /// Table name within that database
    pub table: String,
}

impl SourceTableKey {
    /// Creates a key from a database alias and table name.
    pub fn new(db: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            db: db.into(),
            table: table.into(),
        }
    }
}

impl fmt::Display for SourceTableKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.db, self.table)
    }
}
