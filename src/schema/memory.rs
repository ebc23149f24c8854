//! In-memory schema fixture.
//!
//! A [`SchemaIntrospector`](super::SchemaIntrospector) backed by a plain map.
//! Used for offline dictionary validation (re-checking a rule file against a
//! schema snapshot without database access) and throughout the test suite.

use super::{SchemaIntrospector, SourceColumn};
use crate::domain::{LetheError, Result};
use std::collections::BTreeMap;

/// Schema snapshot held in memory, keyed by source-database alias.
#[derive(Debug, Default, Clone)]
pub struct MemorySchema {
    databases: BTreeMap<String, Vec<SourceColumn>>,
}

impl MemorySchema {
    /// Creates an empty snapshot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a column to the named database, creating the database entry on
    /// first use. Columns are kept in insertion order, mirroring the ordered
    /// sequence a live introspection query returns.
    pub fn add_column(&mut self, db: impl Into<String>, column: SourceColumn) -> &mut Self {
        self.databases.entry(db.into()).or_default().push(column);
        self
    }

    /// Adds a whole table at once: `(column_name, full_sql_type)` pairs.
    pub fn add_table(
        &mut self,
        db: impl Into<String>,
        table: &str,
        columns: &[(&str, &str)],
    ) -> &mut Self {
        let db = db.into();
        for (name, datatype) in columns {
            self.add_column(db.clone(), SourceColumn::new(table, *name, *datatype));
        }
        self
    }
}

impl SchemaIntrospector for MemorySchema {
    fn columns(&self, db: &str) -> Result<Vec<SourceColumn>> {
        self.databases
            .get(db)
            .cloned()
            .ok_or_else(|| LetheError::Introspection(format!("unknown source database: {db}")))
    }

    fn table_exists(&self, db: &str, table: &str) -> Result<bool> {
        let columns = self.columns(db)?;
        Ok(columns.iter().any(|c| c.table == table))
    }
}
