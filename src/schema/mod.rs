//! Schema introspection interface.
//!
//! Lethe consumes source-database schemas but never talks to a database
//! itself: connection plumbing lives behind the [`SchemaIntrospector`] trait,
//! implemented by the driver layer (or by [`MemorySchema`] for offline
//! validation and tests). A call either yields the complete column listing
//! for a database or fails; no partial results are retained.

pub mod memory;

pub use memory::MemorySchema;

use crate::domain::Result;

/// One column as reported by `information_schema`-style introspection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceColumn {
    /// Table the column belongs to
    pub table: String,
    /// Column name
    pub name: String,
    /// Short type keyword, e.g. `VARCHAR`
    pub datatype_short: String,
    /// Full type string, e.g. `VARCHAR(50)`
    pub datatype_full: String,
    /// Column comment, if the source dialect carries them
    pub comment: Option<String>,
}

impl SourceColumn {
    /// Convenience constructor for the common no-comment case.
    pub fn new(
        table: impl Into<String>,
        name: impl Into<String>,
        datatype_full: impl Into<String>,
    ) -> Self {
        let datatype_full = datatype_full.into();
        let datatype_short = datatype_full
            .split('(')
            .next()
            .unwrap_or(&datatype_full)
            .trim()
            .to_uppercase();
        Self {
            table: table.into(),
            name: name.into(),
            datatype_short,
            datatype_full,
            comment: None,
        }
    }

    /// Attaches a column comment.
    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }
}

/// Read-only view of the source databases' live schemas.
///
/// Implementations must be restartable per call: `columns` may be invoked any
/// number of times and returns the full ordered listing each time.
pub trait SchemaIntrospector {
    /// All columns of all tables in the named source database, in schema
    /// order.
    fn columns(&self, db: &str) -> Result<Vec<SourceColumn>>;

    /// Does the named table exist in the named source database?
    fn table_exists(&self, db: &str, table: &str) -> Result<bool>;
}
