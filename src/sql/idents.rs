//! Identifier syntax validation
//!
//! Dialect-independent identifier rules: a leading letter or underscore,
//! then letters, digits or underscores, at most 64 characters. Quoted or
//! schema-qualified identifiers are deliberately rejected; the data
//! dictionary stores bare names.

use regex::Regex;
use std::sync::LazyLock;

static IDENTIFIER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("hardcoded regex"));

/// Maximum identifier length accepted (the MySQL limit; the strictest of the
/// dialects we care about).
pub const MAX_IDENTIFIER_LEN: usize = 64;

/// Is `name` syntactically valid as a column name?
pub fn is_valid_field_name(name: &str) -> bool {
    name.len() <= MAX_IDENTIFIER_LEN && IDENTIFIER_RE.is_match(name)
}

/// Is `name` syntactically valid as a table name?
///
/// Same rules as field names; kept separate so call sites document intent.
pub fn is_valid_table_name(name: &str) -> bool {
    is_valid_field_name(name)
}
