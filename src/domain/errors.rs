//! Domain error types
//!
//! One error enum for the whole validation pass. A rule set that fails any
//! check is unsafe to use for de-identification, so there is no recovery or
//! retry anywhere: every variant is fatal and aborts the pass. Row-scoped
//! variants carry the full row signature so an operator can locate the
//! offending rule in the data dictionary without re-running introspection.

use thiserror::Error;

/// Main Lethe error type
#[derive(Debug, Error)]
pub enum LetheError {
    /// A rule that could not be parsed at all: wrong column count, invalid
    /// identifier syntax, unknown SQL type, bad boolean/integer token.
    #[error("Malformed rule [{signature}]: {message}")]
    MalformedRule {
        /// Full signature of the offending row, including its destination
        /// mapping where one exists (`db.table.field -> dest.field`)
        signature: String,
        /// What was wrong
        message: String,
    },

    /// A rule that parsed but whose flag/method combination violates a row
    /// invariant.
    #[error("Inconsistent rule [{signature}]: {message}")]
    InconsistentRule {
        /// Full signature of the offending row
        signature: String,
        /// Which invariant was violated
        message: String,
    },

    /// Cross-row or cross-table inconsistency in the dictionary as a whole.
    /// The message enumerates every violation found, one per line, not just
    /// the first offender.
    #[error("Data dictionary inconsistency:\n{0}")]
    CollectiveInconsistency(String),

    /// Configuration errors: blank or duplicate reserved field names, blank
    /// secrets, invalid date formats, missing sections. Raised before any
    /// dictionary work begins.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Schema introspection errors (unknown source database, introspector
    /// failure)
    #[error("Schema introspection error: {0}")]
    Introspection(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(String),
}

impl LetheError {
    /// Shorthand for a malformed-rule error scoped to a row signature.
    pub fn malformed(signature: impl Into<String>, message: impl Into<String>) -> Self {
        LetheError::MalformedRule {
            signature: signature.into(),
            message: message.into(),
        }
    }

    /// Shorthand for an inconsistent-rule error scoped to a row signature.
    pub fn inconsistent(signature: impl Into<String>, message: impl Into<String>) -> Self {
        LetheError::InconsistentRule {
            signature: signature.into(),
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for LetheError {
    fn from(err: std::io::Error) -> Self {
        LetheError::Io(err.to_string())
    }
}

impl From<toml::de::Error> for LetheError {
    fn from(err: toml::de::Error) -> Self {
        LetheError::Configuration(format!("TOML parse error: {err}"))
    }
}

impl From<csv::Error> for LetheError {
    fn from(err: csv::Error) -> Self {
        LetheError::Io(format!("rule file read error: {err}"))
    }
}
