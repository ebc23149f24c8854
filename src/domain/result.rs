//! Result type alias for Lethe
//!
//! Validation failures compose up through row -> dictionary -> configuration
//! as `LetheError` values; use this alias for every fallible operation.

use super::errors::LetheError;

/// Result type alias for Lethe operations
pub type Result<T> = std::result::Result<T, LetheError>;
