//! Domain types for Lethe.
//!
//! The domain layer provides:
//! - **Error types** ([`LetheError`]) covering the whole failure taxonomy:
//!   malformed rules, inconsistent rules, collective dictionary
//!   inconsistencies, configuration errors
//! - **Result type alias** ([`Result`])
//! - **Typed cache keys** ([`SourceTableKey`]) used by the dictionary's
//!   derived indexes
//!
//! Everything here is plain data: no I/O, no database access.

pub mod errors;
pub mod keys;
pub mod result;

pub use errors::LetheError;
pub use keys::SourceTableKey;
pub use result::Result;
