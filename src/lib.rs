// Lethe - De-identification rule engine for clinical research databases
// Copyright (c) 2025 Lethe Contributors
// Licensed under the MIT License

//! # Lethe - clinical de-identification rule engine
//!
//! Lethe is the rule-engine core of a system that copies records from
//! identifiable clinical source databases into a de-identified research
//! database. It owns the **data dictionary** - a declarative mapping saying,
//! per source column, how that column must be transformed - plus the
//! configuration and validation layer that proves the mapping internally
//! consistent and safe *before any row of patient data is touched*.
//!
//! Correctness here is a data-governance guarantee, not a convenience: a
//! single inconsistent rule (a patient identifier routed to an unhashed
//! output column, say) is an information-disclosure failure. Lethe therefore
//! refuses to hand out a partially-validated rule set: every pass either
//! succeeds completely or fails with enough context to fix the rules.
//!
//! The row-by-row execution engine, the free-text scrubber and the database
//! drivers are separate components consuming this crate's API.
//!
//! ## Architecture
//!
//! - [`config`] - TOML configuration, source-database profiles, secrets
//! - [`dictionary`] - rule rows, the dictionary, derived indexes, TSV io
//! - [`pseudonym`] - salted one-way digests for identifiers and change
//!   detection
//! - [`schema`] - the schema-introspection interface Lethe consumes
//! - [`sql`] - identifier and SQL-type validators
//! - [`engine`] - fixed-order construction of the validated core
//! - [`domain`] - errors, result alias, typed keys
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use lethe::engine::Engine;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Loads lethe.toml, loads and validates the configured rule file
//!     let engine = Engine::from_config_file("lethe.toml", None)?;
//!
//!     let dictionary = engine.dictionary();
//!     println!("{} rules over {} source databases",
//!         dictionary.len(),
//!         dictionary.source_databases().len());
//!
//!     // The execution engine consumes these:
//!     let token = engine.pseudonymizer().pseudonymize_primary("1234567890");
//!     assert_eq!(token.len(), 64);
//!     Ok(())
//! }
//! ```
//!
//! ## Drafting a data dictionary
//!
//! Given live source schemas (behind a [`schema::SchemaIntrospector`]), Lethe
//! derives a draft rule set from each source database's profile:
//!
//! ```rust,no_run
//! use lethe::config::load_config;
//! use lethe::engine::Engine;
//! # fn introspector() -> lethe::schema::MemorySchema { unimplemented!() }
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config("lethe.toml")?;
//! let draft = Engine::draft_dictionary(&config, &introspector())?;
//! std::fs::write("draft_dd.tsv", draft.to_tsv()?)?;
//! // ... review, edit, then point [dictionary].file at the result
//! # Ok(())
//! # }
//! ```
//!
//! ## Error handling
//!
//! Everything fallible returns [`domain::Result`]; the error taxonomy in
//! [`domain::LetheError`] distinguishes malformed rules, inconsistent rules,
//! collective dictionary inconsistencies and configuration errors. All are
//! fatal: there is no retry and no degraded mode.

pub mod config;
pub mod dictionary;
pub mod domain;
pub mod engine;
pub mod pseudonym;
pub mod schema;
pub mod sql;
