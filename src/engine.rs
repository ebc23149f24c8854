//! Fixed-order construction of the validated core.
//!
//! The [`Engine`] owns the configuration, the data dictionary and the
//! pseudonymization service, and is the only way to obtain all three in a
//! consistent state. Construction follows a fixed order that must not be
//! rearranged:
//!
//! 1. parse profiles and connection descriptors (the config loader),
//! 2. validate global field naming, scrub policy and secret non-blankness,
//! 3. construct the three keyed hashers and verify the digest-width /
//!    reserved-SQL-type agreement,
//! 4. construct the dictionary (load from the rule file, or derive from the
//!    live schema),
//! 5. run collective dictionary validation, cross-checked against the live
//!    schema when an introspector is supplied.
//!
//! Any step's failure prevents progressing to the next; there is no partial
//! engine. Once constructed, everything here is read-only and freely
//! shareable across reader threads.

use crate::config::{load_config, LetheConfig};
use crate::dictionary::Dictionary;
use crate::domain::{LetheError, Result};
use crate::pseudonym::{Pseudonymizer, DIGEST_HEX_LEN, SQLTYPE_PSEUDONYM};
use crate::schema::SchemaIntrospector;
use std::path::Path;
use tracing::info;

/// Probe identifier sized like the largest we expect (NHS numbers are ten
/// digits); used only to measure digest output width at startup.
const PROBE_PID: &str = "9999999999";

/// The validated core: configuration + dictionary + pseudonymizer.
#[derive(Debug)]
pub struct Engine {
    config: LetheConfig,
    dictionary: Dictionary,
    pseudonymizer: Pseudonymizer,
}

impl Engine {
    /// Builds the core from an already-parsed configuration, following the
    /// fixed load order above.
    ///
    /// With a rule file configured, the dictionary loads from it; otherwise
    /// it is derived from the live schema, which then requires an
    /// introspector. Collective validation cross-checks against the live
    /// schema whenever an introspector is supplied.
    pub fn initialise(
        config: LetheConfig,
        introspector: Option<&dyn SchemaIntrospector>,
    ) -> Result<Self> {
        config.validate().map_err(LetheError::Configuration)?;

        let pseudonymizer = Pseudonymizer::new(&config.secrets);
        verify_digest_width(&pseudonymizer)?;

        let dictionary = match &config.dictionary.file {
            Some(path) => Dictionary::load_file(path, &config)?,
            None => {
                let Some(introspector) = introspector else {
                    return Err(LetheError::Configuration(
                        "no rule file configured and no schema introspector supplied; \
                         cannot construct a data dictionary"
                            .to_string(),
                    ));
                };
                let mut dictionary = Dictionary::new();
                dictionary.extend_from_schema(&config, introspector)?;
                dictionary
            }
        };

        dictionary.validate_collective(&config, introspector)?;
        info!(rules = dictionary.len(), "engine initialised");

        Ok(Self {
            config,
            dictionary,
            pseudonymizer,
        })
    }

    /// Convenience: load the configuration file, then initialise.
    pub fn from_config_file(
        path: impl AsRef<Path>,
        introspector: Option<&dyn SchemaIntrospector>,
    ) -> Result<Self> {
        let config = load_config(path)?;
        Self::initialise(config, introspector)
    }

    /// Drafting workflow: loads the configured rule file when it exists,
    /// supplements it from the live schema, and returns the draft WITHOUT
    /// collective validation, so an operator can serialize, review and edit
    /// a rule set that is not yet consistent.
    pub fn draft_dictionary(
        config: &LetheConfig,
        introspector: &dyn SchemaIntrospector,
    ) -> Result<Dictionary> {
        config.validate().map_err(LetheError::Configuration)?;
        let mut dictionary = match &config.dictionary.file {
            Some(path) if path.exists() => Dictionary::load_file(path, config)?,
            _ => Dictionary::new(),
        };
        dictionary.extend_from_schema(config, introspector)?;
        Ok(dictionary)
    }

    /// The owning configuration.
    pub fn config(&self) -> &LetheConfig {
        &self.config
    }

    /// The validated data dictionary.
    pub fn dictionary(&self) -> &Dictionary {
        &self.dictionary
    }

    /// The pseudonymization service.
    pub fn pseudonymizer(&self) -> &Pseudonymizer {
        &self.pseudonymizer
    }
}

/// The digest output width drives the reserved pseudonymized SQL type; the
/// two must agree before any rule references that type.
fn verify_digest_width(pseudonymizer: &Pseudonymizer) -> Result<()> {
    let probe = pseudonymizer.pseudonymize_primary(PROBE_PID);
    if probe.len() != DIGEST_HEX_LEN
        || SQLTYPE_PSEUDONYM != format!("VARCHAR({})", probe.len())
    {
        return Err(LetheError::Configuration(format!(
            "digest width {} does not match the reserved destination type {SQLTYPE_PSEUDONYM}",
            probe.len()
        )));
    }
    Ok(())
}
