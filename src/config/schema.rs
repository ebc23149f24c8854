//! Configuration schema types
//!
//! The root [`LetheConfig`] maps to the TOML configuration file. Each section
//! validates itself; [`LetheConfig::validate`] runs the sections in a fixed
//! order and fails on the first bad section, before any dictionary work
//! begins.

use crate::config::secret::{secret_is_blank, SecretString};
use crate::sql::is_valid_field_name;
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

/// Database engine for a connection descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseEngine {
    /// MySQL / MariaDB
    Mysql,
    /// Microsoft SQL Server (direct or via ODBC DSN)
    SqlServer,
}

/// Connection descriptor for one database
///
/// Lethe never opens these connections itself; the descriptors are validated
/// here and handed to the driver layer.
#[derive(Debug, Clone, Deserialize)]
pub struct ConnectionConfig {
    /// Database engine
    pub engine: DatabaseEngine,
    /// Host name (required for MySQL)
    #[serde(default)]
    pub host: Option<String>,
    /// TCP port (required for MySQL)
    #[serde(default)]
    pub port: Option<u16>,
    /// Database / schema name
    #[serde(default)]
    pub db: Option<String>,
    /// ODBC DSN, SQL Server only; replaces host/db when present
    #[serde(default)]
    pub dsn: Option<String>,
    /// User name
    pub user: String,
    /// Password, redacted in Debug output and zeroed on drop
    pub password: SecretString,
}

impl ConnectionConfig {
    fn validate(&self, section: &str) -> Result<(), String> {
        if self.user.is_empty() {
            return Err(format!("[{section}] user must not be blank"));
        }
        if secret_is_blank(&self.password) {
            return Err(format!("[{section}] password must not be blank"));
        }
        match self.engine {
            DatabaseEngine::Mysql => {
                if self.host.as_deref().unwrap_or("").is_empty()
                    || self.port.is_none()
                    || self.db.as_deref().unwrap_or("").is_empty()
                {
                    return Err(format!("[{section}] MySQL needs host, port and db"));
                }
            }
            DatabaseEngine::SqlServer => {
                let has_dsn = self.dsn.as_deref().is_some_and(|d| !d.is_empty());
                let has_direct = self.host.as_deref().is_some_and(|h| !h.is_empty())
                    && self.db.as_deref().is_some_and(|d| !d.is_empty());
                if !has_dsn && !has_direct {
                    return Err(format!("[{section}] SQL Server needs a dsn, or host and db"));
                }
            }
        }
        Ok(())
    }
}

/// Where the persisted data dictionary lives, if one exists
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DictionaryConfig {
    /// Path to the tab-separated rule file. Absent means the dictionary will
    /// be derived from live schema introspection instead.
    #[serde(default)]
    pub file: Option<PathBuf>,
}

/// The three pseudonymization passphrases
///
/// Independent secrets so that compromise of one digest family (say the
/// change-detection hashes, which are the least protected) reveals nothing
/// about the patient-identifier mappings.
#[derive(Debug, Clone, Deserialize)]
pub struct SecretsConfig {
    /// Keys the per-table patient-identifier digest
    pub per_table_patient_id: SecretString,
    /// Keys the master patient-identifier digest (e.g. NHS number)
    pub master_patient_id: SecretString,
    /// Keys the change-detection digest used for incremental updates
    pub change_detection: SecretString,
}

impl SecretsConfig {
    fn validate(&self) -> Result<(), String> {
        if secret_is_blank(&self.per_table_patient_id) {
            return Err("secrets.per_table_patient_id must not be blank".to_string());
        }
        if secret_is_blank(&self.master_patient_id) {
            return Err("secrets.master_patient_id must not be blank".to_string());
        }
        if secret_is_blank(&self.change_detection) {
            return Err("secrets.change_detection must not be blank".to_string());
        }
        Ok(())
    }
}

/// Free-text scrubbing policy, consumed by the scrubber
#[derive(Debug, Clone, Deserialize)]
pub struct ScrubConfig {
    /// Replacement token for patient-identifying fragments
    pub replace_patient_info_with: String,
    /// Replacement token for third-party (carer/family) fragments
    pub replace_third_party_info_with: String,
    /// Maximum errors (insertions, deletions, substitutions) tolerated in
    /// fuzzy regex matching. 1-2 is sensible; high values over-scrub.
    #[serde(default = "default_string_max_regex_errors")]
    pub string_max_regex_errors: u32,
    /// Scrub dates only at word boundaries?
    #[serde(default)]
    pub anonymise_dates_at_word_boundaries_only: bool,
    /// Scrub numbers only at word boundaries?
    #[serde(default = "default_true")]
    pub anonymise_numbers_at_word_boundaries_only: bool,
    /// Scrub strings only at word boundaries?
    #[serde(default)]
    pub anonymise_strings_at_word_boundaries_only: bool,
    /// Suffixes appended to every scrub-from string, e.g. "s" so that
    /// scrubbing "Robert" also scrubs "Roberts"
    #[serde(default)]
    pub scrub_string_suffixes: Vec<String>,
}

impl ScrubConfig {
    fn validate(&self) -> Result<(), String> {
        if self.replace_patient_info_with.is_empty() {
            return Err("scrub.replace_patient_info_with must not be blank".to_string());
        }
        if self.replace_third_party_info_with.is_empty() {
            return Err("scrub.replace_third_party_info_with must not be blank".to_string());
        }
        if self.replace_patient_info_with == self.replace_third_party_info_with {
            return Err(
                "scrub.replace_patient_info_with and replace_third_party_info_with \
                 must differ, or the output cannot distinguish patient from third-party \
                 redactions"
                    .to_string(),
            );
        }
        Ok(())
    }
}

/// Reserved destination field names and output formatting
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Name of the (secret) patient ID column in the mapping table
    pub mapping_patient_id_field: String,
    /// Name of the research-ID column that replaces each table's patient ID
    pub research_id_field: String,
    /// Name of the (secret) master ID column in the mapping table
    pub mapping_master_id_field: String,
    /// Name of the hashed master-ID column in the destination
    pub master_research_id_field: String,
    /// Name of the change-detection hash column added to hashed tables
    pub source_hash_field: String,
    /// strftime format for DATE-to-text conversion
    #[serde(default = "default_date_format")]
    pub date_to_text_format: String,
    /// strftime format for DATETIME-to-text conversion
    #[serde(default = "default_datetime_format")]
    pub datetime_to_text_format: String,
    /// Append `[from db.table.field]` to serialized rule comments?
    #[serde(default = "default_true")]
    pub append_source_info_to_comment: bool,
}

impl OutputConfig {
    /// The five reserved destination field names, in a fixed order.
    pub fn reserved_fields(&self) -> [(&'static str, &str); 5] {
        [
            ("mapping_patient_id_field", &self.mapping_patient_id_field),
            ("research_id_field", &self.research_id_field),
            ("mapping_master_id_field", &self.mapping_master_id_field),
            ("master_research_id_field", &self.master_research_id_field),
            ("source_hash_field", &self.source_hash_field),
        ]
    }

    fn validate(&self) -> Result<(), String> {
        let mut seen = BTreeSet::new();
        for (name, value) in self.reserved_fields() {
            if value.is_empty() {
                return Err(format!("output.{name} must not be blank"));
            }
            if !is_valid_field_name(value) {
                return Err(format!("output.{name} is not a valid field name: {value}"));
            }
            if !seen.insert(value.to_string()) {
                return Err(format!(
                    "output field names must all differ; {value} is used twice"
                ));
            }
        }
        validate_date_format("output.date_to_text_format", &self.date_to_text_format)?;
        validate_date_format(
            "output.datetime_to_text_format",
            &self.datetime_to_text_format,
        )?;
        Ok(())
    }
}

/// Checks a strftime format string by formatting a known instant.
fn validate_date_format(name: &str, fmt: &str) -> Result<(), String> {
    use chrono::format::{Item, StrftimeItems};
    use std::fmt::Write as _;

    if StrftimeItems::new(fmt).any(|item| matches!(item, Item::Error)) {
        return Err(format!("{name} is not a valid strftime format: {fmt:?}"));
    }
    // 2000-01-02T03:04:05Z; every standard specifier renders against a UTC
    // instant, so a parseable format cannot fail here
    let known = chrono::DateTime::from_timestamp(946_782_245, 0).expect("valid epoch");
    let mut rendered = String::new();
    if write!(&mut rendered, "{}", known.format(fmt)).is_err() {
        return Err(format!("{name} failed to format a known instant: {fmt:?}"));
    }
    Ok(())
}

/// Per-source-database defaults and exemption lists
///
/// Drives auto-derivation of dictionary rows from a live schema and the
/// per-row validation of loaded rule files. Read-only after load.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceProfile {
    /// The patient-identifier column present in every patient table
    pub per_table_pid_field: String,
    /// The master-identifier column (e.g. NHS number), if this source has one
    #[serde(default)]
    pub master_pid_field: Option<String>,
    /// Tables never to include when deriving a dictionary
    #[serde(default)]
    pub table_blacklist: Vec<String>,
    /// Columns never to include, regardless of table
    #[serde(default)]
    pub field_blacklist: Vec<String>,
    /// Column names assumed to be their table's primary key
    #[serde(default)]
    pub possible_pk_fields: Vec<String>,
    /// Columns that define the patient-identifier universe (unusual; normally
    /// one column of the master demographics table)
    #[serde(default)]
    pub pid_defining_fields: Vec<String>,
    /// Columns holding patient-identifying values to scrub from free text
    #[serde(default)]
    pub scrubsrc_patient_fields: Vec<String>,
    /// Columns holding third-party-identifying values to scrub from free text
    #[serde(default)]
    pub scrubsrc_thirdparty_fields: Vec<String>,
    /// Columns to scrub as dates regardless of their SQL type
    #[serde(default)]
    pub scrubmethod_date_fields: Vec<String>,
    /// Columns to scrub as numbers regardless of their SQL type (e.g. phone
    /// numbers stored as text)
    #[serde(default)]
    pub scrubmethod_number_fields: Vec<String>,
    /// Known-safe columns exempt from scrub-in alteration
    #[serde(default)]
    pub safe_fields_exempt_from_scrubbing: Vec<String>,
    /// Columns whose dates are truncated to the first of the month
    #[serde(default)]
    pub truncate_date_fields: Vec<String>,
    /// Derive rows as included (omit = false) by default? Scrub-source
    /// columns stay omitted regardless; see the dictionary derivation rules.
    #[serde(default)]
    pub default_include: bool,
}

impl SourceProfile {
    fn validate(&self, section: &str, source_hash_field: &str) -> Result<(), String> {
        if self.per_table_pid_field.is_empty() {
            return Err(format!("[{section}] per_table_pid_field must not be blank"));
        }
        if !is_valid_field_name(&self.per_table_pid_field) {
            return Err(format!(
                "[{section}] per_table_pid_field is not a valid field name: {}",
                self.per_table_pid_field
            ));
        }
        if self.per_table_pid_field == source_hash_field {
            return Err(format!(
                "[{section}] per_table_pid_field collides with output.source_hash_field"
            ));
        }
        if let Some(master) = &self.master_pid_field {
            if !is_valid_field_name(master) {
                return Err(format!(
                    "[{section}] master_pid_field is not a valid field name: {master}"
                ));
            }
        }
        Ok(())
    }

    /// Is `field` listed as a scrub source (patient or third party)?
    pub fn is_scrub_source(&self, field: &str) -> bool {
        self.scrubsrc_patient_fields.iter().any(|f| f == field)
            || self.scrubsrc_thirdparty_fields.iter().any(|f| f == field)
    }
}

/// One configured source database: connection plus profile
#[derive(Debug, Clone, Deserialize)]
pub struct SourceDatabaseConfig {
    /// How to reach the database
    pub connection: ConnectionConfig,
    /// Defaults and exemptions for dictionary work
    #[serde(flatten)]
    pub profile: SourceProfile,
}

/// Root configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LetheConfig {
    /// Persisted rule file location
    #[serde(default)]
    pub dictionary: DictionaryConfig,
    /// Destination database (de-identified output); needs WRITE access
    pub destination_database: ConnectionConfig,
    /// Administrative database (secret mapping table, audit trail)
    pub admin_database: ConnectionConfig,
    /// Pseudonymization passphrases
    pub secrets: SecretsConfig,
    /// Free-text scrubbing policy
    pub scrub: ScrubConfig,
    /// Reserved destination fields and output formatting
    pub output: OutputConfig,
    /// Source databases by alias. The alias is what dictionary rows refer to;
    /// it need not match the SQL schema name.
    pub sources: BTreeMap<String, SourceDatabaseConfig>,
}

impl LetheConfig {
    /// Validates every section.
    ///
    /// Order matters and is fixed: output naming, scrub policy and secrets
    /// are checked before connections and profiles, and all of this runs
    /// before any dictionary is constructed.
    pub fn validate(&self) -> Result<(), String> {
        self.output.validate()?;
        self.scrub.validate()?;
        self.secrets.validate()?;
        self.destination_database.validate("destination_database")?;
        self.admin_database.validate("admin_database")?;
        if self.sources.is_empty() {
            return Err("no source databases configured".to_string());
        }
        for (name, source) in &self.sources {
            source.connection.validate(&format!("sources.{name}"))?;
            source
                .profile
                .validate(&format!("sources.{name}"), &self.output.source_hash_field)?;
        }
        Ok(())
    }

    /// The profile for a source database alias, if configured.
    pub fn profile(&self, db: &str) -> Option<&SourceProfile> {
        self.sources.get(db).map(|s| &s.profile)
    }
}

fn default_true() -> bool {
    true
}

fn default_string_max_regex_errors() -> u32 {
    1
}

fn default_date_format() -> String {
    "%Y-%m-%d".to_string()
}

fn default_datetime_format() -> String {
    "%Y-%m-%dT%H:%M:%S".to_string()
}
