//! Configuration management for Lethe.
//!
//! TOML-based configuration with `${ENV_VAR}` substitution, per-section
//! validation on load, and secrecy-protected passphrases.
//!
//! # Example configuration
//!
//! ```toml
//! [dictionary]
//! file = "data_dictionary.tsv"
//!
//! [destination_database]
//! engine = "mysql"
//! host = "localhost"
//! port = 3306
//! db = "research_output"
//! user = "writer"
//! password = "${LETHE_DEST_PASSWORD}"
//!
//! [admin_database]
//! engine = "mysql"
//! host = "localhost"
//! port = 3306
//! db = "research_admin"
//! user = "admin"
//! password = "${LETHE_ADMIN_PASSWORD}"
//!
//! [secrets]
//! per_table_patient_id = "${LETHE_PID_SECRET}"
//! master_patient_id = "${LETHE_MASTER_SECRET}"
//! change_detection = "${LETHE_CHANGE_SECRET}"
//!
//! [scrub]
//! replace_patient_info_with = "XXX"
//! replace_third_party_info_with = "YYY"
//! string_max_regex_errors = 1
//!
//! [output]
//! mapping_patient_id_field = "patient_id"
//! research_id_field = "rid"
//! mapping_master_id_field = "nhsnum"
//! master_research_id_field = "nhshash"
//! source_hash_field = "_src_hash"
//!
//! [sources.ehr]
//! per_table_pid_field = "patient_id"
//! master_pid_field = "nhsnum"
//! scrubsrc_patient_fields = ["forename", "surname", "dob"]
//! scrubmethod_date_fields = ["dob"]
//! truncate_date_fields = ["dob"]
//!
//! [sources.ehr.connection]
//! engine = "mysql"
//! host = "ehr-host"
//! port = 3306
//! db = "ehr_live"
//! user = "reader"
//! password = "${LETHE_EHR_PASSWORD}"
//! ```

pub mod loader;
pub mod schema;
pub mod secret;

pub use loader::{load_config, parse_config};
pub use schema::{
    ConnectionConfig, DatabaseEngine, DictionaryConfig, LetheConfig, OutputConfig, ScrubConfig,
    SecretsConfig, SourceDatabaseConfig, SourceProfile,
};
pub use secret::{secret_string, SecretString, SecretValue};
