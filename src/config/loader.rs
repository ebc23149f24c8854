//! Configuration loader with TOML parsing and environment variable
//! substitution
//!
//! Loading is a strict three-step pass: read the file, substitute
//! `${VAR}` placeholders (so passphrases and passwords can stay out of the
//! file on disk), parse and validate. Any failure aborts the load; there is
//! no partially-loaded configuration.

use super::schema::LetheConfig;
use crate::domain::{LetheError, Result};
use regex::Regex;
use std::fs;
use std::path::Path;
use std::sync::LazyLock;

static ENV_VAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").expect("hardcoded regex"));

/// Loads configuration from a TOML file.
///
/// # Errors
///
/// Returns [`LetheError::Configuration`] if the file cannot be read, a
/// referenced environment variable is unset, the TOML does not parse, or
/// validation fails.
pub fn load_config(path: impl AsRef<Path>) -> Result<LetheConfig> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(LetheError::Configuration(format!(
            "Configuration file not found: {}",
            path.display()
        )));
    }

    let contents = fs::read_to_string(path).map_err(|e| {
        LetheError::Configuration(format!(
            "Failed to read configuration file {}: {}",
            path.display(),
            e
        ))
    })?;

    parse_config(&contents)
}

/// Parses and validates configuration from a TOML string.
pub fn parse_config(contents: &str) -> Result<LetheConfig> {
    let contents = substitute_env_vars(contents)?;

    let config: LetheConfig = toml::from_str(&contents)
        .map_err(|e| LetheError::Configuration(format!("Failed to parse TOML: {e}")))?;

    config
        .validate()
        .map_err(LetheError::Configuration)?;

    Ok(config)
}

/// Substitutes environment variables in the format `${VAR_NAME}`.
///
/// Comment lines are left untouched. All missing variables are reported at
/// once rather than one per run.
fn substitute_env_vars(input: &str) -> Result<String> {
    let mut result = String::new();
    let mut missing_vars = Vec::new();

    for line in input.lines() {
        let trimmed = line.trim_start();
        if trimmed.starts_with('#') {
            result.push_str(line);
            result.push('\n');
            continue;
        }

        let mut processed_line = line.to_string();
        for cap in ENV_VAR_RE.captures_iter(line) {
            let var_name = &cap[1];
            match std::env::var(var_name) {
                Ok(value) => {
                    let placeholder = format!("${{{var_name}}}");
                    processed_line = processed_line.replace(&placeholder, &value);
                }
                Err(_) => {
                    if !missing_vars.contains(&var_name.to_string()) {
                        missing_vars.push(var_name.to_string());
                    }
                }
            }
        }
        result.push_str(&processed_line);
        result.push('\n');
    }

    if !missing_vars.is_empty() {
        return Err(LetheError::Configuration(format!(
            "Missing required environment variables: {}",
            missing_vars.join(", ")
        )));
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_substitute_env_vars() {
        std::env::set_var("LETHE_TEST_VAR", "test_value");
        let input = "password = \"${LETHE_TEST_VAR}\"";
        let result = substitute_env_vars(input).unwrap();
        assert_eq!(result, "password = \"test_value\"\n");
        std::env::remove_var("LETHE_TEST_VAR");
    }

    #[test]
    fn test_substitute_env_vars_missing() {
        std::env::remove_var("LETHE_MISSING_VAR");
        let input = "password = \"${LETHE_MISSING_VAR}\"";
        let result = substitute_env_vars(input);
        assert!(result.is_err());
    }

    #[test]
    fn test_substitute_skips_comments() {
        let input = "# uses ${LETHE_COMMENT_ONLY_VAR}\nkey = \"v\"";
        let result = substitute_env_vars(input).unwrap();
        assert!(result.contains("${LETHE_COMMENT_ONLY_VAR}"));
    }

    #[test]
    fn test_load_config_missing_file() {
        let result = load_config("nonexistent.toml");
        assert!(matches!(result, Err(LetheError::Configuration(_))));
    }

    #[test]
    fn test_load_config_valid() {
        let toml_content = r#"
[destination_database]
engine = "mysql"
host = "localhost"
port = 3306
db = "anon_output"
user = "writer"
password = "wpw"

[admin_database]
engine = "mysql"
host = "localhost"
port = 3306
db = "anon_admin"
user = "admin"
password = "apw"

[secrets]
per_table_patient_id = "s1"
master_patient_id = "s2"
change_detection = "s3"

[scrub]
replace_patient_info_with = "XXX"
replace_third_party_info_with = "YYY"

[output]
mapping_patient_id_field = "patient_id"
research_id_field = "rid"
mapping_master_id_field = "nhsnum"
master_research_id_field = "nhshash"
source_hash_field = "_src_hash"

[sources.ehr]
per_table_pid_field = "patient_id"

[sources.ehr.connection]
engine = "mysql"
host = "dbhost"
port = 3306
db = "ehr_live"
user = "reader"
password = "rpw"
"#;
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(toml_content.as_bytes()).unwrap();
        temp_file.flush().unwrap();

        let config = load_config(temp_file.path()).unwrap();
        assert_eq!(config.output.research_id_field, "rid");
    }

    #[test]
    fn test_parse_config_rejects_invalid() {
        // research_id_field duplicated with master_research_id_field
        let toml_content = r#"
[destination_database]
engine = "mysql"
host = "localhost"
port = 3306
db = "d"
user = "u"
password = "p"

[admin_database]
engine = "mysql"
host = "localhost"
port = 3306
db = "a"
user = "u"
password = "p"

[secrets]
per_table_patient_id = "s1"
master_patient_id = "s2"
change_detection = "s3"

[scrub]
replace_patient_info_with = "XXX"
replace_third_party_info_with = "YYY"

[output]
mapping_patient_id_field = "patient_id"
research_id_field = "rid"
mapping_master_id_field = "nhsnum"
master_research_id_field = "rid"
source_hash_field = "_src_hash"

[sources.ehr]
per_table_pid_field = "patient_id"

[sources.ehr.connection]
engine = "mysql"
host = "h"
port = 3306
db = "d"
user = "u"
password = "p"
"#;
        let result = parse_config(toml_content);
        assert!(matches!(result, Err(LetheError::Configuration(_))));
    }
}
