//! Pseudonymization service.
//!
//! Three independent, salted, deterministic one-way digests, keyed by the
//! three configured passphrases:
//!
//! - **primary** - replaces the per-table patient identifier with a research
//!   token, linking a patient's records across tables
//! - **master** - replaces the master identifier (e.g. NHS number)
//! - **change** - digests a whole source row so the execution engine can
//!   detect changed rows during incremental updates
//!
//! The digest output width is fixed and drives the declared SQL type of
//! every pseudonymized destination column ([`SQLTYPE_PSEUDONYM`]); the
//! engine re-checks that agreement at startup with a probe digest.

use crate::config::{SecretString, SecretsConfig};
use crate::domain::{LetheError, Result};
use secrecy::ExposeSecret;
use serde_json::Value;
use sha2::{Digest, Sha256};

/// Hex length of every digest this service emits.
pub const DIGEST_HEX_LEN: usize = 64;

/// Reserved destination SQL type for pseudonymized identifier columns.
/// Width equals [`DIGEST_HEX_LEN`].
pub const SQLTYPE_PSEUDONYM: &str = "VARCHAR(64)";

/// One salted one-way digest function.
///
/// Digest = lowercase hex SHA-256 over `secret || 0x00 || value`; the NUL
/// separator pins the salt/value boundary so `("ab","c")` and `("a","bc")`
/// cannot collide.
#[derive(Clone)]
pub struct KeyedHasher {
    secret: SecretString,
}

impl KeyedHasher {
    /// Creates a hasher keyed by `secret`.
    pub fn new(secret: SecretString) -> Self {
        Self { secret }
    }

    /// Digests `value`. Deterministic for a fixed secret.
    pub fn hash(&self, value: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.secret.expose_secret().as_ref().as_bytes());
        hasher.update([0u8]);
        hasher.update(value.as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

impl std::fmt::Debug for KeyedHasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // never expose the secret
        f.debug_struct("KeyedHasher").finish_non_exhaustive()
    }
}

/// The pseudonymization façade handed to the execution engine.
///
/// Stateless after construction; freely shareable across reader threads.
#[derive(Debug, Clone)]
pub struct Pseudonymizer {
    primary: KeyedHasher,
    master: KeyedHasher,
    change: KeyedHasher,
}

impl Pseudonymizer {
    /// Builds the three hashers from the configured secrets.
    pub fn new(secrets: &SecretsConfig) -> Self {
        Self {
            primary: KeyedHasher::new(secrets.per_table_patient_id.clone()),
            master: KeyedHasher::new(secrets.master_patient_id.clone()),
            change: KeyedHasher::new(secrets.change_detection.clone()),
        }
    }

    /// Research token for a per-table patient identifier.
    pub fn pseudonymize_primary(&self, pid: &str) -> String {
        self.primary.hash(pid)
    }

    /// Research token for a master identifier. `None` propagates untouched:
    /// emitting a digest of nothing would look like a real token.
    pub fn pseudonymize_master(&self, pid: Option<&str>) -> Option<String> {
        pid.map(|p| self.master.hash(p))
    }

    /// Change-detection digest over a source row's ordered field values.
    ///
    /// The values are serialized as a canonical JSON array (object keys
    /// sorted recursively) before hashing, so semantically identical rows
    /// digest identically.
    pub fn change_digest(&self, values: &[Value]) -> Result<String> {
        let canonical: Vec<Value> = values.iter().map(normalize_json).collect();
        let encoded = serde_json::to_string(&canonical)
            .map_err(|e| LetheError::Io(format!("change digest serialization: {e}")))?;
        Ok(self.change.hash(&encoded))
    }
}

/// Recursively sorts object keys so key order never affects a digest.
fn normalize_json(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let sorted: std::collections::BTreeMap<String, Value> = map
                .iter()
                .map(|(k, v)| (k.clone(), normalize_json(v)))
                .collect();
            Value::Object(sorted.into_iter().collect())
        }
        Value::Array(arr) => Value::Array(arr.iter().map(normalize_json).collect()),
        _ => value.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::secret_string;
    use serde_json::json;

    fn secrets() -> SecretsConfig {
        SecretsConfig {
            per_table_patient_id: secret_string("alpha"),
            master_patient_id: secret_string("beta"),
            change_detection: secret_string("gamma"),
        }
    }

    #[test]
    fn test_primary_is_deterministic() {
        let p = Pseudonymizer::new(&secrets());
        assert_eq!(p.pseudonymize_primary("12345"), p.pseudonymize_primary("12345"));
    }

    #[test]
    fn test_primary_output_width() {
        let p = Pseudonymizer::new(&secrets());
        let token = p.pseudonymize_primary("9999999999");
        assert_eq!(token.len(), DIGEST_HEX_LEN);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_distinct_secrets_give_distinct_tokens() {
        let p = Pseudonymizer::new(&secrets());
        let mut other = secrets();
        other.per_table_patient_id = secret_string("different");
        let q = Pseudonymizer::new(&other);
        assert_ne!(p.pseudonymize_primary("12345"), q.pseudonymize_primary("12345"));
    }

    #[test]
    fn test_primary_and_master_are_independent() {
        // same input, different secret family, different token
        let p = Pseudonymizer::new(&secrets());
        assert_ne!(
            p.pseudonymize_primary("12345"),
            p.pseudonymize_master(Some("12345")).unwrap()
        );
    }

    #[test]
    fn test_master_none_propagates() {
        let p = Pseudonymizer::new(&secrets());
        assert_eq!(p.pseudonymize_master(None), None);
    }

    #[test]
    fn test_salt_value_boundary_is_unambiguous() {
        let h1 = KeyedHasher::new(secret_string("ab"));
        let h2 = KeyedHasher::new(secret_string("a"));
        assert_ne!(h1.hash("c"), h2.hash("bc"));
    }

    #[test]
    fn test_change_digest_detects_change() {
        let p = Pseudonymizer::new(&secrets());
        let before = [json!(1), json!("Smith"), json!(null)];
        let after = [json!(1), json!("Smyth"), json!(null)];
        assert_ne!(
            p.change_digest(&before).unwrap(),
            p.change_digest(&after).unwrap()
        );
        assert_eq!(
            p.change_digest(&before).unwrap(),
            p.change_digest(&before).unwrap()
        );
    }

    #[test]
    fn test_change_digest_ignores_object_key_order() {
        let p = Pseudonymizer::new(&secrets());
        let a = [json!({"x": 1, "y": 2})];
        let b = [json!({"y": 2, "x": 1})];
        assert_eq!(p.change_digest(&a).unwrap(), p.change_digest(&b).unwrap());
    }

    #[test]
    fn test_sql_type_matches_digest_width() {
        assert_eq!(SQLTYPE_PSEUDONYM, format!("VARCHAR({DIGEST_HEX_LEN})"));
    }

    #[test]
    fn test_hasher_debug_hides_secret() {
        let h = KeyedHasher::new(secret_string("super-secret"));
        assert!(!format!("{h:?}").contains("super-secret"));
    }
}
