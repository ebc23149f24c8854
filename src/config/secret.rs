//! Secure passphrase handling using the secrecy crate
//!
//! The three pseudonymization passphrases (and database passwords) are held
//! as [`SecretString`]: memory is zeroed on drop and the `Debug`
//! representation is redacted, so a secret can never reach a log line or a
//! crash report by accident. Access requires an explicit `expose_secret()`.

use secrecy::{CloneableSecret, DebugSecret, ExposeSecret, Secret};
use serde::{Deserialize, Deserializer};
use zeroize::Zeroize;

/// Newtype wrapper for String that implements the traits `Secret` needs
#[derive(Clone, Debug, Zeroize)]
#[zeroize(drop)]
pub struct SecretValue(String);

impl CloneableSecret for SecretValue {}
impl DebugSecret for SecretValue {}

impl From<String> for SecretValue {
    fn from(s: String) -> Self {
        SecretValue(s)
    }
}

impl AsRef<str> for SecretValue {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl SecretValue {
    /// Check if the secret value is empty
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<'de> Deserialize<'de> for SecretValue {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        String::deserialize(deserializer).map(SecretValue)
    }
}

/// Type alias for a secret string
///
/// Zeroed on drop, redacted in Debug output, exposed only via
/// `expose_secret()`.
pub type SecretString = Secret<SecretValue>;

/// Helper to create a SecretString from a String
#[inline]
pub fn secret_string(value: impl Into<String>) -> SecretString {
    Secret::new(SecretValue::from(value.into()))
}

/// Is the wrapped secret blank? Blank secrets are configuration errors: a
/// passphrase that is empty produces guessable digests.
pub fn secret_is_blank(secret: &SecretString) -> bool {
    secret.expose_secret().is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_string_creation() {
        let secret = secret_string("passphrase");
        assert_eq!(secret.expose_secret().as_ref(), "passphrase");
    }

    #[test]
    fn test_secret_debug_redacted() {
        let secret = secret_string("sensitive-passphrase");
        let debug_output = format!("{secret:?}");
        assert!(!debug_output.contains("sensitive-passphrase"));
    }

    #[test]
    fn test_secret_is_blank() {
        assert!(secret_is_blank(&secret_string("")));
        assert!(!secret_is_blank(&secret_string("x")));
    }

    #[test]
    fn test_secret_deserialize() {
        #[derive(Deserialize)]
        struct Holder {
            secret: SecretString,
        }
        let holder: Holder = toml::from_str(r#"secret = "hunter2""#).unwrap();
        assert_eq!(holder.secret.expose_secret().as_ref(), "hunter2");
    }
}
