//! Secret detection and redaction utilities.
//!
//! Settings carry database, cache and broker credentials. Everything that can
//! reach an error message, a log line or a printed config goes through here.

use serde::{Serialize, Serializer};

/// The redacted placeholder string.
pub const REDACTED: &str = "[REDACTED]";

/// Checks if a key/variable name likely refers to a secret.
///
/// Case-insensitive match on common secret naming conventions, including
/// the short `PASS` suffix used by broker settings.
///
/// # Examples
///
/// ```
/// use timetable_shared::is_secret_key;
///
/// assert!(is_secret_key("POSTGRES_PASSWORD"));
/// assert!(is_secret_key("RABBITMQ_PASS"));
/// assert!(is_secret_key("IAM_TOKEN"));
/// assert!(!is_secret_key("REDIS_HOST"));
/// ```
pub fn is_secret_key(key: &str) -> bool {
    let key = key.to_ascii_uppercase();
    key.contains("KEY")
        || key.contains("TOKEN")
        || key.contains("SECRET")
        || key.contains("PASS")
        || key.contains("CREDENTIAL")
}

/// Redacts a value if the key is likely a secret.
///
/// # Examples
///
/// ```
/// use timetable_shared::redact_if_secret;
///
/// assert_eq!(redact_if_secret("REDIS_PASSWORD", "pw"), "[REDACTED]");
/// assert_eq!(redact_if_secret("REDIS_PORT", "6379"), "6379");
/// ```
pub fn redact_if_secret(key: &str, value: &str) -> String {
    if is_secret_key(key) {
        REDACTED.to_string()
    } else {
        value.to_string()
    }
}

/// A secret string wrapper that redacts on Display/Debug/Serialize.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct SecretString(Box<str>);

impl SecretString {
    /// Wrap a secret value.
    pub fn new(value: impl Into<Box<str>>) -> Self {
        Self(value.into())
    }

    /// Borrow the underlying secret.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Returns true when the secret is the empty string.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Debug for SecretString {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(REDACTED)
    }
}

impl std::fmt::Display for SecretString {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(REDACTED)
    }
}

impl Serialize for SecretString {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(REDACTED)
    }
}

impl From<String> for SecretString {
    fn from(value: String) -> Self {
        Self(value.into_boxed_str())
    }
}

impl From<&str> for SecretString {
    fn from(value: &str) -> Self {
        Self(value.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_settings_secret_names() {
        assert!(is_secret_key("POSTGRES_PASSWORD"));
        assert!(is_secret_key("MEPHI_PASSWORD"));
        assert!(is_secret_key("REDIS_PASSWORD"));
        assert!(is_secret_key("rabbitmq_pass"));
        assert!(is_secret_key("IAM_TOKEN"));
        assert!(is_secret_key("CLIENT_SECRET"));
        assert!(is_secret_key("API_KEY"));
    }

    #[test]
    fn rejects_non_secret_names() {
        assert!(!is_secret_key("POSTGRES_USER"));
        assert!(!is_secret_key("REDIS_PORT"));
        assert!(!is_secret_key("MEPHI_AUTH_URL"));
        assert!(!is_secret_key("MEPHI_AUTH_SERVICE_URL"));
        assert!(!is_secret_key("FOLDER_ID"));
    }

    #[test]
    fn secret_string_never_prints_its_value() -> Result<(), serde_json::Error> {
        let secret = SecretString::new("shh");
        assert_eq!(secret.to_string(), REDACTED);
        assert_eq!(format!("{secret:?}"), REDACTED);
        assert_eq!(serde_json::to_string(&secret)?, format!("\"{REDACTED}\""));
        assert_eq!(secret.expose(), "shh");
        Ok(())
    }
}
