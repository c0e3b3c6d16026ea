//! Wrapper for plaintext invitation tokens.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A plaintext secret that never shows up in logs.
///
/// `Debug` and `Display` print `[REDACTED]`. The value is only reachable
/// through [`SecretString::expose_secret`], or by serializing it into the
/// response that delivers the token to the invitee.
///
/// ```rust
/// use teamgate::SecretString;
///
/// let token = SecretString::new("tok_123");
/// assert_eq!(format!("{token:?}"), "SecretString([REDACTED])");
/// assert_eq!(token.expose_secret(), "tok_123");
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct SecretString(String);

impl SecretString {
    #[must_use]
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    #[must_use]
    pub fn expose_secret(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretString([REDACTED])")
    }
}

impl fmt::Display for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl From<String> for SecretString {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for SecretString {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl Serialize for SecretString {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for SecretString {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        String::deserialize(deserializer).map(Self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_is_redacted() {
        let token = SecretString::new("invite-token");
        assert_eq!(format!("{token:?}"), "SecretString([REDACTED])");
        assert_eq!(format!("{token}"), "[REDACTED]");
        assert_eq!(token.expose_secret(), "invite-token");
    }

    #[test]
    fn test_secret_serializes_plaintext_for_delivery() {
        let token = SecretString::from("invite-token");
        let json = serde_json::to_string(&token).unwrap();
        assert_eq!(json, "\"invite-token\"");

        let restored: SecretString = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, token);
    }
}
