//! Credential redaction for error text and log output
//!
//! The token is held as a `secrecy::SecretString` so it never shows up in
//! `Debug` output, and every occurrence of it in outgoing text is replaced
//! with a fixed mask.

use secrecy::{ExposeSecret, SecretString};
use std::fmt;

/// Fixed mask substituted for the credential token
pub const REDACTION_MASK: &str = "********";

/// Scrubs one credential token out of arbitrary text
///
/// # Examples
///
/// ```
/// use publish_release::security::CredentialRedactor;
/// use secrecy::SecretString;
///
/// let token = SecretString::new("ghp_abcdef123456".into());
/// let redactor = CredentialRedactor::new(&token);
/// assert_eq!(redactor.redact("auth ghp_abcdef123456 failed"), "auth ******** failed");
/// ```
#[derive(Default)]
pub struct CredentialRedactor {
    token: Option<SecretString>,
}

impl CredentialRedactor {
    /// Creates a redactor for the given token
    ///
    /// An empty token yields a redactor that leaves text untouched.
    pub fn new(token: &SecretString) -> Self {
        let raw = token.expose_secret();
        if raw.is_empty() {
            return Self::default();
        }

        Self {
            token: Some(SecretString::new(raw.into())),
        }
    }

    /// Creates a redactor for a token that may not be configured
    pub fn from_optional(token: Option<&SecretString>) -> Self {
        token.map(Self::new).unwrap_or_default()
    }

    /// Replaces every occurrence of the token with [`REDACTION_MASK`]
    pub fn redact(&self, text: &str) -> String {
        match &self.token {
            Some(token) => text.replace(token.expose_secret(), REDACTION_MASK),
            None => text.to_string(),
        }
    }

    /// Masks a token for display
    ///
    /// Shows only the first 3 and last 3 characters for identification purposes.
    /// Tokens shorter than 10 characters are fully masked as "****".
    ///
    /// # Examples
    ///
    /// ```
    /// use publish_release::security::CredentialRedactor;
    ///
    /// assert_eq!(CredentialRedactor::mask_token("abcdef123456"), "abc...456");
    /// assert_eq!(CredentialRedactor::mask_token("short"), "****");
    /// ```
    pub fn mask_token(token: &str) -> String {
        if token.len() < 10 || !token.is_ascii() {
            return "****".to_string();
        }

        let prefix = &token[..3];
        let suffix = &token[token.len() - 3..];
        format!("{}...{}", prefix, suffix)
    }
}

impl fmt::Debug for CredentialRedactor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialRedactor")
            .field("active", &self.token.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secret(value: &str) -> SecretString {
        SecretString::new(value.into())
    }

    #[test]
    fn test_redact_replaces_every_occurrence() {
        let redactor = CredentialRedactor::new(&secret("ghp_0123456789"));
        let output = redactor.redact("a=ghp_0123456789&b=ghp_0123456789");
        assert_eq!(output, "a=********&b=********");
    }

    #[test]
    fn test_redact_no_token_in_text() {
        let redactor = CredentialRedactor::new(&secret("ghp_0123456789"));
        let input = "This is a safe string with no tokens";
        assert_eq!(redactor.redact(input), input);
    }

    #[test]
    fn test_redact_very_long_token() {
        let token = "a".repeat(500_000);
        let redactor = CredentialRedactor::new(&secret(&token));
        let output = redactor.redact(&format!("Bad credentials: {}", token));
        assert_eq!(output, "Bad credentials: ********");
    }

    #[test]
    fn test_redact_treats_token_literally() {
        let redactor = CredentialRedactor::new(&secret("test.token+with*special$chars"));
        assert_eq!(
            redactor.redact("x test.token+with*special$chars y"),
            "x ******** y"
        );
        assert_eq!(
            redactor.redact("testXtoken+with*special$chars"),
            "testXtoken+with*special$chars"
        );
    }

    #[test]
    fn test_empty_token_disables_redaction() {
        let redactor = CredentialRedactor::new(&secret(""));
        assert_eq!(redactor.redact("anything"), "anything");

        let redactor = CredentialRedactor::from_optional(None);
        assert_eq!(redactor.redact("anything"), "anything");
    }

    #[test]
    fn test_debug_does_not_leak_token() {
        let redactor = CredentialRedactor::new(&secret("ghp_0123456789"));
        let debug = format!("{:?}", redactor);
        assert!(!debug.contains("ghp_0123456789"));
        assert!(debug.contains("active: true"));
    }

    #[test]
    fn test_mask_token_with_short_token() {
        assert_eq!(CredentialRedactor::mask_token("short"), "****");
        assert_eq!(CredentialRedactor::mask_token(""), "****");
    }

    #[test]
    fn test_mask_token_with_long_token() {
        assert_eq!(CredentialRedactor::mask_token("abcdef123456"), "abc...456");
        assert_eq!(
            CredentialRedactor::mask_token("very-long-token-string"),
            "ver...ing"
        );
    }
}
