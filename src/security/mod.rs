pub mod redactor;

pub use redactor::{CredentialRedactor, REDACTION_MASK};
