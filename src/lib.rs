pub mod assets;
pub mod core;
pub mod orchestration;
pub mod release;
pub mod security;
pub mod transport;

#[cfg(test)]
mod testing;

pub use crate::core::*;
pub use orchestration::{
    PublishHandle, PublishReport, PublishStatus, ReleasePublisher, spawn_publish,
};
pub use security::{CredentialRedactor, REDACTION_MASK};
pub use transport::{HttpTransport, RequestContext};
