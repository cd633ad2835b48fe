//! Release resolution and mutation

pub mod mutator;
pub mod resolver;

pub use mutator::{DraftTransition, ReleaseMutator};
pub use resolver::{ReleaseResolver, Resolution};

use crate::core::config::PublishConfig;
use crate::core::traits::ReleaseRequest;

/// Body shared by the create and edit calls
pub fn release_request(config: &PublishConfig) -> ReleaseRequest {
    ReleaseRequest {
        tag_name: config.tag_name().to_string(),
        target_commitish: config.target_commitish.clone(),
        name: config.name.clone(),
        body: config.notes.clone(),
        draft: config.draft,
        prerelease: config.prerelease,
    }
}
