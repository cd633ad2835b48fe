//! Release Mutator - edits reused releases and removes emptied tags

use crate::core::config::PublishConfig;
use crate::core::error::PublishError;
use crate::core::events::{EventSink, PublishEvent};
use crate::core::traits::{HttpMethod, Release, RequestBody, Transport};
use crate::release::release_request;
use crate::transport::context::{RequestContext, dispatch};

const EDIT_OPERATION: &str = "edit-release";
const DELETE_TAG_OPERATION: &str = "delete-tag";

/// Draft state of a release before and after an edit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DraftTransition {
    pub was_draft: bool,
    pub is_draft: bool,
}

impl DraftTransition {
    /// A published (or prerelease) release became a draft
    pub fn published_to_draft(&self) -> bool {
        !self.was_draft && self.is_draft
    }
}

/// Applies post-resolution changes to a release
pub struct ReleaseMutator<'a> {
    transport: &'a dyn Transport,
    context: &'a RequestContext,
    events: &'a dyn EventSink,
}

impl<'a> ReleaseMutator<'a> {
    pub fn new(
        transport: &'a dyn Transport,
        context: &'a RequestContext,
        events: &'a dyn EventSink,
    ) -> Self {
        Self {
            transport,
            context,
            events,
        }
    }

    /// Patch a reused release with the configured metadata
    ///
    /// Returns `None` without any request unless the release was reused and
    /// `edit_release` is set. On success the release's draft, prerelease,
    /// name and body follow the service response; id and tag never change.
    pub async fn edit(
        &self,
        release: &mut Release,
        config: &PublishConfig,
    ) -> Result<Option<DraftTransition>, PublishError> {
        if !(release.reused && config.edit_release) {
            return Ok(None);
        }

        self.events.emit(PublishEvent::EditRelease);

        let body = serde_json::to_value(release_request(config))
            .map_err(|e| PublishError::invalid_response(EDIT_OPERATION, e))?;
        let request = self
            .context
            .request(HttpMethod::Patch, release.url.clone(), RequestBody::Json(body));

        let updated: Release = dispatch(self.transport, request, EDIT_OPERATION)
            .await?
            .success_json(EDIT_OPERATION)?;

        let transition = DraftTransition {
            was_draft: release.draft,
            is_draft: updated.draft,
        };

        release.draft = updated.draft;
        release.prerelease = updated.prerelease;
        release.name = updated.name;
        release.body = updated.body;

        log::info!(
            "Edited release {} (draft: {} -> {})",
            release.tag_name,
            transition.was_draft,
            transition.is_draft
        );
        self.events.emit(PublishEvent::EditedRelease {
            release: Box::new(release.clone()),
        });

        Ok(Some(transition))
    }

    /// Delete the tag of a release an edit turned into a draft
    ///
    /// Returns the deleted tag, or `None` when the edit did not run, the
    /// release did not go from published to draft, or `delete_empty_tag`
    /// is unset.
    pub async fn delete_empty_tag(
        &self,
        release: &Release,
        transition: Option<DraftTransition>,
        config: &PublishConfig,
    ) -> Result<Option<String>, PublishError> {
        let Some(transition) = transition else {
            return Ok(None);
        };
        if !(transition.published_to_draft() && config.delete_empty_tag) {
            return Ok(None);
        }

        let tag = release.tag_name.clone();
        let request = self.context.request(
            HttpMethod::Delete,
            self.context.tag_ref_url(&tag),
            RequestBody::Empty,
        );

        let response = dispatch(self.transport, request, DELETE_TAG_OPERATION).await?;
        if !response.is_success() {
            return Err(response.into_status_error(DELETE_TAG_OPERATION));
        }

        log::info!("Deleted tag {}", tag);
        self.events
            .emit(PublishEvent::DeletedTagRelease { tag: tag.clone() });

        Ok(Some(tag))
    }
}
