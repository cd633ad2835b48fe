//! Release Resolver - picks an existing release or creates a new one

use crate::core::config::PublishConfig;
use crate::core::error::PublishError;
use crate::core::events::{EventSink, PublishEvent};
use crate::core::traits::{HttpMethod, Release, RequestBody, Transport};
use crate::release::release_request;
use crate::transport::context::{RequestContext, dispatch};

const LIST_OPERATION: &str = "list-releases";
const CREATE_OPERATION: &str = "create-release";

/// Outcome of release resolution
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// A new release was created
    Created(Release),
    /// An existing release with the tag is reused
    Reused(Release),
    /// A release with the tag exists, may not be reused, and publishing
    /// should stop without error
    AlreadyPublished(Release),
}

impl Resolution {
    pub fn into_release(self) -> Release {
        match self {
            Self::Created(release) | Self::Reused(release) | Self::AlreadyPublished(release) => {
                release
            }
        }
    }
}

/// Applies the reuse policy and creates releases
pub struct ReleaseResolver<'a> {
    transport: &'a dyn Transport,
    context: &'a RequestContext,
    events: &'a dyn EventSink,
}

impl<'a> ReleaseResolver<'a> {
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

    /// Produce the release this publish operation works on
    ///
    /// With `reuse_release` unset this is exactly one creation call. With it
    /// set, the first listed release whose tag matches is reused when the
    /// draft-only policy allows it; otherwise a new release is created,
    /// unless `skip_if_published` asks to stop.
    pub async fn resolve(&self, config: &PublishConfig) -> Result<Resolution, PublishError> {
        let tag = config.tag_name();

        if config.reuse_release {
            let releases = self.list_releases().await?;

            if let Some(mut existing) = releases.into_iter().find(|r| r.tag_name == tag) {
                if !config.reuse_draft_only || existing.draft {
                    log::info!("Reusing release {} ({})", existing.id, existing.tag_name);
                    existing.reused = true;
                    self.events.emit(PublishEvent::ReuseRelease {
                        release: Box::new(existing.clone()),
                    });
                    return Ok(Resolution::Reused(existing));
                }

                if config.skip_if_published {
                    log::info!(
                        "Release {} is already published, nothing to do",
                        existing.tag_name
                    );
                    return Ok(Resolution::AlreadyPublished(existing));
                }

                log::info!(
                    "Release {} is published and only drafts may be reused, creating a new one",
                    existing.tag_name
                );
            }
        }

        let created = self.create_release(config).await?;
        Ok(Resolution::Created(created))
    }

    async fn list_releases(&self) -> Result<Vec<Release>, PublishError> {
        let request = self.context.request(
            HttpMethod::Get,
            self.context.releases_url(),
            RequestBody::Empty,
        );

        dispatch(self.transport, request, LIST_OPERATION)
            .await?
            .success_json(LIST_OPERATION)
    }

    async fn create_release(&self, config: &PublishConfig) -> Result<Release, PublishError> {
        self.events.emit(PublishEvent::CreateRelease);

        let body = serde_json::to_value(release_request(config))
            .map_err(|e| PublishError::invalid_response(CREATE_OPERATION, e))?;
        let request = self.context.request(
            HttpMethod::Post,
            self.context.releases_url(),
            RequestBody::Json(body),
        );

        let release: Release = dispatch(self.transport, request, CREATE_OPERATION)
            .await?
            .success_json(CREATE_OPERATION)?;

        log::info!("Created release {} ({})", release.id, release.tag_name);
        self.events.emit(PublishEvent::CreatedRelease {
            release: Box::new(release.clone()),
        });

        Ok(release)
    }
}
