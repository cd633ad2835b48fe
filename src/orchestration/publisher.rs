//! Release Publisher - Main orchestrator for publishing a release
//!
//! Runs the publish workflow as a strict sequence of stages:
//! - Validation of the required options
//! - Asset precheck
//! - Release resolution (reuse or create)
//! - Release edit and empty-tag deletion
//! - Sequential asset upload
//!
//! Lifecycle events go to an [`EventSink`]; the terminal outcome is the
//! returned result. Every error leaving the publisher has the credential
//! token masked.

use crate::assets::AssetUploadSequencer;
use crate::core::config::PublishConfig;
use crate::core::error::PublishError;
use crate::core::events::{ChannelSink, EventSink, PublishEvent};
use crate::core::state_machine::{PublishStage, StageDisposition, StageTracker, StageTransition};
use crate::core::traits::{Release, ReleaseAsset, Transport};
use crate::release::{DraftTransition, ReleaseMutator, ReleaseResolver, Resolution};
use crate::security::CredentialRedactor;
use crate::transport::RequestContext;
use chrono::{DateTime, Utc};
use secrecy::ExposeSecret;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

/// How a successful publish ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PublishStatus {
    /// The release was created or reused and all stages ran
    Published,
    /// A published release with the tag exists and nothing was changed
    AlreadyPublished,
}

/// Publishing report returned after a successful publish
#[derive(Debug, Clone, Serialize)]
pub struct PublishReport {
    pub status: PublishStatus,
    pub operation_id: Uuid,
    pub release: Release,
    pub uploaded_assets: Vec<ReleaseAsset>,
    pub deleted_tag: Option<String>,
    pub published_at: DateTime<Utc>,
    /// Wall time in milliseconds
    pub duration: u64,
    pub transitions: Vec<StageTransition>,
}

impl PublishReport {
    /// Stages passed through without doing work, in order
    pub fn skipped_stages(&self) -> Vec<PublishStage> {
        self.transitions
            .iter()
            .filter(|t| t.disposition == StageDisposition::Skipped)
            .map(|t| t.to)
            .collect()
    }
}

/// Receiving ends of a spawned publish
#[derive(Debug)]
pub struct PublishHandle {
    /// Lifecycle events; closes once the publish has finished
    pub events: mpsc::UnboundedReceiver<PublishEvent>,
    /// Resolves exactly once with the terminal outcome
    pub outcome: oneshot::Receiver<Result<PublishReport, PublishError>>,
}

/// Run a publish on the tokio runtime, observing it through two channels
pub fn spawn_publish(config: PublishConfig, transport: Arc<dyn Transport>) -> PublishHandle {
    let (sink, events) = ChannelSink::channel();
    let (sender, outcome) = oneshot::channel();
    let publisher = ReleasePublisher::new(transport, Arc::new(sink));

    tokio::spawn(async move {
        let result = publisher.publish(&config).await;
        // The caller may have stopped waiting
        let _ = sender.send(result);
    });

    PublishHandle { events, outcome }
}

struct StageOutputs {
    status: PublishStatus,
    release: Release,
    uploaded_assets: Vec<ReleaseAsset>,
    deleted_tag: Option<String>,
}

/// Main release publisher orchestrator
pub struct ReleasePublisher {
    transport: Arc<dyn Transport>,
    events: Arc<dyn EventSink>,
}

impl ReleasePublisher {
    /// Create a new ReleasePublisher
    ///
    /// # Arguments
    ///
    /// * `transport` - Executes every request against the service
    /// * `events` - Receives lifecycle and progress events
    pub fn new(transport: Arc<dyn Transport>, events: Arc<dyn EventSink>) -> Self {
        Self { transport, events }
    }

    /// Execute the publish workflow once
    ///
    /// Validation and asset precheck failures return before any network
    /// call and without an `error` event. Any later failure emits an
    /// `error` event with the masked message, then returns the masked error.
    pub async fn publish(&self, config: &PublishConfig) -> Result<PublishReport, PublishError> {
        let start_time = Instant::now();
        let redactor = CredentialRedactor::from_optional(config.token.as_ref());
        let mut tracker = StageTracker::new();

        tracker.enter(PublishStage::Validating);
        let context = match RequestContext::new(config) {
            Ok(context) => context,
            Err(error) => return Err(self.fail(&mut tracker, error, &redactor)),
        };

        if config.skip_assets_check || config.assets.is_empty() {
            tracker.skip(PublishStage::CheckingAssets, "asset check not requested");
        } else {
            tracker.enter(PublishStage::CheckingAssets);
            if let Err(error) = precheck_assets(config).await {
                return Err(self.fail(&mut tracker, error, &redactor));
            }
        }

        log::info!(
            "[{}] Publishing {}/{} {}",
            context.operation_id(),
            config.owner.as_deref().unwrap_or_default(),
            config.repo.as_deref().unwrap_or_default(),
            config.tag_name()
        );
        if let Some(token) = &config.token {
            log::debug!(
                "[{}] Using token {}",
                context.operation_id(),
                CredentialRedactor::mask_token(token.expose_secret())
            );
        }

        match self.run_stages(&context, config, &mut tracker).await {
            Ok(outputs) => {
                tracker.succeed();
                log::info!(
                    "[{}] Publish finished in {}ms",
                    context.operation_id(),
                    start_time.elapsed().as_millis()
                );

                Ok(PublishReport {
                    status: outputs.status,
                    operation_id: context.operation_id(),
                    release: outputs.release,
                    uploaded_assets: outputs.uploaded_assets,
                    deleted_tag: outputs.deleted_tag,
                    published_at: Utc::now(),
                    duration: start_time.elapsed().as_millis() as u64,
                    transitions: tracker.into_transitions(),
                })
            }
            Err(error) => Err(self.fail(&mut tracker, error, &redactor)),
        }
    }

    async fn run_stages(
        &self,
        context: &RequestContext,
        config: &PublishConfig,
        tracker: &mut StageTracker,
    ) -> Result<StageOutputs, PublishError> {
        let transport = self.transport.as_ref();
        let events = self.events.as_ref();

        tracker.enter(PublishStage::ResolvingRelease);
        let resolution = ReleaseResolver::new(transport, context, events)
            .resolve(config)
            .await?;

        let mut release = match resolution {
            Resolution::AlreadyPublished(release) => {
                for stage in [
                    PublishStage::EditingRelease,
                    PublishStage::DeletingTag,
                    PublishStage::UploadingAssets,
                ] {
                    tracker.skip(stage, "release already published");
                }
                return Ok(StageOutputs {
                    status: PublishStatus::AlreadyPublished,
                    release,
                    uploaded_assets: Vec::new(),
                    deleted_tag: None,
                });
            }
            resolution => resolution.into_release(),
        };

        let mutator = ReleaseMutator::new(transport, context, events);

        if release.reused && config.edit_release {
            tracker.enter(PublishStage::EditingRelease);
        } else {
            tracker.skip(PublishStage::EditingRelease, "release not reused or edit not allowed");
        }
        let transition = mutator.edit(&mut release, config).await?;

        if should_delete_tag(transition, config) {
            tracker.enter(PublishStage::DeletingTag);
        } else {
            tracker.skip(PublishStage::DeletingTag, "release was not turned into a draft");
        }
        let deleted_tag = mutator
            .delete_empty_tag(&release, transition, config)
            .await?;

        if config.assets.is_empty() {
            tracker.skip(PublishStage::UploadingAssets, "no assets");
        } else {
            tracker.enter(PublishStage::UploadingAssets);
        }
        let uploaded_assets = AssetUploadSequencer::new(transport, context, events)
            .upload_all(&release, config)
            .await?;

        Ok(StageOutputs {
            status: PublishStatus::Published,
            release,
            uploaded_assets,
            deleted_tag,
        })
    }

    /// Mask the error, record it, and report it on the event channel
    ///
    /// Pre-flight errors made no network call and only reach the caller
    /// through the returned result.
    fn fail(
        &self,
        tracker: &mut StageTracker,
        error: PublishError,
        redactor: &CredentialRedactor,
    ) -> PublishError {
        let error = error.redact(redactor);
        let message = error.to_string();

        log::error!(
            "Publish failed during {:?}: {}",
            tracker.current_stage(),
            message
        );
        if !error.is_preflight() {
            self.events.emit(PublishEvent::Error {
                message: message.clone(),
            });
        }
        tracker.fail(&message);
        error
    }
}

fn should_delete_tag(transition: Option<DraftTransition>, config: &PublishConfig) -> bool {
    config.delete_empty_tag && transition.is_some_and(|t| t.published_to_draft())
}

/// Every asset path must be accessible; the first one that is not fails
async fn precheck_assets(config: &PublishConfig) -> Result<(), PublishError> {
    for path in &config.assets {
        if tokio::fs::metadata(path).await.is_err() {
            return Err(PublishError::AssetNotAccessible { path: path.clone() });
        }
    }
    Ok(())
}
