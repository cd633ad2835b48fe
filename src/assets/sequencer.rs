//! Asset Upload Sequencer - uploads assets one after another
//!
//! Each asset reaches a terminal state before the next one starts. Duplicate
//! conflicts are resolved by deleting the existing asset and retrying, up to
//! `max_duplicate_retries` times per asset.

use crate::assets::transfer::{AssetTransfer, AssetUploadTask, TransferOutcome};
use crate::core::config::PublishConfig;
use crate::core::error::PublishError;
use crate::core::events::{EventSink, PublishEvent};
use crate::core::traits::{HttpMethod, Release, ReleaseAsset, RequestBody, Transport};
use crate::transport::context::{RequestContext, dispatch};
use std::path::Path;

const DELETE_ASSET_OPERATION: &str = "delete-asset";

pub struct AssetUploadSequencer<'a> {
    transport: &'a dyn Transport,
    context: &'a RequestContext,
    events: &'a dyn EventSink,
}

impl<'a> AssetUploadSequencer<'a> {
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

    /// Upload every configured asset to `release`, in order
    ///
    /// Returns the assets that were uploaded. Assets kept because of
    /// `skip_duplicated_assets` are not part of the result. The first hard
    /// failure aborts the remaining assets.
    pub async fn upload_all(
        &self,
        release: &Release,
        config: &PublishConfig,
    ) -> Result<Vec<ReleaseAsset>, PublishError> {
        if config.assets.is_empty() {
            return Ok(Vec::new());
        }

        let endpoint =
            release
                .upload_endpoint()
                .ok_or_else(|| PublishError::MissingUploadEndpoint {
                    tag: release.tag_name.clone(),
                })?;

        let mut uploaded = Vec::with_capacity(config.assets.len());
        for path in &config.assets {
            if let Some(asset) = self.upload_one(release, endpoint, path, config).await? {
                uploaded.push(asset);
            }
        }

        log::info!(
            "Uploaded {} of {} asset(s) to {}",
            uploaded.len(),
            config.assets.len(),
            release.tag_name
        );
        Ok(uploaded)
    }

    async fn upload_one(
        &self,
        release: &Release,
        endpoint: &str,
        path: &Path,
        config: &PublishConfig,
    ) -> Result<Option<ReleaseAsset>, PublishError> {
        let task = AssetUploadTask::prepare(path).await?;
        let transfer = AssetTransfer::new(self.transport, self.context, self.events);
        let mut deletions = 0;

        loop {
            self.events.emit(PublishEvent::UploadAsset {
                file_name: task.file_name.clone(),
            });

            match transfer.transfer(&task, endpoint).await? {
                TransferOutcome::Uploaded(asset) => {
                    self.events.emit(PublishEvent::UploadedAsset {
                        file_name: task.file_name.clone(),
                    });
                    return Ok(Some(asset));
                }
                TransferOutcome::Duplicate => {
                    log::warn!("Asset {} already exists on the release", task.file_name);
                    self.events.emit(PublishEvent::DuplicatedAsset {
                        file_name: task.file_name.clone(),
                    });

                    if config.skip_duplicated_assets {
                        return Ok(None);
                    }

                    if deletions >= config.max_duplicate_retries {
                        return Err(PublishError::DuplicateAssetUnresolved {
                            file_name: task.file_name.clone(),
                            reason: format!(
                                "conflict persisted after {} deletion(s)",
                                deletions
                            ),
                        });
                    }

                    self.delete_existing(release, &task.file_name).await?;
                    deletions += 1;
                    self.events.emit(PublishEvent::DuplicatedAssetDeleted {
                        file_name: task.file_name.clone(),
                    });
                }
            }
        }
    }

    /// Delete the asset named `file_name` as listed on the release
    async fn delete_existing(
        &self,
        release: &Release,
        file_name: &str,
    ) -> Result<(), PublishError> {
        let existing =
            release
                .find_asset(file_name)
                .ok_or_else(|| PublishError::DuplicateAssetUnresolved {
                    file_name: file_name.to_string(),
                    reason: "existing asset is not listed on the release".to_string(),
                })?;

        let request = self.context.request(
            HttpMethod::Delete,
            RequestContext::asset_url(release, existing.id),
            RequestBody::Empty,
        );
        let response = dispatch(self.transport, request, DELETE_ASSET_OPERATION).await?;
        if !response.is_success() {
            return Err(response.into_status_error(DELETE_ASSET_OPERATION));
        }

        log::info!("Deleted existing asset {} ({})", file_name, existing.id);
        Ok(())
    }
}
