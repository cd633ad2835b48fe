//! Asset Transfer Unit - streams one file to the upload endpoint

use crate::assets::content_type::content_type_for;
use crate::core::error::PublishError;
use crate::core::events::{EventSink, PublishEvent, UploadProgressSample};
use crate::core::traits::{ReleaseAsset, ServiceErrorBody, Transport};
use crate::transport::context::{RequestContext, dispatch};
use bytes::Bytes;
use futures::Stream;
use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::task::{Context, Poll, ready};
use std::time::{Duration, Instant};
use tokio::fs::File;
use tokio::sync::mpsc;
use tokio_util::io::ReaderStream;

const UPLOAD_OPERATION: &str = "upload-asset";

/// Minimum wall time between two progress samples
pub const PROGRESS_INTERVAL: Duration = Duration::from_millis(100);

/// One file about to be uploaded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetUploadTask {
    pub path: PathBuf,
    pub file_name: String,
    pub size: u64,
}

impl AssetUploadTask {
    /// Stat the file and derive the asset name from its base name
    pub async fn prepare(path: &Path) -> Result<Self, PublishError> {
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| PublishError::AssetRead {
                path: path.to_path_buf(),
                message: "path has no file name".to_string(),
            })?;

        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|e| PublishError::AssetRead {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;

        Ok(Self {
            path: path.to_path_buf(),
            file_name,
            size: metadata.len(),
        })
    }
}

/// Result of a single transfer attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferOutcome {
    Uploaded(ReleaseAsset),
    /// The service already holds an asset with this name
    Duplicate,
}

/// Uploads one asset per call, reporting progress while the body streams
pub struct AssetTransfer<'a> {
    transport: &'a dyn Transport,
    context: &'a RequestContext,
    events: &'a dyn EventSink,
}

impl<'a> AssetTransfer<'a> {
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

    /// Stream `task` to `endpoint`
    ///
    /// Progress samples are emitted as the transport consumes the body. A 422
    /// reporting `already_exists` yields [`TransferOutcome::Duplicate`]; any
    /// other failure is an error.
    pub async fn transfer(
        &self,
        task: &AssetUploadTask,
        endpoint: &str,
    ) -> Result<TransferOutcome, PublishError> {
        let url = RequestContext::upload_url(endpoint, &task.file_name)?;
        let file = File::open(&task.path)
            .await
            .map_err(|e| PublishError::AssetRead {
                path: task.path.clone(),
                message: e.to_string(),
            })?;

        let (sender, mut samples) = mpsc::unbounded_channel();
        let body = ProgressStream::new(file, task, sender);
        let request = self.context.upload_request(
            url,
            content_type_for(&task.file_name),
            task.size,
            Box::pin(body),
        );

        log::debug!("Uploading {} ({} bytes)", task.file_name, task.size);

        let upload = dispatch(self.transport, request, UPLOAD_OPERATION);
        tokio::pin!(upload);

        let result = loop {
            tokio::select! {
                biased;
                Some(sample) = samples.recv() => {
                    self.events.emit(PublishEvent::UploadProgress(sample));
                }
                result = &mut upload => break result,
            }
        };

        while let Ok(sample) = samples.try_recv() {
            self.events.emit(PublishEvent::UploadProgress(sample));
        }

        let response = result?;

        if response.is_success() {
            let asset: ReleaseAsset = response.json(UPLOAD_OPERATION)?;
            return Ok(TransferOutcome::Uploaded(asset));
        }

        if response.status == 422 && is_duplicate(&response.body) {
            return Ok(TransferOutcome::Duplicate);
        }

        Err(response.into_status_error(UPLOAD_OPERATION))
    }
}

fn is_duplicate(body: &str) -> bool {
    serde_json::from_str::<ServiceErrorBody>(body)
        .map(|error| error.is_already_exists())
        .unwrap_or(false)
}

/// File body that counts bytes as they are read and samples progress
struct ProgressStream {
    inner: ReaderStream<File>,
    file_name: String,
    total: u64,
    transferred: u64,
    started: Instant,
    last_sample: Instant,
    completed: bool,
    samples: mpsc::UnboundedSender<UploadProgressSample>,
}

impl ProgressStream {
    fn new(
        file: File,
        task: &AssetUploadTask,
        samples: mpsc::UnboundedSender<UploadProgressSample>,
    ) -> Self {
        let now = Instant::now();
        Self {
            inner: ReaderStream::new(file),
            file_name: task.file_name.clone(),
            total: task.size,
            transferred: 0,
            started: now,
            last_sample: now,
            completed: false,
            samples,
        }
    }

    fn sample(&mut self) {
        let now = Instant::now();
        if self.completed || now.duration_since(self.last_sample) < PROGRESS_INTERVAL {
            return;
        }
        self.last_sample = now;
        self.send(now);
    }

    fn complete(&mut self) {
        if self.completed {
            return;
        }
        self.completed = true;
        self.send(Instant::now());
    }

    fn send(&self, now: Instant) {
        let sample = UploadProgressSample::new(
            &self.file_name,
            self.transferred,
            self.total,
            now.duration_since(self.started),
        );
        // The receiver is gone once the transfer has returned
        let _ = self.samples.send(sample);
    }
}

impl Stream for ProgressStream {
    type Item = io::Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        match ready!(Pin::new(&mut this.inner).poll_next(cx)) {
            Some(Ok(chunk)) => {
                this.transferred += chunk.len() as u64;
                this.sample();
                Poll::Ready(Some(Ok(chunk)))
            }
            Some(Err(e)) => Poll::Ready(Some(Err(e))),
            None => {
                this.complete();
                Poll::Ready(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::events::RecordingSink;
    use crate::core::traits::{ApiRequest, ApiResponse, RequestBody, TransportError};
    use crate::testing::{MockTransport, test_config};
    use async_trait::async_trait;
    use futures::StreamExt;
    use std::io::Write;
    use tempfile::TempDir;

    const ENDPOINT: &str = "https://uploads.example.com/repos/octo/widget/releases/1/assets";

    fn asset_file(dir: &TempDir, name: &str, size: usize) -> PathBuf {
        let path = dir.path().join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(&vec![b'x'; size]).unwrap();
        path
    }

    /// Reads the upload body one chunk at a time with a pause after each
    struct SlowTransport {
        pause: Duration,
    }

    #[async_trait]
    impl Transport for SlowTransport {
        async fn execute(&self, request: ApiRequest) -> Result<ApiResponse, TransportError> {
            if let RequestBody::Stream { mut stream, .. } = request.body {
                while let Some(chunk) = stream.next().await {
                    chunk.map_err(|e| TransportError(e.to_string()))?;
                    tokio::time::sleep(self.pause).await;
                }
            }
            Ok(ApiResponse::new(201, r#"{"id": 7, "name": "slow.bin"}"#))
        }
    }

    fn progress(sink: &RecordingSink) -> Vec<UploadProgressSample> {
        sink.events()
            .into_iter()
            .filter_map(|e| match e {
                PublishEvent::UploadProgress(sample) => Some(sample),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_prepare_stats_file() {
        let dir = TempDir::new().unwrap();
        let path = asset_file(&dir, "a.zip", 1234);

        let task = AssetUploadTask::prepare(&path).await.unwrap();
        assert_eq!(task.file_name, "a.zip");
        assert_eq!(task.size, 1234);
    }

    #[tokio::test]
    async fn test_slow_upload_samples_progress_periodically() {
        let dir = TempDir::new().unwrap();
        let path = asset_file(&dir, "slow.bin", 64 * 1024);
        let task = AssetUploadTask::prepare(&path).await.unwrap();

        let transport = SlowTransport {
            pause: Duration::from_millis(40),
        };
        let config = test_config();
        let context = RequestContext::new(&config).unwrap();
        let sink = RecordingSink::new();

        let outcome = AssetTransfer::new(&transport, &context, &sink)
            .transfer(&task, ENDPOINT)
            .await
            .unwrap();
        assert!(matches!(outcome, TransferOutcome::Uploaded(ref asset) if asset.id == 7));

        let samples = progress(&sink);
        assert!(samples.len() >= 3, "got {:?}", samples);

        let (last, periodic) = samples.split_last().unwrap();
        assert_eq!(last.transferred, 64 * 1024);
        assert_eq!(last.percentage, 100.0);

        assert!(periodic[0].elapsed >= PROGRESS_INTERVAL);
        for pair in periodic.windows(2) {
            assert!(pair[1].elapsed - pair[0].elapsed >= PROGRESS_INTERVAL);
            assert!(pair[1].transferred > pair[0].transferred);
        }
        for pair in samples.windows(2) {
            assert!(pair[1].transferred >= pair[0].transferred);
        }
    }

    #[tokio::test]
    async fn test_prepare_missing_file() {
        let dir = TempDir::new().unwrap();
        let error = AssetUploadTask::prepare(&dir.path().join("nope.zip"))
            .await
            .unwrap_err();
        assert_eq!(error.code(), "ASSET_READ");
    }

    #[tokio::test]
    async fn test_upload_streams_file_with_headers() {
        let dir = TempDir::new().unwrap();
        let path = asset_file(&dir, "b.tar.gz", 300_000);
        let task = AssetUploadTask::prepare(&path).await.unwrap();

        let transport = MockTransport::new();
        transport.respond(201, r#"{"id": 55, "name": "b.tar.gz"}"#);
        let config = test_config();
        let context = RequestContext::new(&config).unwrap();
        let sink = RecordingSink::new();

        let outcome = AssetTransfer::new(&transport, &context, &sink)
            .transfer(&task, ENDPOINT)
            .await
            .unwrap();

        assert_eq!(
            outcome,
            TransferOutcome::Uploaded(ReleaseAsset {
                id: 55,
                name: "b.tar.gz".to_string()
            })
        );

        let upload = &transport.requests()[0];
        assert_eq!(upload.method, "POST");
        assert_eq!(upload.url, format!("{}?name=b.tar.gz", ENDPOINT));
        assert_eq!(upload.header("Content-Type"), Some("application/gzip"));
        assert_eq!(upload.header("Content-Length"), Some("300000"));
        assert_eq!(upload.body_len, 300_000);

        let samples = progress(&sink);
        let last = samples.last().unwrap();
        assert_eq!(last.transferred, 300_000);
        assert_eq!(last.percentage, 100.0);
        assert!(samples.windows(2).all(|w| w[0].transferred <= w[1].transferred));
    }

    #[tokio::test]
    async fn test_empty_file_reports_completion() {
        let dir = TempDir::new().unwrap();
        let path = asset_file(&dir, "empty.txt", 0);
        let task = AssetUploadTask::prepare(&path).await.unwrap();

        let transport = MockTransport::new();
        transport.respond(201, r#"{"id": 1, "name": "empty.txt"}"#);
        let config = test_config();
        let context = RequestContext::new(&config).unwrap();
        let sink = RecordingSink::new();

        AssetTransfer::new(&transport, &context, &sink)
            .transfer(&task, ENDPOINT)
            .await
            .unwrap();

        let samples = progress(&sink);
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].total, 0);
        assert_eq!(samples[0].percentage, 100.0);
    }

    #[tokio::test]
    async fn test_already_exists_maps_to_duplicate() {
        let dir = TempDir::new().unwrap();
        let path = asset_file(&dir, "a.zip", 10);
        let task = AssetUploadTask::prepare(&path).await.unwrap();

        let transport = MockTransport::new();
        transport.respond(
            422,
            r#"{"message":"Validation Failed","errors":[{"resource":"ReleaseAsset","code":"already_exists","field":"name"}]}"#,
        );
        let config = test_config();
        let context = RequestContext::new(&config).unwrap();
        let sink = RecordingSink::new();

        let outcome = AssetTransfer::new(&transport, &context, &sink)
            .transfer(&task, ENDPOINT)
            .await
            .unwrap();

        assert_eq!(outcome, TransferOutcome::Duplicate);
    }

    #[tokio::test]
    async fn test_other_validation_failure_is_error() {
        let dir = TempDir::new().unwrap();
        let path = asset_file(&dir, "a.zip", 10);
        let task = AssetUploadTask::prepare(&path).await.unwrap();

        let transport = MockTransport::new();
        transport.respond(
            422,
            r#"{"message":"Validation Failed","errors":[{"code":"invalid"}]}"#,
        );
        let config = test_config();
        let context = RequestContext::new(&config).unwrap();
        let sink = RecordingSink::new();

        let error = AssetTransfer::new(&transport, &context, &sink)
            .transfer(&task, ENDPOINT)
            .await
            .unwrap_err();

        assert!(matches!(
            error,
            PublishError::ServiceStatus { status: 422, .. }
        ));
    }

    #[tokio::test]
    async fn test_transport_failure() {
        let dir = TempDir::new().unwrap();
        let path = asset_file(&dir, "a.zip", 10);
        let task = AssetUploadTask::prepare(&path).await.unwrap();

        let transport = MockTransport::new();
        transport.fail("broken pipe");
        let config = test_config();
        let context = RequestContext::new(&config).unwrap();
        let sink = RecordingSink::new();

        let error = AssetTransfer::new(&transport, &context, &sink)
            .transfer(&task, ENDPOINT)
            .await
            .unwrap_err();

        assert_eq!(error.code(), "TRANSPORT_ERROR");
    }
}
