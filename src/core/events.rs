//! Lifecycle and progress events of a publish operation
//!
//! Events are delivered through an [`EventSink`], independently of the
//! terminal result of the operation.

use crate::core::traits::Release;
use serde::Serialize;
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::mpsc;

/// Progress of one asset transfer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UploadProgressSample {
    pub file_name: String,
    pub transferred: u64,
    pub total: u64,
    pub percentage: f64,
    pub elapsed: Duration,
}

impl UploadProgressSample {
    pub fn new(file_name: &str, transferred: u64, total: u64, elapsed: Duration) -> Self {
        let percentage = if total == 0 {
            100.0
        } else {
            (transferred as f64 / total as f64) * 100.0
        };

        Self {
            file_name: file_name.to_string(),
            transferred,
            total,
            percentage,
            elapsed,
        }
    }
}

/// Notification emitted while publishing
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum PublishEvent {
    CreateRelease,
    CreatedRelease { release: Box<Release> },
    ReuseRelease { release: Box<Release> },
    EditRelease,
    EditedRelease { release: Box<Release> },
    DeletedTagRelease { tag: String },
    UploadAsset { file_name: String },
    UploadProgress(UploadProgressSample),
    DuplicatedAsset { file_name: String },
    DuplicatedAssetDeleted { file_name: String },
    UploadedAsset { file_name: String },
    /// Terminal failure, message already redacted
    Error { message: String },
}

impl PublishEvent {
    /// Stable event name
    pub fn name(&self) -> &'static str {
        match self {
            Self::CreateRelease => "create-release",
            Self::CreatedRelease { .. } => "created-release",
            Self::ReuseRelease { .. } => "reuse-release",
            Self::EditRelease => "edit-release",
            Self::EditedRelease { .. } => "edited-release",
            Self::DeletedTagRelease { .. } => "deleted-tag-release",
            Self::UploadAsset { .. } => "upload-asset",
            Self::UploadProgress(_) => "upload-progress",
            Self::DuplicatedAsset { .. } => "duplicated-asset",
            Self::DuplicatedAssetDeleted { .. } => "duplicated-asset-deleted",
            Self::UploadedAsset { .. } => "uploaded-asset",
            Self::Error { .. } => "error",
        }
    }

    /// Asset the event refers to, if any
    pub fn file_name(&self) -> Option<&str> {
        match self {
            Self::UploadAsset { file_name }
            | Self::DuplicatedAsset { file_name }
            | Self::DuplicatedAssetDeleted { file_name }
            | Self::UploadedAsset { file_name } => Some(file_name),
            Self::UploadProgress(sample) => Some(&sample.file_name),
            _ => None,
        }
    }
}

/// Receiver of publish events
///
/// Emission must not block. Sinks are called from the publish task; upload
/// progress reaches them through a channel drained while the upload runs.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: PublishEvent);
}

/// Forwards events into an unbounded tokio channel
#[derive(Debug, Clone)]
pub struct ChannelSink {
    sender: mpsc::UnboundedSender<PublishEvent>,
}

impl ChannelSink {
    pub fn new(sender: mpsc::UnboundedSender<PublishEvent>) -> Self {
        Self { sender }
    }

    /// Sink plus the receiving half
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<PublishEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self::new(sender), receiver)
    }
}

impl EventSink for ChannelSink {
    fn emit(&self, event: PublishEvent) {
        // A dropped receiver only means nobody is listening
        let _ = self.sender.send(event);
    }
}

/// Keeps every event in memory, in emission order
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<PublishEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<PublishEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Event names with progress samples filtered out
    pub fn milestones(&self) -> Vec<String> {
        self.events()
            .iter()
            .filter(|e| !matches!(e, PublishEvent::UploadProgress(_)))
            .map(|e| match e.file_name() {
                Some(file_name) => format!("{}({})", e.name(), file_name),
                None => e.name().to_string(),
            })
            .collect()
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: PublishEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}
