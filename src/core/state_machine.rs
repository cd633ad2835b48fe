//! Stage tracking for the publish workflow
//!
//! Records every stage transition of one publish operation with a timestamp,
//! including stages that were skipped by policy.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Publishing stage
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PublishStage {
    Initial,
    Validating,
    CheckingAssets,
    ResolvingRelease,
    EditingRelease,
    DeletingTag,
    UploadingAssets,
    Succeeded,
    Failed,
}

/// How a stage ended up participating
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StageDisposition {
    Ran,
    Skipped,
}

/// State transition
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StageTransition {
    pub from: PublishStage,
    pub to: PublishStage,
    pub disposition: StageDisposition,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<HashMap<String, serde_json::Value>>,
}

/// Tracks the stages of one publish operation
#[derive(Debug, Clone)]
pub struct StageTracker {
    current_stage: PublishStage,
    transitions: Vec<StageTransition>,
}

impl Default for StageTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl StageTracker {
    pub fn new() -> Self {
        Self {
            current_stage: PublishStage::Initial,
            transitions: Vec::new(),
        }
    }

    /// Enter a stage that does work
    pub fn enter(&mut self, to: PublishStage) {
        self.push(to, StageDisposition::Ran, None);
    }

    /// Pass through a stage whose precondition did not hold
    pub fn skip(&mut self, to: PublishStage, reason: &str) {
        let mut metadata = HashMap::new();
        metadata.insert(
            "reason".to_string(),
            serde_json::Value::String(reason.to_string()),
        );
        self.push(to, StageDisposition::Skipped, Some(metadata));
    }

    /// Terminal failure; the message must already be redacted
    pub fn fail(&mut self, message: &str) {
        let mut metadata = HashMap::new();
        metadata.insert(
            "error".to_string(),
            serde_json::Value::String(message.to_string()),
        );
        self.push(PublishStage::Failed, StageDisposition::Ran, Some(metadata));
    }

    pub fn succeed(&mut self) {
        self.push(PublishStage::Succeeded, StageDisposition::Ran, None);
    }

    fn push(
        &mut self,
        to: PublishStage,
        disposition: StageDisposition,
        metadata: Option<HashMap<String, serde_json::Value>>,
    ) {
        log::debug!("stage {:?} -> {:?} ({:?})", self.current_stage, to, disposition);

        self.transitions.push(StageTransition {
            from: self.current_stage,
            to,
            disposition,
            timestamp: Utc::now(),
            metadata,
        });
        self.current_stage = to;
    }

    pub fn current_stage(&self) -> PublishStage {
        self.current_stage
    }

    pub fn into_transitions(self) -> Vec<StageTransition> {
        self.transitions
    }
}
