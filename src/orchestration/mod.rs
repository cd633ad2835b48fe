//! Orchestration layer for release publishing
//!
//! This module provides the publisher that sequences the release and asset
//! stages of one publish operation.

pub mod publisher;

// Re-export main types for convenience
pub use publisher::{PublishHandle, PublishReport, PublishStatus, ReleasePublisher, spawn_publish};
