//! Error handling for release publishing
//!
//! This module provides the error taxonomy of a publish operation with
//! recovery guidance, using the thiserror crate for ergonomic error handling.

use crate::security::CredentialRedactor;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for release publishing operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PublishError {
    // Pre-flight errors
    #[error("missing required options: {}", fields.join(", "))]
    MissingOptions { fields: Vec<String> },

    #[error("asset is missing or not accessible: {}", path.display())]
    AssetNotAccessible { path: PathBuf },

    // Remote errors
    #[error("[{operation}] transport failure: {message}")]
    Transport { operation: String, message: String },

    #[error("[{operation}] service responded with status {status}: {body}")]
    ServiceStatus {
        operation: String,
        status: u16,
        body: String,
    },

    #[error("[{operation}] unexpected response: {message}")]
    InvalidResponse { operation: String, message: String },

    // Upload errors
    #[error("release {tag} has no usable upload endpoint")]
    MissingUploadEndpoint { tag: String },

    #[error("duplicate asset {file_name} could not be resolved: {reason}")]
    DuplicateAssetUnresolved { file_name: String, reason: String },

    #[error("failed to read asset {}: {message}", path.display())]
    AssetRead { path: PathBuf, message: String },

    // Configuration errors
    #[error("configuration error: {0}")]
    ConfigError(String),
}

impl PublishError {
    /// Build a transport error for the named operation
    pub fn transport(operation: &str, message: impl Into<String>) -> Self {
        Self::Transport {
            operation: operation.to_string(),
            message: message.into(),
        }
    }

    /// Build an invalid-response error for the named operation
    pub fn invalid_response(operation: &str, message: impl ToString) -> Self {
        Self::InvalidResponse {
            operation: operation.to_string(),
            message: message.to_string(),
        }
    }

    /// Whether this error is raised before any network activity
    pub fn is_preflight(&self) -> bool {
        matches!(
            self,
            Self::MissingOptions { .. } | Self::AssetNotAccessible { .. } | Self::ConfigError(_)
        )
    }

    /// Check if re-running the publish may succeed without changing the input
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Transport { .. } | Self::DuplicateAssetUnresolved { .. } => true,
            Self::ServiceStatus { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }

    /// Replace every occurrence of the credential token in the error text
    pub fn redact(self, redactor: &CredentialRedactor) -> Self {
        match self {
            Self::Transport { operation, message } => Self::Transport {
                operation,
                message: redactor.redact(&message),
            },
            Self::ServiceStatus {
                operation,
                status,
                body,
            } => Self::ServiceStatus {
                operation,
                status,
                body: redactor.redact(&body),
            },
            Self::InvalidResponse { operation, message } => Self::InvalidResponse {
                operation,
                message: redactor.redact(&message),
            },
            Self::DuplicateAssetUnresolved { file_name, reason } => {
                Self::DuplicateAssetUnresolved {
                    file_name,
                    reason: redactor.redact(&reason),
                }
            }
            Self::AssetRead { path, message } => Self::AssetRead {
                path,
                message: redactor.redact(&message),
            },
            Self::ConfigError(message) => Self::ConfigError(redactor.redact(&message)),
            other => other,
        }
    }

    /// Get suggested actions for this error
    pub fn suggested_actions(&self) -> Vec<&'static str> {
        match self {
            Self::MissingOptions { .. } => vec![
                "Pass the missing options on the command line",
                "Set GITHUB_TOKEN or GH_TOKEN for the credential",
            ],
            Self::AssetNotAccessible { .. } => vec![
                "Check that every asset path exists and is readable",
                "Use --skip-assets-check to defer the check to upload time",
            ],
            Self::Transport { .. } => vec![
                "Check your network connection",
                "Retry after a short wait",
            ],
            Self::ServiceStatus { status: 401, .. } | Self::ServiceStatus { status: 403, .. } => {
                vec![
                    "Check that the token is valid and not expired",
                    "Check that the token has the repo scope",
                ]
            }
            Self::ServiceStatus { status: 404, .. } => {
                vec!["Check the owner and repo names", "Check the API url"]
            }
            Self::ServiceStatus { .. } => vec![
                "Inspect the response body for details",
                "Check the service status page",
            ],
            Self::InvalidResponse { .. } => vec!["Check that the API url points to a GitHub API"],
            Self::MissingUploadEndpoint { .. } => vec![
                "Inspect the release on the service for creation errors",
                "Check that the tag name is valid",
            ],
            Self::DuplicateAssetUnresolved { .. } => vec![
                "Delete the conflicting asset manually",
                "Use --skip-duplicated-assets to keep the existing asset",
            ],
            Self::AssetRead { .. } => vec!["Check file permissions of the asset"],
            Self::ConfigError(_) => vec!["Check .publish-release.yaml for syntax errors"],
        }
    }

    /// Get error code for this error
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingOptions { .. } => "MISSING_OPTIONS",
            Self::AssetNotAccessible { .. } => "ASSET_NOT_ACCESSIBLE",
            Self::Transport { .. } => "TRANSPORT_ERROR",
            Self::ServiceStatus { .. } => "SERVICE_STATUS",
            Self::InvalidResponse { .. } => "INVALID_RESPONSE",
            Self::MissingUploadEndpoint { .. } => "MISSING_UPLOAD_ENDPOINT",
            Self::DuplicateAssetUnresolved { .. } => "DUPLICATE_ASSET_UNRESOLVED",
            Self::AssetRead { .. } => "ASSET_READ",
            Self::ConfigError(_) => "CONFIG_ERROR",
        }
    }
}
