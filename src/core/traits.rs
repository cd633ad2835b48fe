//! Core traits and types for release publishing
//!
//! This module defines the transport seam every remote call goes through
//! and the wire types exchanged with the release-hosting service.

use crate::core::error::PublishError;
use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::pin::Pin;
use thiserror::Error;

// ============================================================================
// Requests
// ============================================================================

/// HTTP methods used against the release-hosting service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Patch,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }
}

/// Streamed request body chunks
pub type BodyStream = Pin<Box<dyn Stream<Item = std::io::Result<Bytes>> + Send + 'static>>;

/// Request payload
pub enum RequestBody {
    Empty,
    Json(serde_json::Value),
    /// Streamed bytes with a known total length
    Stream { stream: BodyStream, length: u64 },
}

impl fmt::Debug for RequestBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => f.write_str("Empty"),
            Self::Json(value) => f.debug_tuple("Json").field(value).finish(),
            Self::Stream { length, .. } => {
                f.debug_struct("Stream").field("length", length).finish()
            }
        }
    }
}

/// One request for the transport
///
/// Headers are carried as plain pairs; the `Authorization` value is only
/// ever read by the transport.
#[derive(Debug)]
pub struct ApiRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: RequestBody,
}

impl ApiRequest {
    /// Look up a header value, case-insensitively
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

// ============================================================================
// Responses
// ============================================================================

/// Status and raw body of a completed exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: String,
}

impl ApiResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Decode the body as JSON
    pub fn json<T: DeserializeOwned>(&self, operation: &str) -> Result<T, PublishError> {
        serde_json::from_str(&self.body).map_err(|e| PublishError::invalid_response(operation, e))
    }

    /// Decode a 2xx body, or turn any other status into a service error
    pub fn success_json<T: DeserializeOwned>(self, operation: &str) -> Result<T, PublishError> {
        if !self.is_success() {
            return Err(self.into_status_error(operation));
        }
        self.json(operation)
    }

    pub fn into_status_error(self, operation: &str) -> PublishError {
        PublishError::ServiceStatus {
            operation: operation.to_string(),
            status: self.status,
            body: self.body,
        }
    }
}

/// Network-level failure reported by a transport
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct TransportError(pub String);

// ============================================================================
// Transport Trait
// ============================================================================

/// The seam between the publish workflow and the network
///
/// Implementations execute exactly one exchange per call and never retry.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, request: ApiRequest) -> Result<ApiResponse, TransportError>;
}

// ============================================================================
// Wire Types
// ============================================================================

/// Asset attached to a release
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseAsset {
    pub id: u64,
    pub name: String,
}

/// Release record as returned by the service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Release {
    #[serde(default)]
    pub id: u64,
    #[serde(default)]
    pub tag_name: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub upload_url: Option<String>,
    #[serde(default)]
    pub html_url: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub draft: bool,
    #[serde(default)]
    pub prerelease: bool,
    #[serde(default)]
    pub assets: Vec<ReleaseAsset>,
    /// Validation errors reported alongside a release
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<serde_json::Value>>,
    /// Set locally when an existing release was picked up
    #[serde(skip)]
    pub reused: bool,
}

impl Release {
    /// Upload endpoint with the `{?name,label}` template stripped
    ///
    /// `None` when the release cannot receive assets.
    pub fn upload_endpoint(&self) -> Option<&str> {
        if self.errors.as_ref().is_some_and(|e| !e.is_empty()) {
            return None;
        }

        let template = self.upload_url.as_deref()?;
        let endpoint = template.split('{').next().unwrap_or_default();
        if endpoint.is_empty() { None } else { Some(endpoint) }
    }

    pub fn find_asset(&self, name: &str) -> Option<&ReleaseAsset> {
        self.assets.iter().find(|asset| asset.name == name)
    }
}

/// Body of the create and edit calls
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReleaseRequest {
    pub tag_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_commitish: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    pub draft: bool,
    pub prerelease: bool,
}

/// Error entry of a 4xx response body
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServiceErrorDetail {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub field: Option<String>,
    #[serde(default)]
    pub resource: Option<String>,
}

/// 4xx response body
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServiceErrorBody {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub errors: Vec<ServiceErrorDetail>,
}

impl ServiceErrorBody {
    /// Whether the body reports an asset that already exists
    pub fn is_already_exists(&self) -> bool {
        self.errors
            .iter()
            .any(|e| e.code.as_deref() == Some("already_exists"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn release_json() -> &'static str {
        r#"{
            "id": 42,
            "url": "https://api.github.com/repos/octo/widget/releases/42",
            "upload_url": "https://uploads.github.com/repos/octo/widget/releases/42/assets{?name,label}",
            "html_url": "https://github.com/octo/widget/releases/tag/v1.0.0",
            "tag_name": "v1.0.0",
            "name": null,
            "draft": true,
            "prerelease": false,
            "assets": [{"id": 7, "name": "a.zip", "size": 10}]
        }"#
    }

    #[test]
    fn test_release_deserialization() {
        let release: Release = serde_json::from_str(release_json()).unwrap();

        assert_eq!(release.id, 42);
        assert_eq!(release.tag_name, "v1.0.0");
        assert!(release.draft);
        assert!(!release.reused);
        assert_eq!(release.find_asset("a.zip").map(|a| a.id), Some(7));
        assert!(release.find_asset("b.zip").is_none());
    }

    #[test]
    fn test_upload_endpoint_strips_template() {
        let release: Release = serde_json::from_str(release_json()).unwrap();
        assert_eq!(
            release.upload_endpoint(),
            Some("https://uploads.github.com/repos/octo/widget/releases/42/assets")
        );
    }

    #[test]
    fn test_upload_endpoint_missing_when_errors_reported() {
        let mut release: Release = serde_json::from_str(release_json()).unwrap();
        release.errors = Some(vec![serde_json::json!({"code": "invalid"})]);
        assert!(release.upload_endpoint().is_none());

        release.errors = None;
        release.upload_url = None;
        assert!(release.upload_endpoint().is_none());
    }

    #[test]
    fn test_release_request_serialization() {
        let request = ReleaseRequest {
            tag_name: "v1.0.0".to_string(),
            target_commitish: None,
            name: Some("One".to_string()),
            body: None,
            draft: false,
            prerelease: true,
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["tag_name"], "v1.0.0");
        assert_eq!(json["name"], "One");
        assert_eq!(json["prerelease"], true);
        assert!(json.get("target_commitish").is_none());
    }

    #[test]
    fn test_already_exists_detection() {
        let body: ServiceErrorBody = serde_json::from_str(
            r#"{"message":"Validation Failed","errors":[{"resource":"ReleaseAsset","code":"already_exists","field":"name"}]}"#,
        )
        .unwrap();
        assert!(body.is_already_exists());

        let body: ServiceErrorBody =
            serde_json::from_str(r#"{"message":"Validation Failed","errors":[{"code":"invalid"}]}"#)
                .unwrap();
        assert!(!body.is_already_exists());
    }

    #[test]
    fn test_response_status_mapping() {
        let response = ApiResponse::new(404, "{\"message\":\"Not Found\"}");
        assert!(!response.is_success());

        let error = response.success_json::<Release>("create-release").unwrap_err();
        assert_eq!(error.code(), "SERVICE_STATUS");

        let response = ApiResponse::new(201, "not json");
        let error = response.success_json::<Release>("create-release").unwrap_err();
        assert_eq!(error.code(), "INVALID_RESPONSE");
    }

    #[test]
    fn test_request_header_lookup() {
        let request = ApiRequest {
            method: HttpMethod::Get,
            url: "https://example.com".to_string(),
            headers: vec![("User-Agent".to_string(), "ua".to_string())],
            body: RequestBody::Empty,
        };

        assert_eq!(request.header("user-agent"), Some("ua"));
        assert_eq!(request.header("Authorization"), None);
        assert_eq!(format!("{:?}", request.body), "Empty");
    }
}
