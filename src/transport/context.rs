//! Per-operation request context
//!
//! Built once from a validated `PublishConfig` and passed to every call
//! that talks to the service. Nothing in it changes after construction.

use crate::core::config::PublishConfig;
use crate::core::error::PublishError;
use crate::core::traits::{
    ApiRequest, ApiResponse, BodyStream, HttpMethod, Release, RequestBody, Transport,
};
use secrecy::{ExposeSecret, SecretString};
use std::fmt;
use url::Url;
use uuid::Uuid;

/// Product-identifying user agent sent with every request
pub fn user_agent() -> String {
    format!(
        "publish-release {} (https://github.com/remixz/publish-release)",
        env!("CARGO_PKG_VERSION")
    )
}

/// Execute one request, turning transport failures into publish errors
pub async fn dispatch(
    transport: &dyn Transport,
    request: ApiRequest,
    operation: &str,
) -> Result<ApiResponse, PublishError> {
    transport
        .execute(request)
        .await
        .map_err(|e| PublishError::transport(operation, e.0))
}

/// Immutable addressing and header data for one publish operation
pub struct RequestContext {
    api_url: String,
    owner: String,
    repo: String,
    authorization: SecretString,
    user_agent: String,
    operation_id: Uuid,
}

impl RequestContext {
    /// Capture everything requests need from the configuration
    pub fn new(config: &PublishConfig) -> Result<Self, PublishError> {
        let missing = config.missing_fields();
        if !missing.is_empty() {
            return Err(PublishError::MissingOptions { fields: missing });
        }

        let token = config
            .token
            .as_ref()
            .map(|t| t.expose_secret())
            .unwrap_or_default();

        Ok(Self {
            api_url: config.api_url.trim_end_matches('/').to_string(),
            owner: config.owner.clone().unwrap_or_default(),
            repo: config.repo.clone().unwrap_or_default(),
            authorization: SecretString::new(format!("token {}", token).into()),
            user_agent: user_agent(),
            operation_id: Uuid::new_v4(),
        })
    }

    /// Identifier used to correlate log lines of one operation
    pub fn operation_id(&self) -> Uuid {
        self.operation_id
    }

    /// `{api}/repos/{owner}/{repo}/releases`
    pub fn releases_url(&self) -> String {
        format!("{}/repos/{}/{}/releases", self.api_url, self.owner, self.repo)
    }

    /// `{api}/repos/{owner}/{repo}/git/refs/tags/{tag}`
    pub fn tag_ref_url(&self, tag: &str) -> String {
        format!(
            "{}/repos/{}/{}/git/refs/tags/{}",
            self.api_url, self.owner, self.repo, tag
        )
    }

    /// Asset resource next to the release: `{release.url}/../assets/{id}`
    pub fn asset_url(release: &Release, asset_id: u64) -> String {
        let base = release
            .url
            .trim_end_matches('/')
            .rsplit_once('/')
            .map(|(base, _)| base)
            .unwrap_or(release.url.as_str());
        format!("{}/assets/{}", base, asset_id)
    }

    /// Upload endpoint with the file name as query parameter
    pub fn upload_url(endpoint: &str, file_name: &str) -> Result<String, PublishError> {
        let mut url =
            Url::parse(endpoint).map_err(|e| PublishError::invalid_response("upload-asset", e))?;
        url.query_pairs_mut().append_pair("name", file_name);
        Ok(url.into())
    }

    /// Request carrying the common headers
    pub fn request(&self, method: HttpMethod, url: String, body: RequestBody) -> ApiRequest {
        let headers = vec![
            (
                "Authorization".to_string(),
                self.authorization.expose_secret().to_string(),
            ),
            ("User-Agent".to_string(), self.user_agent.clone()),
            (
                "Accept".to_string(),
                "application/vnd.github+json".to_string(),
            ),
        ];

        ApiRequest {
            method,
            url,
            headers,
            body,
        }
    }

    /// Streamed asset upload request
    pub fn upload_request(
        &self,
        url: String,
        content_type: &str,
        length: u64,
        stream: BodyStream,
    ) -> ApiRequest {
        let mut request = self.request(
            HttpMethod::Post,
            url,
            RequestBody::Stream { stream, length },
        );
        request
            .headers
            .push(("Content-Type".to_string(), content_type.to_string()));
        request
            .headers
            .push(("Content-Length".to_string(), length.to_string()));
        request
    }
}

impl fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestContext")
            .field("api_url", &self.api_url)
            .field("owner", &self.owner)
            .field("repo", &self.repo)
            .field("operation_id", &self.operation_id)
            .finish_non_exhaustive()
    }
}
