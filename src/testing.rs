//! Test helpers: a scripted transport and canned service payloads

use crate::core::config::PublishConfig;
use crate::core::traits::{ApiRequest, ApiResponse, RequestBody, Transport, TransportError};
use async_trait::async_trait;
use futures::StreamExt;
use secrecy::SecretString;
use std::collections::VecDeque;
use std::sync::Mutex;
use url::Url;

pub const TEST_TOKEN: &str = "ghp_testtoken123";

enum Scripted {
    Respond(ApiResponse),
    Fail(String),
}

/// What the transport saw for one request
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: &'static str,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub json: Option<serde_json::Value>,
    pub body_len: u64,
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Transport answering from a queue of scripted replies
///
/// Stream bodies are drained so upload progress fires. A request with no
/// scripted reply fails at the transport level.
#[derive(Default)]
pub struct MockTransport {
    script: Mutex<VecDeque<Scripted>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, status: u16, body: impl Into<String>) {
        self.script
            .lock()
            .unwrap()
            .push_back(Scripted::Respond(ApiResponse::new(status, body)));
    }

    pub fn fail(&self, message: impl Into<String>) {
        self.script
            .lock()
            .unwrap()
            .push_back(Scripted::Fail(message.into()));
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Requests with `method` whose url path ends with `suffix`
    pub fn count(&self, method: &str, suffix: &str) -> usize {
        self.requests()
            .iter()
            .filter(|r| r.method == method && path_of(&r.url).ends_with(suffix))
            .count()
    }

    /// File names of every upload attempt, in order
    pub fn uploads(&self) -> Vec<String> {
        self.requests()
            .iter()
            .filter_map(|r| Url::parse(&r.url).ok())
            .filter_map(|url| {
                url.query_pairs()
                    .find(|(key, _)| key == "name")
                    .map(|(_, value)| value.into_owned())
            })
            .collect()
    }
}

fn path_of(url: &str) -> String {
    Url::parse(url)
        .map(|u| u.path().to_string())
        .unwrap_or_else(|_| url.to_string())
}

#[async_trait]
impl Transport for MockTransport {
    async fn execute(&self, request: ApiRequest) -> Result<ApiResponse, TransportError> {
        let (json, body_len) = match request.body {
            RequestBody::Empty => (None, 0),
            RequestBody::Json(value) => (Some(value), 0),
            RequestBody::Stream { mut stream, .. } => {
                let mut total = 0u64;
                while let Some(chunk) = stream.next().await {
                    let chunk = chunk.map_err(|e| TransportError(e.to_string()))?;
                    total += chunk.len() as u64;
                }
                (None, total)
            }
        };

        self.requests.lock().unwrap().push(RecordedRequest {
            method: request.method.as_str(),
            url: request.url.clone(),
            headers: request.headers.clone(),
            json,
            body_len,
        });

        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some(Scripted::Respond(response)) => Ok(response),
            Some(Scripted::Fail(message)) => Err(TransportError(message)),
            None => Err(TransportError(format!(
                "no scripted reply for {} {}",
                request.method.as_str(),
                request.url
            ))),
        }
    }
}

/// Release payload shaped like the service's
pub fn release_json(id: u64, tag: &str, draft: bool, assets: &[(u64, &str)]) -> String {
    let assets: Vec<_> = assets
        .iter()
        .map(|(asset_id, name)| serde_json::json!({"id": asset_id, "name": name}))
        .collect();

    serde_json::json!({
        "id": id,
        "tag_name": tag,
        "url": format!("https://api.example.com/repos/octo/widget/releases/{}", id),
        "upload_url": format!(
            "https://uploads.example.com/repos/octo/widget/releases/{}/assets{{?name,label}}",
            id
        ),
        "html_url": format!("https://example.com/octo/widget/releases/tag/{}", tag),
        "name": tag,
        "body": null,
        "draft": draft,
        "prerelease": false,
        "assets": assets,
    })
    .to_string()
}

/// Valid configuration pointing at the fake service
pub fn test_config() -> PublishConfig {
    PublishConfig {
        api_url: "https://api.example.com".to_string(),
        token: Some(SecretString::new(TEST_TOKEN.into())),
        owner: Some("octo".to_string()),
        repo: Some("widget".to_string()),
        tag: Some("v1.0.0".to_string()),
        ..Default::default()
    }
}
