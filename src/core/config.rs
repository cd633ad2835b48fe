//! Configuration structures and types for publish-release
//!
//! `ConfigFile` is the serde-facing, layered shape read from YAML files and
//! the environment. `PublishConfig` is the immutable value one publish
//! operation runs against.

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default API root of the release-hosting service
pub const DEFAULT_API_URL: &str = "https://api.github.com";

/// Default number of delete-then-retry rounds per conflicting asset
pub const DEFAULT_MAX_DUPLICATE_RETRIES: u32 = 1;

/// Layered configuration as read from `.publish-release.yaml`
///
/// Every field is optional so that several layers can be merged.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConfigFile {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    /// Credential token, usually `${GITHUB_TOKEN}`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub repo: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_commitish: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub draft: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub prerelease: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub assets: Option<Vec<PathBuf>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub reuse_release: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub reuse_draft_only: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip_if_published: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub edit_release: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub delete_empty_tag: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip_assets_check: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip_duplicated_assets: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_duplicate_retries: Option<u32>,
}

/// Everything one publish operation needs, fixed before it starts
#[derive(Debug)]
pub struct PublishConfig {
    /// API root, e.g. `https://api.github.com`
    pub api_url: String,

    /// Pre-obtained credential token
    pub token: Option<SecretString>,

    pub owner: Option<String>,
    pub repo: Option<String>,
    pub tag: Option<String>,

    pub target_commitish: Option<String>,
    pub name: Option<String>,
    pub notes: Option<String>,
    pub draft: bool,
    pub prerelease: bool,

    /// Asset files, uploaded in this order
    pub assets: Vec<PathBuf>,

    /// Reuse a release whose tag matches instead of creating one
    pub reuse_release: bool,

    /// Only reuse drafts
    pub reuse_draft_only: bool,

    /// Do nothing when a matching release exists but may not be reused
    pub skip_if_published: bool,

    /// Patch a reused release with the configured metadata
    pub edit_release: bool,

    /// Delete the tag when an edit turns a published release into a draft
    pub delete_empty_tag: bool,

    pub skip_assets_check: bool,

    /// Keep existing assets instead of replacing them on conflict
    pub skip_duplicated_assets: bool,

    /// Delete-then-retry rounds allowed per conflicting asset
    pub max_duplicate_retries: u32,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            token: None,
            owner: None,
            repo: None,
            tag: None,
            target_commitish: None,
            name: None,
            notes: None,
            draft: false,
            prerelease: false,
            assets: Vec::new(),
            reuse_release: false,
            reuse_draft_only: false,
            skip_if_published: false,
            edit_release: false,
            delete_empty_tag: false,
            skip_assets_check: false,
            skip_duplicated_assets: false,
            max_duplicate_retries: DEFAULT_MAX_DUPLICATE_RETRIES,
        }
    }
}

impl PublishConfig {
    /// Names of the required options that are absent or empty
    ///
    /// Order is stable: token, repo, owner, tag.
    pub fn missing_fields(&self) -> Vec<String> {
        use secrecy::ExposeSecret;

        let token_present = self
            .token
            .as_ref()
            .is_some_and(|t| !t.expose_secret().trim().is_empty());

        let checks = [
            ("token", token_present),
            ("repo", is_present(&self.repo)),
            ("owner", is_present(&self.owner)),
            ("tag", is_present(&self.tag)),
        ];

        checks
            .iter()
            .filter(|(_, present)| !present)
            .map(|(name, _)| name.to_string())
            .collect()
    }

    /// Configured tag, empty when absent
    pub fn tag_name(&self) -> &str {
        self.tag.as_deref().unwrap_or_default()
    }
}

impl From<ConfigFile> for PublishConfig {
    fn from(file: ConfigFile) -> Self {
        let defaults = PublishConfig::default();

        Self {
            api_url: file.api_url.unwrap_or(defaults.api_url),
            token: file.token.map(|t| SecretString::new(t.into())),
            owner: file.owner,
            repo: file.repo,
            tag: file.tag,
            target_commitish: file.target_commitish,
            name: file.name,
            notes: file.notes,
            draft: file.draft.unwrap_or(false),
            prerelease: file.prerelease.unwrap_or(false),
            assets: file.assets.unwrap_or_default(),
            reuse_release: file.reuse_release.unwrap_or(false),
            reuse_draft_only: file.reuse_draft_only.unwrap_or(false),
            skip_if_published: file.skip_if_published.unwrap_or(false),
            edit_release: file.edit_release.unwrap_or(false),
            delete_empty_tag: file.delete_empty_tag.unwrap_or(false),
            skip_assets_check: file.skip_assets_check.unwrap_or(false),
            skip_duplicated_assets: file.skip_duplicated_assets.unwrap_or(false),
            max_duplicate_retries: file
                .max_duplicate_retries
                .unwrap_or(defaults.max_duplicate_retries),
        }
    }
}

fn is_present(value: &Option<String>) -> bool {
    value.as_ref().is_some_and(|v| !v.trim().is_empty())
}
