//! Configuration file loader for publish-release
//!
//! This module provides configuration loading, merging and `${VAR}`
//! expansion capabilities.

use super::config::*;
use crate::core::error::PublishError;
use regex::Regex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Configuration file name
pub const CONFIG_FILENAME: &str = ".publish-release.yaml";

/// Environment variable pattern (${VAR_NAME})
const ENV_VAR_PATTERN: &str = r"\$\{([A-Z_][A-Z0-9_]*)\}";

/// Configuration load options
#[derive(Debug, Clone, Default)]
pub struct ConfigLoadOptions {
    /// Project path to load config from
    pub project_path: PathBuf,

    /// Home directory holding the global config, if any
    pub home_dir: Option<PathBuf>,

    /// CLI arguments (highest priority)
    pub cli_args: Option<ConfigFile>,

    /// Environment variables
    pub env: HashMap<String, String>,
}

impl ConfigLoadOptions {
    /// Options reading the process environment and `$HOME`
    pub fn from_process_env(project_path: PathBuf, cli_args: Option<ConfigFile>) -> Self {
        let env: HashMap<String, String> = std::env::vars().collect();
        let home_dir = env.get("HOME").map(PathBuf::from);

        Self {
            project_path,
            home_dir,
            cli_args,
            env,
        }
    }
}

/// Configuration file loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from multiple sources with priority
    ///
    /// Priority (high to low):
    /// 1. CLI arguments
    /// 2. Environment variables
    /// 3. Project config (./.publish-release.yaml)
    /// 4. Global config (~/.publish-release.yaml)
    /// 5. Default values
    pub async fn load(options: ConfigLoadOptions) -> Result<PublishConfig, PublishError> {
        let mut configs: Vec<ConfigFile> = Vec::new();

        if let Some(home_dir) = &options.home_dir {
            let global_path = home_dir.join(CONFIG_FILENAME);
            if let Some(global_config) = Self::load_config_file(&global_path).await? {
                configs.push(Self::expand_env_vars(global_config, &options.env));
            }
        }

        if let Some(project_config) =
            Self::load_config_file(&options.project_path.join(CONFIG_FILENAME)).await?
        {
            configs.push(Self::expand_env_vars(project_config, &options.env));
        }

        if let Some(env_config) = Self::load_env_config(&options.env) {
            configs.push(env_config);
        }

        if let Some(cli_config) = options.cli_args {
            configs.push(cli_config);
        }

        let merged = Self::merge_configs(configs);
        log::debug!(
            "Loaded configuration for {}/{}",
            merged.owner.as_deref().unwrap_or("?"),
            merged.repo.as_deref().unwrap_or("?")
        );

        Ok(PublishConfig::from(merged))
    }

    /// Load configuration from a YAML file, `None` when it does not exist
    async fn load_config_file(file_path: &Path) -> Result<Option<ConfigFile>, PublishError> {
        if !fs::try_exists(file_path).await.unwrap_or(false) {
            return Ok(None);
        }

        let content = fs::read_to_string(file_path).await.map_err(|e| {
            PublishError::ConfigError(format!(
                "Failed to read config file {}: {}",
                file_path.display(),
                e
            ))
        })?;

        let config: ConfigFile = serde_yaml::from_str(&content).map_err(|e| {
            PublishError::ConfigError(format!(
                "Failed to parse YAML config {}: {}",
                file_path.display(),
                e
            ))
        })?;

        Ok(Some(config))
    }

    /// Load configuration from environment variables
    fn load_env_config(env: &HashMap<String, String>) -> Option<ConfigFile> {
        let mut config = ConfigFile::default();
        let mut has_changes = false;

        // GITHUB_TOKEN wins over GH_TOKEN
        if let Some(token) = env.get("GITHUB_TOKEN").or_else(|| env.get("GH_TOKEN")) {
            config.token = Some(token.clone());
            has_changes = true;
        }

        if let Some(api_url) = env.get("GITHUB_API_URL") {
            config.api_url = Some(api_url.clone());
            has_changes = true;
        }

        if let Some(owner) = env.get("PUBLISH_RELEASE_OWNER") {
            config.owner = Some(owner.clone());
            has_changes = true;
        }

        if let Some(repo) = env.get("PUBLISH_RELEASE_REPO") {
            config.repo = Some(repo.clone());
            has_changes = true;
        }

        if has_changes { Some(config) } else { None }
    }

    /// Merge multiple configurations, later entries win
    fn merge_configs(configs: Vec<ConfigFile>) -> ConfigFile {
        let mut result = ConfigFile::default();

        for config in configs {
            Self::merge_into(&mut result, config);
        }

        result
    }

    /// Merge source config into target
    fn merge_into(target: &mut ConfigFile, source: ConfigFile) {
        macro_rules! take {
            ($($field:ident),* $(,)?) => {
                $(
                    if source.$field.is_some() {
                        target.$field = source.$field;
                    }
                )*
            };
        }

        take!(
            api_url,
            token,
            owner,
            repo,
            tag,
            target_commitish,
            name,
            notes,
            draft,
            prerelease,
            assets,
            reuse_release,
            reuse_draft_only,
            skip_if_published,
            edit_release,
            delete_empty_tag,
            skip_assets_check,
            skip_duplicated_assets,
            max_duplicate_retries,
        );
    }

    /// Expand `${VAR}` references in the fields that usually carry them
    fn expand_env_vars(mut config: ConfigFile, env: &HashMap<String, String>) -> ConfigFile {
        if let Some(token) = &config.token {
            config.token = Some(Self::expand_string(token, env));
        }
        if let Some(api_url) = &config.api_url {
            config.api_url = Some(Self::expand_string(api_url, env));
        }

        config
    }

    /// Expand environment variables in a single string
    ///
    /// Unknown variables are left in place.
    fn expand_string(input: &str, env: &HashMap<String, String>) -> String {
        let Ok(env_var_regex) = Regex::new(ENV_VAR_PATTERN) else {
            return input.to_string();
        };

        let mut result = input.to_string();
        for cap in env_var_regex.captures_iter(input) {
            let var_name = &cap[1];

            if let Some(value) = env.get(var_name) {
                result = result.replace(&format!("${{{}}}", var_name), value);
            } else {
                log::warn!("Environment variable {} not found", var_name);
            }
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use tempfile::TempDir;

    #[test]
    fn test_load_env_config() {
        let mut env = HashMap::new();
        env.insert("GH_TOKEN".to_string(), "gh-token".to_string());
        env.insert("GITHUB_API_URL".to_string(), "https://ghe.example.com/api/v3".to_string());
        env.insert("PUBLISH_RELEASE_OWNER".to_string(), "octo".to_string());

        let config = ConfigLoader::load_env_config(&env).unwrap();

        assert_eq!(config.token.as_deref(), Some("gh-token"));
        assert_eq!(config.api_url.as_deref(), Some("https://ghe.example.com/api/v3"));
        assert_eq!(config.owner.as_deref(), Some("octo"));
        assert!(config.repo.is_none());
    }

    #[test]
    fn test_github_token_preferred_over_gh_token() {
        let mut env = HashMap::new();
        env.insert("GH_TOKEN".to_string(), "second".to_string());
        env.insert("GITHUB_TOKEN".to_string(), "first".to_string());

        let config = ConfigLoader::load_env_config(&env).unwrap();
        assert_eq!(config.token.as_deref(), Some("first"));
    }

    #[test]
    fn test_empty_env_yields_nothing() {
        assert!(ConfigLoader::load_env_config(&HashMap::new()).is_none());
    }

    #[test]
    fn test_expand_string() {
        let mut env = HashMap::new();
        env.insert("RELEASE_TOKEN".to_string(), "secret123".to_string());

        let result = ConfigLoader::expand_string("${RELEASE_TOKEN}", &env);
        assert_eq!(result, "secret123");

        let result = ConfigLoader::expand_string("${UNKNOWN_VAR}", &env);
        assert_eq!(result, "${UNKNOWN_VAR}");
    }

    #[test]
    fn test_merge_configs_later_wins() {
        let base = ConfigFile {
            owner: Some("base-owner".to_string()),
            repo: Some("base-repo".to_string()),
            draft: Some(true),
            ..Default::default()
        };
        let overlay = ConfigFile {
            repo: Some("overlay-repo".to_string()),
            draft: Some(false),
            ..Default::default()
        };

        let merged = ConfigLoader::merge_configs(vec![base, overlay]);

        assert_eq!(merged.owner.as_deref(), Some("base-owner"));
        assert_eq!(merged.repo.as_deref(), Some("overlay-repo"));
        assert_eq!(merged.draft, Some(false));
    }

    #[tokio::test]
    async fn test_load_with_priorities() {
        let project = TempDir::new().unwrap();
        let home = TempDir::new().unwrap();

        fs::write(
            home.path().join(CONFIG_FILENAME),
            "owner: global-owner\nrepo: global-repo\n",
        )
        .await
        .unwrap();
        fs::write(
            project.path().join(CONFIG_FILENAME),
            "repo: project-repo\ntoken: ${RELEASE_TOKEN}\ntag: v0.1.0\n",
        )
        .await
        .unwrap();

        let mut env = HashMap::new();
        env.insert("RELEASE_TOKEN".to_string(), "expanded-token".to_string());

        let options = ConfigLoadOptions {
            project_path: project.path().to_path_buf(),
            home_dir: Some(home.path().to_path_buf()),
            cli_args: Some(ConfigFile {
                tag: Some("v9.9.9".to_string()),
                ..Default::default()
            }),
            env,
        };

        let config = ConfigLoader::load(options).await.unwrap();

        assert_eq!(config.owner.as_deref(), Some("global-owner"));
        assert_eq!(config.repo.as_deref(), Some("project-repo"));
        assert_eq!(config.tag.as_deref(), Some("v9.9.9"));
        assert_eq!(config.token.unwrap().expose_secret(), "expanded-token");
    }

    #[tokio::test]
    async fn test_load_without_files() {
        let project = TempDir::new().unwrap();

        let options = ConfigLoadOptions {
            project_path: project.path().to_path_buf(),
            ..Default::default()
        };

        let config = ConfigLoader::load(options).await.unwrap();
        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert!(config.token.is_none());
    }

    #[tokio::test]
    async fn test_load_rejects_invalid_yaml() {
        let project = TempDir::new().unwrap();
        fs::write(project.path().join(CONFIG_FILENAME), "draft: [not-a-bool")
            .await
            .unwrap();

        let options = ConfigLoadOptions {
            project_path: project.path().to_path_buf(),
            ..Default::default()
        };

        let error = ConfigLoader::load(options).await.unwrap_err();
        assert_eq!(error.code(), "CONFIG_ERROR");
    }
}
