use crate::error::TrawlerError;
use crate::policy::DEFAULT_POLICY;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable holding the DigitalOcean API token.
pub const TOKEN_ENV: &str = "DIGITALOCEAN_TOKEN";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrawlerConfig {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub cleanup: CleanupConfig,
}

/// Connection settings handed to the provider client at construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default = "default_per_page")]
    pub per_page: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            token: None,
            per_page: default_per_page(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanupConfig {
    #[serde(default = "default_policy")]
    pub default_policy: String,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            default_policy: default_policy(),
        }
    }
}

/// Location of the user config file, if the platform has a config dir.
#[must_use]
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("trawler/config.toml"))
}

/// Load config from `path`; a missing file yields defaults.
///
/// # Errors
///
/// Returns [`TrawlerError::Config`] if the file exists but cannot be read or parsed.
pub fn load_config(path: &Path) -> Result<TrawlerConfig, TrawlerError> {
    if !path.exists() {
        return Ok(TrawlerConfig::default());
    }

    let content = std::fs::read_to_string(path).map_err(|err| TrawlerError::Config {
        path: path.to_path_buf(),
        message: err.to_string(),
    })?;

    toml::from_str::<TrawlerConfig>(&content).map_err(|err| TrawlerError::Config {
        path: path.to_path_buf(),
        message: err.to_string(),
    })
}

/// Load the user config, or defaults when there is no config dir.
///
/// # Errors
///
/// Returns [`TrawlerError::Config`] if the file exists but is invalid.
pub fn load_user_config() -> Result<TrawlerConfig, TrawlerError> {
    user_config_path().map_or_else(|| Ok(TrawlerConfig::default()), |path| load_config(&path))
}

/// Overrides taken from CLI flags and the environment.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub token: Option<String>,
    pub base_url: Option<String>,
}

impl TrawlerConfig {
    /// Apply overrides; flags win over the environment, which wins over the file.
    #[must_use]
    pub fn with_overrides(mut self, overrides: Overrides, env_token: Option<String>) -> Self {
        if let Some(token) = overrides
            .token
            .or(env_token)
            .filter(|token| !token.trim().is_empty())
        {
            self.api.token = Some(token);
        }
        if let Some(base_url) = overrides.base_url {
            self.api.base_url = base_url;
        }
        self.api.base_url = self.api.base_url.trim_end_matches('/').to_string();
        self
    }
}

fn default_base_url() -> String {
    "https://api.digitalocean.com".to_string()
}

const fn default_per_page() -> u32 {
    200
}

const fn default_timeout_secs() -> u64 {
    30
}

fn default_policy() -> String {
    DEFAULT_POLICY.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_config_uses_defaults() {
        let dir = TempDir::new().expect("temp dir must be created");
        let cfg = load_config(&dir.path().join("config.toml")).expect("load should succeed");
        assert_eq!(cfg, TrawlerConfig::default());
        assert_eq!(cfg.api.base_url, "https://api.digitalocean.com");
        assert_eq!(cfg.api.per_page, 200);
        assert_eq!(cfg.cleanup.default_policy, "1r");
        assert!(cfg.api.token.is_none());
    }

    #[test]
    fn partial_config_fills_defaults() {
        let dir = TempDir::new().expect("temp dir must be created");
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[api]
token = "file-token"

[cleanup]
default_policy = "7d4w"
"#,
        )
        .expect("write config");

        let cfg = load_config(&path).expect("load should succeed");
        assert_eq!(cfg.api.token.as_deref(), Some("file-token"));
        assert_eq!(cfg.api.timeout_secs, 30);
        assert_eq!(cfg.cleanup.default_policy, "7d4w");
    }

    #[test]
    fn malformed_config_is_an_error() {
        let dir = TempDir::new().expect("temp dir must be created");
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[api\nper_page = 'many'").expect("write config");

        let err = load_config(&path).expect_err("must fail");
        assert!(matches!(err, TrawlerError::Config { .. }));
    }

    #[test]
    fn flag_token_beats_env_and_file() {
        let mut cfg = TrawlerConfig::default();
        cfg.api.token = Some("file".into());

        let merged = cfg.clone().with_overrides(
            Overrides {
                token: Some("flag".into()),
                base_url: None,
            },
            Some("env".into()),
        );
        assert_eq!(merged.api.token.as_deref(), Some("flag"));

        let merged = cfg.clone().with_overrides(Overrides::default(), Some("env".into()));
        assert_eq!(merged.api.token.as_deref(), Some("env"));

        let merged = cfg.with_overrides(Overrides::default(), Some("  ".into()));
        assert_eq!(merged.api.token.as_deref(), Some("file"));
    }

    #[test]
    fn base_url_override_drops_trailing_slash() {
        let merged = TrawlerConfig::default().with_overrides(
            Overrides {
                token: None,
                base_url: Some("http://127.0.0.1:9000/".into()),
            },
            None,
        );
        assert_eq!(merged.api.base_url, "http://127.0.0.1:9000");
    }
}
