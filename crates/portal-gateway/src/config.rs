//! Configuration types and loading
//!
//! Config precedence: env vars > config file > defaults. The bootstrap
//! refresh token is loaded from the PORTAL_REFRESH_TOKEN env var or from
//! refresh_token_file, never stored in the TOML directly to avoid leaking
//! secrets.

use common::Secret;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Root configuration
#[derive(Debug, Deserialize)]
pub struct Config {
    pub api: ApiConfig,
    #[serde(default)]
    pub credentials: CredentialsConfig,
}

/// Portal API connection settings
#[derive(Debug, Deserialize)]
pub struct ApiConfig {
    pub base_url: String,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

/// Credential storage settings
#[derive(Debug, Default, Deserialize)]
pub struct CredentialsConfig {
    /// Credential file path; omit to keep the session in memory only.
    #[serde(default)]
    pub file: Option<PathBuf>,
    /// Path to a file containing the bootstrap refresh token (alternative
    /// to the PORTAL_REFRESH_TOKEN env var)
    #[serde(default)]
    pub refresh_token_file: Option<PathBuf>,
    /// Resolved bootstrap token; seeded into an empty store at wiring time.
    #[serde(skip)]
    pub bootstrap_refresh: Option<Secret<String>>,
}

fn default_timeout() -> u64 {
    30
}

impl Config {
    /// Load configuration from a TOML file, then overlay environment
    /// variables.
    ///
    /// Bootstrap refresh token resolution order:
    /// 1. PORTAL_REFRESH_TOKEN env var
    /// 2. refresh_token_file path from config
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&contents)?;

        // Validate base_url is a valid URL with http(s) scheme
        if !config.api.base_url.starts_with("http://")
            && !config.api.base_url.starts_with("https://")
        {
            return Err(common::Error::Config(format!(
                "base_url must start with http:// or https://, got: {}",
                config.api.base_url
            )));
        }

        // Validate timeout_secs is non-zero
        if config.api.timeout_secs == 0 {
            return Err(common::Error::Config(
                "timeout_secs must be greater than 0".into(),
            ));
        }

        // Resolve bootstrap token: env var takes precedence over file
        if let Ok(token) = std::env::var("PORTAL_REFRESH_TOKEN") {
            config.credentials.bootstrap_refresh = Some(Secret::new(token));
        } else if let Some(ref token_file) = config.credentials.refresh_token_file {
            let token = std::fs::read_to_string(token_file).map_err(|e| {
                common::Error::Config(format!(
                    "failed to read refresh_token_file {}: {e}",
                    token_file.display()
                ))
            })?;
            let token = token.trim().to_owned();
            if !token.is_empty() {
                config.credentials.bootstrap_refresh = Some(Secret::new(token));
            }
        }

        Ok(config)
    }

    /// Resolve config file path from CLI arg or CONFIG_PATH env var.
    pub fn resolve_path(cli_path: Option<&str>) -> PathBuf {
        if let Some(p) = cli_path {
            return PathBuf::from(p);
        }
        if let Ok(p) = std::env::var("CONFIG_PATH") {
            return PathBuf::from(p);
        }
        PathBuf::from("portal-gateway.toml")
    }
}
