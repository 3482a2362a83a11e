//! Configuration loading
//!
//! Bootstrap configuration lives in a single TOML file. The file is located
//! in priority order:
//! 1. Command-line argument (highest priority)
//! 2. `NRS_CONFIG` environment variable
//! 3. Platform config directory (`~/.config/nrs/config.toml` on Linux)
//! 4. Compiled defaults (fallback)
//!
//! A missing file is never fatal unless it was named explicitly on the
//! command line: the loader logs a warning and continues with defaults.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming the configuration file
pub const CONFIG_ENV_VAR: &str = "NRS_CONFIG";

/// Environment variable holding a MyAnimeList access token
pub const MAL_TOKEN_ENV_VAR: &str = "NRS_MAL_TOKEN";

/// Environment variable holding an AniList access token
pub const ANILIST_TOKEN_ENV_VAR: &str = "NRS_ANILIST_TOKEN";

/// Bootstrap configuration loaded from TOML
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    pub logging: LoggingConfig,
    pub resolution: ResolutionConfig,
    pub providers: ProviderConfig,
    pub tokens: TokenConfig,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error); `RUST_LOG` overrides
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Metadata resolution tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolutionConfig {
    /// Decay constant for source freshness, in days
    pub tau_days: f64,
}

impl Default for ResolutionConfig {
    fn default() -> Self {
        Self { tau_days: 30.0 }
    }
}

/// HTTP settings shared by all provider adapters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub user_agent: String,
    pub request_timeout_secs: u64,
    pub mal_requests_per_second: u32,
    pub anilist_requests_per_second: u32,
    pub find_my_anime_requests_per_second: u32,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            user_agent: format!("nrs-meta/{}", env!("CARGO_PKG_VERSION")),
            request_timeout_secs: 30,
            mal_requests_per_second: 1,
            anilist_requests_per_second: 1,
            find_my_anime_requests_per_second: 2,
        }
    }
}

/// Provider access tokens (environment variables take precedence)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenConfig {
    pub myanimelist: Option<String>,
    pub anilist: Option<String>,
}

/// Token-bearing providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    MyAnimeList,
    AniList,
}

impl TokenKind {
    pub fn env_var(self) -> &'static str {
        match self {
            TokenKind::MyAnimeList => MAL_TOKEN_ENV_VAR,
            TokenKind::AniList => ANILIST_TOKEN_ENV_VAR,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl TomlConfig {
    /// Parse configuration text and validate it
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: TomlConfig = toml::from_str(content)
            .map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the rest of the system cannot work with
    pub fn validate(&self) -> Result<()> {
        if !self.resolution.tau_days.is_finite() || self.resolution.tau_days <= 0.0 {
            return Err(Error::Config(format!(
                "resolution.tau_days must be a positive number, got {}",
                self.resolution.tau_days
            )));
        }
        if self.providers.request_timeout_secs == 0 {
            return Err(Error::Config(
                "providers.request_timeout_secs must be greater than zero".to_string(),
            ));
        }
        let rates = [
            ("mal_requests_per_second", self.providers.mal_requests_per_second),
            ("anilist_requests_per_second", self.providers.anilist_requests_per_second),
            (
                "find_my_anime_requests_per_second",
                self.providers.find_my_anime_requests_per_second,
            ),
        ];
        if let Some((name, _)) = rates.iter().find(|(_, rate)| *rate == 0) {
            return Err(Error::Config(format!(
                "providers.{} must be greater than zero",
                name
            )));
        }
        Ok(())
    }

    /// Resolve an access token
    ///
    /// **Priority:** ENV → TOML
    pub fn resolve_token(&self, kind: TokenKind) -> Option<String> {
        let env_token = std::env::var(kind.env_var()).ok().filter(|t| is_valid_key(t));
        let toml_token = match kind {
            TokenKind::MyAnimeList => self.tokens.myanimelist.as_ref(),
            TokenKind::AniList => self.tokens.anilist.as_ref(),
        }
        .filter(|t| is_valid_key(t))
        .cloned();

        match (env_token, toml_token) {
            (Some(env), Some(_)) => {
                warn!(
                    "{:?} token found in both {} and TOML config. Using environment.",
                    kind,
                    kind.env_var()
                );
                Some(env)
            }
            (Some(env), None) => Some(env),
            (None, Some(toml)) => Some(toml),
            (None, None) => None,
        }
    }
}

/// Validate a key or token (non-empty, non-whitespace)
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}

/// Locates and loads the bootstrap TOML file
#[derive(Debug, Clone, Default)]
pub struct ConfigResolver {
    cli_path: Option<PathBuf>,
}

impl ConfigResolver {
    pub fn new(cli_path: Option<PathBuf>) -> Self {
        Self { cli_path }
    }

    /// Candidate config path following the documented priority order
    pub fn config_path(&self) -> Option<PathBuf> {
        if let Some(path) = &self.cli_path {
            return Some(path.clone());
        }

        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            if !path.trim().is_empty() {
                return Some(PathBuf::from(path));
            }
        }

        default_config_path()
    }

    /// Load configuration, falling back to compiled defaults
    pub fn load(&self) -> Result<TomlConfig> {
        let Some(path) = self.config_path() else {
            warn!("Could not determine config directory, using defaults");
            return Ok(TomlConfig::default());
        };

        if !path.exists() {
            if self.cli_path.is_some() {
                return Err(Error::Config(format!(
                    "Config file not found: {}",
                    path.display()
                )));
            }
            warn!("Config file {} not found, using defaults", path.display());
            return Ok(TomlConfig::default());
        }

        let config = load_toml_config(&path)?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }
}

/// Read and validate a TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read TOML {} failed: {}", path.display(), e)))?;
    TomlConfig::from_toml_str(&content)
}

/// Platform default config location
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("nrs").join("config.toml"))
}
