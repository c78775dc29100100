//! Configuration management.
//!
//! Settings come from, in increasing precedence: built-in defaults, a TOML file
//! and `BIBLIO_RESOLVER_*` environment variables (`__` separates nesting, e.g.
//! `BIBLIO_RESOLVER_FANOUT__MAX_WORKERS=2`).

mod file_config;

pub use file_config::CONFIG_TEMPLATE;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::resolver::{ChainSettings, FanoutSettings, ResolverSettings};
use crate::sources::SourceSelection;
use crate::utils::{default_profiles, BrowserProfile, FetchSettings, Pacing, ProfilePool, Rotation};

/// File name looked up in the working directory
pub const LOCAL_CONFIG_FILE: &str = "biblio-resolver.toml";

const ENV_PREFIX: &str = "BIBLIO_RESOLVER";

/// Application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResolverConfig {
    #[serde(default)]
    pub fetch: FetchConfig,

    #[serde(default)]
    pub chain: ChainConfig,

    #[serde(default)]
    pub fanout: FanoutConfig,

    #[serde(default)]
    pub sources: SourcesConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Fetch client settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Per-request timeout for ISBN lookups
    #[serde(default = "default_isbn_timeout")]
    pub isbn_timeout_secs: u64,

    /// Per-request timeout for keyword searches
    #[serde(default = "default_keyword_timeout")]
    pub keyword_timeout_secs: u64,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Lower bound of the random delay before each disguised request
    #[serde(default = "default_min_delay")]
    pub min_delay_ms: u64,

    #[serde(default = "default_max_delay")]
    pub max_delay_ms: u64,

    #[serde(default)]
    pub rotation: Rotation,

    /// Profile index used when `rotation = "fixed"`
    #[serde(default)]
    pub fixed_profile: usize,

    /// Replaces the built-in browser profiles when non-empty
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub profiles: Vec<BrowserProfile>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            isbn_timeout_secs: default_isbn_timeout(),
            keyword_timeout_secs: default_keyword_timeout(),
            connect_timeout_secs: default_connect_timeout(),
            min_delay_ms: default_min_delay(),
            max_delay_ms: default_max_delay(),
            rotation: Rotation::default(),
            fixed_profile: 0,
            profiles: Vec::new(),
        }
    }
}

fn default_isbn_timeout() -> u64 {
    15
}

fn default_keyword_timeout() -> u64 {
    6
}

fn default_connect_timeout() -> u64 {
    5
}

fn default_min_delay() -> u64 {
    150
}

fn default_max_delay() -> u64 {
    900
}

/// ISBN chain settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainConfig {
    /// Upper bound on one source's lookup, all of its requests included
    #[serde(default = "default_step_timeout")]
    pub step_timeout_secs: u64,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            step_timeout_secs: default_step_timeout(),
        }
    }
}

fn default_step_timeout() -> u64 {
    45
}

/// Keyword fan-out settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FanoutConfig {
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,

    #[serde(default = "default_task_timeout")]
    pub task_timeout_ms: u64,

    #[serde(default = "default_overall_ceiling")]
    pub overall_ceiling_ms: u64,

    #[serde(default = "default_per_source_limit")]
    pub per_source_limit: usize,
}

impl Default for FanoutConfig {
    fn default() -> Self {
        Self {
            max_workers: default_max_workers(),
            task_timeout_ms: default_task_timeout(),
            overall_ceiling_ms: default_overall_ceiling(),
            per_source_limit: default_per_source_limit(),
        }
    }
}

fn default_max_workers() -> usize {
    4
}

fn default_task_timeout() -> u64 {
    8000
}

fn default_overall_ceiling() -> u64 {
    10_000
}

fn default_per_source_limit() -> usize {
    5
}

/// Sources configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourcesConfig {
    /// Comma-separated ids; only these sources are used
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<String>,

    /// Comma-separated ids; never used, even if enabled
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disabled: Option<String>,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// `"json"` for structured output
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Serialize error: {0}")]
    Serialize(String),
}

impl ResolverConfig {
    /// Fetch client settings derived from `[fetch]`
    pub fn fetch_settings(&self) -> FetchSettings {
        let fetch = &self.fetch;
        let profiles = if fetch.profiles.is_empty() {
            default_profiles()
        } else {
            fetch.profiles.clone()
        };

        FetchSettings {
            isbn_timeout: Duration::from_secs(fetch.isbn_timeout_secs),
            keyword_timeout: Duration::from_secs(fetch.keyword_timeout_secs),
            connect_timeout: Duration::from_secs(fetch.connect_timeout_secs),
            pacing: Pacing::new(
                Duration::from_millis(fetch.min_delay_ms),
                Duration::from_millis(fetch.max_delay_ms),
            ),
            profiles: ProfilePool::new(profiles, fetch.rotation, fetch.fixed_profile),
        }
    }

    /// Chain and fan-out limits derived from `[chain]` and `[fanout]`
    pub fn resolver_settings(&self) -> ResolverSettings {
        ResolverSettings {
            chain: ChainSettings {
                step_timeout: Duration::from_secs(self.chain.step_timeout_secs),
            },
            fanout: FanoutSettings {
                max_workers: self.fanout.max_workers,
                task_timeout: Duration::from_millis(self.fanout.task_timeout_ms),
                overall_ceiling: Duration::from_millis(self.fanout.overall_ceiling_ms),
                per_source_limit: self.fanout.per_source_limit,
            },
        }
    }

    /// Source selection from `[sources]`
    pub fn source_selection(&self) -> SourceSelection {
        SourceSelection::from_lists(
            self.sources.enabled.as_deref(),
            self.sources.disabled.as_deref(),
        )
    }
}

/// Load configuration from an optional file plus environment overrides
pub fn load_config(path: Option<&Path>) -> Result<ResolverConfig, ConfigError> {
    let mut builder = config::Config::builder();
    if let Some(path) = path {
        builder = builder.add_source(config::File::from(path));
    }

    let settings = builder
        .add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    Ok(settings.try_deserialize()?)
}

/// Look for a configuration file in the usual places.
///
/// `./biblio-resolver.toml` first, then `<config_dir>/biblio-resolver/config.toml`.
pub fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from(LOCAL_CONFIG_FILE);
    if local.is_file() {
        return Some(local);
    }

    let user = user_config_path()?;
    user.is_file().then_some(user)
}

/// `<config_dir>/biblio-resolver/config.toml`, whether or not it exists
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("biblio-resolver").join("config.toml"))
}

/// Get the default configuration (defaults plus environment overrides)
pub fn get_config() -> ResolverConfig {
    load_config(None).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "ignoring invalid environment configuration");
        ResolverConfig::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = ResolverConfig::default();
        assert_eq!(config.fetch.isbn_timeout_secs, 15);
        assert_eq!(config.fetch.keyword_timeout_secs, 6);
        assert_eq!(config.fanout.max_workers, 4);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_fetch_settings_conversion() {
        let mut config = ResolverConfig::default();
        config.fetch.rotation = Rotation::Fixed;
        config.fetch.fixed_profile = 3;

        let settings = config.fetch_settings();
        assert_eq!(settings.isbn_timeout, Duration::from_secs(15));
        assert_eq!(settings.pacing.min, Duration::from_millis(150));
        assert_eq!(settings.profiles.pick().name, "safari-macos");
    }

    #[test]
    fn test_resolver_settings_conversion() {
        let mut config = ResolverConfig::default();
        config.fanout.overall_ceiling_ms = 2500;

        let settings = config.resolver_settings();
        assert_eq!(settings.fanout.overall_ceiling, Duration::from_millis(2500));
        assert_eq!(settings.fanout.task_timeout, Duration::from_millis(8000));
        assert_eq!(settings.chain.step_timeout, Duration::from_secs(45));
    }

    #[test]
    fn test_load_config_from_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[fetch]
keyword_timeout_secs = 5
rotation = "fixed"

[fanout]
max_workers = 2

[sources]
disabled = "momo"
"#,
        )
        .unwrap();

        let config = load_config(Some(path.as_path())).unwrap();
        assert_eq!(config.fetch.keyword_timeout_secs, 5);
        assert_eq!(config.fetch.isbn_timeout_secs, 15);
        assert_eq!(config.fetch.rotation, Rotation::Fixed);
        assert_eq!(config.fanout.max_workers, 2);
        assert!(!config.source_selection().allows("momo"));
        assert!(config.source_selection().allows("sanmin"));
    }

    #[test]
    fn test_load_config_missing_file() {
        let result = load_config(Some(Path::new("/nonexistent/biblio-resolver.toml")));
        assert!(matches!(result, Err(ConfigError::Load(_))));
    }
}
