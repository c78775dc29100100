//! Configuration file support.
//!
//! # Configuration File Format
//!
//! ```toml
//! [fetch]
//! isbn_timeout_secs = 15
//! keyword_timeout_secs = 6
//! min_delay_ms = 150
//! max_delay_ms = 900
//! rotation = "random"      # or "fixed"
//! fixed_profile = 0
//!
//! [[fetch.profiles]]
//! name = "chrome-windows"
//! user_agent = "Mozilla/5.0 ..."
//! accept_language = "zh-TW,zh;q=0.9"
//!
//! [chain]
//! step_timeout_secs = 45
//!
//! [fanout]
//! max_workers = 4
//! task_timeout_ms = 8000
//! overall_ceiling_ms = 10000
//! per_source_limit = 5
//!
//! [sources]
//! enabled = "momo,sanmin,books_com_tw,google_books"
//! disabled = ""
//!
//! [logging]
//! level = "info"
//! format = "json"
//! ```

use std::path::Path;

use super::{ConfigError, ResolverConfig};

/// Commented starting point written by `biblio-resolver config --init`
pub const CONFIG_TEMPLATE: &str = r#"# biblio-resolver configuration

[fetch]
isbn_timeout_secs = 15
keyword_timeout_secs = 6
min_delay_ms = 150
max_delay_ms = 900
# "random" picks a browser profile per request, "fixed" always uses fixed_profile
rotation = "random"
fixed_profile = 0

[chain]
step_timeout_secs = 45

[fanout]
max_workers = 4
task_timeout_ms = 8000
overall_ceiling_ms = 10000
per_source_limit = 5

[sources]
# enabled = "momo,sanmin,books_com_tw,google_books"
# disabled = ""

[logging]
level = "info"
# format = "json"
"#;

impl ResolverConfig {
    /// Load configuration from a TOML file, without environment overrides
    pub fn load_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io(e.to_string()))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))
    }

    /// Save configuration to a TOML file, creating parent directories
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = self.to_toml()?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Io(e.to_string()))?;
        }
        std::fs::write(path, content).map_err(|e| ConfigError::Io(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::Rotation;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn test_config_file_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let toml_content = r#"
[fetch]
isbn_timeout_secs = 12
rotation = "fixed"
fixed_profile = 1

[[fetch.profiles]]
name = "custom"
user_agent = "Mozilla/5.0 (X11; Linux x86_64) Custom/1.0"
accept_language = "zh-TW"

[fanout]
max_workers = 8
per_source_limit = 3

[sources]
enabled = "sanmin,google_books"

[logging]
level = "debug"
"#;

        let mut file = File::create(&path).unwrap();
        file.write_all(toml_content.as_bytes()).unwrap();

        let config = ResolverConfig::load_file(&path).unwrap();

        assert_eq!(config.fetch.isbn_timeout_secs, 12);
        assert_eq!(config.fetch.rotation, Rotation::Fixed);
        assert_eq!(config.fetch.profiles.len(), 1);
        assert_eq!(config.fetch.profiles[0].name, "custom");
        assert_eq!(config.fanout.max_workers, 8);
        assert_eq!(config.fanout.per_source_limit, 3);
        assert_eq!(config.fanout.task_timeout_ms, 8000);
        assert_eq!(config.sources.enabled.as_deref(), Some("sanmin,google_books"));
        assert_eq!(config.logging.level, "debug");

        // Index 1 is clamped into the single custom profile
        assert_eq!(config.fetch_settings().profiles.pick().name, "custom");
    }

    #[test]
    fn test_config_file_save_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = ResolverConfig::default();
        config.fanout.max_workers = 2;
        config.sources.disabled = Some("momo".to_string());

        config.save(&path).unwrap();

        let loaded = ResolverConfig::load_file(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_template_parses_to_defaults() {
        let config = ResolverConfig::from_toml(CONFIG_TEMPLATE).unwrap();
        assert_eq!(config, ResolverConfig::default());
    }

    #[test]
    fn test_config_file_nonexistent() {
        let result = ResolverConfig::load_file(Path::new("/nonexistent/config.toml"));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn test_config_file_invalid_toml() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("invalid.toml");

        std::fs::write(&path, "invalid = toml = content").unwrap();

        let result = ResolverConfig::load_file(&path);
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }
}
