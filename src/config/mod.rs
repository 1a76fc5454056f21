//! Configuration management.
//!
//! Values come from, in increasing precedence: built-in defaults, a TOML
//! file, and `GUILDSYNC_*` environment variables.

use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Main configuration for guildsync.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GuildSyncConfig {
    /// Listing cache settings.
    pub cache: CacheSettings,
    /// Platform API settings.
    pub platform: PlatformSettings,
    /// Registration database settings.
    pub storage: StorageSettings,
    /// Logging settings.
    pub logging: LoggingSettings,
}

/// Listing cache settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheSettings {
    /// Seconds a cached listing stays fresh.
    pub ttl_secs: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self { ttl_secs: 300 }
    }
}

/// Platform API settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformSettings {
    /// REST API base URL.
    pub api_base_url: String,
    /// CDN base URL for guild icons.
    pub cdn_base_url: String,
    /// Requested icon edge length in pixels.
    pub icon_size: u32,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for PlatformSettings {
    fn default() -> Self {
        Self {
            api_base_url: "https://discord.com/api/v10".to_string(),
            cdn_base_url: "https://cdn.discordapp.com".to_string(),
            icon_size: 128,
            timeout_secs: 10,
        }
    }
}

/// Registration database settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StorageSettings {
    /// `SQLite` database path. Defaults to the user data directory.
    pub database_path: Option<PathBuf>,
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingSettings {
    /// Output format: "pretty" or "json".
    pub format: String,
    /// Filter directive used when `RUST_LOG` is unset.
    pub level: Option<String>,
    /// Optional log file; stderr when unset.
    pub file: Option<PathBuf>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            format: "pretty".to_string(),
            level: None,
            file: None,
        }
    }
}

/// Configuration file structure (for TOML parsing).
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    /// Cache section.
    pub cache: Option<ConfigFileCache>,
    /// Platform section.
    pub platform: Option<ConfigFilePlatform>,
    /// Storage section.
    pub storage: Option<ConfigFileStorage>,
    /// Logging section.
    pub logging: Option<ConfigFileLogging>,
}

/// Cache section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileCache {
    /// TTL in seconds.
    pub ttl_secs: Option<u64>,
}

/// Platform section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFilePlatform {
    /// API base URL.
    pub api_base_url: Option<String>,
    /// CDN base URL.
    pub cdn_base_url: Option<String>,
    /// Icon size.
    pub icon_size: Option<u32>,
    /// Timeout in seconds.
    pub timeout_secs: Option<u64>,
}

/// Storage section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileStorage {
    /// Database path.
    pub database_path: Option<String>,
}

/// Logging section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileLogging {
    /// Format.
    pub format: Option<String>,
    /// Level.
    pub level: Option<String>,
    /// File.
    pub file: Option<String>,
}

impl GuildSyncConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_from_file(path: &Path) -> crate::Result<Self> {
        let contents =
            std::fs::read_to_string(path).map_err(|e| crate::Error::OperationFailed {
                operation: "read_config_file".to_string(),
                cause: e.to_string(),
            })?;

        Self::parse(&contents)
    }

    /// Parses configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not valid configuration TOML.
    pub fn parse(contents: &str) -> crate::Result<Self> {
        let file: ConfigFile =
            toml::from_str(contents).map_err(|e| crate::Error::OperationFailed {
                operation: "parse_config_file".to_string(),
                cause: e.to_string(),
            })?;

        Ok(Self::from_config_file(file))
    }

    /// Loads configuration from the default location.
    ///
    /// Checks the following paths in order:
    /// 1. Platform-specific config dir (`~/Library/Application Support/guildsync/` on macOS)
    /// 2. XDG config dir (`~/.config/guildsync/` for Unix compatibility)
    ///
    /// Returns default configuration if neither file exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the first existing file cannot be read or parsed.
    pub fn load_default() -> crate::Result<Self> {
        let xdg_config = directories::BaseDirs::new().map(|base| {
            base.home_dir()
                .join(".config")
                .join("guildsync")
                .join("config.toml")
        });

        Self::load_first(Self::default_path().into_iter().chain(xdg_config))
    }

    /// Loads the first candidate that exists, or defaults if none does.
    fn load_first(candidates: impl IntoIterator<Item = PathBuf>) -> crate::Result<Self> {
        candidates
            .into_iter()
            .find(|path| path.exists())
            .map_or_else(|| Ok(Self::default()), |path| Self::load_from_file(&path))
    }

    /// Default config file path.
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "guildsync")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Applies `GUILDSYNC_*` environment overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if a numeric override does not parse.
    pub fn with_env_overrides(self) -> crate::Result<Self> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Applies overrides looked up through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns an error if a numeric override does not parse.
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> crate::Result<Self> {
        if let Some(ttl) = lookup("GUILDSYNC_CACHE_TTL_SECS") {
            self.cache.ttl_secs = ttl.trim().parse().map_err(|e| {
                crate::Error::InvalidInput(format!("GUILDSYNC_CACHE_TTL_SECS={ttl:?}: {e}"))
            })?;
        }
        if let Some(url) = lookup("GUILDSYNC_PLATFORM_API_URL") {
            self.platform.api_base_url = url;
        }
        if let Some(path) = lookup("GUILDSYNC_DATABASE_PATH") {
            self.storage.database_path = Some(PathBuf::from(path));
        }
        if let Some(format) = lookup("GUILDSYNC_LOG_FORMAT") {
            self.logging.format = format;
        }
        if let Some(level) = lookup("GUILDSYNC_LOG_LEVEL") {
            self.logging.level = Some(level);
        }
        Ok(self)
    }

    /// Converts a `ConfigFile` to `GuildSyncConfig`.
    fn from_config_file(file: ConfigFile) -> Self {
        let mut config = Self::default();

        if let Some(cache) = file.cache {
            if let Some(ttl) = cache.ttl_secs {
                config.cache.ttl_secs = ttl;
            }
        }
        if let Some(platform) = file.platform {
            if let Some(v) = platform.api_base_url {
                config.platform.api_base_url = v;
            }
            if let Some(v) = platform.cdn_base_url {
                config.platform.cdn_base_url = v;
            }
            if let Some(v) = platform.icon_size {
                config.platform.icon_size = v;
            }
            if let Some(v) = platform.timeout_secs {
                config.platform.timeout_secs = v;
            }
        }
        if let Some(storage) = file.storage {
            config.storage.database_path = storage.database_path.map(PathBuf::from);
        }
        if let Some(logging) = file.logging {
            if let Some(format) = logging.format {
                config.logging.format = format;
            }
            config.logging.level = logging.level;
            config.logging.file = logging.file.map(PathBuf::from);
        }

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = GuildSyncConfig::new();
        assert_eq!(config.cache.ttl_secs, 300);
        assert_eq!(config.platform.icon_size, 128);
        assert_eq!(config.logging.format, "pretty");
        assert!(config.storage.database_path.is_none());
    }

    #[test]
    fn test_parse_partial_file() {
        let config = GuildSyncConfig::parse(
            r#"
            [cache]
            ttl_secs = 60

            [platform]
            api_base_url = "http://localhost:9000/api"

            [logging]
            format = "json"
            file = "/tmp/guildsync.log"
            "#,
        )
        .unwrap();

        assert_eq!(config.cache.ttl_secs, 60);
        assert_eq!(config.platform.api_base_url, "http://localhost:9000/api");
        assert_eq!(config.platform.cdn_base_url, "https://cdn.discordapp.com");
        assert_eq!(config.logging.format, "json");
        assert_eq!(
            config.logging.file.as_deref(),
            Some(Path::new("/tmp/guildsync.log"))
        );
    }

    #[test]
    fn test_parse_rejects_unknown_section() {
        assert!(GuildSyncConfig::parse("[nope]\nx = 1").is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[storage]\ndatabase_path = \"/var/lib/g.db\"\n").unwrap();

        let config = GuildSyncConfig::load_from_file(&path).unwrap();
        assert_eq!(
            config.storage.database_path.as_deref(),
            Some(Path::new("/var/lib/g.db"))
        );
    }

    #[test]
    fn test_load_first_picks_first_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let absent = dir.path().join("absent.toml");
        let present = dir.path().join("present.toml");
        std::fs::write(&present, "[cache]\nttl_secs = 42\n").unwrap();

        let config = GuildSyncConfig::load_first([absent, present]).unwrap();
        assert_eq!(config.cache.ttl_secs, 42);
    }

    #[test]
    fn test_load_first_defaults_when_nothing_exists() {
        let dir = tempfile::tempdir().unwrap();
        let config = GuildSyncConfig::load_first([dir.path().join("absent.toml")]).unwrap();
        assert_eq!(config, GuildSyncConfig::default());
    }

    #[test]
    fn test_load_first_reports_unreadable_file() {
        let dir = tempfile::tempdir().unwrap();
        let broken = dir.path().join("config.toml");
        std::fs::write(&broken, "[cache\nttl_secs = ").unwrap();

        let err = GuildSyncConfig::load_first([broken]).unwrap_err();
        assert!(err.to_string().contains("parse_config_file"));
    }

    #[test]
    fn test_unbounded_ttl_is_accepted() {
        let config = GuildSyncConfig::parse("[cache]\nttl_secs = 18446744073709551615\n").unwrap();
        assert_eq!(config.cache.ttl_secs, u64::MAX);
    }

    #[test]
    fn test_missing_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(GuildSyncConfig::load_from_file(&dir.path().join("absent.toml")).is_err());
    }

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("GUILDSYNC_CACHE_TTL_SECS", " 15 "),
            ("GUILDSYNC_DATABASE_PATH", "/data/g.db"),
            ("GUILDSYNC_LOG_LEVEL", "debug"),
        ]);
        let config = GuildSyncConfig::new()
            .with_overrides(|key| env.get(key).map(|v| (*v).to_string()))
            .unwrap();

        assert_eq!(config.cache.ttl_secs, 15);
        assert_eq!(
            config.storage.database_path.as_deref(),
            Some(Path::new("/data/g.db"))
        );
        assert_eq!(config.logging.level.as_deref(), Some("debug"));
    }

    #[test]
    fn test_invalid_ttl_override_is_rejected() {
        let err = GuildSyncConfig::new()
            .with_overrides(|key| (key == "GUILDSYNC_CACHE_TTL_SECS").then(|| "soon".to_string()))
            .unwrap_err();
        assert!(err.to_string().contains("GUILDSYNC_CACHE_TTL_SECS"));
    }
}
