//! Structured logging.

use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use crate::config::LoggingSettings;

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable multi-line output.
    #[default]
    Pretty,
    /// One JSON object per event.
    Json,
}

impl LogFormat {
    /// Parses a format string, defaulting to pretty.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "json" => Self::Json,
            _ => Self::Pretty,
        }
    }
}

/// Resolved logging configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Output format.
    pub format: LogFormat,
    /// Filter directive used when `RUST_LOG` is unset.
    pub directive: String,
    /// Log file; stderr when unset.
    pub file: Option<PathBuf>,
}

impl LoggingConfig {
    /// Builds the logging configuration from settings and the CLI verbosity.
    ///
    /// An explicit level wins over `verbose`.
    #[must_use]
    pub fn from_settings(settings: &LoggingSettings, verbose: bool) -> Self {
        let directive = settings.level.clone().unwrap_or_else(|| {
            if verbose {
                "guildsync=debug,info".to_string()
            } else {
                "guildsync=info,warn".to_string()
            }
        });

        Self {
            format: LogFormat::parse(&settings.format),
            directive,
            file: settings.file.clone(),
        }
    }

    /// The effective filter: `RUST_LOG` if set, else the directive.
    #[must_use]
    pub fn filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.directive))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_parse() {
        assert_eq!(LogFormat::parse("json"), LogFormat::Json);
        assert_eq!(LogFormat::parse(" JSON "), LogFormat::Json);
        assert_eq!(LogFormat::parse("pretty"), LogFormat::Pretty);
        assert_eq!(LogFormat::parse("xml"), LogFormat::Pretty);
    }

    #[test]
    fn test_level_wins_over_verbose() {
        let settings = LoggingSettings {
            level: Some("trace".to_string()),
            ..LoggingSettings::default()
        };
        let config = LoggingConfig::from_settings(&settings, true);
        assert_eq!(config.directive, "trace");
    }

    #[test]
    fn test_verbose_default() {
        let quiet = LoggingConfig::from_settings(&LoggingSettings::default(), false);
        let loud = LoggingConfig::from_settings(&LoggingSettings::default(), true);
        assert_eq!(quiet.directive, "guildsync=info,warn");
        assert_eq!(loud.directive, "guildsync=debug,info");
        assert_eq!(quiet.format, LogFormat::Pretty);
        assert!(quiet.file.is_none());
    }
}
