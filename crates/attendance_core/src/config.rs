//! Ledger runtime configuration.
//!
//! # Responsibility
//! - Load `LedgerConfig` from TOML.
//! - Validate values and convert them into connection/logging settings.
//!
//! # Invariants
//! - A validated config has a non-empty database path and a positive
//!   busy timeout.
//! - Logging stays disabled unless `[logging] dir` is set.

use crate::db::DbOptions;
use crate::logging::{default_log_level, normalize_level};
use crate::model::session::PresencePolicy;
use serde::Deserialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// Top-level ledger configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LedgerConfig {
    pub database_path: PathBuf,
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    #[serde(default)]
    pub presence_policy: PresencePolicy,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// `[logging]` table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    pub level: Option<String>,
    pub dir: Option<PathBuf>,
}

/// Configuration loading failure.
#[derive(Debug)]
pub enum ConfigError {
    Io { path: PathBuf, source: std::io::Error },
    Parse(toml::de::Error),
    Invalid(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "failed to read config `{}`: {source}", path.display())
            }
            Self::Parse(err) => write!(f, "invalid config: {err}"),
            Self::Invalid(message) => write!(f, "invalid config: {message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse(err) => Some(err),
            Self::Invalid(_) => None,
        }
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(value: toml::de::Error) -> Self {
        Self::Parse(value)
    }
}

impl LedgerConfig {
    /// Builds a config with defaults for everything but the database path.
    pub fn new(database_path: impl Into<PathBuf>) -> Self {
        Self {
            database_path: database_path.into(),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            presence_policy: PresencePolicy::default(),
            logging: LoggingConfig::default(),
        }
    }

    /// Parses and validates TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database_path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid(
                "database_path cannot be empty".to_string(),
            ));
        }
        if self.busy_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "busy_timeout_ms must be positive".to_string(),
            ));
        }
        if let Some(level) = &self.logging.level {
            normalize_level(level).map_err(|err| ConfigError::Invalid(err.to_string()))?;
        }
        Ok(())
    }

    pub fn db_options(&self) -> DbOptions {
        DbOptions {
            busy_timeout: Duration::from_millis(self.busy_timeout_ms),
        }
    }

    /// Configured level, or the build-mode default.
    pub fn log_level(&self) -> &str {
        self.logging
            .level
            .as_deref()
            .unwrap_or(default_log_level())
    }
}

fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, LedgerConfig};
    use crate::model::session::PresencePolicy;
    use std::path::Path;
    use std::time::Duration;

    #[test]
    fn full_config_parses() {
        let config = LedgerConfig::from_toml_str(
            r#"
database_path = "/var/lib/attendance/ledger.sqlite3"
busy_timeout_ms = 250
presence_policy = "reject"

[logging]
level = "warn"
dir = "/var/log/attendance"
"#,
        )
        .unwrap();

        assert_eq!(config.presence_policy, PresencePolicy::Reject);
        assert_eq!(config.db_options().busy_timeout, Duration::from_millis(250));
        assert_eq!(config.log_level(), "warn");
        assert_eq!(
            config.logging.dir.as_deref(),
            Some(Path::new("/var/log/attendance"))
        );
    }

    #[test]
    fn defaults_apply_when_fields_are_omitted() {
        let config = LedgerConfig::from_toml_str(r#"database_path = "ledger.sqlite3""#).unwrap();
        assert_eq!(config.busy_timeout_ms, 5_000);
        assert_eq!(config.presence_policy, PresencePolicy::Clamp);
        assert!(config.logging.dir.is_none());
        assert_eq!(config.log_level(), crate::logging::default_log_level());
    }

    #[test]
    fn zero_timeout_is_invalid() {
        let err = LedgerConfig::from_toml_str(
            r#"
database_path = "ledger.sqlite3"
busy_timeout_ms = 0
"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn empty_path_and_unknown_level_are_invalid() {
        assert!(matches!(
            LedgerConfig::from_toml_str(r#"database_path = """#),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            LedgerConfig::from_toml_str(
                r#"
database_path = "ledger.sqlite3"
[logging]
level = "loud"
"#
            ),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn unknown_keys_are_parse_errors() {
        let err = LedgerConfig::from_toml_str(
            r#"
database_path = "ledger.sqlite3"
pool_size = 4
"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = LedgerConfig::load(dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
