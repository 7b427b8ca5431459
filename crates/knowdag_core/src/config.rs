//! Environment-driven runtime configuration.
//!
//! | variable | meaning | default |
//! |---|---|---|
//! | `KNOWDAG_DB_PATH` | SQLite file | `<temp_dir>/knowdag.sqlite3` |
//! | `KNOWDAG_LOG_LEVEL` | trace/debug/info/warn/error | build dependent |
//! | `KNOWDAG_LOG_DIR` | absolute log directory; unset disables file logs | unset |
//! | `KNOWDAG_MAX_ANALYSIS_PATHS` | path cap for analysis; `0` or unset = none | unset |

use crate::graph::analysis::AnalysisLimits;
use crate::logging::{LogLevel, LoggingConfig};
use crate::service::context::ServiceContext;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

pub const ENV_DB_PATH: &str = "KNOWDAG_DB_PATH";
pub const ENV_LOG_LEVEL: &str = "KNOWDAG_LOG_LEVEL";
pub const ENV_LOG_DIR: &str = "KNOWDAG_LOG_DIR";
pub const ENV_MAX_ANALYSIS_PATHS: &str = "KNOWDAG_MAX_ANALYSIS_PATHS";

const DEFAULT_DB_FILE_NAME: &str = "knowdag.sqlite3";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidValue { key, value, reason } => {
                write!(f, "invalid value `{value}` for {key}: {reason}")
            }
        }
    }
}

impl Error for ConfigError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreConfig {
    pub db_path: PathBuf,
    pub log_level: LogLevel,
    pub log_dir: Option<PathBuf>,
    pub max_analysis_paths: Option<usize>,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            db_path: std::env::temp_dir().join(DEFAULT_DB_FILE_NAME),
            log_level: LogLevel::default_for_build(),
            log_dir: None,
            max_analysis_paths: None,
        }
    }
}

impl CoreConfig {
    /// Reads configuration from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads configuration through `lookup`; blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let read = |key: &str| {
            lookup(key)
                .map(|raw| raw.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let mut config = Self::default();

        if let Some(path) = read(ENV_DB_PATH) {
            config.db_path = PathBuf::from(path);
        }
        if let Some(level) = read(ENV_LOG_LEVEL) {
            config.log_level = LogLevel::parse(&level).map_err(|err| ConfigError::InvalidValue {
                key: ENV_LOG_LEVEL,
                value: level.clone(),
                reason: err.to_string(),
            })?;
        }
        if let Some(dir) = read(ENV_LOG_DIR) {
            let dir = PathBuf::from(&dir);
            if !dir.is_absolute() {
                return Err(ConfigError::InvalidValue {
                    key: ENV_LOG_DIR,
                    value: dir.display().to_string(),
                    reason: "must be an absolute path".to_string(),
                });
            }
            config.log_dir = Some(dir);
        }
        if let Some(raw) = read(ENV_MAX_ANALYSIS_PATHS) {
            let parsed = raw.parse::<usize>().map_err(|err| ConfigError::InvalidValue {
                key: ENV_MAX_ANALYSIS_PATHS,
                value: raw.clone(),
                reason: err.to_string(),
            })?;
            config.max_analysis_paths = (parsed > 0).then_some(parsed);
        }

        Ok(config)
    }

    pub fn analysis_limits(&self) -> AnalysisLimits {
        AnalysisLimits {
            max_paths: self.max_analysis_paths,
        }
    }

    /// Default service context carrying this config's analysis limits.
    pub fn service_context(&self) -> ServiceContext {
        ServiceContext::default().with_limits(self.analysis_limits())
    }

    /// `None` when file logging is not configured.
    pub fn logging(&self) -> Option<LoggingConfig> {
        self.log_dir
            .as_ref()
            .map(|dir| LoggingConfig::new(self.log_level, dir.clone()))
    }
}
