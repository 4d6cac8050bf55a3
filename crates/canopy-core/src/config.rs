//! Run configuration.
//!
//! A [`RunConfig`] is assembled once before the run starts (config file merged
//! with CLI overrides by the caller) and is read-only for the duration of one
//! run.

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Bail-out threshold for captured errors.
///
/// The run terminates once the captured-error count strictly exceeds the
/// bound, so `Bounded(0)` bails on the very first error and `Unbounded`
/// never bails. On the wire this is either a number or the literal
/// `unbounded`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MaxErrors {
    Bounded(u64),
    #[default]
    Unbounded,
}

impl MaxErrors {
    /// Returns true when `total` captured errors exceed this threshold.
    pub fn exceeded_by(self, total: usize) -> bool {
        match self {
            MaxErrors::Bounded(max) => total as u64 > max,
            MaxErrors::Unbounded => false,
        }
    }
}

impl FromStr for MaxErrors {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("unbounded") {
            return Ok(MaxErrors::Unbounded);
        }
        s.parse::<u64>()
            .map(MaxErrors::Bounded)
            .map_err(|_| format!("expected a number or \"unbounded\", got \"{s}\""))
    }
}

impl Serialize for MaxErrors {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            MaxErrors::Bounded(max) => serializer.serialize_u64(*max),
            MaxErrors::Unbounded => serializer.serialize_str("unbounded"),
        }
    }
}

impl<'de> Deserialize<'de> for MaxErrors {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Count(u64),
            Keyword(String),
        }

        match Repr::deserialize(deserializer)? {
            Repr::Count(max) => Ok(MaxErrors::Bounded(max)),
            Repr::Keyword(word) => word.parse().map_err(de::Error::custom),
        }
    }
}

/// Immutable configuration for one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Global timeout in milliseconds, applied to any hook that does not
    /// carry its own timeout and handed through to the engine.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Bail-out threshold for captured errors.
    #[serde(default)]
    pub max_errors: MaxErrors,

    /// Maximum stack lines rendered per captured error.
    #[serde(default = "default_max_stack_lines")]
    pub max_stack_lines: usize,

    /// Test-file pattern, passed through to the engine opaquely.
    #[serde(default)]
    pub pattern: Option<String>,

    /// Emit per-hook duration lines.
    #[serde(default)]
    pub verbose: bool,

    /// Suppress block headers and the pending section.
    #[serde(default)]
    pub quiet: bool,

    /// Directory the engine resolves test files against.
    #[serde(default = "default_directory")]
    pub directory: PathBuf,
}

fn default_timeout_ms() -> u64 {
    5000
}

fn default_max_stack_lines() -> usize {
    10
}

fn default_directory() -> PathBuf {
    PathBuf::from(".")
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            max_errors: MaxErrors::default(),
            max_stack_lines: default_max_stack_lines(),
            pattern: None,
            verbose: false,
            quiet: false,
            directory: default_directory(),
        }
    }
}

impl RunConfig {
    /// Loads configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path_ref = path.as_ref();
        debug!(path = %path_ref.display(), "Loading configuration from file");
        let content = std::fs::read_to_string(path_ref)?;
        let config: Self = serde_yaml::from_str(&content)?;
        debug!(
            timeout_ms = config.timeout_ms,
            max_stack_lines = config.max_stack_lines,
            "Configuration loaded"
        );
        Ok(config)
    }

    /// Validates preconditions that must hold before the run state machine
    /// starts. These are user errors, reported without a stack trace.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.directory.exists() {
            return Err(ConfigError::MissingPath {
                path: self.directory.clone(),
            });
        }
        Ok(())
    }

    /// The global timeout as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Configuration errors, surfaced at the boundary before any hook or
/// engine interaction begins.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("referenced path does not exist: {path}")]
    MissingPath { path: PathBuf },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let config = RunConfig::default();
        assert_eq!(config.timeout_ms, 5000);
        assert_eq!(config.max_errors, MaxErrors::Unbounded);
        assert_eq!(config.max_stack_lines, 10);
        assert!(config.pattern.is_none());
        assert!(!config.verbose);
        assert!(!config.quiet);
    }

    #[test]
    fn test_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "timeout_ms: 250").unwrap();
        writeln!(file, "max_errors: 3").unwrap();
        writeln!(file, "max_stack_lines: 5").unwrap();
        writeln!(file, "quiet: true").unwrap();
        file.flush().unwrap();

        let config = RunConfig::from_file(file.path()).unwrap();
        assert_eq!(config.timeout_ms, 250);
        assert_eq!(config.max_errors, MaxErrors::Bounded(3));
        assert_eq!(config.max_stack_lines, 5);
        assert!(config.quiet);
    }

    #[test]
    fn test_unbounded_keyword() {
        let config: RunConfig = serde_yaml::from_str("max_errors: unbounded").unwrap();
        assert_eq!(config.max_errors, MaxErrors::Unbounded);
    }

    #[test]
    fn test_max_errors_from_str() {
        assert_eq!("0".parse::<MaxErrors>().unwrap(), MaxErrors::Bounded(0));
        assert_eq!("12".parse::<MaxErrors>().unwrap(), MaxErrors::Bounded(12));
        assert_eq!(
            "unbounded".parse::<MaxErrors>().unwrap(),
            MaxErrors::Unbounded
        );
        assert!("lots".parse::<MaxErrors>().is_err());
    }

    #[test]
    fn test_exceeded_by_is_strict() {
        assert!(!MaxErrors::Bounded(2).exceeded_by(1));
        assert!(!MaxErrors::Bounded(2).exceeded_by(2));
        assert!(MaxErrors::Bounded(2).exceeded_by(3));
        assert!(MaxErrors::Bounded(0).exceeded_by(1));
        assert!(!MaxErrors::Bounded(0).exceeded_by(0));
        assert!(!MaxErrors::Unbounded.exceeded_by(usize::MAX));
    }

    #[test]
    fn test_validate_missing_directory() {
        let config = RunConfig {
            directory: PathBuf::from("/nonexistent/canopy/dir"),
            ..RunConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingPath { .. })
        ));
    }

    #[test]
    fn test_parse_error_reported() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "max_stack_lines: [not a number").unwrap();
        file.flush().unwrap();

        assert!(matches!(
            RunConfig::from_file(file.path()),
            Err(ConfigError::Parse(_))
        ));
    }
}
