//! Readiness deployment configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

use super::defaults;

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV_VAR: &str = "READINESS_CONFIG";

/// Config file looked up in the working directory.
pub const LOCAL_CONFIG_FILE: &str = "readiness.toml";

// ============================================================================
// Top-Level Config
// ============================================================================

/// Root configuration for a readiness deployment.
///
/// Load with `ReadinessConfig::load()` which searches:
/// 1. `$READINESS_CONFIG` env var
/// 2. `./readiness.toml`
/// 3. Built-in defaults
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReadinessConfig {
    /// Run timing, concurrency and reaper settings
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Merge engine limits
    #[serde(default)]
    pub merge: MergeConfig,

    /// Reference analyzer settings
    #[serde(default)]
    pub analyzer: AnalyzerConfig,

    /// Persistence backend
    #[serde(default)]
    pub storage: StorageConfig,

    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Log output
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl ReadinessConfig {
    /// Load configuration using the standard search order:
    /// 1. `$READINESS_CONFIG` environment variable
    /// 2. `./readiness.toml` in the current working directory
    /// 3. Built-in defaults
    pub fn load() -> Self {
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            let p = PathBuf::from(&path);
            if p.exists() {
                match Self::load_from_file(&p) {
                    Ok(config) => {
                        info!(path = %p.display(), "Loaded readiness config from READINESS_CONFIG");
                        return config;
                    }
                    Err(e) => {
                        warn!(path = %p.display(), error = %e, "Failed to load config from READINESS_CONFIG, falling back");
                    }
                }
            } else {
                warn!(path = %path, "READINESS_CONFIG points to non-existent file, falling back");
            }
        }

        let local = PathBuf::from(LOCAL_CONFIG_FILE);
        if local.exists() {
            match Self::load_from_file(&local) {
                Ok(config) => {
                    info!("Loaded readiness config from ./readiness.toml");
                    return config;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to load ./readiness.toml, using defaults");
                }
            }
        }

        info!("No readiness.toml found, using built-in defaults");
        Self::default()
    }

    /// Load from a specific TOML file path.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        Self::from_toml_str(&contents).map_err(|e| match e {
            ConfigError::Parse(_, err) => ConfigError::Parse(path.to_path_buf(), err),
            other => other,
        })
    }

    /// Parse and validate a TOML document.
    ///
    /// Unknown keys are logged as warnings; they never fail the load.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        for w in super::validation::validate_unknown_keys(contents) {
            warn!("{}", w);
        }

        let config: Self = toml::from_str(contents)
            .map_err(|e| ConfigError::Parse(PathBuf::from("<inline>"), e))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize the current config to a TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }

    /// Validate values for internal consistency.
    ///
    /// Rules:
    /// - Timeouts, intervals, concurrency and capacities must be > 0
    /// - The stuck-run threshold must exceed the run timeout
    /// - Storage backend must be `sled` or `memory`
    /// - Log format must be `compact` or `json`
    pub fn validate(&self) -> Result<(), ConfigError> {
        let p = &self.pipeline;
        let mut errors: Vec<String> = Vec::new();

        if p.run_timeout_secs == 0 {
            errors.push("pipeline.run_timeout_secs: must be > 0".to_string());
        }
        if p.max_concurrent_runs == 0 {
            errors.push("pipeline.max_concurrent_runs: must be > 0".to_string());
        }
        if p.queue_capacity == 0 {
            errors.push("pipeline.queue_capacity: must be > 0".to_string());
        }
        if p.reaper_interval_secs == 0 {
            errors.push("pipeline.reaper_interval_secs: must be > 0".to_string());
        }
        if p.stuck_after_secs <= p.run_timeout_secs {
            errors.push(format!(
                "pipeline.stuck_after_secs ({}) must be greater than pipeline.run_timeout_secs ({})",
                p.stuck_after_secs, p.run_timeout_secs
            ));
        }

        if self.merge.recommendation_log_cap == 0 {
            errors.push("merge.recommendation_log_cap: must be > 0".to_string());
        }

        match self.storage.backend.as_str() {
            "sled" | "memory" => {}
            other => errors.push(format!(
                "storage.backend: unknown backend '{other}' (expected 'sled' or 'memory')"
            )),
        }

        match self.logging.format.as_str() {
            "compact" | "json" => {}
            other => errors.push(format!(
                "logging.format: unknown format '{other}' (expected 'compact' or 'json')"
            )),
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }
}

// ============================================================================
// Error Type
// ============================================================================

#[derive(Debug)]
pub enum ConfigError {
    Io(PathBuf, std::io::Error),
    Parse(PathBuf, toml::de::Error),
    Serialize(toml::ser::Error),
    Validation(Vec<String>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(path, e) => write!(f, "Config I/O error ({}): {}", path.display(), e),
            Self::Parse(path, e) => {
                write!(f, "Config parse error ({}): {}", path.display(), e)
            }
            Self::Serialize(e) => write!(f, "Config serialization error: {e}"),
            Self::Validation(errors) => {
                writeln!(f, "Config validation failed:")?;
                for e in errors {
                    writeln!(f, "  - {e}")?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

// ============================================================================
// Sections
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Bound on fetch + analysis per run (seconds)
    pub run_timeout_secs: u64,
    /// Concurrent coordinator runs
    pub max_concurrent_runs: usize,
    /// Delay before an uploaded artifact is first processed (ms)
    pub intake_delay_ms: u64,
    /// Dispatcher channel capacity
    pub queue_capacity: usize,
    /// Age after which a `processing` record is reaped (seconds)
    pub stuck_after_secs: u64,
    /// Reaper sweep interval (seconds)
    pub reaper_interval_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            run_timeout_secs: defaults::RUN_TIMEOUT_SECS,
            max_concurrent_runs: defaults::MAX_CONCURRENT_RUNS,
            intake_delay_ms: defaults::INTAKE_DELAY_MS,
            queue_capacity: defaults::DISPATCH_QUEUE_CAPACITY,
            stuck_after_secs: defaults::STUCK_AFTER_SECS,
            reaper_interval_secs: defaults::REAPER_INTERVAL_SECS,
        }
    }
}

impl PipelineConfig {
    pub const fn run_timeout(&self) -> Duration {
        Duration::from_secs(self.run_timeout_secs)
    }

    pub const fn intake_delay(&self) -> Duration {
        Duration::from_millis(self.intake_delay_ms)
    }

    pub const fn stuck_after(&self) -> Duration {
        Duration::from_secs(self.stuck_after_secs)
    }

    pub const fn reaper_interval(&self) -> Duration {
        Duration::from_secs(self.reaper_interval_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeConfig {
    /// Most recent recommendation entries kept per vehicle
    pub recommendation_log_cap: usize,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            recommendation_log_cap: defaults::RECOMMENDATION_LOG_CAP,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    /// Seed for the reference analyzer's outcome draws. Unset = entropy.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// `sled` or `memory`
    pub backend: String,
    /// Root directory for the database and artifact bytes
    pub data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: "sled".to_string(),
            data_dir: PathBuf::from(defaults::DATA_DIR),
        }
    }
}

impl StorageConfig {
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("db")
    }

    pub fn blob_dir(&self) -> PathBuf {
        self.data_dir.join("artifacts")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub addr: String,
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: defaults::SERVER_ADDR.to_string(),
            max_upload_bytes: defaults::MAX_UPLOAD_BYTES,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset
    pub level: String,
    /// `compact` or `json`
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "compact".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        let config = ReadinessConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.pipeline.intake_delay_ms, 2_000);
        assert_eq!(config.merge.recommendation_log_cap, 200);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let config = ReadinessConfig::from_toml_str(
            r#"
            [pipeline]
            run_timeout_secs = 10
            stuck_after_secs = 60
            "#,
        )
        .unwrap();
        assert_eq!(config.pipeline.run_timeout_secs, 10);
        assert_eq!(config.pipeline.max_concurrent_runs, defaults::MAX_CONCURRENT_RUNS);
        assert_eq!(config.storage.backend, "sled");
    }

    #[test]
    fn stuck_threshold_must_exceed_run_timeout() {
        let mut config = ReadinessConfig::default();
        config.pipeline.run_timeout_secs = 60;
        config.pipeline.stuck_after_secs = 60;
        match config.validate() {
            Err(ConfigError::Validation(errors)) => {
                assert!(errors.iter().any(|e| e.contains("stuck_after_secs")));
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn toml_round_trip_keeps_seed() {
        let mut config = ReadinessConfig::default();
        config.analyzer.seed = Some(7);
        let text = config.to_toml().unwrap();
        let parsed = ReadinessConfig::from_toml_str(&text).unwrap();
        assert_eq!(parsed.analyzer.seed, Some(7));
    }
}
