//! Agent configuration.
//!
//! `AgentConfig` combines everything the agent needs: storage layout,
//! transfer block size, observation retry timings, and the service
//! endpoint. All values have sensible defaults; deployments override them
//! through an INI config file.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use ini::Ini;

use super::error::AgentError;
use crate::session::HttpSessionConfig;
use crate::settings::{LOOP_DELAY_MAX, LOOP_DELAY_MIN};

/// Default transfer block size in bytes.
pub const DEFAULT_BLOCK_SIZE: usize = 1024;

/// Default initial delay for observation retries.
pub const DEFAULT_OBSERVE_RETRY_INITIAL_SECS: u64 = 5;

/// Default cap on the observation retry delay.
pub const DEFAULT_OBSERVE_RETRY_MAX_SECS: u64 = 60;

/// Default main-loop heartbeat delay in seconds.
pub const DEFAULT_LOOP_DELAY_SECS: i64 = 10;

/// Top-level agent configuration.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Directory downloaded artifacts are stored under.
    pub storage_root: PathBuf,

    /// Fixed transfer block size in bytes.
    pub block_size: usize,

    /// Initial delay between observation attempts.
    pub observe_retry_initial: Duration,

    /// Cap on the observation retry delay.
    pub observe_retry_max: Duration,

    /// Initial main-loop heartbeat delay in seconds.
    pub loop_delay_secs: i64,

    /// Package name reported when the agent is idle.
    pub package: String,

    /// Running firmware/agent version reported to the service.
    pub version: String,

    /// Service endpoint settings for the HTTP session.
    pub service: HttpSessionConfig,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            storage_root: PathBuf::from("/var/lib/otaflow"),
            block_size: DEFAULT_BLOCK_SIZE,
            observe_retry_initial: Duration::from_secs(DEFAULT_OBSERVE_RETRY_INITIAL_SECS),
            observe_retry_max: Duration::from_secs(DEFAULT_OBSERVE_RETRY_MAX_SECS),
            loop_delay_secs: DEFAULT_LOOP_DELAY_SECS,
            package: "main".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            service: HttpSessionConfig::new("http://localhost:8080", "dev-01"),
        }
    }
}

impl AgentConfig {
    /// Set the storage root.
    pub fn with_storage_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.storage_root = root.into();
        self
    }

    /// Set the transfer block size.
    pub fn with_block_size(mut self, block_size: usize) -> Self {
        self.block_size = block_size;
        self
    }

    /// Set the observation retry timings.
    pub fn with_observe_retry(mut self, initial: Duration, max: Duration) -> Self {
        self.observe_retry_initial = initial;
        self.observe_retry_max = max;
        self
    }

    /// Load configuration from an INI file, falling back to defaults for
    /// any key that is absent.
    ///
    /// ```ini
    /// [agent]
    /// package = main
    /// version = 1.2.3
    /// loop_delay_s = 10
    ///
    /// [storage]
    /// root = /var/lib/otaflow
    /// block_size = 1024
    ///
    /// [observe]
    /// retry_initial_s = 5
    /// retry_max_s = 60
    ///
    /// [service]
    /// base_url = https://mgmt.example.com
    /// device_id = dev-01
    /// poll_interval_s = 5
    /// request_timeout_s = 10
    /// ```
    ///
    /// # Errors
    ///
    /// Returns `AgentError::Config` if the file cannot be read or a value
    /// fails to parse or validate.
    pub fn from_ini(path: &Path) -> Result<Self, AgentError> {
        let ini = Ini::load_from_file(path)
            .map_err(|e| AgentError::Config(format!("failed to load {}: {}", path.display(), e)))?;

        let mut config = Self::default();

        if let Some(section) = ini.section(Some("agent")) {
            if let Some(value) = section.get("package") {
                config.package = value.to_string();
            }
            if let Some(value) = section.get("version") {
                config.version = value.to_string();
            }
            if let Some(value) = parse_key(section.get("loop_delay_s"), "agent.loop_delay_s")? {
                config.loop_delay_secs = value;
            }
        }

        if let Some(section) = ini.section(Some("storage")) {
            if let Some(value) = section.get("root") {
                config.storage_root = PathBuf::from(value);
            }
            if let Some(value) = parse_key(section.get("block_size"), "storage.block_size")? {
                config.block_size = value;
            }
        }

        if let Some(section) = ini.section(Some("observe")) {
            if let Some(value) = parse_key(section.get("retry_initial_s"), "observe.retry_initial_s")? {
                config.observe_retry_initial = Duration::from_secs(value);
            }
            if let Some(value) = parse_key(section.get("retry_max_s"), "observe.retry_max_s")? {
                config.observe_retry_max = Duration::from_secs(value);
            }
        }

        if let Some(section) = ini.section(Some("service")) {
            if let Some(value) = section.get("base_url") {
                config.service.base_url = value.to_string();
            }
            if let Some(value) = section.get("device_id") {
                config.service.device_id = value.to_string();
            }
            if let Some(value) = parse_key(section.get("poll_interval_s"), "service.poll_interval_s")? {
                config.service.poll_interval = Duration::from_secs(value);
            }
            // Also bounds state reports; there is no separate report timeout.
            if let Some(value) =
                parse_key(section.get("request_timeout_s"), "service.request_timeout_s")?
            {
                config.service.request_timeout = Duration::from_secs(value);
            }
        }

        config.validate()?;
        Ok(config)
    }

    /// Check invariants the rest of the agent relies on.
    ///
    /// # Errors
    ///
    /// Returns `AgentError::Config` naming the offending value.
    pub fn validate(&self) -> Result<(), AgentError> {
        if self.block_size == 0 {
            return Err(AgentError::Config(
                "storage.block_size must be positive".to_string(),
            ));
        }
        if self.observe_retry_initial.is_zero() {
            return Err(AgentError::Config(
                "observe.retry_initial_s must be positive".to_string(),
            ));
        }
        if self.loop_delay_secs < LOOP_DELAY_MIN || self.loop_delay_secs > LOOP_DELAY_MAX {
            return Err(AgentError::Config(format!(
                "agent.loop_delay_s must be within [{}, {}]",
                LOOP_DELAY_MIN, LOOP_DELAY_MAX
            )));
        }
        Ok(())
    }
}

fn parse_key<T: FromStr>(value: Option<&str>, key: &str) -> Result<Option<T>, AgentError>
where
    T::Err: std::fmt::Display,
{
    match value {
        None => Ok(None),
        Some(raw) => raw
            .parse()
            .map(Some)
            .map_err(|e| AgentError::Config(format!("invalid value for {}: {}", key, e))),
    }
}
