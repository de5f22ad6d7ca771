//! Configuration loading and constants.
//!
//! Loads the check configuration from a TOML file and defines defaults for the
//! provisioning adapter, the retry budget, probe timeouts, logging format,
//! and default paths. `AppConfig` is the root configuration struct.

use const_format::formatcp;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

// =============================================================================
// Verification Budget Defaults
// =============================================================================

/// Maximum number of probes before the endpoint is declared unhealthy
pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;

/// Fixed pause between probes, in seconds
pub const DEFAULT_INTERVAL_SECS: u64 = 10;

/// Per-probe request timeout, in seconds
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

// =============================================================================
// Provisioning Defaults
// =============================================================================

/// Provisioning CLI invoked by the real adapter
pub const DEFAULT_PROVISION_BINARY: &str = "terraform";

/// Output holding the load balancer's DNS name
pub const DEFAULT_OUTPUT_KEY: &str = "alb_dns_name";

// =============================================================================
// Default Paths and Strings
// =============================================================================

/// Default configuration file path
pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Default scheme prefixed to the output value
pub const DEFAULT_SCHEME: &str = "http";

/// Default request path on the target host
pub const DEFAULT_PATH: &str = "/";

/// Default log filter when RUST_LOG is not set
pub const DEFAULT_LOG_FILTER: &str = "deploy_verify=info";

/// Default log format (text or json)
pub const DEFAULT_LOG_FORMAT: &str = "text";

/// User-Agent sent with every probe
pub const PROBE_USER_AGENT: &str =
    formatcp!("{}/{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Provisioning adapter settings
    pub provision: ProvisionConfig,
    /// Endpoint verification settings
    #[serde(default)]
    pub verify: VerifyConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Provisioning adapter configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ProvisionConfig {
    /// Directory holding the infrastructure definition
    pub dir: PathBuf,
    /// Named output that holds the target host
    #[serde(default = "ProvisionConfig::default_output_key")]
    pub output_key: String,
    /// Provisioning CLI binary
    #[serde(default = "ProvisionConfig::default_binary")]
    pub binary: String,
    /// Re-plan after apply and fail if changes are still pending
    #[serde(default = "ProvisionConfig::default_idempotency_check")]
    pub idempotency_check: bool,
}

impl ProvisionConfig {
    fn default_output_key() -> String {
        DEFAULT_OUTPUT_KEY.to_string()
    }

    fn default_binary() -> String {
        DEFAULT_PROVISION_BINARY.to_string()
    }

    fn default_idempotency_check() -> bool {
        true
    }
}

/// Endpoint verification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct VerifyConfig {
    /// Scheme prefixed to the output value ("http" or "https")
    #[serde(default = "VerifyConfig::default_scheme")]
    pub scheme: String,
    /// Path requested on the target host
    #[serde(default = "VerifyConfig::default_path")]
    pub path: String,
    /// Attempt budget (must be at least 1)
    #[serde(default = "VerifyConfig::default_max_attempts")]
    pub max_attempts: u32,
    /// Pause between attempts in seconds (0 disables the pause)
    #[serde(default = "VerifyConfig::default_interval")]
    pub interval_seconds: u64,
    /// Per-probe request timeout in seconds
    #[serde(default = "VerifyConfig::default_request_timeout")]
    pub request_timeout_seconds: u64,
    /// Overall deadline for the whole verification, in seconds
    pub deadline_seconds: Option<u64>,
}

impl Default for VerifyConfig {
    fn default() -> Self {
        Self {
            scheme: Self::default_scheme(),
            path: Self::default_path(),
            max_attempts: Self::default_max_attempts(),
            interval_seconds: Self::default_interval(),
            request_timeout_seconds: Self::default_request_timeout(),
            deadline_seconds: None,
        }
    }
}

impl VerifyConfig {
    fn default_scheme() -> String {
        DEFAULT_SCHEME.to_string()
    }

    fn default_path() -> String {
        DEFAULT_PATH.to_string()
    }

    fn default_max_attempts() -> u32 {
        DEFAULT_MAX_ATTEMPTS
    }

    fn default_interval() -> u64 {
        DEFAULT_INTERVAL_SECS
    }

    fn default_request_timeout() -> u64 {
        DEFAULT_REQUEST_TIMEOUT_SECS
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_seconds)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    pub fn deadline(&self) -> Option<Duration> {
        self.deadline_seconds.map(Duration::from_secs)
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log format: "text" (human-readable, default) or "json" (structured)
    #[serde(default = "LoggingConfig::default_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: DEFAULT_LOG_FORMAT.to_string(),
        }
    }
}

impl LoggingConfig {
    fn default_format() -> String {
        DEFAULT_LOG_FORMAT.to_string()
    }

    pub fn is_json(&self) -> bool {
        self.format == "json"
    }
}

impl AppConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Point the provisioning adapter at a different definition directory
    pub fn with_dir(mut self, dir: PathBuf) -> Result<Self, ConfigError> {
        self.provision.dir = dir;
        self.validate()?;
        Ok(self)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.provision.dir.as_os_str().is_empty() {
            return Err(ConfigError::Validation(
                "provision.dir must not be empty".to_string(),
            ));
        }
        if self.provision.output_key.trim().is_empty() {
            return Err(ConfigError::Validation(
                "provision.output_key must not be empty".to_string(),
            ));
        }
        if self.verify.max_attempts == 0 {
            return Err(ConfigError::Validation(
                "verify.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.verify.request_timeout_seconds == 0 {
            return Err(ConfigError::Validation(
                "verify.request_timeout_seconds must be at least 1".to_string(),
            ));
        }
        if !matches!(self.verify.scheme.as_str(), "http" | "https") {
            return Err(ConfigError::Validation(format!(
                "verify.scheme must be \"http\" or \"https\", got \"{}\"",
                self.verify.scheme
            )));
        }
        if !self.verify.path.starts_with('/') {
            return Err(ConfigError::Validation(format!(
                "verify.path must start with '/', got \"{}\"",
                self.verify.path
            )));
        }
        if !matches!(self.logging.format.as_str(), "text" | "json") {
            return Err(ConfigError::Validation(format!(
                "logging.format must be \"text\" or \"json\", got \"{}\"",
                self.logging.format
            )));
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Configuration error: {0}")]
    Validation(String),
}
