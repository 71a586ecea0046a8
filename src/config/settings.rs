use clap::ArgMatches;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::mercury::transaction::RetryPolicy;
use crate::utils::error::MeterError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    // Connection settings
    pub serial_port: String,
    pub baud_rate: u32,
    pub timeout_ms: u64,
    pub inter_byte_timeout_ms: u64,

    // Transaction settings
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    pub ignore_checksum: bool,

    // Monitoring settings
    pub update_interval_seconds: u64,

    // Output settings
    pub output: OutputConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub format: OutputFormat,
    pub collectd_host: String,
    pub collectd_plugin: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Table,
    Rrd,
    Collectd,
    Json,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::Table,
            collectd_host: "moidom02".to_string(),
            collectd_plugin: "mercury".to_string(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            // Connection settings
            serial_port: "/dev/ttyACM0".to_string(),
            baud_rate: 9600,
            timeout_ms: 500,
            inter_byte_timeout_ms: 20,

            // Transaction settings
            max_retries: 16,
            retry_delay_ms: 50,
            ignore_checksum: false,

            // Monitoring settings
            update_interval_seconds: 10,

            output: OutputConfig::default(),
        }
    }
}

impl Config {
    /// Start from the `--config` file (or defaults) and apply command line overrides.
    pub fn from_matches(matches: &ArgMatches) -> Result<Self, MeterError> {
        let mut config = match matches.get_one::<String>("config") {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };

        if let Some(port) = matches.get_one::<String>("port") {
            config.serial_port = port.clone();
        }

        if let Some(interval) = matches.get_one::<u64>("interval") {
            config.update_interval_seconds = *interval;
        }

        if matches.get_flag("ignore-checksum") {
            config.ignore_checksum = true;
        }

        if matches.get_flag("rrd") {
            config.output.format = OutputFormat::Rrd;
        } else if matches.get_flag("collectd") {
            config.output.format = OutputFormat::Collectd;
        } else if matches.get_flag("json") {
            config.output.format = OutputFormat::Json;
        }

        config.validate()?;
        debug!("Effective configuration: {:?}", config);
        Ok(config)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, MeterError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            MeterError::ConfigError(format!("Unable to read {}: {}", path.display(), e))
        })?;
        let config: Config = toml::from_str(&content)?;

        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), MeterError> {
        if self.serial_port.is_empty() {
            return Err(MeterError::ConfigError("serial_port must not be empty".to_string()));
        }
        if self.baud_rate == 0 {
            return Err(MeterError::ConfigError("baud_rate must be positive".to_string()));
        }
        if self.max_retries == 0 {
            return Err(MeterError::ConfigError("max_retries must be at least 1".to_string()));
        }
        if self.timeout_ms == 0 {
            return Err(MeterError::ConfigError("timeout_ms must be positive".to_string()));
        }
        if self.inter_byte_timeout_ms == 0 {
            return Err(MeterError::ConfigError(
                "inter_byte_timeout_ms must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            backoff_step: Duration::from_millis(self.retry_delay_ms),
            ignore_checksum: self.ignore_checksum,
        }
    }

    pub fn response_timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn inter_byte_timeout(&self) -> Duration {
        Duration::from_millis(self.inter_byte_timeout_ms)
    }

    pub fn update_interval(&self) -> Duration {
        Duration::from_secs(self.update_interval_seconds)
    }
}
