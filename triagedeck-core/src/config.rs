//! Configuration loading and management
//!
//! Configuration is loaded from `~/.config/triagedeck/config.toml`
//!
//! This module follows the XDG Base Directory Specification:
//! - Config: `$XDG_CONFIG_HOME/triagedeck/` (~/.config/triagedeck/)
//! - State/Logs: `$XDG_STATE_HOME/triagedeck/` (~/.local/state/triagedeck/)

use crate::error::{Error, Result};
use crate::types::{ProcessOptions, RunMode};
use serde::Deserialize;
use std::path::PathBuf;

/// Returns a best-effort home directory path.
fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Returns XDG_CONFIG_HOME or ~/.config
fn xdg_config_home() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"))
}

/// Returns XDG_STATE_HOME or ~/.local/state
fn xdg_state_home() -> PathBuf {
    std::env::var("XDG_STATE_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/state"))
}

/// Main configuration struct
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    /// Session/activity retention
    #[serde(default)]
    pub retention: RetentionConfig,

    /// Event stream liveness
    #[serde(default)]
    pub stream: StreamConfig,

    /// Defaults for dispatching runs to the fix agent
    #[serde(default)]
    pub processing: ProcessingConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Activity retention configuration
#[derive(Debug, Deserialize)]
pub struct RetentionConfig {
    /// Maximum activities kept per session; oldest are evicted past the cap
    #[serde(default = "default_max_activities")]
    pub max_activities_per_session: usize,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            max_activities_per_session: default_max_activities(),
        }
    }
}

fn default_max_activities() -> usize {
    500
}

/// Event stream liveness configuration
#[derive(Debug, Deserialize)]
pub struct StreamConfig {
    /// Expected heartbeat cadence on idle connections, seconds
    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval_secs: u64,

    /// Silence longer than this is treated as a dead connection
    #[serde(default = "default_stale_after")]
    pub stale_after_secs: u64,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval_secs: default_heartbeat_interval(),
            stale_after_secs: default_stale_after(),
        }
    }
}

fn default_heartbeat_interval() -> u64 {
    15
}

fn default_stale_after() -> u64 {
    60
}

/// Defaults for fix-agent dispatch
#[derive(Debug, Deserialize)]
pub struct ProcessingConfig {
    /// "plan" or "build"
    #[serde(default = "default_mode")]
    pub mode: String,

    /// Model selection; omitted lets the agent pick its default
    pub model: Option<String>,

    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,

    #[serde(default)]
    pub auto_push: bool,

    #[serde(default = "default_ci_aware")]
    pub ci_aware: bool,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            mode: default_mode(),
            model: None,
            max_iterations: default_max_iterations(),
            auto_push: false,
            ci_aware: default_ci_aware(),
        }
    }
}

impl ProcessingConfig {
    /// Build dispatch options from the configured defaults.
    pub fn to_options(&self) -> Result<ProcessOptions> {
        let mode: RunMode = self
            .mode
            .parse()
            .map_err(|e: String| Error::Config(format!("processing.mode: {}", e)))?;
        Ok(ProcessOptions {
            mode,
            model: self.model.clone(),
            max_iterations: self.max_iterations,
            auto_push: self.auto_push,
            ci_aware: self.ci_aware,
        })
    }
}

fn default_mode() -> String {
    "plan".to_string()
}

fn default_max_iterations() -> u32 {
    5
}

fn default_ci_aware() -> bool {
    true
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from the default path
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
            return Ok(Config::default());
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &PathBuf) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read config file {:?}: {}", path, e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate cross-field constraints, returning error message if invalid
    pub fn validate(&self) -> Result<()> {
        if self.retention.max_activities_per_session == 0 {
            return Err(Error::Config(
                "retention.max_activities_per_session must be at least 1".to_string(),
            ));
        }
        if self.stream.stale_after_secs <= self.stream.heartbeat_interval_secs {
            return Err(Error::Config(
                "stream.stale_after_secs must exceed stream.heartbeat_interval_secs".to_string(),
            ));
        }
        if self.processing.max_iterations == 0 {
            return Err(Error::Config(
                "processing.max_iterations must be at least 1".to_string(),
            ));
        }
        self.processing.to_options().map(|_| ())
    }

    /// Returns the default config file path
    ///
    /// `$XDG_CONFIG_HOME/triagedeck/config.toml` (~/.config/triagedeck/config.toml)
    pub fn config_path() -> PathBuf {
        xdg_config_home().join("triagedeck").join("config.toml")
    }

    /// Returns the state directory path (for logs)
    ///
    /// `$XDG_STATE_HOME/triagedeck/` (~/.local/state/triagedeck/)
    pub fn state_dir() -> PathBuf {
        xdg_state_home().join("triagedeck")
    }

    /// Returns the log file path
    ///
    /// `$XDG_STATE_HOME/triagedeck/triagedeck.log`
    pub fn log_path() -> PathBuf {
        Self::state_dir().join("triagedeck.log")
    }
}
