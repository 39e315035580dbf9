//! Configuration module for the mssqlmon agent.
//!
//! Provides YAML-based configuration loading and validation for:
//! - Agent settings (default schedule, connect timeout, output format)
//! - Plugin instances (`custom_mssql`, `nhn_rds_mssql`)

mod app;
mod plugin;
mod validation;

pub use app::{AgentConfig, AppConfig, DEFAULT_INTERVAL};
pub use plugin::PluginsConfig;
pub use validation::{ConfigError, expand_env_vars, parse_duration};
