//! Plugin configuration sections.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::collector::plugins::{CustomMssql, MssqlPluginConfig, NhnRdsMssql};
use crate::collector::sqlserver::Target;

use super::validation::{ConfigError, expand_env_vars};

/// Plugin instances grouped by kind.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PluginsConfig {
    /// `custom_mssql` instances.
    #[serde(default)]
    pub custom_mssql: Vec<MssqlPluginConfig>,

    /// `nhn_rds_mssql` instances.
    #[serde(default)]
    pub nhn_rds_mssql: Vec<MssqlPluginConfig>,
}

impl PluginsConfig {
    /// Merge another PluginsConfig into this one.
    #[must_use]
    pub fn merge(mut self, other: PluginsConfig) -> Self {
        self.custom_mssql.extend(other.custom_mssql);
        self.nhn_rds_mssql.extend(other.nhn_rds_mssql);
        self
    }

    /// Every instance with its kind, in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &MssqlPluginConfig)> {
        self.custom_mssql
            .iter()
            .map(|c| (CustomMssql::PLUGIN_NAME, c))
            .chain(
                self.nhn_rds_mssql
                    .iter()
                    .map(|c| (NhnRdsMssql::PLUGIN_NAME, c)),
            )
    }

    /// Number of configured instances, enabled or not.
    pub fn len(&self) -> usize {
        self.custom_mssql.len() + self.nhn_rds_mssql.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Validate all plugin configurations.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen_names = HashSet::new();

        for (kind, plugin) in self.iter() {
            if plugin.name.is_empty() {
                return Err(ConfigError::ValidationError(format!(
                    "{kind} plugin name cannot be empty"
                )));
            }
            if !seen_names.insert(&plugin.name) {
                return Err(ConfigError::ValidationError(format!(
                    "duplicate plugin name: '{}'",
                    plugin.name
                )));
            }
            if plugin.interval.is_some() && plugin.cron.is_some() {
                return Err(ConfigError::ValidationError(format!(
                    "{kind} plugin '{}': cannot specify both interval and cron",
                    plugin.name
                )));
            }
            if let Some(expr) = &plugin.cron {
                crate::collector::Schedule::cron(expr).map_err(|e| {
                    ConfigError::ValidationError(format!("{kind} plugin '{}': {e}", plugin.name))
                })?;
            }
            for query in &plugin.queries {
                if query.script_name.trim().is_empty() {
                    return Err(ConfigError::ValidationError(format!(
                        "{kind} plugin '{}': query name cannot be empty",
                        plugin.name
                    )));
                }
                if query.script.trim().is_empty() {
                    return Err(ConfigError::ValidationError(format!(
                        "{kind} plugin '{}': query '{}' has an empty script",
                        plugin.name, query.script_name
                    )));
                }
            }
        }

        Ok(())
    }

    /// Expand `${VAR}` references in every connection string.
    pub fn expand_env(&mut self) -> Result<(), ConfigError> {
        for plugin in self
            .custom_mssql
            .iter_mut()
            .chain(self.nhn_rds_mssql.iter_mut())
        {
            for server in &mut plugin.servers {
                *server = Target::new(expand_env_vars(server.connection_string())?);
            }
        }
        Ok(())
    }

    /// Load plugin sections from all YAML files in a directory.
    ///
    /// Each file has the same shape as the `plugins` section of the main file.
    pub fn load_from_dir(dir_path: &str) -> Result<Self, ConfigError> {
        let dir = Path::new(dir_path);
        if !dir.is_dir() {
            return Err(ConfigError::ValidationError(format!(
                "plugin_dir '{dir_path}' is not a directory"
            )));
        }

        let mut paths = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
            if path.is_file() && (ext == "yaml" || ext == "yml") {
                paths.push(path);
            }
        }
        paths.sort();

        let mut merged = Self::default();
        for path in paths {
            tracing::debug!(path = %path.display(), "Loading plugin config");
            let content = std::fs::read_to_string(&path)?;
            let file_config: Self = serde_yaml::from_str(&content).map_err(|e| {
                ConfigError::ValidationError(format!("failed to parse '{}': {e}", path.display()))
            })?;
            merged = merged.merge(file_config);
        }

        Ok(merged)
    }
}
