use crate::utils::{get_config_path, DEFAULT_DIRECTORY, DEFAULT_TABLE};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Invalid journal table name: {0}")]
    InvalidTableName(String),
}

/// Journal table names end up interpolated into SQL by real backends.
static TABLE_NAME_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid table name pattern"));

fn default_directory() -> PathBuf {
    PathBuf::from(DEFAULT_DIRECTORY)
}

fn default_table() -> String {
    DEFAULT_TABLE.to_string()
}

/// Tidemark project configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TidemarkConfig {
    /// Directory containing migration files, relative to the project root.
    #[serde(default = "default_directory")]
    pub directory: PathBuf,
    /// Name of the journal table.
    #[serde(default = "default_table")]
    pub table: String,
    /// Whether `create` writes split up/down files by default.
    #[serde(default)]
    pub split: bool,
}

impl Default for TidemarkConfig {
    fn default() -> Self {
        Self {
            directory: default_directory(),
            table: default_table(),
            split: false,
        }
    }
}

impl TidemarkConfig {
    /// Check that the configuration can be used against a database.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_table_name(&self.table)
    }

    /// Resolve the migration directory against the project root
    pub fn migrations_path(&self, project_path: &Path) -> PathBuf {
        project_path.join(&self.directory)
    }

    /// Like [`migrations_path`](Self::migrations_path), but an override
    /// directory takes precedence. Both resolve against the project root.
    pub fn resolve_directory(&self, project_path: &Path, directory: Option<&Path>) -> PathBuf {
        match directory {
            Some(directory) => project_path.join(directory),
            None => self.migrations_path(project_path),
        }
    }
}

/// Validate a journal table name
pub fn validate_table_name(table: &str) -> Result<(), ConfigError> {
    if TABLE_NAME_PATTERN.is_match(table) {
        Ok(())
    } else {
        Err(ConfigError::InvalidTableName(table.to_string()))
    }
}

/// Read the configuration file
pub async fn read_config(project_path: &Path) -> Result<Option<TidemarkConfig>, ConfigError> {
    let config_path = get_config_path(project_path);

    if !config_path.exists() {
        return Ok(None);
    }

    let content = fs::read_to_string(&config_path).await?;
    let config: TidemarkConfig = serde_json::from_str(&content)?;
    config.validate()?;
    Ok(Some(config))
}

/// Read the configuration file, falling back to defaults when there is none
pub async fn load_config(project_path: &Path) -> Result<TidemarkConfig, ConfigError> {
    Ok(read_config(project_path).await?.unwrap_or_default())
}

/// Write the configuration file
pub async fn write_config(
    project_path: &Path,
    config: &TidemarkConfig,
) -> Result<(), ConfigError> {
    config.validate()?;
    let config_path = get_config_path(project_path);
    let content = serde_json::to_string_pretty(config)?;
    fs::write(&config_path, content).await?;
    Ok(())
}
