use super::types::{Migration, MigrationDirection, MigrationFiles};
use super::FilesError;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;
use tokio::fs;

/// A line of three or more hyphens and nothing else.
static SECTION_SEPARATOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^-{3,}\r?$").expect("valid section separator pattern"));

/// The two SQL bodies of a combined migration file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlSections {
    pub up: String,
    pub down: String,
}

/// Split combined migration content into its up and down sections.
///
/// `path` is only used to identify the file in errors.
pub fn split_sections(path: &Path, content: &str) -> Result<SqlSections, FilesError> {
    let sections: Vec<&str> = SECTION_SEPARATOR.split(content).collect();

    match sections.as_slice() {
        [up, down] => Ok(SqlSections {
            up: up.trim().to_string(),
            down: down.trim().to_string(),
        }),
        [_] => Err(FilesError::SqlMissing(path.to_path_buf())),
        _ => Err(FilesError::SqlConflict(path.to_path_buf())),
    }
}

impl SqlSections {
    pub fn for_direction(&self, direction: MigrationDirection) -> &str {
        match direction {
            MigrationDirection::Up => &self.up,
            MigrationDirection::Down => &self.down,
        }
    }
}

/// Read both SQL bodies of a migration, trimmed.
pub async fn read_sections(migration: &Migration) -> Result<SqlSections, FilesError> {
    match migration.files() {
        MigrationFiles::Split { up_path, down_path } => Ok(SqlSections {
            up: fs::read_to_string(up_path).await?.trim().to_string(),
            down: fs::read_to_string(down_path).await?.trim().to_string(),
        }),
        MigrationFiles::Combined { path } => {
            let content = fs::read_to_string(path).await?;
            split_sections(path, &content)
        }
    }
}

/// Read the SQL that applies a migration
pub async fn read_up_sql(migration: &Migration) -> Result<String, FilesError> {
    read_sql(migration, MigrationDirection::Up).await
}

/// Read the SQL that reverts a migration
pub async fn read_down_sql(migration: &Migration) -> Result<String, FilesError> {
    read_sql(migration, MigrationDirection::Down).await
}

/// Read a migration's SQL for the given direction, trimmed.
pub async fn read_sql(
    migration: &Migration,
    direction: MigrationDirection,
) -> Result<String, FilesError> {
    match migration.files() {
        MigrationFiles::Split { up_path, down_path } => {
            let path = match direction {
                MigrationDirection::Up => up_path,
                MigrationDirection::Down => down_path,
            };
            let content = fs::read_to_string(path).await?;
            Ok(content.trim().to_string())
        }
        MigrationFiles::Combined { path } => {
            let content = fs::read_to_string(path).await?;
            let sections = split_sections(path, &content)?;
            Ok(match direction {
                MigrationDirection::Up => sections.up,
                MigrationDirection::Down => sections.down,
            })
        }
    }
}
