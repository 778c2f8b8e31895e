//! Types for migration files.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Where a migration's SQL lives on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum MigrationFiles {
    /// One file with an up section and a down section.
    #[serde(rename_all = "camelCase")]
    Combined { path: PathBuf },
    /// Separate up and down files.
    #[serde(rename_all = "camelCase")]
    Split { up_path: PathBuf, down_path: PathBuf },
}

/// One versioned schema change discovered on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Migration {
    id: String,
    name: String,
    files: MigrationFiles,
}

impl Migration {
    /// A migration stored as a single file
    pub fn combined(id: impl Into<String>, name: impl Into<String>, path: PathBuf) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            files: MigrationFiles::Combined { path },
        }
    }

    /// A migration stored as an up/down file pair
    pub fn split(
        id: impl Into<String>,
        name: impl Into<String>,
        up_path: PathBuf,
        down_path: PathBuf,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            files: MigrationFiles::Split { up_path, down_path },
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn files(&self) -> &MigrationFiles {
        &self.files
    }

    pub fn is_split(&self) -> bool {
        matches!(self.files, MigrationFiles::Split { .. })
    }

    /// Path of a combined migration's file
    pub fn path(&self) -> Option<&Path> {
        match &self.files {
            MigrationFiles::Combined { path } => Some(path),
            MigrationFiles::Split { .. } => None,
        }
    }

    /// Path of a split migration's up file
    pub fn up_path(&self) -> Option<&Path> {
        match &self.files {
            MigrationFiles::Split { up_path, .. } => Some(up_path),
            MigrationFiles::Combined { .. } => None,
        }
    }

    /// Path of a split migration's down file
    pub fn down_path(&self) -> Option<&Path> {
        match &self.files {
            MigrationFiles::Split { down_path, .. } => Some(down_path),
            MigrationFiles::Combined { .. } => None,
        }
    }

    /// Every file backing this migration
    pub fn paths(&self) -> Vec<&Path> {
        match &self.files {
            MigrationFiles::Combined { path } => vec![path.as_path()],
            MigrationFiles::Split { up_path, down_path } => {
                vec![up_path.as_path(), down_path.as_path()]
            }
        }
    }
}

/// Direction to run a migration in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationDirection {
    /// Apply the forward change.
    Up,
    /// Revert the change.
    Down,
}

/// Split-file marker in a migration filename.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SplitMarker {
    Up,
    Down,
}

/// A directory entry whose name follows the migration filename grammar.
#[derive(Debug, Clone)]
pub(crate) struct FileMatch {
    pub id: String,
    pub name: String,
    pub marker: Option<SplitMarker>,
    pub path: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_combined_accessors() {
        let m = Migration::combined("1", "init", PathBuf::from("migrations/1.init.sql"));
        assert!(!m.is_split());
        assert_eq!(m.path(), Some(Path::new("migrations/1.init.sql")));
        assert!(m.up_path().is_none());
        assert!(m.down_path().is_none());
        assert_eq!(m.paths().len(), 1);
    }

    #[test]
    fn test_split_accessors() {
        let m = Migration::split(
            "1",
            "init",
            PathBuf::from("migrations/1.init.up.sql"),
            PathBuf::from("migrations/1.init.down.sql"),
        );
        assert!(m.is_split());
        assert!(m.path().is_none());
        assert_eq!(m.up_path(), Some(Path::new("migrations/1.init.up.sql")));
        assert_eq!(m.down_path(), Some(Path::new("migrations/1.init.down.sql")));
        assert_eq!(m.paths().len(), 2);
    }
}
