//! Migration files on disk.
//!
//! Migrations live in a single directory and follow one of two conventions:
//!
//! - combined: `<id>.<name>.sql`, with the up and down SQL separated by a
//!   line of three or more hyphens
//! - split: `<id>.<name>.up.sql` and `<id>.<name>.down.sql`
//!
//! Listing a directory validates the whole set up front. A lone half of a
//! split pair, or more files than a migration can own, fails the listing.

mod create;
mod discover;
mod sql;
mod types;

pub use create::{
    create, create_split, ensure_directory, validate_name_part, COMBINED_TEMPLATE, DOWN_TEMPLATE,
    UP_TEMPLATE,
};
pub use discover::list_migrations;
pub use sql::{
    read_down_sql, read_sections, read_sql, read_up_sql, split_sections, SqlSections,
};
pub use types::{Migration, MigrationDirection, MigrationFiles};

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FilesError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Missing corresponding migration file for: {}", .0.display())]
    SplitFileMissing(PathBuf),

    #[error("Conflicting migration files: {}", join_paths(.0))]
    SplitFileConflict(Vec<PathBuf>),

    #[error("SQL section missing in migration file: {}", .0.display())]
    SqlMissing(PathBuf),

    #[error("Too many SQL sections in migration file: {}", .0.display())]
    SqlConflict(PathBuf),

    #[error("Invalid migration ID or name '{0}': must be non-empty and contain no '.', '/' or '\\'")]
    InvalidName(String),
}

fn join_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages_name_paths() {
        let err = FilesError::SplitFileMissing(PathBuf::from("migrations/1.x.up.sql"));
        assert!(err.to_string().contains("migrations/1.x.up.sql"));

        let err = FilesError::SplitFileConflict(vec![
            PathBuf::from("1.x.down.sql"),
            PathBuf::from("1.x.sql"),
        ]);
        assert_eq!(err.to_string(), "Conflicting migration files: 1.x.down.sql, 1.x.sql");
    }
}
