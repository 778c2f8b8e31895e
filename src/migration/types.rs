//! Types for the migration system.

use crate::client::ClientError;
use crate::config::ConfigError;
use crate::files::{FilesError, MigrationDirection};
use thiserror::Error;

/// Error running a single migration.
#[derive(Error, Debug)]
pub enum ExecuteError {
    #[error("Migration file error: {0}")]
    Files(#[from] FilesError),

    #[error("Database error: {0}")]
    Client(#[from] ClientError),

    #[error("Migration {migration_id} failed and was rolled back: {source}")]
    Failed {
        migration_id: String,
        #[source]
        source: ClientError,
    },

    /// The database may or may not have applied the transaction.
    #[error("Commit failed for migration {migration_id}, outcome unknown: {source}")]
    CommitFailed {
        migration_id: String,
        #[source]
        source: ClientError,
    },
}

/// Error choosing which migrations to run.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum PlanError {
    #[error("Migration {0} not found")]
    UnknownMigration(String),

    #[error("Migration {0} is applied but its files are missing")]
    MissingMigration(String),
}

/// Error from a [`Migrator`](super::Migrator) operation.
#[derive(Error, Debug)]
pub enum MigratorError {
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Migration file error: {0}")]
    Files(#[from] FilesError),

    #[error("Database error: {0}")]
    Client(#[from] ClientError),

    #[error("Plan error: {0}")]
    Plan(#[from] PlanError),

    #[error("{source} ({} migration(s) completed before the failure)", .completed.len())]
    Execute {
        /// IDs that completed before the failure, in run order.
        completed: Vec<String>,
        #[source]
        source: ExecuteError,
    },
}

/// Which of the candidate migrations to run.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Selection {
    /// Every candidate.
    #[default]
    All,
    /// The first `n` candidates in run order.
    Count(usize),
    /// Exactly one migration.
    Id(String),
    /// Candidates up to and including this ID when applying, down to and
    /// including it when reverting.
    To(String),
}

impl Selection {
    /// Everything when applying, the newest migration when reverting.
    pub fn default_for(direction: MigrationDirection) -> Self {
        match direction {
            MigrationDirection::Up => Selection::All,
            MigrationDirection::Down => Selection::Count(1),
        }
    }
}

/// Result of a multi-migration run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationRunResult {
    pub direction: MigrationDirection,
    /// IDs of the migrations run, in run order.
    pub completed: Vec<String>,
    /// Total execution time in milliseconds
    pub execution_time_ms: u128,
}

impl MigrationRunResult {
    pub fn is_empty(&self) -> bool {
        self.completed.is_empty()
    }
}
