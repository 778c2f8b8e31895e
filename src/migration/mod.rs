//! Running migrations against a database.
//!
//! # Overview
//!
//! - The executor runs one migration in one transaction, together with the
//!   journal entry that records it
//! - The planner turns the current status and a [`Selection`] into an
//!   ordered list of migrations
//! - The [`Migrator`] ties discovery, planning and execution together and
//!   owns the connection for the duration of a run
//!
//! Every migration file is read and split before a run connects, so one
//! malformed file stops the whole run. Past that point a run stops at the
//! first failure, and migrations committed before it stay committed.
//!
//! # Usage
//!
//! ```ignore
//! let migrator = Migrator::new(client, client_config, "migrations", "schema_journal")?;
//! let result = migrator.apply(&Selection::All).await?;
//! ```

mod executor;
mod plan;
mod runner;
mod types;

pub use crate::files::MigrationDirection;
pub use executor::{apply_migration, execute_migration, revert_migration, run_migration};
pub use plan::{plan_apply, plan_revert};
pub use runner::Migrator;
pub use types::{ExecuteError, MigrationRunResult, MigratorError, PlanError, Selection};
