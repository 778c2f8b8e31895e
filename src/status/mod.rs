//! Migration status reconciliation.
//!
//! Status is never stored. It is recomputed from the discovered migrations
//! and the full journal on every call, so there is no second source of truth
//! that could drift from the journal.

use crate::client::{JournalEntry, Operation};
use crate::files::Migration;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use tracing::warn;

/// Lifecycle state of one migration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum State {
    /// Never applied.
    Pending,
    /// Most recently applied.
    Applied,
    /// Most recently reverted.
    Reverted,
    /// In the journal, but its file is gone.
    Missing,
}

impl State {
    pub fn as_str(&self) -> &'static str {
        match self {
            State::Pending => "pending",
            State::Applied => "applied",
            State::Reverted => "reverted",
            State::Missing => "missing",
        }
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status of one migration ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationState {
    #[serde(rename = "migrationID")]
    pub migration_id: String,
    #[serde(rename = "migrationName")]
    pub migration_name: String,
    pub state: State,
}

impl MigrationState {
    pub fn is_applied(&self) -> bool {
        self.state == State::Applied
    }
}

/// Compute the state of every migration ID found on disk or in the journal.
///
/// For an ID with journal history, the last entry in journal order decides
/// the state; timestamps are never compared. IDs only present in the journal
/// are `Missing`. The result is sorted by ID.
pub fn get_migration_states(
    migrations: &[Migration],
    journal: &[JournalEntry],
) -> Vec<MigrationState> {
    let mut history: HashMap<&str, Vec<&JournalEntry>> = HashMap::new();
    for entry in journal {
        history
            .entry(entry.migration_id.as_str())
            .or_default()
            .push(entry);
    }

    let mut states: BTreeMap<&str, MigrationState> = BTreeMap::new();

    for migration in migrations {
        let state = match history.get(migration.id()).and_then(|h| h.last()) {
            None => State::Pending,
            Some(last) => operation_state(last.operation),
        };

        states.insert(
            migration.id(),
            MigrationState {
                migration_id: migration.id().to_string(),
                migration_name: migration.name().to_string(),
                state,
            },
        );
    }

    for (id, entries) in &history {
        check_history(id, entries);

        if states.contains_key(id) {
            continue;
        }

        let migration_name = entries
            .last()
            .map(|e| e.migration_name.clone())
            .unwrap_or_default();

        states.insert(
            *id,
            MigrationState {
                migration_id: id.to_string(),
                migration_name,
                state: State::Missing,
            },
        );
    }

    states.into_values().collect()
}

/// Find the state of one migration ID
pub fn find_state<'a>(states: &'a [MigrationState], migration_id: &str) -> Option<&'a MigrationState> {
    states.iter().find(|s| s.migration_id == migration_id)
}

fn operation_state(operation: Operation) -> State {
    match operation {
        Operation::Apply => State::Applied,
        Operation::Revert => State::Reverted,
    }
}

/// History should alternate apply, revert, apply... starting with apply.
/// Anything else still resolves by the last entry, but is worth a warning.
fn check_history(migration_id: &str, entries: &[&JournalEntry]) {
    let mut expected = Operation::Apply;
    for (position, entry) in entries.iter().enumerate() {
        if entry.operation != expected {
            warn!(
                migration = %migration_id,
                position,
                operation = %entry.operation,
                "Inconsistent journal history"
            );
            return;
        }
        expected = match expected {
            Operation::Apply => Operation::Revert,
            Operation::Revert => Operation::Apply,
        };
    }
}
