//! Choosing which migrations a run touches.

use super::types::{PlanError, Selection};
use crate::client::{JournalEntry, Operation};
use crate::files::Migration;
use crate::status::{get_migration_states, State};

/// A revert candidate: either a migration on disk, or an ID the journal
/// says is applied but whose files are gone.
enum RevertCandidate<'a> {
    Present(&'a Migration),
    Missing(&'a str),
}

impl RevertCandidate<'_> {
    fn id(&self) -> &str {
        match self {
            RevertCandidate::Present(m) => m.id(),
            RevertCandidate::Missing(id) => id,
        }
    }
}

/// Migrations to apply, in ascending ID order.
///
/// Candidates are pending or reverted. An explicit ID must name a migration
/// on disk; selecting one that is already applied yields an empty plan.
pub fn plan_apply<'a>(
    migrations: &'a [Migration],
    journal: &[JournalEntry],
    selection: &Selection,
) -> Result<Vec<&'a Migration>, PlanError> {
    if let Selection::Id(id) = selection {
        if !migrations.iter().any(|m| m.id() == id) {
            return Err(PlanError::UnknownMigration(id.clone()));
        }
    }

    let states = get_migration_states(migrations, journal);
    let mut candidates: Vec<&Migration> = migrations
        .iter()
        .filter(|m| {
            states
                .iter()
                .find(|s| s.migration_id == m.id())
                .map_or(true, |s| matches!(s.state, State::Pending | State::Reverted))
        })
        .collect();
    candidates.sort_by(|a, b| a.id().cmp(b.id()));

    let selected = match selection {
        Selection::All => candidates,
        Selection::Count(n) => candidates.into_iter().take(*n).collect(),
        Selection::Id(id) => candidates.into_iter().filter(|m| m.id() == id).collect(),
        Selection::To(target) => candidates
            .into_iter()
            .filter(|m| m.id() <= target.as_str())
            .collect(),
    };

    Ok(selected)
}

/// Migrations to revert, in descending ID order.
///
/// Candidates are applied. If the selection reaches an ID that is applied
/// but has no files, planning fails before anything runs.
pub fn plan_revert<'a>(
    migrations: &'a [Migration],
    journal: &'a [JournalEntry],
    selection: &Selection,
) -> Result<Vec<&'a Migration>, PlanError> {
    let states = get_migration_states(migrations, journal);

    let mut candidates: Vec<RevertCandidate<'a>> = Vec::new();
    for state in &states {
        match state.state {
            State::Applied => {
                if let Some(m) = migrations.iter().find(|m| m.id() == state.migration_id) {
                    candidates.push(RevertCandidate::Present(m));
                }
            }
            State::Missing => {
                if let Some(last) = last_entry(journal, &state.migration_id) {
                    if last.operation == Operation::Apply {
                        candidates.push(RevertCandidate::Missing(&last.migration_id));
                    }
                }
            }
            State::Pending | State::Reverted => {}
        }
    }
    candidates.sort_by(|a, b| b.id().cmp(a.id()));

    let selected: Vec<RevertCandidate<'a>> = match selection {
        Selection::All => candidates,
        Selection::Count(n) => candidates.into_iter().take(*n).collect(),
        Selection::Id(id) => {
            let known = migrations.iter().any(|m| m.id() == id)
                || journal.iter().any(|e| &e.migration_id == id);
            if !known {
                return Err(PlanError::UnknownMigration(id.clone()));
            }
            candidates.into_iter().filter(|c| c.id() == id).collect()
        }
        Selection::To(target) => candidates
            .into_iter()
            .filter(|c| c.id() >= target.as_str())
            .collect(),
    };

    selected
        .into_iter()
        .map(|c| match c {
            RevertCandidate::Present(m) => Ok(m),
            RevertCandidate::Missing(id) => Err(PlanError::MissingMigration(id.to_string())),
        })
        .collect()
}

fn last_entry<'a>(journal: &'a [JournalEntry], migration_id: &str) -> Option<&'a JournalEntry> {
    journal.iter().rev().find(|e| e.migration_id == migration_id)
}
