//! Journal types shared by every backend.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// The two things that can happen to a migration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Apply,
    Revert,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Apply => "apply",
            Operation::Revert => "revert",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
#[error("Unknown journal operation: {0}")]
pub struct ParseOperationError(pub String);

impl FromStr for Operation {
    type Err = ParseOperationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "apply" => Ok(Operation::Apply),
            "revert" => Ok(Operation::Revert),
            other => Err(ParseOperationError(other.to_string())),
        }
    }
}

/// One row of the migration journal.
///
/// Entries are only ever appended; their order in the journal is the order
/// operations ran in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub timestamp: DateTime<Utc>,
    pub operation: Operation,
    #[serde(rename = "migrationID")]
    pub migration_id: String,
    #[serde(rename = "migrationName")]
    pub migration_name: String,
}

impl JournalEntry {
    /// An entry stamped with the current time
    pub fn now(
        operation: Operation,
        migration_id: impl Into<String>,
        migration_name: impl Into<String>,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            operation,
            migration_id: migration_id.into(),
            migration_name: migration_name.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_parse_and_display() {
        assert_eq!("apply".parse::<Operation>(), Ok(Operation::Apply));
        assert_eq!("revert".parse::<Operation>(), Ok(Operation::Revert));
        assert!("Apply".parse::<Operation>().is_err());
        assert_eq!(Operation::Revert.to_string(), "revert");
    }

    #[test]
    fn test_journal_entry_field_names() {
        let entry = JournalEntry::now(Operation::Apply, "1", "init");
        let value = serde_json::to_value(&entry).unwrap();

        assert_eq!(value["operation"], "apply");
        assert_eq!(value["migrationID"], "1");
        assert_eq!(value["migrationName"], "init");
        assert!(value["timestamp"].is_string());

        let back: JournalEntry = serde_json::from_value(value).unwrap();
        assert_eq!(back, entry);
    }
}
