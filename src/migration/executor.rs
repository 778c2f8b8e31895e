//! Transactional execution of a single migration.

use super::types::ExecuteError;
use crate::client::{Client, ClientError, Operation};
use crate::files::{read_sql, Migration, MigrationDirection};
use tracing::{debug, error, info};

/// Apply one migration in its own transaction
pub async fn apply_migration<C: Client>(
    client: &C,
    connection: &mut C::Connection,
    table: &str,
    migration: &Migration,
) -> Result<(), ExecuteError> {
    run_migration(client, connection, table, migration, MigrationDirection::Up).await
}

/// Revert one migration in its own transaction
pub async fn revert_migration<C: Client>(
    client: &C,
    connection: &mut C::Connection,
    table: &str,
    migration: &Migration,
) -> Result<(), ExecuteError> {
    run_migration(client, connection, table, migration, MigrationDirection::Down).await
}

/// Run one migration in one direction, reading its SQL first.
pub async fn run_migration<C: Client>(
    client: &C,
    connection: &mut C::Connection,
    table: &str,
    migration: &Migration,
    direction: MigrationDirection,
) -> Result<(), ExecuteError> {
    let sql = read_sql(migration, direction).await?;
    execute_migration(client, connection, table, migration, direction, &sql).await
}

/// Run one migration in one direction with SQL that was already read.
///
/// The SQL and the journal entry recording it commit together or not at all:
/// - any failure before commit rolls back, then surfaces the original error
/// - a failed commit is reported as [`ExecuteError::CommitFailed`] and never
///   retried
pub async fn execute_migration<C: Client>(
    client: &C,
    connection: &mut C::Connection,
    table: &str,
    migration: &Migration,
    direction: MigrationDirection,
    sql: &str,
) -> Result<(), ExecuteError> {
    let operation = match direction {
        MigrationDirection::Up => Operation::Apply,
        MigrationDirection::Down => Operation::Revert,
    };

    info!(
        migration = %migration.id(),
        name = %migration.name(),
        %operation,
        "Running migration"
    );

    client.begin_transaction(connection).await?;

    if let Err(e) = run_in_transaction(client, connection, table, migration, sql, operation).await
    {
        error!(migration = %migration.id(), error = %e, "Migration failed, rolling back");

        if let Err(rollback_err) = client.rollback_transaction(connection).await {
            error!(
                migration = %migration.id(),
                error = %rollback_err,
                "Rollback failed"
            );
        }

        return Err(ExecuteError::Failed {
            migration_id: migration.id().to_string(),
            source: e,
        });
    }

    client
        .commit_transaction(connection)
        .await
        .map_err(|source| {
            error!(migration = %migration.id(), error = %source, "Commit failed");
            ExecuteError::CommitFailed {
                migration_id: migration.id().to_string(),
                source,
            }
        })?;

    info!(migration = %migration.id(), %operation, "Migration committed");
    Ok(())
}

async fn run_in_transaction<C: Client>(
    client: &C,
    connection: &mut C::Connection,
    table: &str,
    migration: &Migration,
    sql: &str,
    operation: Operation,
) -> Result<(), ClientError> {
    if sql.is_empty() {
        debug!(migration = %migration.id(), "Migration SQL is empty");
    } else {
        client.execute(connection, sql).await?;
    }

    client.ensure_journal(connection, table).await?;
    client
        .append_journal(connection, table, operation, migration.id(), migration.name())
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{JournalEntry, MemoryClient, MemoryConfig};
    use crate::files::create;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};

    const JOURNAL: &str = "schema_journal";

    /// Delegates to a memory client but can be told to fail commits.
    struct FlakyCommitClient {
        inner: MemoryClient,
        fail_commit: AtomicBool,
    }

    #[async_trait]
    impl Client for FlakyCommitClient {
        type Config = MemoryConfig;
        type Connection = <MemoryClient as Client>::Connection;

        async fn connect(&self, config: &MemoryConfig) -> Result<Self::Connection, ClientError> {
            self.inner.connect(config).await
        }

        async fn disconnect(&self, connection: Self::Connection) -> Result<(), ClientError> {
            self.inner.disconnect(connection).await
        }

        async fn begin_transaction(&self, c: &mut Self::Connection) -> Result<(), ClientError> {
            self.inner.begin_transaction(c).await
        }

        async fn commit_transaction(&self, c: &mut Self::Connection) -> Result<(), ClientError> {
            if self.fail_commit.load(Ordering::SeqCst) {
                return Err(ClientError::Connection("connection reset".to_string()));
            }
            self.inner.commit_transaction(c).await
        }

        async fn rollback_transaction(&self, c: &mut Self::Connection) -> Result<(), ClientError> {
            self.inner.rollback_transaction(c).await
        }

        async fn execute(&self, c: &mut Self::Connection, sql: &str) -> Result<(), ClientError> {
            self.inner.execute(c, sql).await
        }

        async fn ensure_journal(&self, c: &mut Self::Connection, t: &str) -> Result<(), ClientError> {
            self.inner.ensure_journal(c, t).await
        }

        async fn append_journal(
            &self,
            c: &mut Self::Connection,
            t: &str,
            operation: Operation,
            id: &str,
            name: &str,
        ) -> Result<(), ClientError> {
            self.inner.append_journal(c, t, operation, id, name).await
        }

        async fn read_journal(
            &self,
            c: &mut Self::Connection,
            t: &str,
        ) -> Result<Vec<JournalEntry>, ClientError> {
            self.inner.read_journal(c, t).await
        }
    }

    async fn setup() -> (MemoryClient, crate::client::MemoryConnection) {
        let client = MemoryClient::new();
        client.create_database("test").await.unwrap();
        let conn = client.connect(&MemoryConfig::new("test")).await.unwrap();
        (client, conn)
    }

    #[tokio::test]
    async fn test_apply_then_revert() {
        let temp_dir = tempfile::tempdir().unwrap();
        let migration = create(
            "CREATE TABLE users (id INT);\n---\nDROP TABLE users;\n",
            temp_dir.path(),
            "1",
            "users",
        )
        .await
        .unwrap();
        let (client, mut conn) = setup().await;

        apply_migration(&client, &mut conn, JOURNAL, &migration).await.unwrap();
        assert_eq!(client.table_names(&mut conn).await.unwrap(), vec!["users"]);

        revert_migration(&client, &mut conn, JOURNAL, &migration).await.unwrap();
        assert!(client.table_names(&mut conn).await.unwrap().is_empty());

        let journal = client.read_journal(&mut conn, JOURNAL).await.unwrap();
        let ops: Vec<Operation> = journal.iter().map(|e| e.operation).collect();
        assert_eq!(ops, vec![Operation::Apply, Operation::Revert]);
        assert!(journal.iter().all(|e| e.migration_id == "1" && e.migration_name == "users"));
        assert!(!conn.in_transaction());
    }

    #[tokio::test]
    async fn test_sql_failure_rolls_back() {
        let temp_dir = tempfile::tempdir().unwrap();
        let migration = create(
            "CREATE TABLE users (id INT);\nCREATE TABLE users (id INT);\n---\n",
            temp_dir.path(),
            "1",
            "dup",
        )
        .await
        .unwrap();
        let (client, mut conn) = setup().await;

        let err = apply_migration(&client, &mut conn, JOURNAL, &migration)
            .await
            .unwrap_err();
        assert!(matches!(err, ExecuteError::Failed { ref migration_id, .. } if migration_id == "1"));

        assert!(!conn.in_transaction());
        assert!(client.table_names(&mut conn).await.unwrap().is_empty());
        assert!(client.read_journal(&mut conn, JOURNAL).await.is_err());
    }

    #[tokio::test]
    async fn test_unparseable_file_never_opens_transaction() {
        let temp_dir = tempfile::tempdir().unwrap();
        let migration = create("SELECT 1;\n", temp_dir.path(), "1", "nosep")
            .await
            .unwrap();
        let (client, mut conn) = setup().await;

        let err = apply_migration(&client, &mut conn, JOURNAL, &migration)
            .await
            .unwrap_err();
        assert!(matches!(err, ExecuteError::Files(_)));
        assert!(!conn.in_transaction());
    }

    #[tokio::test]
    async fn test_begin_failure_is_reported() {
        let temp_dir = tempfile::tempdir().unwrap();
        let migration = create("SELECT 1;\n---\n", temp_dir.path(), "1", "x")
            .await
            .unwrap();
        let (client, mut conn) = setup().await;
        client.begin_transaction(&mut conn).await.unwrap();

        let err = apply_migration(&client, &mut conn, JOURNAL, &migration)
            .await
            .unwrap_err();
        assert!(matches!(err, ExecuteError::Client(ClientError::Transaction(_))));
    }

    #[tokio::test]
    async fn test_commit_failure_is_fatal() {
        let temp_dir = tempfile::tempdir().unwrap();
        let migration = create("SELECT 1;\n---\n", temp_dir.path(), "1", "x")
            .await
            .unwrap();
        let client = FlakyCommitClient {
            inner: MemoryClient::new(),
            fail_commit: AtomicBool::new(true),
        };
        client.inner.create_database("test").await.unwrap();
        let mut conn = client.connect(&MemoryConfig::new("test")).await.unwrap();

        let err = apply_migration(&client, &mut conn, JOURNAL, &migration)
            .await
            .unwrap_err();
        assert!(matches!(err, ExecuteError::CommitFailed { .. }));
    }
}
