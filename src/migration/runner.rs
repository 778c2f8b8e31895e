use super::executor::execute_migration;
use super::plan::{plan_apply, plan_revert};
use super::types::{MigrationRunResult, MigratorError, Selection};
use crate::client::{Client, ClientError, JournalEntry};
use crate::config::{validate_table_name, TidemarkConfig};
use crate::files::{
    list_migrations, read_sections, FilesError, Migration, MigrationDirection, SqlSections,
};
use crate::status::{get_migration_states, MigrationState};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, warn};

/// Runs migrations from one directory against one database.
///
/// Every operation discovers the migration files first, so a broken
/// directory fails before a connection is opened, then opens a fresh
/// connection and closes it again on the way out. `apply` and `revert` also
/// read and split every migration file up front. Reads never create the
/// journal table.
pub struct Migrator<C: Client> {
    client: C,
    config: C::Config,
    directory: PathBuf,
    table: String,
}

impl<C: Client> Migrator<C> {
    pub fn new(
        client: C,
        config: C::Config,
        directory: impl Into<PathBuf>,
        table: impl Into<String>,
    ) -> Result<Self, MigratorError> {
        let table = table.into();
        validate_table_name(&table)?;

        Ok(Self {
            client,
            config,
            directory: directory.into(),
            table,
        })
    }

    /// Build a migrator from a project's `tidemark.json` settings.
    pub fn from_config(
        client: C,
        config: C::Config,
        project_path: &Path,
        settings: &TidemarkConfig,
    ) -> Result<Self, MigratorError> {
        Self::new(
            client,
            config,
            settings.migrations_path(project_path),
            settings.table.clone(),
        )
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Migrations on disk, sorted by ID
    pub async fn migrations(&self) -> Result<Vec<Migration>, MigratorError> {
        Ok(list_migrations(&self.directory).await?)
    }

    /// The full journal. Empty if the journal table doesn't exist yet.
    pub async fn journal(&self) -> Result<Vec<JournalEntry>, MigratorError> {
        let mut connection = self.client.connect(&self.config).await?;
        let result = self.read_journal(&mut connection).await;
        self.close(connection).await;
        result
    }

    /// State of every migration on disk or in the journal.
    pub async fn status(&self) -> Result<Vec<MigrationState>, MigratorError> {
        let migrations = self.migrations().await?;
        let mut connection = self.client.connect(&self.config).await?;
        let result = self.read_journal(&mut connection).await;
        self.close(connection).await;

        Ok(get_migration_states(&migrations, &result?))
    }

    /// Apply the selected pending or reverted migrations, oldest first.
    pub async fn apply(&self, selection: &Selection) -> Result<MigrationRunResult, MigratorError> {
        self.run(MigrationDirection::Up, selection).await
    }

    /// Revert the selected applied migrations, newest first.
    pub async fn revert(&self, selection: &Selection) -> Result<MigrationRunResult, MigratorError> {
        self.run(MigrationDirection::Down, selection).await
    }

    async fn run(
        &self,
        direction: MigrationDirection,
        selection: &Selection,
    ) -> Result<MigrationRunResult, MigratorError> {
        let start = Instant::now();
        let migrations = self.migrations().await?;
        let sections = load_sections(&migrations).await?;

        let mut connection = self.client.connect(&self.config).await?;
        let result = self
            .run_with(&mut connection, &migrations, &sections, direction, selection)
            .await;
        self.close(connection).await;

        let completed = result?;
        let execution_time_ms = start.elapsed().as_millis();

        info!(
            ?direction,
            count = completed.len(),
            execution_time_ms = execution_time_ms as u64,
            "Migration run complete"
        );

        Ok(MigrationRunResult {
            direction,
            completed,
            execution_time_ms,
        })
    }

    async fn run_with(
        &self,
        connection: &mut C::Connection,
        migrations: &[Migration],
        sections: &HashMap<&str, SqlSections>,
        direction: MigrationDirection,
        selection: &Selection,
    ) -> Result<Vec<String>, MigratorError> {
        let journal = self.read_journal(connection).await?;

        let plan = match direction {
            MigrationDirection::Up => plan_apply(migrations, &journal, selection)?,
            MigrationDirection::Down => plan_revert(migrations, &journal, selection)?,
        };

        if plan.is_empty() {
            info!(?direction, "Nothing to run");
            return Ok(Vec::new());
        }

        let mut completed = Vec::with_capacity(plan.len());
        for migration in plan {
            // Every discovered migration was loaded by `load_sections`.
            let sql = sections[migration.id()].for_direction(direction);
            if let Err(source) =
                execute_migration(&self.client, connection, &self.table, migration, direction, sql)
                    .await
            {
                return Err(MigratorError::Execute { completed, source });
            }
            completed.push(migration.id().to_string());
        }

        Ok(completed)
    }

    async fn read_journal(
        &self,
        connection: &mut C::Connection,
    ) -> Result<Vec<JournalEntry>, MigratorError> {
        match self.client.read_journal(connection, &self.table).await {
            Ok(journal) => Ok(journal),
            Err(ClientError::JournalMissing(_)) => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn close(&self, connection: C::Connection) {
        if let Err(e) = self.client.disconnect(connection).await {
            warn!(error = %e, "Failed to close connection");
        }
    }
}

/// Read and split every migration, so a malformed file fails the run before
/// anything touches the database.
async fn load_sections(
    migrations: &[Migration],
) -> Result<HashMap<&str, SqlSections>, FilesError> {
    let mut sections = HashMap::with_capacity(migrations.len());
    for migration in migrations {
        sections.insert(migration.id(), read_sections(migration).await?);
    }
    Ok(sections)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{MemoryClient, MemoryConfig, Operation};
    use crate::files::create;
    use crate::migration::types::{ExecuteError, PlanError};
    use crate::status::State;

    async fn setup(temp: &Path) -> Migrator<MemoryClient> {
        let client = MemoryClient::new();
        client.create_database("app").await.unwrap();
        Migrator::new(client, MemoryConfig::new("app"), temp, "schema_journal").unwrap()
    }

    #[tokio::test]
    async fn test_rejects_bad_table_name() {
        let result = Migrator::new(
            MemoryClient::new(),
            MemoryConfig::new("app"),
            "migrations",
            "journal; DROP",
        );
        assert!(matches!(result, Err(MigratorError::Config(_))));
    }

    #[tokio::test]
    async fn test_apply_and_revert_all() {
        let temp_dir = tempfile::tempdir().unwrap();
        let dir = temp_dir.path();
        create("CREATE TABLE a (id INT);\n---\nDROP TABLE a;\n", dir, "1", "a")
            .await
            .unwrap();
        create("CREATE TABLE b (id INT);\n---\nDROP TABLE b;\n", dir, "2", "b")
            .await
            .unwrap();
        let migrator = setup(dir).await;

        let result = migrator.apply(&Selection::All).await.unwrap();
        assert_eq!(result.completed, vec!["1", "2"]);
        assert!(migrator.status().await.unwrap().iter().all(|s| s.state == State::Applied));

        // Nothing left to apply
        let result = migrator.apply(&Selection::All).await.unwrap();
        assert!(result.is_empty());

        let result = migrator.revert(&Selection::All).await.unwrap();
        assert_eq!(result.completed, vec!["2", "1"]);
        assert!(migrator.status().await.unwrap().iter().all(|s| s.state == State::Reverted));

        let journal = migrator.journal().await.unwrap();
        assert_eq!(journal.len(), 4);
        assert_eq!(journal[3].operation, Operation::Revert);
    }

    #[tokio::test]
    async fn test_failure_stops_run_and_keeps_earlier_commits() {
        let temp_dir = tempfile::tempdir().unwrap();
        let dir = temp_dir.path();
        create("CREATE TABLE a (id INT);\n---\n", dir, "1", "a").await.unwrap();
        create("CREATE TABLE a (id INT);\n---\n", dir, "2", "dup").await.unwrap();
        create("CREATE TABLE c (id INT);\n---\n", dir, "3", "c").await.unwrap();
        let migrator = setup(dir).await;

        let err = migrator.apply(&Selection::All).await.unwrap_err();
        match err {
            MigratorError::Execute { completed, source } => {
                assert_eq!(completed, vec!["1"]);
                assert!(matches!(source, ExecuteError::Failed { .. }));
            }
            other => panic!("unexpected error: {other}"),
        }

        let states = migrator.status().await.unwrap();
        let summary: Vec<State> = states.iter().map(|s| s.state).collect();
        assert_eq!(summary, vec![State::Applied, State::Pending, State::Pending]);
    }

    #[tokio::test]
    async fn test_broken_directory_fails_before_connecting() {
        let temp_dir = tempfile::tempdir().unwrap();
        let dir = temp_dir.path();
        tokio::fs::write(dir.join("1.a.up.sql"), "SELECT 1;").await.unwrap();

        // The database doesn't exist, so connecting would fail differently.
        let migrator = Migrator::new(
            MemoryClient::new(),
            MemoryConfig::new("nope"),
            dir,
            "schema_journal",
        )
        .unwrap();

        let err = migrator.apply(&Selection::All).await.unwrap_err();
        assert!(matches!(err, MigratorError::Files(_)));
    }

    #[tokio::test]
    async fn test_malformed_file_blocks_whole_run() {
        let temp_dir = tempfile::tempdir().unwrap();
        let dir = temp_dir.path();
        create("CREATE TABLE a (id INT);\n---\nDROP TABLE a;\n", dir, "1", "a")
            .await
            .unwrap();
        create("CREATE TABLE b (id INT);\n", dir, "2", "b").await.unwrap();
        let migrator = setup(dir).await;

        let err = migrator.apply(&Selection::All).await.unwrap_err();
        assert!(matches!(err, MigratorError::Files(FilesError::SqlMissing(_))));

        let mut conn = migrator.client().connect(&MemoryConfig::new("app")).await.unwrap();
        assert!(migrator.client().table_names(&mut conn).await.unwrap().is_empty());
        assert!(migrator.journal().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_reads_do_not_create_journal() {
        let temp_dir = tempfile::tempdir().unwrap();
        let dir = temp_dir.path();
        create("SELECT 1;\n---\n", dir, "1", "a").await.unwrap();
        let migrator = setup(dir).await;

        let states = migrator.status().await.unwrap();
        assert_eq!(states[0].state, State::Pending);
        assert!(migrator.journal().await.unwrap().is_empty());

        // Selecting nothing doesn't create it either
        migrator.revert(&Selection::All).await.unwrap();

        let mut conn = migrator.client().connect(&MemoryConfig::new("app")).await.unwrap();
        let result = migrator.client().read_journal(&mut conn, "schema_journal").await;
        assert!(matches!(result, Err(ClientError::JournalMissing(_))));
    }

    #[tokio::test]
    async fn test_revert_with_missing_files() {
        let temp_dir = tempfile::tempdir().unwrap();
        let dir = temp_dir.path();
        let migration = create("SELECT 1;\n---\nSELECT 2;\n", dir, "1", "gone")
            .await
            .unwrap();
        let migrator = setup(dir).await;
        migrator.apply(&Selection::All).await.unwrap();

        tokio::fs::remove_file(migration.path().unwrap()).await.unwrap();

        let states = migrator.status().await.unwrap();
        assert_eq!(states[0].state, State::Missing);
        assert_eq!(states[0].migration_name, "gone");

        let err = migrator.revert(&Selection::Count(1)).await.unwrap_err();
        assert!(matches!(
            err,
            MigratorError::Plan(PlanError::MissingMigration(ref id)) if id == "1"
        ));
    }
}
