use super::types::{JournalEntry, Operation};
use super::{Client, ClientError};
use async_trait::async_trait;
use sqlparser::ast::{ObjectType, Statement};
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

/// Everything one in-memory database holds.
#[derive(Debug, Clone, Default)]
struct DatabaseState {
    journals: HashMap<String, Vec<JournalEntry>>,
    tables: BTreeSet<String>,
    statements: Vec<String>,
    /// Bumped on every committed change to live state.
    version: u64,
}

impl DatabaseState {
    fn has_relation(&self, name: &str) -> bool {
        self.tables.contains(name) || self.journals.contains_key(name)
    }

    fn journal_mut(&mut self, table: &str) -> Result<&mut Vec<JournalEntry>, ClientError> {
        self.journals
            .get_mut(table)
            .ok_or_else(|| ClientError::JournalMissing(table.to_string()))
    }

    fn apply_statement(&mut self, statement: &Statement) -> Result<(), ClientError> {
        match statement {
            Statement::CreateTable(create) => {
                let name = create.name.to_string();
                if self.has_relation(&name) {
                    if !create.if_not_exists {
                        return Err(ClientError::Query(format!(
                            "relation \"{}\" already exists",
                            name
                        )));
                    }
                } else {
                    self.tables.insert(name);
                }
            }
            Statement::Drop {
                object_type: ObjectType::Table,
                names,
                if_exists,
                ..
            } => {
                for name in names {
                    let name = name.to_string();
                    let removed =
                        self.tables.remove(&name) || self.journals.remove(&name).is_some();
                    if !removed && !*if_exists {
                        return Err(ClientError::Query(format!(
                            "table \"{}\" does not exist",
                            name
                        )));
                    }
                }
            }
            _ => {}
        }

        self.statements.push(statement.to_string());
        Ok(())
    }
}

/// The open transaction of a connection: the live version it started from
/// and the working copy every read and write goes to until it ends.
#[derive(Debug)]
struct OpenTransaction {
    base_version: u64,
    working: DatabaseState,
}

/// Connection settings for [`MemoryClient`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryConfig {
    /// Name of a database created with [`MemoryClient::create_database`].
    pub database: String,
}

impl MemoryConfig {
    pub fn new(database: impl Into<String>) -> Self {
        Self {
            database: database.into(),
        }
    }
}

/// A connection to one in-memory database.
#[derive(Debug)]
pub struct MemoryConnection {
    database: String,
    transaction: Option<OpenTransaction>,
}

impl MemoryConnection {
    pub fn database(&self) -> &str {
        &self.database
    }

    pub fn in_transaction(&self) -> bool {
        self.transaction.is_some()
    }
}

/// In-process backend holding any number of named databases.
///
/// Clones share the same databases, so state committed through one
/// connection is visible to every later connection.
///
/// Transactions follow the reference model: `begin` takes a working copy of
/// live state, `commit` promotes the working copy to live, `rollback` drops
/// it. Live state is never touched by an open transaction. A commit fails if
/// another connection changed live state after `begin`, so no committed
/// change is ever overwritten.
///
/// SQL is parsed with the PostgreSQL dialect. `CREATE TABLE` and `DROP TABLE`
/// maintain a table catalog; other statements are only recorded.
#[derive(Debug, Clone, Default)]
pub struct MemoryClient {
    databases: Arc<Mutex<HashMap<String, DatabaseState>>>,
}

impl MemoryClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty database
    pub async fn create_database(&self, name: &str) -> Result<(), ClientError> {
        if name.is_empty() {
            return Err(ClientError::Connection(
                "database name must not be empty".to_string(),
            ));
        }

        let mut databases = self.databases.lock().await;
        if databases.contains_key(name) {
            return Err(ClientError::Connection(format!(
                "database \"{}\" already exists",
                name
            )));
        }
        databases.insert(name.to_string(), DatabaseState::default());
        debug!(database = %name, "Created in-memory database");
        Ok(())
    }

    /// Drop a database and everything in it
    pub async fn drop_database(&self, name: &str) -> Result<(), ClientError> {
        let mut databases = self.databases.lock().await;
        databases
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| ClientError::Connection(format!("database \"{}\" does not exist", name)))
    }

    /// Names of tables created through SQL, as this connection sees them
    pub async fn table_names(
        &self,
        connection: &mut MemoryConnection,
    ) -> Result<Vec<String>, ClientError> {
        self.read_state(connection, |state| {
            Ok(state.tables.iter().cloned().collect())
        })
        .await
    }

    /// Every statement executed so far, as this connection sees them
    pub async fn executed_statements(
        &self,
        connection: &mut MemoryConnection,
    ) -> Result<Vec<String>, ClientError> {
        self.read_state(connection, |state| Ok(state.statements.clone()))
            .await
    }

    /// Read the transaction's working copy if one is open, otherwise live
    /// state.
    async fn read_state<R, F>(
        &self,
        connection: &mut MemoryConnection,
        f: F,
    ) -> Result<R, ClientError>
    where
        F: FnOnce(&DatabaseState) -> Result<R, ClientError> + Send,
        R: Send,
    {
        if let Some(transaction) = connection.transaction.as_ref() {
            return f(&transaction.working);
        }

        let databases = self.databases.lock().await;
        let state = databases
            .get(&connection.database)
            .ok_or_else(|| missing_database(&connection.database))?;
        f(state)
    }

    /// Change the transaction's working copy if one is open, otherwise
    /// change live state directly (autocommit).
    async fn write_state<R, F>(
        &self,
        connection: &mut MemoryConnection,
        f: F,
    ) -> Result<R, ClientError>
    where
        F: FnOnce(&mut DatabaseState) -> Result<R, ClientError> + Send,
        R: Send,
    {
        if let Some(transaction) = connection.transaction.as_mut() {
            return f(&mut transaction.working);
        }

        let mut databases = self.databases.lock().await;
        let state = databases
            .get_mut(&connection.database)
            .ok_or_else(|| missing_database(&connection.database))?;
        state.version += 1;
        f(state)
    }
}

fn missing_database(name: &str) -> ClientError {
    ClientError::Connection(format!("database \"{}\" does not exist", name))
}

#[async_trait]
impl Client for MemoryClient {
    type Config = MemoryConfig;
    type Connection = MemoryConnection;

    async fn connect(&self, config: &MemoryConfig) -> Result<MemoryConnection, ClientError> {
        let databases = self.databases.lock().await;
        if !databases.contains_key(&config.database) {
            return Err(missing_database(&config.database));
        }

        debug!(database = %config.database, "Connected");
        Ok(MemoryConnection {
            database: config.database.clone(),
            transaction: None,
        })
    }

    async fn disconnect(&self, connection: MemoryConnection) -> Result<(), ClientError> {
        if connection.in_transaction() {
            debug!(database = %connection.database, "Discarding open transaction on disconnect");
        }
        debug!(database = %connection.database, "Disconnected");
        Ok(())
    }

    async fn begin_transaction(&self, connection: &mut MemoryConnection) -> Result<(), ClientError> {
        if connection.in_transaction() {
            return Err(ClientError::Transaction(
                "a transaction is already in progress".to_string(),
            ));
        }

        let databases = self.databases.lock().await;
        let live = databases
            .get(&connection.database)
            .ok_or_else(|| missing_database(&connection.database))?;

        connection.transaction = Some(OpenTransaction {
            base_version: live.version,
            working: live.clone(),
        });
        Ok(())
    }

    async fn commit_transaction(
        &self,
        connection: &mut MemoryConnection,
    ) -> Result<(), ClientError> {
        let transaction = connection
            .transaction
            .take()
            .ok_or_else(|| ClientError::Transaction("no transaction in progress".to_string()))?;

        let mut databases = self.databases.lock().await;
        let live = databases
            .get_mut(&connection.database)
            .ok_or_else(|| missing_database(&connection.database))?;

        if live.version != transaction.base_version {
            return Err(ClientError::Transaction(
                "database changed by another connection since the transaction began".to_string(),
            ));
        }

        *live = transaction.working;
        live.version = transaction.base_version + 1;
        Ok(())
    }

    async fn rollback_transaction(
        &self,
        connection: &mut MemoryConnection,
    ) -> Result<(), ClientError> {
        connection
            .transaction
            .take()
            .map(|_| ())
            .ok_or_else(|| ClientError::Transaction("no transaction in progress".to_string()))
    }

    async fn execute(&self, connection: &mut MemoryConnection, sql: &str) -> Result<(), ClientError> {
        let statements = Parser::parse_sql(&PostgreSqlDialect {}, sql)
            .map_err(|e| ClientError::Query(e.to_string()))?;

        self.write_state(connection, |state| {
            statements
                .iter()
                .try_for_each(|statement| state.apply_statement(statement))
        })
        .await
    }

    async fn ensure_journal(
        &self,
        connection: &mut MemoryConnection,
        table: &str,
    ) -> Result<(), ClientError> {
        self.write_state(connection, |state| {
            if !state.journals.contains_key(table) {
                if state.tables.contains(table) {
                    return Err(ClientError::Query(format!(
                        "relation \"{}\" already exists and is not a journal",
                        table
                    )));
                }
                state.journals.insert(table.to_string(), Vec::new());
            }
            Ok(())
        })
        .await
    }

    async fn append_journal(
        &self,
        connection: &mut MemoryConnection,
        table: &str,
        operation: Operation,
        migration_id: &str,
        migration_name: &str,
    ) -> Result<(), ClientError> {
        let entry = JournalEntry::now(operation, migration_id, migration_name);
        self.write_state(connection, |state| {
            state.journal_mut(table)?.push(entry);
            Ok(())
        })
        .await
    }

    async fn read_journal(
        &self,
        connection: &mut MemoryConnection,
        table: &str,
    ) -> Result<Vec<JournalEntry>, ClientError> {
        self.read_state(connection, |state| {
            state
                .journals
                .get(table)
                .cloned()
                .ok_or_else(|| ClientError::JournalMissing(table.to_string()))
        })
        .await
    }
}
