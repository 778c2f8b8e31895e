//! Database/journal interface.
//!
//! Every backend implements [`Client`]: connection lifecycle, a single
//! transaction slot per connection, SQL execution, and the journal table.
//! The rest of the crate only talks to this trait. [`MemoryClient`] is the
//! reference implementation; it keeps state in process and defines the
//! observable transactional behavior real drivers must match.

mod memory;
mod types;

pub use memory::{MemoryClient, MemoryConfig, MemoryConnection};
pub use types::{JournalEntry, Operation, ParseOperationError};

use async_trait::async_trait;
use thiserror::Error;

/// Errors raised by a backend.
///
/// The core never interprets these beyond rolling back, so drivers are free
/// to put whatever their database reported into the message.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Transaction error: {0}")]
    Transaction(String),

    #[error("Query error: {0}")]
    Query(String),

    #[error("Journal table '{0}' does not exist")]
    JournalMissing(String),
}

/// A database backend.
///
/// Operations on one connection are issued one at a time; each call completes
/// before the next starts. At most one transaction is open per connection.
#[async_trait]
pub trait Client: Send + Sync {
    /// Backend specific connection settings.
    type Config: Send + Sync;

    /// An open session.
    type Connection: Send;

    /// Open a connection.
    async fn connect(&self, config: &Self::Config) -> Result<Self::Connection, ClientError>;

    /// Close a connection. An open transaction is discarded.
    async fn disconnect(&self, connection: Self::Connection) -> Result<(), ClientError>;

    /// Open a transaction. Fails if one is already open.
    async fn begin_transaction(&self, connection: &mut Self::Connection)
        -> Result<(), ClientError>;

    /// Make everything since `begin_transaction` durable.
    async fn commit_transaction(
        &self,
        connection: &mut Self::Connection,
    ) -> Result<(), ClientError>;

    /// Discard everything since `begin_transaction`.
    async fn rollback_transaction(
        &self,
        connection: &mut Self::Connection,
    ) -> Result<(), ClientError>;

    /// Run migration SQL, possibly several statements.
    async fn execute(&self, connection: &mut Self::Connection, sql: &str)
        -> Result<(), ClientError>;

    /// Create the journal table unless it exists.
    async fn ensure_journal(
        &self,
        connection: &mut Self::Connection,
        table: &str,
    ) -> Result<(), ClientError>;

    /// Append an entry stamped with the current time.
    async fn append_journal(
        &self,
        connection: &mut Self::Connection,
        table: &str,
        operation: Operation,
        migration_id: &str,
        migration_name: &str,
    ) -> Result<(), ClientError>;

    /// All journal entries in insertion order, including uncommitted ones
    /// written by this connection's open transaction.
    ///
    /// Fails with [`ClientError::JournalMissing`] if the table doesn't exist.
    async fn read_journal(
        &self,
        connection: &mut Self::Connection,
        table: &str,
    ) -> Result<Vec<JournalEntry>, ClientError>;
}
