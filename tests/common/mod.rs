#![allow(dead_code)]

use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tidemark::{Client, MemoryClient, MemoryConfig, MemoryConnection};

pub const JOURNAL_TABLE: &str = "schema_journal";

/// Create a temporary directory for testing
pub fn create_test_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp dir")
}

/// Write a file into the migration directory
pub async fn write_file(directory: &Path, file_name: &str, content: &str) -> PathBuf {
    let path = directory.join(file_name);
    tokio::fs::write(&path, content)
        .await
        .expect("Failed to write migration file");
    path
}

/// A memory backend with one empty database
pub async fn memory_database(name: &str) -> (MemoryClient, MemoryConfig) {
    let client = MemoryClient::new();
    client
        .create_database(name)
        .await
        .expect("Failed to create database");
    (client, MemoryConfig::new(name))
}

/// Open a fresh connection to a memory database
pub async fn connect(client: &MemoryClient, config: &MemoryConfig) -> MemoryConnection {
    client.connect(config).await.expect("Failed to connect")
}
