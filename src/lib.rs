pub mod client;
pub mod config;
pub mod files;
pub mod migration;
pub mod status;
pub mod utils;

// Re-export commonly used types
pub use client::{
    Client, ClientError, JournalEntry, MemoryClient, MemoryConfig, MemoryConnection, Operation,
};
pub use config::{load_config, read_config, write_config, ConfigError, TidemarkConfig};
pub use files::{
    create, create_split, list_migrations, read_down_sql, read_sql, read_up_sql, split_sections,
    FilesError, Migration, MigrationDirection, MigrationFiles,
};
pub use migration::{
    apply_migration, revert_migration, ExecuteError, MigrationRunResult, Migrator, MigratorError,
    PlanError, Selection,
};
pub use status::{get_migration_states, MigrationState, State};
