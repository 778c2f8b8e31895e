use std::path::{Path, PathBuf};

/// The name of the project configuration file
pub const CONFIG_FILE: &str = "tidemark.json";

/// Default directory holding migration files, relative to the project
pub const DEFAULT_DIRECTORY: &str = "migrations";

/// Default name of the journal table
pub const DEFAULT_TABLE: &str = "schema_journal";

/// Format used by `generate_id`. Lexicographic order equals chronological order.
pub const ID_FORMAT: &str = "%Y%m%d%H%M%S";

/// Get the path to the configuration file
pub fn get_config_path(project_path: &Path) -> PathBuf {
    project_path.join(CONFIG_FILE)
}

/// Generate a migration ID from the current UTC time
pub fn generate_id() -> String {
    chrono::Utc::now().format(ID_FORMAT).to_string()
}
