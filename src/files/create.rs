use super::types::Migration;
use super::FilesError;
use std::path::Path;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

/// Template for a new combined migration
pub const COMBINED_TEMPLATE: &str = "-- Apply the change here.\n\n---\n\n-- Revert the change here.\n";

/// Template for a new split migration's up file
pub const UP_TEMPLATE: &str = "-- Apply the change here.\n";

/// Template for a new split migration's down file
pub const DOWN_TEMPLATE: &str = "-- Revert the change here.\n";

/// Create the migration directory if it doesn't exist
pub async fn ensure_directory(directory: &Path) -> Result<(), FilesError> {
    if !directory.exists() {
        debug!(directory = %directory.display(), "Creating migration directory");
        fs::create_dir_all(directory).await?;
    }
    Ok(())
}

/// IDs and names become filename components separated by dots.
pub fn validate_name_part(part: &str) -> Result<(), FilesError> {
    if part.is_empty() || part.contains(['.', '/', '\\']) {
        return Err(FilesError::InvalidName(part.to_string()));
    }
    Ok(())
}

/// Create a combined migration file from a template.
///
/// Fails if a file with the same name already exists.
pub async fn create(
    template: &str,
    directory: &Path,
    id: &str,
    name: &str,
) -> Result<Migration, FilesError> {
    validate_name_part(id)?;
    validate_name_part(name)?;

    let path = directory.join(format!("{}.{}.sql", id, name));
    write_new_file(&path, template).await?;

    debug!(path = %path.display(), "Created migration");
    Ok(Migration::combined(id, name, path))
}

/// Create a split migration's up and down files from templates.
///
/// Fails if either file already exists; no file is left behind in that case.
pub async fn create_split(
    up_template: &str,
    down_template: &str,
    directory: &Path,
    id: &str,
    name: &str,
) -> Result<Migration, FilesError> {
    validate_name_part(id)?;
    validate_name_part(name)?;

    let up_path = directory.join(format!("{}.{}.up.sql", id, name));
    let down_path = directory.join(format!("{}.{}.down.sql", id, name));

    write_new_file(&up_path, up_template).await?;

    if let Err(e) = write_new_file(&down_path, down_template).await {
        if let Err(remove_err) = fs::remove_file(&up_path).await {
            warn!(
                path = %up_path.display(),
                error = %remove_err,
                "Failed to remove up file after down file creation failed"
            );
        }
        return Err(e);
    }

    debug!(up = %up_path.display(), down = %down_path.display(), "Created split migration");
    Ok(Migration::split(id, name, up_path, down_path))
}

async fn write_new_file(path: &Path, content: &str) -> Result<(), FilesError> {
    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .await?;
    file.write_all(content.as_bytes()).await?;
    file.flush().await?;
    Ok(())
}
