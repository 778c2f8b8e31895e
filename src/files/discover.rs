use super::types::{FileMatch, Migration, SplitMarker};
use super::FilesError;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// `<id>.<name>.sql`, `<id>.<name>.up.sql` or `<id>.<name>.down.sql`
static MIGRATION_FILE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([^./\\]+)\.([^./\\]+)\.(?:(up|down)\.)?sql$")
        .expect("valid migration file pattern")
});

/// Match a file name against the migration filename grammar
pub(crate) fn match_file_name(directory: &Path, file_name: &str) -> Option<FileMatch> {
    let captures = MIGRATION_FILE_PATTERN.captures(file_name)?;

    let marker = match captures.get(3).map(|m| m.as_str()) {
        Some("up") => Some(SplitMarker::Up),
        Some("down") => Some(SplitMarker::Down),
        _ => None,
    };

    Some(FileMatch {
        id: captures[1].to_string(),
        name: captures[2].to_string(),
        marker,
        path: directory.join(file_name),
    })
}

/// List all migrations in a directory, sorted by ID.
///
/// Entries that don't follow the filename grammar are ignored. A missing
/// directory has no migrations. Any malformed or conflicting group fails the
/// whole listing so nothing runs against a partially understood set.
pub async fn list_migrations(directory: &Path) -> Result<Vec<Migration>, FilesError> {
    if !directory.exists() {
        debug!(directory = %directory.display(), "Migration directory does not exist");
        return Ok(Vec::new());
    }

    let mut groups: BTreeMap<(String, String), Vec<FileMatch>> = BTreeMap::new();
    let mut entries = fs::read_dir(directory).await?;

    while let Some(entry) = entries.next_entry().await? {
        let file_name = entry.file_name();
        let Some(file_name) = file_name.to_str() else {
            continue;
        };

        let Some(file_match) = match_file_name(directory, file_name) else {
            debug!(file = %file_name, "Skipping non-migration file");
            continue;
        };

        // Follows symlinks; a dangling link named like a migration is an error.
        if !fs::metadata(&file_match.path).await?.is_file() {
            debug!(file = %file_name, "Skipping non-file entry");
            continue;
        }

        groups
            .entry((file_match.id.clone(), file_match.name.clone()))
            .or_default()
            .push(file_match);
    }

    let mut migrations = groups
        .into_values()
        .map(group_to_migration)
        .collect::<Result<Vec<_>, _>>()?;

    migrations.sort_by(|a, b| a.id().cmp(b.id()));
    check_unique_ids(&migrations)?;

    debug!(count = migrations.len(), "Discovered migrations");
    Ok(migrations)
}

/// Classify the files sharing one `(id, name)` key
fn group_to_migration(matches: Vec<FileMatch>) -> Result<Migration, FilesError> {
    match matches.as_slice() {
        [single] => match single.marker {
            None => Ok(Migration::combined(
                single.id.clone(),
                single.name.clone(),
                single.path.clone(),
            )),
            Some(_) => Err(FilesError::SplitFileMissing(single.path.clone())),
        },
        [first, second] => match (first.marker, second.marker) {
            (Some(SplitMarker::Up), Some(SplitMarker::Down)) => Ok(split_migration(first, second)),
            (Some(SplitMarker::Down), Some(SplitMarker::Up)) => Ok(split_migration(second, first)),
            _ => Err(conflict(&matches)),
        },
        _ => Err(conflict(&matches)),
    }
}

fn split_migration(up: &FileMatch, down: &FileMatch) -> Migration {
    Migration::split(
        up.id.clone(),
        up.name.clone(),
        up.path.clone(),
        down.path.clone(),
    )
}

fn conflict(matches: &[FileMatch]) -> FilesError {
    let mut paths: Vec<PathBuf> = matches.iter().map(|m| m.path.clone()).collect();
    paths.sort();
    FilesError::SplitFileConflict(paths)
}

/// IDs order application, so two migrations may not share one.
fn check_unique_ids(sorted: &[Migration]) -> Result<(), FilesError> {
    for window in sorted.windows(2) {
        if window[0].id() == window[1].id() {
            let id = window[0].id();
            let mut paths: Vec<PathBuf> = sorted
                .iter()
                .filter(|m| m.id() == id)
                .flat_map(|m| m.paths().into_iter().map(Path::to_path_buf))
                .collect();
            paths.sort();
            return Err(FilesError::SplitFileConflict(paths));
        }
    }
    Ok(())
}
