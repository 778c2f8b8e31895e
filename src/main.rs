use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tidemark::config::load_config;
use tidemark::files::{
    create, create_split, ensure_directory, list_migrations, read_sections, read_sql,
    COMBINED_TEMPLATE, DOWN_TEMPLATE, UP_TEMPLATE,
};
use tidemark::utils::generate_id;
use tidemark::{Migration, MigrationDirection, MigrationFiles};
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Tidemark - SQL schema migrations tracked in a journal table
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Project root containing tidemark.json
    #[arg(short, long, env = "TIDEMARK_PROJECT", default_value = ".")]
    project: PathBuf,

    /// Migration directory relative to the project, overriding tidemark.json
    #[arg(short, long, env = "TIDEMARK_DIRECTORY")]
    directory: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a new migration from a template
    Create {
        /// Migration name, used in the filename
        name: String,

        /// Write separate up and down files
        #[arg(long)]
        split: bool,

        /// Use this ID instead of the current UTC timestamp
        #[arg(long)]
        id: Option<String>,
    },

    /// List migrations on disk
    List,

    /// Print the SQL of one migration
    Show {
        /// Migration ID
        id: String,

        /// Print the down section instead of the up section
        #[arg(long)]
        down: bool,
    },

    /// Validate every migration file
    Check,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let default_level = if args.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("tidemark={default_level}")));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = load_config(&args.project)
        .await
        .with_context(|| format!("Failed to load config from {}", args.project.display()))?;
    let directory = config.resolve_directory(&args.project, args.directory.as_deref());
    debug!(directory = %directory.display(), "Using migration directory");

    match args.command {
        Command::Create { name, split, id } => {
            let id = id.unwrap_or_else(generate_id);
            let migration = create_migration(&directory, &id, &name, split || config.split).await?;
            for path in migration.paths() {
                println!("{}", path.display());
            }
        }
        Command::List => {
            for migration in discover(&directory).await? {
                println!("{}\t{}\t{}", migration.id(), migration.name(), layout(&migration));
            }
        }
        Command::Show { id, down } => {
            let migrations = discover(&directory).await?;
            let Some(migration) = migrations.iter().find(|m| m.id() == id) else {
                bail!("Migration {id} not found in {}", directory.display());
            };
            let direction = if down {
                MigrationDirection::Down
            } else {
                MigrationDirection::Up
            };
            let sql = read_sql(migration, direction).await?;
            println!("{sql}");
        }
        Command::Check => {
            let migrations = discover(&directory).await?;
            for migration in &migrations {
                read_sections(migration)
                    .await
                    .with_context(|| format!("Migration {} is invalid", migration.id()))?;
            }
            info!(count = migrations.len(), "All migrations are valid");
        }
    }

    Ok(())
}

async fn create_migration(directory: &Path, id: &str, name: &str, split: bool) -> Result<Migration> {
    ensure_directory(directory).await?;

    let migration = if split {
        create_split(UP_TEMPLATE, DOWN_TEMPLATE, directory, id, name).await
    } else {
        create(COMBINED_TEMPLATE, directory, id, name).await
    }
    .with_context(|| format!("Failed to create migration {id}.{name}"))?;

    info!(migration = %migration.id(), split, "Created migration");
    Ok(migration)
}

async fn discover(directory: &Path) -> Result<Vec<Migration>> {
    list_migrations(directory)
        .await
        .with_context(|| format!("Failed to list migrations in {}", directory.display()))
}

fn layout(migration: &Migration) -> &'static str {
    match migration.files() {
        MigrationFiles::Combined { .. } => "combined",
        MigrationFiles::Split { .. } => "split",
    }
}
