//! Command-line host over the takecopter project repository.
//!
//! # Responsibility
//! - Expose the repository contract as subcommands for scripting and checks.
//! - Keep output line-oriented (`key=value` or tab-separated) for easy parsing.

use clap::{Parser, Subcommand};
use log::info;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use takecopter_core::{
    default_log_level, init_logging, CreateStoryInput, ProjectDataRepository, ProjectRepository,
    ProjectService, RepoError, RepoResult, RepositoryConfig,
};

#[derive(Parser)]
#[command(name = "takecopter")]
#[command(version)]
#[command(about = "Local project repository for the takecopter writing workbench")]
struct Cli {
    /// Application data directory (defaults to $TAKECOPTER_DATA_DIR or the platform data dir)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Start file logging at this level (trace|debug|info|warn|error)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Start file logging in this directory (defaults to <data-dir>/logs)
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show bootstrap state and the active project
    Status,

    /// Create (or reuse) a project root and make it active
    Init {
        /// Root directory; the default root is used when omitted
        path: Option<String>,
    },

    /// Activate an existing project root
    Open { path: String },

    /// List stories, newest first
    List,

    /// Create a story
    Create {
        title: String,

        #[arg(short, long, default_value = "")]
        description: String,
    },

    /// Rename a story
    Rename { id: String, title: String },

    /// Delete a story and its workspace
    Delete { id: String },

    /// Export the project (or one story) as a JSON envelope
    Export {
        /// Export only this story
        #[arg(long)]
        story: Option<String>,

        /// Write here instead of <root>/exports/
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Import a JSON envelope
    Import {
        file: PathBuf,

        /// The file holds a single story; other stories are kept
        #[arg(long)]
        story: bool,
    },

    /// Copy the database image to <root>/exports/
    Backup,
}

impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Self::Status => "status",
            Self::Init { .. } => "init",
            Self::Open { .. } => "open",
            Self::List => "list",
            Self::Create { .. } => "create",
            Self::Rename { .. } => "rename",
            Self::Delete { .. } => "delete",
            Self::Export { .. } => "export",
            Self::Import { .. } => "import",
            Self::Backup => "backup",
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> RepoResult<()> {
    let config = match &cli.data_dir {
        Some(dir) => RepositoryConfig::new(dir),
        None => RepositoryConfig::from_env()?,
    };
    start_logging(&cli, &config);

    info!(
        "event=cli_run module=cli status=start command={}",
        cli.command.name()
    );
    let repo = ProjectRepository::open(config)?;
    let mut service = ProjectService::new(repo);

    match cli.command {
        Commands::Status => {
            let state = service.repo().bootstrap_state();
            println!("needs_setup={}", state.needs_setup);
            println!("default_root={}", state.default_root_path);
            if let Some(active) = state.active_root_path {
                println!("active_root={active}");
                let stories = service.repo_mut().load()?.stories.len();
                println!("schema_version={}", service.repo_mut().schema_version()?);
                println!("stories={stories}");
            }
        }
        Commands::Init { path } => {
            let root = service.repo_mut().initialize_project_root(path.as_deref())?;
            service.repo_mut().load()?;
            println!("{}", root.display());
        }
        Commands::Open { path } => {
            let root = service.repo_mut().open_project_root(&path)?;
            service.repo_mut().load()?;
            println!("{}", root.display());
        }
        Commands::List => {
            let project = service.repo_mut().load()?;
            for story in &project.stories {
                let cards = project
                    .workspace(&story.id)
                    .map_or(0, |workspace| workspace.settings.len());
                println!(
                    "{}\t{}\t{}\t{} cards",
                    story.id, story.updated_at, story.title, cards
                );
            }
        }
        Commands::Create { title, description } => {
            let story = service
                .repo_mut()
                .create_story(CreateStoryInput::new(title, description))?;
            println!("{}", story.id);
        }
        Commands::Rename { id, title } => {
            let story = service.repo_mut().rename_story(&id, &title)?;
            println!("{}\t{}", story.id, story.title);
        }
        Commands::Delete { id } => {
            service.repo_mut().delete_story(&id)?;
        }
        Commands::Export { story, out } => {
            let path = match (story, out) {
                (Some(id), Some(out)) => {
                    let envelope = service.repo_mut().export_story(&id)?;
                    write_pretty(&out, &envelope)?;
                    out
                }
                (None, Some(out)) => {
                    let envelope = service.repo_mut().export_project()?;
                    write_pretty(&out, &envelope)?;
                    out
                }
                (Some(id), None) => service.export_story_to_file(&id)?,
                (None, None) => service.export_project_to_file()?,
            };
            println!("{}", path.display());
        }
        Commands::Import { file, story } => {
            if story {
                let story = service.import_story_file(&file)?;
                println!("{}", story.id);
            } else {
                service.import_project_file(&file)?;
                let count = service.repo_mut().load()?.stories.len();
                println!("stories={count}");
            }
        }
        Commands::Backup => {
            let path = service.backup_database()?;
            println!("{}", path.display());
        }
    }
    Ok(())
}

/// Logging starts only when a level or a directory was requested.
fn start_logging(cli: &Cli, config: &RepositoryConfig) {
    if cli.log_level.is_none() && cli.log_dir.is_none() {
        return;
    }
    let level = cli.log_level.as_deref().unwrap_or(default_log_level());
    let dir = cli.log_dir.clone().unwrap_or_else(|| config.log_dir());
    let dir = absolute(&dir);
    if let Err(err) = init_logging(level, &dir) {
        eprintln!("warning: logging disabled: {err}");
    }
}

fn absolute(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    std::env::current_dir()
        .map(|cwd| cwd.join(path))
        .unwrap_or_else(|_| path.to_path_buf())
}

fn write_pretty<T: serde::Serialize>(path: &Path, value: &T) -> RepoResult<()> {
    let bytes = serde_json::to_vec_pretty(value)
        .map_err(|err| RepoError::InvalidData(format!("serialize failed: {err}")))?;
    std::fs::write(path, bytes).map_err(|source| RepoError::Io {
        path: path.to_path_buf(),
        source,
    })
}
