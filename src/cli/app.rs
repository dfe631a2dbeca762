//! Main CLI application structure

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};

use super::output::{Output, OutputFormat};
use super::{dep, logging, query, task};
use crate::domain::ProjectId;
use crate::engine::{EngineError, ErrorKind};
use crate::storage::{Config, Project};

#[derive(Parser)]
#[command(name = "depgraph")]
#[command(author, version, about = "Task dependencies and hierarchy with cycle-safe writes")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output format (defaults to the global config, then text)
    #[arg(long, short = 'f', global = true)]
    pub format: Option<OutputFormat>,

    /// Enable debug logging on stderr
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new depgraph project
    Init {
        /// Path to initialize (defaults to current directory)
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Default project for commands run here
        #[arg(long)]
        project: Option<String>,
    },

    /// Manage tasks and the hierarchy
    #[command(subcommand)]
    Task(task::TaskCommands),

    /// Manage dependencies between tasks
    #[command(subcommand)]
    Dep(dep::DepCommands),

    /// Show tasks ready to work on
    Ready {
        #[arg(long)]
        project: Option<String>,
    },

    /// Show blocked tasks
    Blocked {
        #[arg(long)]
        project: Option<String>,
    },

    /// Show the dependency graph, cycles and topological order
    Graph {
        #[arg(long)]
        project: Option<String>,
    },

    /// Create or delete many dependencies from a JSON or YAML file
    Bulk {
        /// Batch file (.json, .yaml or .yml)
        file: PathBuf,
    },
}

/// Main entry point for the CLI
pub fn run() -> ExitCode {
    let cli = Cli::parse();

    // Outside a project this still yields defaults plus the global file
    let config = Config::load();
    let level = config
        .as_ref()
        .map(|c| c.project.logging.level.clone())
        .unwrap_or_else(|_| "warn".to_string());
    logging::init_tracing(cli.verbose, &level);

    let format = cli
        .format
        .or_else(|| config.as_ref().ok().map(|c| c.global.default_format.into()))
        .unwrap_or_default();
    let output = Output::new(format);

    let result = config.and_then(|_| execute(cli.command, &output));
    match result {
        Ok(()) => {
            tracing::debug!("command completed");
            ExitCode::SUCCESS
        }
        Err(err) => {
            output.error(&format!("{:#}", err), error_kind(&err).as_str());
            ExitCode::FAILURE
        }
    }
}

fn execute(command: Commands, output: &Output) -> Result<()> {
    match command {
        Commands::Init { path, project } => init(output, path, project.as_deref())?,

        Commands::Task(cmd) => task::run(cmd, output)?,
        Commands::Dep(cmd) => dep::run(cmd, output)?,

        Commands::Ready { project } => query::ready(output, project.as_deref())?,
        Commands::Blocked { project } => query::blocked(output, project.as_deref())?,
        Commands::Graph { project } => query::graph(output, project.as_deref())?,
        Commands::Bulk { file } => query::bulk(output, &file)?,
    }

    Ok(())
}

fn init(output: &Output, path: PathBuf, default_project: Option<&str>) -> Result<()> {
    tracing::debug!(path = %path.display(), "initializing project");
    let mut project = Project::init(path)?;

    if let Some(name) = default_project {
        let id: ProjectId = name.parse()?;
        let config = project.config_mut();
        config.project.default_project = id;
        config.save_project()?;
    }

    output.success(&format!(
        "Initialized depgraph project at {}",
        project.root().display()
    ));
    Ok(())
}

/// Kind reported alongside a failed command
fn error_kind(err: &anyhow::Error) -> ErrorKind {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<EngineError>())
        .map(EngineError::kind)
        .unwrap_or(ErrorKind::Internal)
}
