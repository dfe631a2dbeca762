//! Dependency CLI commands

use anyhow::{Context, Result};
use clap::Subcommand;

use super::output::Output;
use super::session::{parse_task_id, Session};
use crate::domain::{DependencyEdge, DependencyType, EdgeFilter, EdgeId, EdgeKey};

#[derive(Subcommand)]
pub enum DepCommands {
    /// Add a dependency, read from TASK's point of view
    ///
    /// Examples:
    ///   depgraph dep add t-aaaaaaa blocks t-bbbbbbb
    ///   depgraph dep add t-bbbbbbb is_blocked_by t-aaaaaaa
    ///   depgraph dep add t-aaaaaaa relates_to t-ccccccc
    Add {
        /// Task the relation is stated from
        task: String,

        /// blocks, is_blocked_by or relates_to
        dep_type: DependencyType,

        /// The other task
        other: String,
    },

    /// Remove a dependency by edge ID
    Rm {
        /// Edge ID (e-xxxxxxx)
        id: String,
    },

    /// List dependencies
    List {
        /// Edges touching this task (takes precedence over --project)
        #[arg(long)]
        task: Option<String>,

        /// Edges inside this project
        #[arg(long)]
        project: Option<String>,

        /// Only edges of this type
        #[arg(long = "type")]
        dep_type: Option<DependencyType>,
    },
}

pub fn run(cmd: DepCommands, output: &Output) -> Result<()> {
    let session = Session::open()?;

    match cmd {
        DepCommands::Add {
            task,
            dep_type,
            other,
        } => add_dependency(&session, output, &task, dep_type, &other),
        DepCommands::Rm { id } => remove_dependency(&session, output, &id),
        DepCommands::List {
            task,
            project,
            dep_type,
        } => list_dependencies(
            &session,
            output,
            task.as_deref(),
            project.as_deref(),
            dep_type,
        ),
    }
}

fn add_dependency(
    session: &Session,
    output: &Output,
    task: &str,
    dep_type: DependencyType,
    other: &str,
) -> Result<()> {
    let key = EdgeKey::from_perspective(parse_task_id(task)?, dep_type, parse_task_id(other)?);
    let actor = session.actor();

    let edge = session.engine.create_dependency(
        &key.dependent_task_id,
        &key.blocking_task_id,
        key.dep_type,
        Some(&actor),
    )?;

    if output.is_json() {
        output.data(&edge);
    } else {
        output.success(&format!("Created dependency {}: {}", edge.id, describe(&edge)));
    }

    Ok(())
}

fn remove_dependency(session: &Session, output: &Output, id: &str) -> Result<()> {
    let edge_id: EdgeId = id
        .parse()
        .with_context(|| format!("Invalid edge id: {}", id))?;

    let edge = session.engine.delete_dependency(&edge_id)?;

    if output.is_json() {
        output.data(&edge);
    } else {
        output.success(&format!("Removed dependency {}: {}", edge.id, describe(&edge)));
    }

    Ok(())
}

fn list_dependencies(
    session: &Session,
    output: &Output,
    task: Option<&str>,
    project: Option<&str>,
    dep_type: Option<DependencyType>,
) -> Result<()> {
    let task_id = task.map(parse_task_id).transpose()?;
    let project_id = match (&task_id, project) {
        (Some(_), None) => None,
        _ => Some(session.project_id(project)?),
    };

    let edges = session.engine.list_dependencies(&EdgeFilter {
        task_id,
        project_id,
        dep_type,
    })?;

    if output.is_json() {
        output.data(&edges);
    } else if edges.is_empty() {
        println!("No dependencies.");
    } else {
        println!("{:<12} {:<12} {:<14} {:<12} BY", "ID", "BLOCKING", "TYPE", "DEPENDENT");
        println!("{}", "-".repeat(64));
        for edge in &edges {
            println!(
                "{:<12} {:<12} {:<14} {:<12} {}",
                edge.id.to_string(),
                edge.blocking_task_id.to_string(),
                edge.dep_type.as_str(),
                edge.dependent_task_id.to_string(),
                edge.created_by.as_deref().unwrap_or("-")
            );
        }
    }

    Ok(())
}

fn describe(edge: &DependencyEdge) -> String {
    match edge.dep_type {
        DependencyType::RelatesTo => format!(
            "{} relates to {}",
            edge.dependent_task_id, edge.blocking_task_id
        ),
        _ => format!(
            "{} blocks {}",
            edge.blocking_task_id, edge.dependent_task_id
        ),
    }
}
