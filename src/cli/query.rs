//! Project-wide commands (ready, blocked, graph, bulk)

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

use super::output::Output;
use super::session::Session;
use crate::engine::{BulkOperation, BulkRequest, EngineError};

/// Show tasks whose blockers are all resolved
pub fn ready(output: &Output, project: Option<&str>) -> Result<()> {
    let session = Session::open()?;
    let project_id = session.project_id(project)?;

    let tasks = session.engine.ready_tasks(&project_id)?;
    tracing::debug!(project = %project_id, count = tasks.len(), "ready tasks");

    if output.is_json() {
        output.data(&tasks);
    } else if tasks.is_empty() {
        println!("No tasks ready to work on.");
    } else {
        println!("Ready tasks ({}):", tasks.len());
        println!("{:<12} TITLE", "ID");
        println!("{}", "-".repeat(60));
        for task in &tasks {
            println!("{:<12} {}", task.id.to_string(), task.title);
        }
    }

    Ok(())
}

/// Show unresolved tasks with at least one open blocker
pub fn blocked(output: &Output, project: Option<&str>) -> Result<()> {
    let session = Session::open()?;
    let project_id = session.project_id(project)?;

    let blocked = session.engine.blocked_tasks(&project_id)?;
    tracing::debug!(project = %project_id, count = blocked.len(), "blocked tasks");

    if output.is_json() {
        output.data(&blocked);
    } else if blocked.is_empty() {
        println!("No blocked tasks.");
    } else {
        println!("Blocked tasks ({}):", blocked.len());
        println!("{:<12} WAITING ON", "ID");
        println!("{}", "-".repeat(60));
        for info in &blocked {
            let waiting: Vec<String> = info
                .blocked_by
                .iter()
                .map(|b| b.id.to_string())
                .collect();
            println!("{:<12} {}", info.task_id.to_string(), waiting.join(", "));
        }
    }

    Ok(())
}

/// Print the project's dependency graph
pub fn graph(output: &Output, project: Option<&str>) -> Result<()> {
    let session = Session::open()?;
    let project_id = session.project_id(project)?;

    let graph = session.engine.generate_dependency_graph(&project_id)?;

    if output.is_json() {
        output.data(&graph);
        return Ok(());
    }

    println!(
        "Project {}: {} tasks, {} edges",
        graph.project_id,
        graph.nodes.len(),
        graph.edges.len()
    );
    for edge in &graph.edges {
        println!("  {} --{}--> {}", edge.from, edge.dep_type.as_str(), edge.to);
    }

    if graph.is_acyclic() {
        let order: Vec<String> = graph
            .topological_order
            .iter()
            .map(|id| id.to_string())
            .collect();
        println!();
        println!("Order: {}", order.join(" "));
    } else {
        println!();
        println!("Cycles ({}):", graph.cycles.len());
        for cycle in &graph.cycles {
            let ids: Vec<String> = cycle.iter().map(|id| id.to_string()).collect();
            println!("  {}", ids.join(" -> "));
        }
    }

    Ok(())
}

/// Apply a batch of dependency creates or deletes from a JSON or YAML file
pub fn bulk(output: &Output, file: &Path) -> Result<()> {
    let session = Session::open()?;

    let content = fs::read_to_string(file)
        .with_context(|| format!("Failed to read batch file: {}", file.display()))?;
    let request = parse_request(file, &content)?;
    let actor = session.actor();

    let result = session
        .engine
        .bulk_dependency_operation(&request, Some(&actor))?;

    if output.is_json() {
        output.data(&result);
        return Ok(());
    }

    let verb = match request.operation {
        BulkOperation::Create => "Created",
        BulkOperation::Delete => "Deleted",
    };
    println!("{} {} dependencies", verb, result.successful.len());
    for edge in &result.successful {
        println!("  {} {} -> {}", edge.id, edge.blocking_task_id, edge.dependent_task_id);
    }

    if !result.failed.is_empty() {
        println!("Failed ({}):", result.failed.len());
        for failure in &result.failed {
            println!(
                "  {} -> {} [{}] {}",
                failure.item.blocking_task_id,
                failure.item.dependent_task_id,
                failure.kind,
                failure.error
            );
        }
    }

    Ok(())
}

fn parse_request(file: &Path, content: &str) -> Result<BulkRequest> {
    let is_yaml = matches!(
        file.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    );

    let request = if is_yaml {
        BulkRequest::from_yaml(content)
    } else {
        BulkRequest::from_json(content)
    };

    Ok(request.map_err(EngineError::from)?)
}
