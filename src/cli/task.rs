//! Task CLI commands

use anyhow::{bail, Result};
use clap::Subcommand;

use super::output::Output;
use super::session::{parse_task_id, Session};
use crate::domain::{EdgeFilter, Task, TaskStatus, TaskTreeNode};
use crate::engine::EngineError;
use crate::storage::TaskStore;

#[derive(Subcommand)]
pub enum TaskCommands {
    /// Add a task
    ///
    /// Examples:
    ///   depgraph task add "Design schema"
    ///   depgraph task add "Write migration" --parent t-1234567 --estimate 4
    Add {
        /// Task title
        title: String,

        /// Project to file the task under (defaults to the configured project)
        #[arg(long, conflicts_with = "parent")]
        project: Option<String>,

        /// Parent task; the new task joins the parent's project
        #[arg(long)]
        parent: Option<String>,

        /// Estimated hours
        #[arg(long)]
        estimate: Option<f64>,

        /// Story points
        #[arg(long)]
        points: Option<u32>,

        /// Sibling position (advisory)
        #[arg(long)]
        position: Option<i64>,
    },

    /// List tasks in a project
    List {
        #[arg(long)]
        project: Option<String>,

        /// Only tasks with this status
        #[arg(long)]
        status: Option<TaskStatus>,
    },

    /// Show task details, blockers and dependencies
    Show {
        /// Task ID
        id: String,
    },

    /// Set task status (todo, in_progress, in_review, done, cancelled)
    Status {
        /// Task ID
        id: String,

        status: TaskStatus,
    },

    /// Move a task under another parent
    Move {
        /// Task ID
        id: String,

        /// New parent task
        #[arg(long, conflicts_with = "root")]
        parent: Option<String>,

        /// Detach to the root level
        #[arg(long)]
        root: bool,

        /// Sibling position (advisory)
        #[arg(long)]
        position: Option<i64>,
    },

    /// Show the subtree below a task
    Tree {
        /// Task ID
        id: String,

        /// Levels to return, including the task itself
        #[arg(long)]
        depth: Option<u32>,
    },

    /// Roll up hours and completion of direct subtasks
    Summary {
        /// Task ID
        id: String,
    },

    /// Show whether a task can start
    Blocking {
        /// Task ID
        id: String,
    },
}

pub fn run(cmd: TaskCommands, output: &Output) -> Result<()> {
    let session = Session::open()?;

    match cmd {
        TaskCommands::Add {
            title,
            project,
            parent,
            estimate,
            points,
            position,
        } => add_task(
            &session,
            output,
            NewTask {
                title,
                project,
                parent,
                estimate,
                points,
                position,
            },
        ),
        TaskCommands::List { project, status } => {
            list_tasks(&session, output, project.as_deref(), status)
        }
        TaskCommands::Show { id } => show_task(&session, output, &id),
        TaskCommands::Status { id, status } => set_status(&session, output, &id, status),
        TaskCommands::Move {
            id,
            parent,
            root,
            position,
        } => move_task(&session, output, &id, parent.as_deref(), root, position),
        TaskCommands::Tree { id, depth } => show_tree(&session, output, &id, depth),
        TaskCommands::Summary { id } => show_summary(&session, output, &id),
        TaskCommands::Blocking { id } => show_blocking(&session, output, &id),
    }
}

struct NewTask {
    title: String,
    project: Option<String>,
    parent: Option<String>,
    estimate: Option<f64>,
    points: Option<u32>,
    position: Option<i64>,
}

fn add_task(session: &Session, output: &Output, new: NewTask) -> Result<()> {
    if new.title.trim().is_empty() {
        bail!("Task title cannot be empty");
    }

    let mut task = match &new.parent {
        Some(parent) => {
            let parent_id = parse_task_id(parent)?;
            let parent = session.engine.require_task(&parent_id)?;
            Task::new(parent.project_id, &new.title).with_parent(parent.id)
        }
        None => Task::new(session.project_id(new.project.as_deref())?, &new.title),
    };
    task.estimated_hours = new.estimate;
    task.story_points = new.points;
    task.position = new.position;

    session.db().insert_task(&task)?;
    tracing::info!(task = %task.id, project = %task.project_id, "task created");

    if output.is_json() {
        output.data(&task);
    } else {
        output.success(&format!("Created task: {} - {}", task.id, task.title));
    }

    Ok(())
}

fn list_tasks(
    session: &Session,
    output: &Output,
    project: Option<&str>,
    status: Option<TaskStatus>,
) -> Result<()> {
    let project_id = session.project_id(project)?;
    let tasks: Vec<Task> = session
        .db()
        .list_project_tasks(&project_id)?
        .into_iter()
        .filter(|t| status.map_or(true, |s| t.status == s))
        .collect();

    if output.is_json() {
        output.data(&tasks);
    } else if tasks.is_empty() {
        println!("No tasks in project {}.", project_id);
    } else {
        println!("{:<12} {:<12} {:<12} TITLE", "ID", "STATUS", "PARENT");
        println!("{}", "-".repeat(60));
        for task in &tasks {
            let parent = task
                .parent_id
                .as_ref()
                .map(|p| p.to_string())
                .unwrap_or_else(|| "-".to_string());
            println!(
                "{:<12} {:<12} {:<12} {}",
                task.id.to_string(),
                task.status.as_str(),
                parent,
                task.title
            );
        }
    }

    Ok(())
}

fn show_task(session: &Session, output: &Output, id: &str) -> Result<()> {
    let task_id = parse_task_id(id)?;
    let task = session.engine.require_task(&task_id)?;

    let blocking = session.engine.get_task_blocking_info(&task_id)?;
    let edges = session.engine.list_dependencies(&EdgeFilter {
        task_id: Some(task_id.clone()),
        ..Default::default()
    })?;

    if output.is_json() {
        output.data(&serde_json::json!({
            "task": task,
            "blocking": blocking,
            "dependencies": edges,
        }));
        return Ok(());
    }

    println!("ID:       {}", task.id);
    println!("Title:    {}", task.title);
    println!("Project:  {}", task.project_id);
    println!("Status:   {}", task.status);
    if let Some(parent) = &task.parent_id {
        println!("Parent:   {}", parent);
    }
    if let Some(hours) = task.estimated_hours {
        println!("Estimate: {}h", hours);
    }
    if let Some(points) = task.story_points {
        println!("Points:   {}", points);
    }
    match &blocking.blocked_reason {
        Some(reason) => println!("Blocking: {}", reason),
        None => println!("Blocking: can start"),
    }

    if !edges.is_empty() {
        println!();
        println!("Dependencies:");
        for edge in &edges {
            output.row(&[
                &format!("  {}", edge.id),
                edge.label_for(&task_id).as_str(),
                &edge.other_end(&task_id).to_string(),
            ]);
        }
    }

    Ok(())
}

fn set_status(session: &Session, output: &Output, id: &str, status: TaskStatus) -> Result<()> {
    let task_id = parse_task_id(id)?;
    if !session.db().set_task_status(&task_id, status)? {
        return Err(EngineError::TaskNotFound(task_id).into());
    }
    tracing::info!(task = %task_id, status = %status, "task status changed");

    output.success(&format!("Task {} is now {}", task_id, status));
    Ok(())
}

fn move_task(
    session: &Session,
    output: &Output,
    id: &str,
    parent: Option<&str>,
    root: bool,
    position: Option<i64>,
) -> Result<()> {
    let task_id = parse_task_id(id)?;
    let parent_id = match (parent, root) {
        (Some(parent), _) => Some(parse_task_id(parent)?),
        (None, true) => None,
        (None, false) => bail!("Give --parent <TASK> or --root"),
    };

    let task = session
        .engine
        .move_task(&task_id, parent_id.as_ref(), position)?;

    if output.is_json() {
        output.data(&task);
    } else {
        match &task.parent_id {
            Some(parent) => output.success(&format!("Moved {} under {}", task.id, parent)),
            None => output.success(&format!("Moved {} to the root level", task.id)),
        }
    }

    Ok(())
}

fn show_tree(session: &Session, output: &Output, id: &str, depth: Option<u32>) -> Result<()> {
    let task_id = parse_task_id(id)?;
    let tree = session.engine.get_task_tree(&task_id, depth)?;

    if output.is_json() {
        output.data(&tree);
    } else {
        print_tree(&tree);
    }

    Ok(())
}

fn print_tree(root: &TaskTreeNode) {
    // Explicit stack; children pushed in reverse to print in order
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        let marker = if node.has_children && node.children.is_empty() {
            " (+)"
        } else {
            ""
        };
        println!(
            "{}{} [{}] {}{}",
            "  ".repeat(node.depth as usize),
            node.task.id,
            node.task.status,
            node.task.title,
            marker
        );
        stack.extend(node.children.iter().rev());
    }
}

fn show_summary(session: &Session, output: &Output, id: &str) -> Result<()> {
    let task_id = parse_task_id(id)?;
    let summary = session.engine.get_subtask_summary(&task_id)?;

    if output.is_json() {
        output.data(&summary);
    } else {
        println!("Subtasks:   {}", summary.total_subtasks);
        println!("Completed:  {}", summary.completed_subtasks);
        println!("Estimated:  {}h", summary.estimated_hours);
        if summary.story_points > 0 {
            println!("Points:     {}", summary.story_points);
        }
        println!("Progress:   {}%", summary.completion_percentage);
    }

    Ok(())
}

fn show_blocking(session: &Session, output: &Output, id: &str) -> Result<()> {
    let task_id = parse_task_id(id)?;
    let info = session.engine.get_task_blocking_info(&task_id)?;

    if output.is_json() {
        output.data(&info);
    } else if info.can_start {
        println!("{} can start.", info.task_id);
    } else {
        println!("{} is blocked by:", info.task_id);
        for blocker in &info.blocked_by {
            let status = blocker
                .status
                .map(|s| s.to_string())
                .unwrap_or_else(|| "missing".to_string());
            println!(
                "  {} [{}] {}",
                blocker.id,
                status,
                blocker.title.as_deref().unwrap_or("")
            );
        }
    }

    Ok(())
}
