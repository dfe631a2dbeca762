//! Shared state for commands that work inside a project

use anyhow::{Context, Result};

use crate::domain::{ProjectId, TaskId};
use crate::engine::Engine;
use crate::storage::{Database, Project};

pub struct Session {
    pub project: Project,
    pub engine: Engine<Database>,
}

impl Session {
    /// Opens the project at the current directory or a parent
    pub fn open() -> Result<Self> {
        let project = Project::open_current()?;
        let engine = project.engine()?;
        tracing::debug!(root = %project.root().display(), "opened project");

        Ok(Self { project, engine })
    }

    pub fn db(&self) -> &Database {
        self.engine.store()
    }

    /// Name recorded as `created_by`
    pub fn actor(&self) -> String {
        self.project.config().project.actor.effective_name()
    }

    /// `--project` if given, else the configured default
    pub fn project_id(&self, arg: Option<&str>) -> Result<ProjectId> {
        match arg {
            Some(name) => name
                .parse()
                .with_context(|| format!("Invalid project id: {}", name)),
            None => Ok(self.project.config().project.default_project.clone()),
        }
    }
}

pub fn parse_task_id(s: &str) -> Result<TaskId> {
    s.parse().with_context(|| format!("Invalid task id: {}", s))
}
