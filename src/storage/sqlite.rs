//! SQLite task and edge store
//!
//! The database sits in `.depgraph/graph.db`. It is the source of truth for
//! file-backed projects; the schema version lives in `PRAGMA user_version`.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::store::{EdgeStore, TaskStore};
use crate::domain::{
    sibling_order, DependencyEdge, EdgeDirection, EdgeId, EdgeKey, ProjectId, Task, TaskId,
    TaskStatus,
};

const TASK_COLUMNS: &str = "id, project_id, parent_id, title, status, estimated_hours, \
                            story_points, position, created_at, updated_at";

const EDGE_COLUMNS: &str =
    "id, project_id, dependent_task_id, blocking_task_id, dep_type, created_at, created_by";

/// Database handle wrapping a SQLite connection
pub struct Database {
    /// None for in-memory databases
    path: Option<PathBuf>,

    conn: Mutex<Connection>,
}

impl Database {
    /// Schema version - bump when the schema changes
    const SCHEMA_VERSION: i32 = 1;

    /// Opens or creates the database at the given path
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {}", path.display()))?;

        // WAL for concurrent readers; writers wait instead of failing
        conn.execute_batch(
            "PRAGMA busy_timeout=5000;
             PRAGMA journal_mode=WAL;
             PRAGMA synchronous=NORMAL;",
        )?;

        let db = Self {
            path: Some(path.to_path_buf()),
            conn: Mutex::new(conn),
        };
        db.ensure_schema()?;

        Ok(db)
    }

    /// Opens an in-memory database (for tests)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self {
            path: None,
            conn: Mutex::new(conn),
        };
        db.ensure_schema()?;

        Ok(db)
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Executes a function with exclusive access to the connection
    fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|_| anyhow!("Database connection lock poisoned"))?;
        f(&conn)
    }

    fn ensure_schema(&self) -> Result<()> {
        self.with_conn(|conn| {
            let version: i32 = conn
                .query_row("PRAGMA user_version", [], |row| row.get(0))
                .optional()?
                .unwrap_or(0);

            match version {
                0 => Self::create_schema(conn),
                v if v == Self::SCHEMA_VERSION => Ok(()),
                v => bail!(
                    "Database schema version {} is newer than supported version {}",
                    v,
                    Self::SCHEMA_VERSION
                ),
            }
        })
    }

    fn create_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS tasks (
                id TEXT PRIMARY KEY,
                project_id TEXT NOT NULL,
                parent_id TEXT,
                title TEXT NOT NULL,
                status TEXT NOT NULL,
                estimated_hours REAL,
                story_points INTEGER,
                position INTEGER,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS dependencies (
                id TEXT PRIMARY KEY,
                project_id TEXT NOT NULL,
                dependent_task_id TEXT NOT NULL,
                blocking_task_id TEXT NOT NULL,
                dep_type TEXT NOT NULL,
                created_at TEXT NOT NULL,
                created_by TEXT,
                UNIQUE (dependent_task_id, blocking_task_id, dep_type)
            );

            CREATE INDEX IF NOT EXISTS idx_tasks_parent ON tasks(parent_id);
            CREATE INDEX IF NOT EXISTS idx_tasks_project ON tasks(project_id);
            CREATE INDEX IF NOT EXISTS idx_deps_dependent ON dependencies(dependent_task_id);
            CREATE INDEX IF NOT EXISTS idx_deps_blocking ON dependencies(blocking_task_id);
            ",
        )?;

        conn.execute_batch(&format!("PRAGMA user_version = {}", Self::SCHEMA_VERSION))?;

        Ok(())
    }

    /// Inserts a new task
    pub fn insert_task(&self, task: &Task) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                &format!(
                    "INSERT INTO tasks ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                    TASK_COLUMNS
                ),
                params![
                    task.id.to_string(),
                    task.project_id.to_string(),
                    task.parent_id.as_ref().map(|p| p.to_string()),
                    task.title,
                    task.status.as_str(),
                    task.estimated_hours,
                    task.story_points,
                    task.position,
                    task.created_at.to_rfc3339(),
                    task.updated_at.to_rfc3339(),
                ],
            )
            .with_context(|| format!("Failed to insert task {}", task.id))?;
            Ok(())
        })
    }

    /// Sets a task's status, returning false if the task is unknown
    pub fn set_task_status(&self, id: &TaskId, status: TaskStatus) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE tasks SET status = ?2, updated_at = ?3 WHERE id = ?1",
                params![id.to_string(), status.as_str(), Utc::now().to_rfc3339()],
            )?;
            Ok(changed > 0)
        })
    }

    fn query_tasks(&self, sql: &str, param: &str) -> Result<Vec<Task>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(sql)?;
            let rows = stmt
                .query_map(params![param], TaskRow::read)?
                .collect::<Result<Vec<_>, _>>()?;
            rows.into_iter().map(Task::try_from).collect()
        })
    }

    fn query_edges(&self, sql: &str, args: &[&dyn rusqlite::ToSql]) -> Result<Vec<DependencyEdge>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(sql)?;
            let rows = stmt
                .query_map(args, EdgeRow::read)?
                .collect::<Result<Vec<_>, _>>()?;
            rows.into_iter().map(DependencyEdge::try_from).collect()
        })
    }
}

/// Raw task columns, converted outside the rusqlite row callback
struct TaskRow {
    id: String,
    project_id: String,
    parent_id: Option<String>,
    title: String,
    status: String,
    estimated_hours: Option<f64>,
    story_points: Option<u32>,
    position: Option<i64>,
    created_at: String,
    updated_at: String,
}

impl TaskRow {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            project_id: row.get(1)?,
            parent_id: row.get(2)?,
            title: row.get(3)?,
            status: row.get(4)?,
            estimated_hours: row.get(5)?,
            story_points: row.get(6)?,
            position: row.get(7)?,
            created_at: row.get(8)?,
            updated_at: row.get(9)?,
        })
    }
}

impl TryFrom<TaskRow> for Task {
    type Error = anyhow::Error;

    fn try_from(row: TaskRow) -> Result<Self> {
        Ok(Task {
            id: row.id.parse()?,
            project_id: row.project_id.parse()?,
            parent_id: row.parent_id.map(|p| p.parse()).transpose()?,
            title: row.title,
            status: row
                .status
                .parse()
                .map_err(|e: String| anyhow!(e))
                .with_context(|| format!("Bad status for task {}", row.id))?,
            estimated_hours: row.estimated_hours,
            story_points: row.story_points,
            position: row.position,
            created_at: parse_timestamp(&row.created_at)?,
            updated_at: parse_timestamp(&row.updated_at)?,
        })
    }
}

struct EdgeRow {
    id: String,
    project_id: String,
    dependent_task_id: String,
    blocking_task_id: String,
    dep_type: String,
    created_at: String,
    created_by: Option<String>,
}

impl EdgeRow {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            project_id: row.get(1)?,
            dependent_task_id: row.get(2)?,
            blocking_task_id: row.get(3)?,
            dep_type: row.get(4)?,
            created_at: row.get(5)?,
            created_by: row.get(6)?,
        })
    }
}

impl TryFrom<EdgeRow> for DependencyEdge {
    type Error = anyhow::Error;

    fn try_from(row: EdgeRow) -> Result<Self> {
        Ok(DependencyEdge {
            id: row.id.parse()?,
            project_id: row.project_id.parse()?,
            dependent_task_id: row.dependent_task_id.parse()?,
            blocking_task_id: row.blocking_task_id.parse()?,
            dep_type: row
                .dep_type
                .parse()
                .map_err(|e: String| anyhow!(e))
                .with_context(|| format!("Bad type for edge {}", row.id))?,
            created_at: parse_timestamp(&row.created_at)?,
            created_by: row.created_by,
        })
    }
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(s)
        .with_context(|| format!("Bad timestamp: {}", s))?
        .with_timezone(&Utc))
}

impl TaskStore for Database {
    fn fetch_task(&self, id: &TaskId) -> Result<Option<Task>> {
        let sql = format!("SELECT {} FROM tasks WHERE id = ?1", TASK_COLUMNS);
        Ok(self.query_tasks(&sql, &id.to_string())?.into_iter().next())
    }

    fn update_task_parent(
        &self,
        id: &TaskId,
        parent_id: Option<&TaskId>,
        position: Option<i64>,
    ) -> Result<()> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE tasks SET parent_id = ?2, position = ?3, updated_at = ?4 WHERE id = ?1",
                params![
                    id.to_string(),
                    parent_id.map(|p| p.to_string()),
                    position,
                    Utc::now().to_rfc3339(),
                ],
            )?;
            if changed == 0 {
                bail!("Task not found: {}", id);
            }
            Ok(())
        })
    }

    fn list_children(&self, parent_id: &TaskId) -> Result<Vec<Task>> {
        let sql = format!("SELECT {} FROM tasks WHERE parent_id = ?1", TASK_COLUMNS);
        let mut children = self.query_tasks(&sql, &parent_id.to_string())?;
        children.sort_by(sibling_order);
        Ok(children)
    }

    fn list_project_tasks(&self, project_id: &ProjectId) -> Result<Vec<Task>> {
        let sql = format!(
            "SELECT {} FROM tasks WHERE project_id = ?1 ORDER BY id",
            TASK_COLUMNS
        );
        self.query_tasks(&sql, project_id.as_str())
    }
}

impl EdgeStore for Database {
    fn list_edges_for_project(&self, project_id: &ProjectId) -> Result<Vec<DependencyEdge>> {
        let sql = "SELECT d.id, d.project_id, d.dependent_task_id, d.blocking_task_id, \
                          d.dep_type, d.created_at, d.created_by
                   FROM dependencies d
                   JOIN tasks a ON a.id = d.dependent_task_id
                   JOIN tasks b ON b.id = d.blocking_task_id
                   WHERE a.project_id = ?1 AND b.project_id = ?1
                   ORDER BY d.created_at, d.id";
        self.query_edges(sql, &[&project_id.as_str()])
    }

    fn list_edges_for_task(
        &self,
        task_id: &TaskId,
        direction: EdgeDirection,
    ) -> Result<Vec<DependencyEdge>> {
        let condition = match direction {
            EdgeDirection::Incoming => "dependent_task_id = ?1",
            EdgeDirection::Outgoing => "blocking_task_id = ?1",
            EdgeDirection::Both => "(dependent_task_id = ?1 OR blocking_task_id = ?1)",
        };
        let sql = format!(
            "SELECT {} FROM dependencies WHERE {} ORDER BY created_at, id",
            EDGE_COLUMNS, condition
        );
        self.query_edges(&sql, &[&task_id.to_string()])
    }

    fn list_all_edges(&self) -> Result<Vec<DependencyEdge>> {
        let sql = format!(
            "SELECT {} FROM dependencies ORDER BY created_at, id",
            EDGE_COLUMNS
        );
        self.query_edges(&sql, &[])
    }

    fn fetch_edge(&self, id: &EdgeId) -> Result<Option<DependencyEdge>> {
        let sql = format!("SELECT {} FROM dependencies WHERE id = ?1", EDGE_COLUMNS);
        Ok(self.query_edges(&sql, &[&id.to_string()])?.into_iter().next())
    }

    fn find_edge(&self, key: &EdgeKey) -> Result<Option<DependencyEdge>> {
        let sql = format!(
            "SELECT {} FROM dependencies
             WHERE dependent_task_id = ?1 AND blocking_task_id = ?2 AND dep_type = ?3",
            EDGE_COLUMNS
        );
        let edges = self.query_edges(
            &sql,
            &[
                &key.dependent_task_id.to_string(),
                &key.blocking_task_id.to_string(),
                &key.dep_type.as_str(),
            ],
        )?;
        Ok(edges.into_iter().next())
    }

    fn insert_edge(&self, edge: &DependencyEdge) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                &format!(
                    "INSERT INTO dependencies ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    EDGE_COLUMNS
                ),
                params![
                    edge.id.to_string(),
                    edge.project_id.to_string(),
                    edge.dependent_task_id.to_string(),
                    edge.blocking_task_id.to_string(),
                    edge.dep_type.as_str(),
                    edge.created_at.to_rfc3339(),
                    edge.created_by,
                ],
            )
            .with_context(|| format!("Failed to insert edge {}", edge.id))?;
            Ok(())
        })
    }

    fn delete_edge(&self, id: &EdgeId) -> Result<bool> {
        self.with_conn(|conn| {
            let changed =
                conn.execute("DELETE FROM dependencies WHERE id = ?1", params![id.to_string()])?;
            Ok(changed > 0)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::DependencyType;
    use tempfile::TempDir;

    fn project() -> ProjectId {
        "alpha".parse().unwrap()
    }

    fn blocks(dependent: &Task, blocking: &Task) -> DependencyEdge {
        DependencyEdge::new(
            project(),
            EdgeKey::new(dependent.id.clone(), blocking.id.clone(), DependencyType::Blocks),
            Some("tester".to_string()),
        )
    }

    #[test]
    fn task_round_trip() {
        let db = Database::open_in_memory().unwrap();
        let parent = Task::new(project(), "Parent");
        let child = Task::new(project(), "Child")
            .with_parent(parent.id.clone())
            .with_estimate(2.5)
            .with_story_points(3);
        db.insert_task(&parent).unwrap();
        db.insert_task(&child).unwrap();

        let loaded = db.fetch_task(&child.id).unwrap().unwrap();
        assert_eq!(loaded.parent_id, Some(parent.id.clone()));
        assert_eq!(loaded.estimated_hours, Some(2.5));
        assert_eq!(loaded.story_points, Some(3));
        assert_eq!(db.list_children(&parent.id).unwrap().len(), 1);
        assert!(db.fetch_task(&"t-fffffff".parse().unwrap()).unwrap().is_none());
    }

    #[test]
    fn status_and_parent_updates() {
        let db = Database::open_in_memory().unwrap();
        let parent = Task::new(project(), "Parent");
        let task = Task::new(project(), "Task").with_parent(parent.id.clone());
        db.insert_task(&parent).unwrap();
        db.insert_task(&task).unwrap();

        assert!(db.set_task_status(&task.id, TaskStatus::Done).unwrap());
        db.update_task_parent(&task.id, None, Some(4)).unwrap();

        let loaded = db.fetch_task(&task.id).unwrap().unwrap();
        assert_eq!(loaded.status, TaskStatus::Done);
        assert!(loaded.parent_id.is_none());
        assert_eq!(loaded.position, Some(4));
        assert!(db.list_children(&parent.id).unwrap().is_empty());
    }

    #[test]
    fn edge_queries() {
        let db = Database::open_in_memory().unwrap();
        let a = Task::new(project(), "A");
        let b = Task::new(project(), "B");
        db.insert_task(&a).unwrap();
        db.insert_task(&b).unwrap();

        let edge = blocks(&b, &a);
        db.insert_edge(&edge).unwrap();

        assert_eq!(db.fetch_edge(&edge.id).unwrap(), Some(edge.clone()));
        assert_eq!(db.find_edge(&edge.key()).unwrap(), Some(edge.clone()));
        assert_eq!(db.list_edges_for_project(&project()).unwrap().len(), 1);
        assert_eq!(db.list_edges_for_task(&b.id, EdgeDirection::Incoming).unwrap().len(), 1);
        assert!(db.list_edges_for_task(&b.id, EdgeDirection::Outgoing).unwrap().is_empty());

        assert!(db.delete_edge(&edge.id).unwrap());
        assert!(db.list_all_edges().unwrap().is_empty());
    }

    #[test]
    fn duplicate_edge_violates_unique_key() {
        let db = Database::open_in_memory().unwrap();
        let a = Task::new(project(), "A");
        let b = Task::new(project(), "B");
        db.insert_edge(&blocks(&b, &a)).unwrap();
        assert!(db.insert_edge(&blocks(&b, &a)).is_err());
    }

    #[test]
    fn reopen_keeps_data() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("graph.db");
        let task = Task::new(project(), "Persisted");

        {
            let db = Database::open(&path).unwrap();
            db.insert_task(&task).unwrap();
        }

        let db = Database::open(&path).unwrap();
        let stored = db.fetch_task(&task.id).unwrap().unwrap();
        assert_eq!(stored.project_id, project());
        assert_eq!(stored.title, "Persisted");
    }
}
