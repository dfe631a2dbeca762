//! Project-scoped mutual exclusion
//!
//! Every read-validate-write sequence on a project's edges or hierarchy runs
//! while holding that project's lock. Within a process, a registry of held
//! projects guarded by a mutex and condvar serializes callers. When a lock
//! directory is configured, an exclusive `fs2` lock on
//! `<dir>/<project>.lock` serializes separate processes as well.

use std::collections::{BTreeSet, HashSet};
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::{Condvar, Mutex, PoisonError};

use anyhow::{anyhow, Context, Result};
use fs2::FileExt;

use crate::domain::ProjectId;

/// Registry of per-project locks
#[derive(Debug, Default)]
pub struct ProjectLocks {
    held: Mutex<HashSet<ProjectId>>,
    released: Condvar,
    lock_dir: Option<PathBuf>,
}

impl ProjectLocks {
    /// Locks that only serialize threads of this process
    pub fn in_process() -> Self {
        Self::default()
    }

    /// Locks that also take an advisory file lock per project
    pub fn with_lock_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            lock_dir: Some(dir.into()),
            ..Self::default()
        }
    }

    pub fn lock_dir(&self) -> Option<&Path> {
        self.lock_dir.as_deref()
    }

    /// Blocks until the project's lock is held
    pub fn lock(&self, project: &ProjectId) -> Result<ProjectGuard<'_>> {
        self.lock_all(std::iter::once(project))
    }

    /// Blocks until every listed project is held.
    ///
    /// The set is claimed in one step in-process, and file locks are taken
    /// in sorted order, so overlapping bulk calls cannot deadlock.
    pub fn lock_all<'p>(
        &self,
        projects: impl IntoIterator<Item = &'p ProjectId>,
    ) -> Result<ProjectGuard<'_>> {
        let projects: BTreeSet<ProjectId> = projects.into_iter().cloned().collect();

        {
            let mut held = self
                .held
                .lock()
                .map_err(|_| anyhow!("Project lock registry poisoned"))?;
            while projects.iter().any(|p| held.contains(p)) {
                held = self
                    .released
                    .wait(held)
                    .map_err(|_| anyhow!("Project lock registry poisoned"))?;
            }
            held.extend(projects.iter().cloned());
        }

        // From here on, dropping the guard gives the projects back
        let mut guard = ProjectGuard {
            locks: self,
            projects: projects.into_iter().collect(),
            files: Vec::new(),
        };

        if let Some(dir) = &self.lock_dir {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create lock directory: {}", dir.display()))?;

            for project in &guard.projects {
                let path = dir.join(format!("{}.lock", project.file_stem()));
                let file = OpenOptions::new()
                    .create(true)
                    .truncate(false)
                    .write(true)
                    .open(&path)
                    .with_context(|| format!("Failed to open lock file: {}", path.display()))?;
                file.lock_exclusive()
                    .with_context(|| format!("Failed to lock: {}", path.display()))?;
                guard.files.push(file);
            }
        }

        tracing::trace!(projects = ?guard.projects, "project locks acquired");
        Ok(guard)
    }
}

/// Holds one or more project locks until dropped
#[derive(Debug)]
pub struct ProjectGuard<'a> {
    locks: &'a ProjectLocks,
    projects: Vec<ProjectId>,
    /// Lock is released when the file is closed
    files: Vec<File>,
}

impl Drop for ProjectGuard<'_> {
    fn drop(&mut self) {
        self.files.clear();

        let mut held = self
            .locks
            .held
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        for project in &self.projects {
            held.remove(project);
        }
        drop(held);

        self.locks.released.notify_all();
        tracing::trace!(projects = ?self.projects, "project locks released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;
    use tempfile::TempDir;

    fn project(name: &str) -> ProjectId {
        name.parse().unwrap()
    }

    #[test]
    fn guard_releases_on_drop() {
        let locks = ProjectLocks::in_process();
        let alpha = project("alpha");

        {
            let guard = locks.lock(&alpha).unwrap();
            assert_eq!(guard.projects, vec![alpha.clone()]);
        }

        // Would block forever if the first guard leaked
        let _again = locks.lock(&alpha).unwrap();
    }

    #[test]
    fn distinct_projects_do_not_contend() {
        let locks = ProjectLocks::in_process();
        let _a = locks.lock(&project("alpha")).unwrap();
        let _b = locks.lock(&project("beta")).unwrap();
    }

    #[test]
    fn lock_all_sorts_and_dedups() {
        let locks = ProjectLocks::in_process();
        let (b, a) = (project("beta"), project("alpha"));
        let guard = locks.lock_all([&b, &a, &b]).unwrap();
        assert_eq!(guard.projects, vec![a, b]);
    }

    #[test]
    fn same_project_is_exclusive() {
        let locks = Arc::new(ProjectLocks::in_process());
        let inside = Arc::new(AtomicUsize::new(0));
        let max_inside = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let locks = Arc::clone(&locks);
                let inside = Arc::clone(&inside);
                let max_inside = Arc::clone(&max_inside);
                thread::spawn(move || {
                    let _guard = locks.lock(&project("alpha")).unwrap();
                    let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                    max_inside.fetch_max(now, Ordering::SeqCst);
                    thread::sleep(Duration::from_millis(2));
                    inside.fetch_sub(1, Ordering::SeqCst);
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(max_inside.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn lock_files_created() {
        let dir = TempDir::new().unwrap();
        let locks = ProjectLocks::with_lock_dir(dir.path().join("locks"));

        let _guard = locks.lock(&project("alpha")).unwrap();
        assert!(dir.path().join("locks").join("alpha.lock").exists());
    }
}
