//! Parent/child task hierarchy
//!
//! The tree is encoded by each task's nullable `parent_id`. Traversals go
//! through a `children_of` lookup (an indexed "children where parent = X"
//! query in the stores) and always use an explicit queue or stack with a
//! visited set, so legacy data with a parent cycle cannot hang them.

use std::collections::{HashSet, VecDeque};

use serde::{Deserialize, Serialize};

use super::id::TaskId;
use super::task::{sibling_order, Task};

/// A node of a task subtree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskTreeNode {
    pub task: Task,
    pub children: Vec<TaskTreeNode>,

    /// True if the task has children in the store, expanded or not
    pub has_children: bool,

    /// Distance from the requested root (root is 0)
    pub depth: u32,
}

impl TaskTreeNode {
    /// Builds the subtree under `root`.
    ///
    /// Children are expanded while `depth < max_depth - 1`; with
    /// `max_depth == 1` only the root is returned. A task reached twice
    /// (parent cycle in stored data) is skipped.
    pub fn build<E>(
        root: Task,
        max_depth: u32,
        mut children_of: impl FnMut(&TaskId) -> Result<Vec<Task>, E>,
    ) -> Result<Self, E> {
        struct Slot {
            task: Task,
            depth: u32,
            /// None when the parent is the root
            parent: Option<usize>,
            has_children: bool,
        }

        let mut visited: HashSet<TaskId> = HashSet::from([root.id.clone()]);
        let mut root_has_children = false;
        let mut slots: Vec<Slot> = Vec::new();
        let mut queue: VecDeque<Option<usize>> = VecDeque::from([None]);

        while let Some(entry) = queue.pop_front() {
            let (task_id, depth) = match entry {
                None => (root.id.clone(), 0),
                Some(idx) => (slots[idx].task.id.clone(), slots[idx].depth),
            };

            let mut children = children_of(&task_id)?;
            children.sort_by(sibling_order);
            match entry {
                None => root_has_children = !children.is_empty(),
                Some(idx) => slots[idx].has_children = !children.is_empty(),
            }

            if depth + 1 >= max_depth {
                continue;
            }

            for child in children {
                if !visited.insert(child.id.clone()) {
                    tracing::warn!(task = %child.id, "task reached twice while walking hierarchy, skipping");
                    continue;
                }
                slots.push(Slot {
                    task: child,
                    depth: depth + 1,
                    parent: entry,
                    has_children: false,
                });
                queue.push_back(Some(slots.len() - 1));
            }
        }

        // Slots are in BFS order, so every child sits after its parent.
        // Folding from the back attaches each finished node to its parent.
        let mut pending: Vec<Vec<TaskTreeNode>> = (0..slots.len()).map(|_| Vec::new()).collect();
        let mut root_children = Vec::new();

        for (idx, slot) in slots.into_iter().enumerate().rev() {
            let mut children = std::mem::take(&mut pending[idx]);
            children.reverse();

            let node = TaskTreeNode {
                task: slot.task,
                children,
                has_children: slot.has_children,
                depth: slot.depth,
            };

            match slot.parent {
                Some(parent) => pending[parent].push(node),
                None => root_children.push(node),
            }
        }
        root_children.reverse();

        Ok(TaskTreeNode {
            task: root,
            children: root_children,
            has_children: root_has_children,
            depth: 0,
        })
    }

    /// Total number of nodes in this subtree, including the root
    pub fn node_count(&self) -> usize {
        let mut count = 0;
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            count += 1;
            stack.extend(node.children.iter());
        }
        count
    }
}

/// Returns true if `candidate` lies in the subtree below `root`.
///
/// `root` itself is not its own descendant.
pub fn is_descendant<E>(
    root: &TaskId,
    candidate: &TaskId,
    mut children_of: impl FnMut(&TaskId) -> Result<Vec<Task>, E>,
) -> Result<bool, E> {
    let mut visited: HashSet<TaskId> = HashSet::from([root.clone()]);
    let mut stack: Vec<TaskId> = vec![root.clone()];

    while let Some(current) = stack.pop() {
        for child in children_of(&current)? {
            if &child.id == candidate {
                return Ok(true);
            }
            if visited.insert(child.id.clone()) {
                stack.push(child.id);
            }
        }
    }

    Ok(false)
}

/// Rollup over the direct children of a task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubtaskSummary {
    pub parent_task_id: TaskId,

    /// Direct children only
    pub total_subtasks: usize,

    pub completed_subtasks: usize,

    /// Sum of children's estimates, missing estimates count as 0
    pub estimated_hours: f64,

    /// Widened so sums of large per-task values cannot overflow
    pub story_points: u64,

    /// 0-100, weighted by story points when any child carries them
    pub completion_percentage: u8,
}

impl SubtaskSummary {
    pub fn from_children(parent_task_id: TaskId, children: &[Task]) -> Self {
        let total_subtasks = children.len();
        let completed_subtasks = children.iter().filter(|c| c.status.is_complete()).count();
        let estimated_hours: f64 = children.iter().map(|c| c.estimated_hours.unwrap_or(0.0)).sum();
        let story_points: u64 = children
            .iter()
            .filter_map(|c| c.story_points)
            .map(u64::from)
            .sum();

        let completion_percentage = if story_points > 0 {
            let done_points: u64 = children
                .iter()
                .filter(|c| c.status.is_complete())
                .filter_map(|c| c.story_points)
                .map(u64::from)
                .sum();
            percentage(done_points as f64, story_points as f64)
        } else if total_subtasks > 0 {
            percentage(completed_subtasks as f64, total_subtasks as f64)
        } else {
            0
        };

        Self {
            parent_task_id,
            total_subtasks,
            completed_subtasks,
            estimated_hours,
            story_points,
            completion_percentage,
        }
    }
}

fn percentage(part: f64, whole: f64) -> u8 {
    ((part / whole) * 100.0).round().clamp(0.0, 100.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ProjectId, TaskStatus};
    use std::collections::HashMap;
    use std::convert::Infallible;

    fn project() -> ProjectId {
        "alpha".parse().unwrap()
    }

    /// Builds a children index from (task, parent) pairs
    fn index(tasks: &[Task]) -> HashMap<TaskId, Vec<Task>> {
        let mut map: HashMap<TaskId, Vec<Task>> = HashMap::new();
        for task in tasks {
            if let Some(parent) = &task.parent_id {
                map.entry(parent.clone()).or_default().push(task.clone());
            }
        }
        map
    }

    fn lookup(map: &HashMap<TaskId, Vec<Task>>) -> impl FnMut(&TaskId) -> Result<Vec<Task>, Infallible> + '_ {
        move |id| Ok(map.get(id).cloned().unwrap_or_default())
    }

    fn family() -> (Task, Task, Task, Task) {
        let root = Task::new(project(), "root");
        let child_a = Task::new(project(), "a").with_parent(root.id.clone());
        let child_b = Task::new(project(), "b").with_parent(root.id.clone());
        let grandchild = Task::new(project(), "a1").with_parent(child_a.id.clone());
        (root, child_a, child_b, grandchild)
    }

    #[test]
    fn tree_depth_one_has_no_children() {
        let (root, a, b, g) = family();
        let map = index(&[a, b, g]);

        let tree = TaskTreeNode::build(root, 1, lookup(&map)).unwrap();
        assert_eq!(tree.depth, 0);
        assert!(tree.children.is_empty());
        assert!(tree.has_children);
    }

    #[test]
    fn tree_depth_two_expands_one_level() {
        let (root, a, b, g) = family();
        let map = index(&[a.clone(), b, g]);

        let tree = TaskTreeNode::build(root, 2, lookup(&map)).unwrap();
        assert_eq!(tree.children.len(), 2);
        assert!(tree.children.iter().all(|c| c.depth == 1 && c.children.is_empty()));

        let node_a = tree.children.iter().find(|c| c.task.id == a.id).unwrap();
        assert!(node_a.has_children);
    }

    #[test]
    fn tree_full_depth() {
        let (root, a, b, g) = family();
        let map = index(&[a.clone(), b, g.clone()]);

        let tree = TaskTreeNode::build(root, 10, lookup(&map)).unwrap();
        assert_eq!(tree.node_count(), 4);

        let node_a = tree.children.iter().find(|c| c.task.id == a.id).unwrap();
        assert_eq!(node_a.children[0].task.id, g.id);
        assert_eq!(node_a.children[0].depth, 2);
        assert!(!node_a.children[0].has_children);
    }

    #[test]
    fn tree_children_follow_position() {
        let root = Task::new(project(), "root");
        let mut first = Task::new(project(), "first").with_parent(root.id.clone());
        let mut second = Task::new(project(), "second").with_parent(root.id.clone());
        first.position = Some(1);
        second.position = Some(2);
        let map = index(&[second.clone(), first.clone()]);

        let tree = TaskTreeNode::build(root, 2, lookup(&map)).unwrap();
        assert_eq!(tree.children[0].task.id, first.id);
        assert_eq!(tree.children[1].task.id, second.id);
    }

    #[test]
    fn tree_survives_parent_cycle() {
        let mut a = Task::new(project(), "a");
        let b = Task::new(project(), "b").with_parent(a.id.clone());
        a.parent_id = Some(b.id.clone());
        let map = index(&[a.clone(), b]);

        let tree = TaskTreeNode::build(a, 100, lookup(&map)).unwrap();
        assert_eq!(tree.node_count(), 2);
    }

    #[test]
    fn descendant_detection() {
        let (root, a, b, g) = family();
        let map = index(&[a.clone(), b.clone(), g.clone()]);

        assert!(is_descendant(&root.id, &g.id, lookup(&map)).unwrap());
        assert!(is_descendant(&a.id, &g.id, lookup(&map)).unwrap());
        assert!(!is_descendant(&b.id, &g.id, lookup(&map)).unwrap());
        assert!(!is_descendant(&g.id, &root.id, lookup(&map)).unwrap());
        assert!(!is_descendant(&root.id, &root.id, lookup(&map)).unwrap());
    }

    #[test]
    fn summary_sums_hours() {
        let parent: TaskId = "t-0000001".parse().unwrap();
        let children = vec![
            Task::new(project(), "a").with_estimate(8.0),
            Task::new(project(), "b").with_estimate(4.0),
        ];

        let summary = SubtaskSummary::from_children(parent, &children);
        assert_eq!(summary.total_subtasks, 2);
        assert_eq!(summary.estimated_hours, 12.0);
        assert_eq!(summary.completion_percentage, 0);
    }

    #[test]
    fn summary_counts_done_children() {
        let parent: TaskId = "t-0000001".parse().unwrap();
        let children = vec![
            Task::new(project(), "a").with_status(TaskStatus::Done),
            Task::new(project(), "b"),
            Task::new(project(), "c").with_status(TaskStatus::Cancelled),
        ];

        let summary = SubtaskSummary::from_children(parent, &children);
        assert_eq!(summary.completed_subtasks, 1);
        assert_eq!(summary.completion_percentage, 33);
    }

    #[test]
    fn summary_weights_by_story_points() {
        let parent: TaskId = "t-0000001".parse().unwrap();
        let children = vec![
            Task::new(project(), "a").with_story_points(3).with_status(TaskStatus::Done),
            Task::new(project(), "b").with_story_points(5),
            Task::new(project(), "c").with_status(TaskStatus::Done),
        ];

        let summary = SubtaskSummary::from_children(parent, &children);
        assert_eq!(summary.story_points, 8);
        // 3 of 8 points
        assert_eq!(summary.completion_percentage, 38);
    }

    #[test]
    fn summary_points_do_not_overflow() {
        let parent: TaskId = "t-0000001".parse().unwrap();
        let children = vec![
            Task::new(project(), "a")
                .with_story_points(u32::MAX)
                .with_status(TaskStatus::Done),
            Task::new(project(), "b")
                .with_story_points(u32::MAX)
                .with_status(TaskStatus::Done),
            Task::new(project(), "c").with_story_points(u32::MAX),
        ];

        let summary = SubtaskSummary::from_children(parent, &children);
        assert_eq!(summary.story_points, 3 * u64::from(u32::MAX));
        assert_eq!(summary.completion_percentage, 67);
    }

    #[test]
    fn summary_without_children() {
        let parent: TaskId = "t-0000001".parse().unwrap();
        let summary = SubtaskSummary::from_children(parent, &[]);
        assert_eq!(summary.total_subtasks, 0);
        assert_eq!(summary.estimated_hours, 0.0);
        assert_eq!(summary.completion_percentage, 0);
    }
}
