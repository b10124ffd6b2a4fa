use chrono::Utc;

use crate::model::task::Task;

/// Narrow capability interface over whatever actually stores tasks.
///
/// The filtering, snapshot, and monitoring code depends only on this trait,
/// never on a concrete store shape, so hosts can adapt legacy or modern
/// stores without touching the core.
pub trait TaskSource {
    fn all_tasks(&self) -> Vec<Task>;

    fn default_project_id(&self) -> Option<String> {
        None
    }

    /// False while the backing store is still loading; snapshot capture
    /// degrades to an empty "unavailable" result instead of failing.
    fn is_ready(&self) -> bool {
        true
    }

    fn task_count(&self) -> usize {
        self.all_tasks().len()
    }
}

/// A single or batched repository mutation
#[derive(Debug, Clone)]
pub enum TaskMutation {
    Create(Task),
    /// Full replacement of the task with the same id
    Update(Task),
    Delete(String),
    /// Applied all-or-nothing and captured as one history entry
    Batch(Vec<TaskMutation>),
}

#[derive(Debug, PartialEq, thiserror::Error)]
pub enum MutationError {
    #[error("duplicate task id: {0}")]
    DuplicateId(String),
    #[error("task not found: {0}")]
    NotFound(String),
    #[error("update would create a parent cycle through task {0}")]
    ParentCycle(String),
}

/// In-memory task collection, the write path of the engine.
///
/// All mutations go through `apply_mutation`, which validates and applies
/// atomically: a failing batch leaves the collection untouched.
#[derive(Debug, Clone, Default)]
pub struct TaskRepository {
    tasks: Vec<Task>,
    default_project_id: Option<String>,
}

impl TaskRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tasks(tasks: Vec<Task>) -> Self {
        TaskRepository {
            tasks,
            default_project_id: None,
        }
    }

    pub fn set_default_project_id(&mut self, project_id: Option<String>) {
        self.default_project_id = project_id;
    }

    pub fn get_all(&self) -> &[Task] {
        &self.tasks
    }

    pub fn get_by_id(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Validate and apply a mutation, returning how many tasks changed.
    /// Batches are all-or-nothing: the first invalid step rejects the whole
    /// mutation with zero effect.
    pub fn apply_mutation(&mut self, mutation: TaskMutation) -> Result<usize, MutationError> {
        let mut next = self.tasks.clone();
        let changed = Self::apply_to(&mut next, mutation)?;
        self.tasks = next;
        Ok(changed)
    }

    /// Replace the whole collection (history restore path)
    pub(crate) fn set_state(&mut self, tasks: Vec<Task>) {
        self.tasks = tasks;
    }

    fn apply_to(tasks: &mut Vec<Task>, mutation: TaskMutation) -> Result<usize, MutationError> {
        match mutation {
            TaskMutation::Create(mut task) => {
                if tasks.iter().any(|t| t.id == task.id) {
                    return Err(MutationError::DuplicateId(task.id));
                }
                Self::check_parent_chain(tasks, &task)?;
                task.updated_at = Utc::now();
                tasks.push(task);
                Ok(1)
            }
            TaskMutation::Update(mut task) => {
                let Some(pos) = tasks.iter().position(|t| t.id == task.id) else {
                    return Err(MutationError::NotFound(task.id));
                };
                Self::check_parent_chain(tasks, &task)?;
                // created_at is repository-owned; an update can't rewrite it
                task.created_at = tasks[pos].created_at;
                task.updated_at = Utc::now();
                tasks[pos] = task;
                Ok(1)
            }
            TaskMutation::Delete(id) => {
                let Some(pos) = tasks.iter().position(|t| t.id == id) else {
                    return Err(MutationError::NotFound(id));
                };
                tasks.remove(pos);
                Ok(1)
            }
            TaskMutation::Batch(steps) => {
                let mut changed = 0;
                for step in steps {
                    changed += Self::apply_to(tasks, step)?;
                }
                Ok(changed)
            }
        }
    }

    /// Walk the parent chain the candidate would join; reaching the
    /// candidate's own id means the mutation would close a cycle. A parent
    /// id that doesn't resolve ends the walk (dangling references are the
    /// host's data, not ours to reject).
    fn check_parent_chain(tasks: &[Task], candidate: &Task) -> Result<(), MutationError> {
        let mut current = candidate.parent_task_id.as_deref();
        let mut hops = 0;
        while let Some(parent_id) = current {
            if parent_id == candidate.id {
                return Err(MutationError::ParentCycle(candidate.id.clone()));
            }
            let Some(parent) = tasks.iter().find(|t| t.id == parent_id) else {
                break;
            };
            hops += 1;
            if hops > tasks.len() {
                // Pre-existing cycle elsewhere in the chain
                return Err(MutationError::ParentCycle(parent_id.to_string()));
            }
            current = parent.parent_task_id.as_deref();
        }
        Ok(())
    }
}

impl TaskSource for TaskRepository {
    fn all_tasks(&self) -> Vec<Task> {
        self.tasks.clone()
    }

    fn default_project_id(&self) -> Option<String> {
        self.default_project_id.clone()
    }

    fn task_count(&self) -> usize {
        self.tasks.len()
    }
}
