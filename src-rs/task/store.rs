use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::Utc;
use thiserror::Error;

use super::types::{Task, TaskStatus};
use crate::result::GenerationResult;

static COUNTER: AtomicUsize = AtomicUsize::new(1);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("unknown task {0}")]
    UnknownTask(String),

    #[error("task {id} is already {status:?}")]
    Terminal { id: String, status: TaskStatus },
}

/// In-memory task records keyed by id.
///
/// Every mutation happens under the write lock and replaces all affected
/// fields at once, so readers never observe a half-applied transition.
/// Terminal tasks are frozen.
#[derive(Default)]
pub struct TaskRegistry {
    tasks: RwLock<HashMap<String, Entry>>,
}

struct Entry {
    seq: usize,
    task: Task,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&self, requirements: &str) -> Task {
        let (seq, id) = next_id();
        let task = Task {
            id: id.clone(),
            requirements: requirements.to_string(),
            status: TaskStatus::Started,
            progress: 0,
            message: "Generation request accepted".to_string(),
            started_at: Utc::now(),
            completed_at: None,
            result: None,
            error: None,
        };
        self.write().insert(
            id,
            Entry {
                seq,
                task: task.clone(),
            },
        );
        task
    }

    /// Records a milestone. Progress only moves forward.
    pub fn advance(&self, id: &str, progress: u8, message: &str) -> Result<Task, TransitionError> {
        self.transition(id, |task| {
            task.status = TaskStatus::Generating;
            task.progress = task.progress.max(progress.min(99));
            task.message = message.to_string();
        })
    }

    pub fn complete(&self, id: &str, result: GenerationResult) -> Result<Task, TransitionError> {
        self.transition(id, |task| {
            task.status = TaskStatus::Completed;
            task.progress = 100;
            task.message = "Architecture generated".to_string();
            task.completed_at = Some(Utc::now());
            task.result = Some(result);
        })
    }

    pub fn fail(&self, id: &str, error: &str) -> Result<Task, TransitionError> {
        self.transition(id, |task| {
            task.status = TaskStatus::Failed;
            task.message = "Generation failed".to_string();
            task.completed_at = Some(Utc::now());
            task.error = Some(error.to_string());
        })
    }

    pub fn get(&self, id: &str) -> Option<Task> {
        self.read().get(id).map(|entry| entry.task.clone())
    }

    /// Newest first.
    pub fn list(&self, limit: usize) -> Vec<Task> {
        let map = self.read();
        let mut entries: Vec<&Entry> = map.values().collect();
        entries.sort_by(|a, b| b.seq.cmp(&a.seq));
        entries
            .into_iter()
            .take(limit)
            .map(|entry| entry.task.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    fn transition(
        &self,
        id: &str,
        apply: impl FnOnce(&mut Task),
    ) -> Result<Task, TransitionError> {
        let mut map = self.write();
        let entry = map
            .get_mut(id)
            .ok_or_else(|| TransitionError::UnknownTask(id.to_string()))?;
        let task = &mut entry.task;
        if task.status.is_terminal() {
            return Err(TransitionError::Terminal {
                id: id.to_string(),
                status: task.status,
            });
        }
        apply(task);
        Ok(task.clone())
    }

    // A panic while holding the lock cannot leave a record half-written
    // (closures only assign fields), so poisoned guards are still usable.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Entry>> {
        self.tasks.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Entry>> {
        self.tasks.write().unwrap_or_else(PoisonError::into_inner)
    }
}

fn next_id() -> (usize, String) {
    let count = COUNTER.fetch_add(1, Ordering::SeqCst);
    (count, format!("task_{}_{}", Utc::now().timestamp_millis(), count))
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Arc;

    use super::*;
    use crate::result::Pricing;

    fn result() -> GenerationResult {
        GenerationResult {
            template: "Resources: {}".to_string(),
            pricing: Pricing::default_estimate(),
            diagram_id: "sample.png".to_string(),
        }
    }

    #[test]
    fn new_task_starts_at_zero() {
        let registry = TaskRegistry::new();
        let task = registry.create("a VPC");
        assert_eq!(task.status, TaskStatus::Started);
        assert_eq!(task.progress, 0);
        assert!(task.completed_at.is_none());
        assert_eq!(registry.get(&task.id).unwrap().requirements, "a VPC");
    }

    #[test]
    fn progress_never_moves_backward() {
        let registry = TaskRegistry::new();
        let id = registry.create("x").id;
        registry.advance(&id, 50, "half").unwrap();
        let task = registry.advance(&id, 20, "later step").unwrap();
        assert_eq!(task.status, TaskStatus::Generating);
        assert_eq!(task.progress, 50);
        assert_eq!(task.message, "later step");
    }

    #[test]
    fn completion_is_atomic_and_final() {
        let registry = TaskRegistry::new();
        let id = registry.create("x").id;
        registry.advance(&id, 10, "working").unwrap();
        let done = registry.complete(&id, result()).unwrap();
        assert_eq!(done.status, TaskStatus::Completed);
        assert_eq!(done.progress, 100);
        assert!(done.completed_at.is_some());
        assert!(done.error.is_none());

        let err = registry.fail(&id, "late failure").unwrap_err();
        assert!(matches!(err, TransitionError::Terminal { .. }));
        assert!(registry.advance(&id, 10, "again").is_err());
        let snapshot = registry.get(&id).unwrap();
        assert!(snapshot.error.is_none());
        assert_eq!(snapshot.completed_at, done.completed_at);
    }

    #[test]
    fn failure_carries_no_result() {
        let registry = TaskRegistry::new();
        let id = registry.create("x").id;
        let failed = registry.fail(&id, "agent timed out").unwrap();
        assert_eq!(failed.status, TaskStatus::Failed);
        assert!(failed.result.is_none());
        assert_eq!(failed.error.as_deref(), Some("agent timed out"));
        assert!(registry.complete(&id, result()).is_err());
    }

    #[test]
    fn unknown_task_is_reported() {
        let registry = TaskRegistry::new();
        assert_eq!(
            registry.advance("nope", 10, "x").unwrap_err(),
            TransitionError::UnknownTask("nope".to_string())
        );
        assert!(registry.get("nope").is_none());
    }

    #[test]
    fn list_is_newest_first_and_limited() {
        let registry = TaskRegistry::new();
        let first = registry.create("one").id;
        let second = registry.create("two").id;
        let third = registry.create("three").id;
        let ids: Vec<String> = registry.list(2).into_iter().map(|t| t.id).collect();
        assert_eq!(ids.len(), 2);
        assert!(!ids.contains(&first));
        assert!(ids.contains(&second) && ids.contains(&third));
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn concurrent_creates_get_distinct_ids() {
        let registry = Arc::new(TaskRegistry::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = registry.clone();
                std::thread::spawn(move || {
                    (0..50).map(|_| registry.create("x").id).collect::<Vec<_>>()
                })
            })
            .collect();
        let ids: HashSet<String> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        assert_eq!(ids.len(), 400);
        assert_eq!(registry.len(), 400);
    }
}
