//! Registry of background query tasks.
//!
//! [`TaskRegistry`] tracks each task through `Pending -> Success | Failed`.
//! A finished task never changes again: finishing it twice is a
//! [`ServiceError::Conflict`]. Each task's status sits in a `watch` channel
//! so waiters are woken on the transition.

use std::time::Instant;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::debug;
use ucore_core::CoreQueryResult;
use ucore_storage::GraphId;
use uuid::Uuid;

use crate::error::ServiceError;

/// Unique task identifier (UUID v4 newtype).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskId(pub Uuid);

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Success { result: CoreQueryResult },
    Failed { error: String },
}

impl TaskStatus {
    pub fn is_finished(&self) -> bool {
        !matches!(self, TaskStatus::Pending)
    }
}

/// What a task was asked to compute, and when.
struct TaskRecord {
    graph: GraphId,
    k: usize,
    eta: f64,
    submitted_at: Instant,
}

struct TaskEntry {
    record: TaskRecord,
    status: watch::Sender<TaskStatus>,
}

/// Backed by `DashMap` for concurrent access from request handlers and
/// worker tasks.
pub struct TaskRegistry {
    tasks: DashMap<TaskId, TaskEntry>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        TaskRegistry {
            tasks: DashMap::new(),
        }
    }

    /// Registers a pending task and returns its id.
    pub fn create(&self, graph: GraphId, k: usize, eta: f64) -> TaskId {
        let id = TaskId(Uuid::new_v4());
        let (status, _) = watch::channel(TaskStatus::Pending);
        let record = TaskRecord {
            graph,
            k,
            eta,
            submitted_at: Instant::now(),
        };
        self.tasks.insert(id, TaskEntry { record, status });
        id
    }

    pub fn status(&self, id: TaskId) -> Result<TaskStatus, ServiceError> {
        self.tasks
            .get(&id)
            .map(|entry| entry.status.borrow().clone())
            .ok_or_else(|| not_found(id))
    }

    pub fn complete(&self, id: TaskId, result: CoreQueryResult) -> Result<(), ServiceError> {
        self.finish(id, TaskStatus::Success { result })
    }

    pub fn fail(&self, id: TaskId, error: impl Into<String>) -> Result<(), ServiceError> {
        self.finish(id, TaskStatus::Failed {
            error: error.into(),
        })
    }

    fn finish(&self, id: TaskId, next: TaskStatus) -> Result<(), ServiceError> {
        let entry = self.tasks.get(&id).ok_or_else(|| not_found(id))?;
        let moved = entry.status.send_if_modified(|status| {
            if status.is_finished() {
                return false;
            }
            *status = next;
            true
        });
        if moved {
            let record = &entry.record;
            debug!(
                task = %id,
                graph = %record.graph,
                k = record.k,
                eta = record.eta,
                elapsed_ms = record.submitted_at.elapsed().as_millis() as u64,
                "task finished"
            );
            Ok(())
        } else {
            Err(ServiceError::Conflict(format!("task {id} already finished")))
        }
    }

    /// Resolves once the task leaves `Pending`.
    pub async fn wait(&self, id: TaskId) -> Result<TaskStatus, ServiceError> {
        let mut receiver = self
            .tasks
            .get(&id)
            .map(|entry| entry.status.subscribe())
            .ok_or_else(|| not_found(id))?;
        let status = receiver
            .wait_for(TaskStatus::is_finished)
            .await
            .map_err(|_| ServiceError::Internal(format!("task {id} was dropped")))?;
        Ok(status.clone())
    }

    /// Drops finished tasks; returns how many were removed.
    pub fn prune_finished(&self) -> usize {
        let before = self.tasks.len();
        self.tasks.retain(|_, entry| !entry.status.borrow().is_finished());
        before - self.tasks.len()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

impl Default for TaskRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn not_found(id: TaskId) -> ServiceError {
    ServiceError::NotFound(format!("task {id}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn empty_result() -> CoreQueryResult {
        CoreQueryResult {
            k: 1,
            eta: 0.5,
            vertices: vec![],
            edges: vec![],
        }
    }

    #[test]
    fn new_tasks_are_pending() {
        let registry = TaskRegistry::new();
        let id = registry.create(GraphId(1), 2, 0.3);
        assert_eq!(registry.status(id).unwrap(), TaskStatus::Pending);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn finishing_twice_conflicts() {
        let registry = TaskRegistry::new();
        let id = registry.create(GraphId(1), 1, 0.5);
        registry.complete(id, empty_result()).unwrap();
        assert!(matches!(
            registry.fail(id, "late"),
            Err(ServiceError::Conflict(_))
        ));
        assert_eq!(
            registry.status(id).unwrap(),
            TaskStatus::Success {
                result: empty_result()
            }
        );
    }

    #[test]
    fn unknown_task_is_not_found() {
        let registry = TaskRegistry::new();
        let ghost = TaskId(Uuid::new_v4());
        assert!(matches!(registry.status(ghost), Err(ServiceError::NotFound(_))));
        assert!(matches!(
            registry.complete(ghost, empty_result()),
            Err(ServiceError::NotFound(_))
        ));
    }

    #[test]
    fn prune_keeps_pending() {
        let registry = TaskRegistry::new();
        let done = registry.create(GraphId(1), 1, 0.5);
        registry.create(GraphId(1), 1, 0.6);
        registry.fail(done, "boom").unwrap();
        assert_eq!(registry.prune_finished(), 1);
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn wait_wakes_on_completion() {
        let registry = Arc::new(TaskRegistry::new());
        let id = registry.create(GraphId(1), 1, 0.5);
        let finisher = Arc::clone(&registry);
        tokio::spawn(async move {
            tokio::task::yield_now().await;
            finisher.fail(id, "boom").unwrap();
        });
        let status = registry.wait(id).await.unwrap();
        assert_eq!(
            status,
            TaskStatus::Failed {
                error: "boom".into()
            }
        );
    }

    #[test]
    fn status_serializes_with_tag() {
        let json = serde_json::to_value(TaskStatus::Failed {
            error: "x".into(),
        })
        .unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["error"], "x");
    }
}
