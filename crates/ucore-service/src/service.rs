//! [`QueryService`]: graph upload, background (k, η)-core queries with a
//! result cache, and serialized edge updates.
//!
//! The store sits behind a `tokio::sync::Mutex` that is only held for
//! loads and saves, never across a computation. Computations run on the
//! blocking pool, at most `max_tasks` at a time, each under the configured
//! timeout. A timed-out computation cannot be interrupted; its result is
//! discarded and the task is marked failed.
//!
//! Results are cached only if the graph is unchanged when the computation
//! finishes, checked by comparing blake3 fingerprints.

use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, Semaphore};
use tracing::{debug, info, warn};
use ucore_core::{
    build_index, k_eta_core, update_index, CoreConfig, CoreQueryResult, EdgeChange,
    MaintenanceOutcome, ThresholdIndex, UncertainGraph,
};
use ucore_storage::{
    cache_key, graph_fingerprint, parse_edge_list, CacheKey, GraphId, GraphStore, GraphSummary,
    InMemoryStore,
};

use crate::config::ServiceConfig;
use crate::error::ServiceError;
use crate::tasks::{TaskId, TaskRegistry, TaskStatus};

/// Outcome of submitting a query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Submission {
    /// Served from the cache; no task was created.
    Cached { result: CoreQueryResult },
    Pending { task_id: TaskId },
}

pub struct QueryService<S = InMemoryStore> {
    store: Arc<Mutex<S>>,
    tasks: Arc<TaskRegistry>,
    permits: Arc<Semaphore>,
    update_locks: DashMap<GraphId, Arc<Mutex<()>>>,
    config: ServiceConfig,
}

impl QueryService<InMemoryStore> {
    pub fn in_memory(config: ServiceConfig) -> Self {
        Self::new(InMemoryStore::new(), config)
    }
}

impl<S> QueryService<S>
where
    S: GraphStore + Send + 'static,
{
    pub fn new(store: S, config: ServiceConfig) -> Self {
        let permits = Arc::new(Semaphore::new(config.max_tasks.max(1)));
        QueryService {
            store: Arc::new(Mutex::new(store)),
            tasks: Arc::new(TaskRegistry::new()),
            permits,
            update_locks: DashMap::new(),
            config,
        }
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn tasks(&self) -> &TaskRegistry {
        &self.tasks
    }

    /// Parses edge-list text and stores the graph.
    pub async fn upload_graph(&self, name: &str, text: &str) -> Result<GraphId, ServiceError> {
        let graph = parse_edge_list(text)?;
        self.add_graph(name, graph).await
    }

    pub async fn add_graph(&self, name: &str, graph: UncertainGraph) -> Result<GraphId, ServiceError> {
        let id = self.store.lock().await.create_graph(name, graph)?;
        info!(graph = %id, name, "stored graph");
        Ok(id)
    }

    pub async fn list_graphs(&self) -> Result<Vec<GraphSummary>, ServiceError> {
        Ok(self.store.lock().await.list_graphs()?)
    }

    pub async fn load_graph(&self, id: GraphId) -> Result<UncertainGraph, ServiceError> {
        Ok(self.store.lock().await.load_graph(id)?)
    }

    /// Removes a graph with its index and cached results. Waits for an
    /// in-flight update of the same graph to finish first.
    pub async fn delete_graph(&self, id: GraphId) -> Result<(), ServiceError> {
        let lock = self.update_locks.get(&id).map(|entry| Arc::clone(entry.value()));
        let _serialized = match &lock {
            Some(lock) => Some(lock.lock().await),
            None => None,
        };
        self.store.lock().await.delete_graph(id)?;
        self.update_locks.remove(&id);
        info!(graph = %id, "deleted graph");
        Ok(())
    }

    /// Returns the cached result for `(graph, k, eta)` or starts a task.
    pub async fn submit_query(
        &self,
        graph_id: GraphId,
        k: usize,
        eta: f64,
    ) -> Result<Submission, ServiceError> {
        if k == 0 {
            return Err(ServiceError::BadRequest("k must be >= 1".into()));
        }
        if !(eta > 0.0 && eta <= 1.0) {
            return Err(ServiceError::BadRequest(format!("eta {eta} is outside (0, 1]")));
        }
        let key = cache_key(graph_id, k, eta)?;
        let (graph, index) = {
            let store = self.store.lock().await;
            if let Some(result) = store.get_cached(&key)? {
                debug!(graph = %graph_id, k, eta, "query served from cache");
                return Ok(Submission::Cached { result });
            }
            (store.load_graph(graph_id)?, store.load_index(graph_id)?)
        };

        if self.tasks.len() >= self.config.retained_tasks {
            let pruned = self.tasks.prune_finished();
            debug!(pruned, remaining = self.tasks.len(), "pruned finished tasks");
        }
        let task_id = self.tasks.create(graph_id, k, eta);
        let job = QueryJob {
            task_id,
            graph_id,
            key,
            graph,
            index,
            k,
            eta,
            core: self.config.core,
        };
        let store = Arc::clone(&self.store);
        let tasks = Arc::clone(&self.tasks);
        let permits = Arc::clone(&self.permits);
        let limit = self.config.task_timeout;
        tokio::spawn(async move {
            let outcome = tokio::time::timeout(limit, job.compute(permits)).await;
            let finished = match outcome {
                Ok(Ok((result, index))) => {
                    job.publish(&store, &result, index).await;
                    tasks.complete(job.task_id, result)
                }
                Ok(Err(err)) => tasks.fail(job.task_id, err.to_string()),
                Err(_) => {
                    let err = ServiceError::TimedOut {
                        seconds: limit.as_secs_f64(),
                    };
                    warn!(task = %job.task_id, "query timed out; result will be discarded");
                    tasks.fail(job.task_id, err.to_string())
                }
            };
            if let Err(err) = finished {
                warn!(task = %job.task_id, error = %err, "could not record task outcome");
            }
        });
        Ok(Submission::Pending { task_id })
    }

    pub fn poll(&self, task_id: TaskId) -> Result<TaskStatus, ServiceError> {
        self.tasks.status(task_id)
    }

    pub async fn wait(&self, task_id: TaskId) -> Result<TaskStatus, ServiceError> {
        self.tasks.wait(task_id).await
    }

    /// Applies one edge change to a stored graph and maintains its index.
    ///
    /// Updates to the same graph run one at a time. The graph is indexed
    /// first if no index is stored. The new graph and index replace the old
    /// ones and the graph's cached query results are dropped.
    #[tracing::instrument(skip_all, fields(graph = %graph_id))]
    pub async fn update_edge(
        &self,
        graph_id: GraphId,
        change: EdgeChange,
    ) -> Result<MaintenanceOutcome, ServiceError> {
        let lock = self
            .update_locks
            .entry(graph_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _serialized = lock.lock().await;

        let loaded = {
            let store = self.store.lock().await;
            store
                .load_graph(graph_id)
                .and_then(|graph| store.load_index(graph_id).map(|index| (graph, index)))
        };
        let (graph, index) = match loaded {
            Ok(loaded) => loaded,
            Err(err) => {
                // No lock entries for graphs that do not exist.
                self.update_locks.remove(&graph_id);
                return Err(err.into());
            }
        };
        let core = self.config.core;
        let start = Instant::now();
        let outcome = tokio::task::spawn_blocking(move || -> Result<MaintenanceOutcome, ServiceError> {
            let index = match index {
                Some(index) => index,
                None => build_index(&graph, &core)?,
            };
            Ok(update_index(&graph, &index, &change, &core)?)
        })
        .await
        .map_err(|err| ServiceError::Internal(format!("maintenance task failed: {err}")))??;

        {
            let mut store = self.store.lock().await;
            store.update_graph(graph_id, outcome.graph.clone())?;
            store.save_index(graph_id, outcome.index.clone())?;
        }
        info!(
            orders = outcome.orders.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "applied edge change"
        );
        Ok(outcome)
    }
}

/// Everything a background query needs, detached from the service.
struct QueryJob {
    task_id: TaskId,
    graph_id: GraphId,
    key: CacheKey,
    graph: UncertainGraph,
    index: Option<ThresholdIndex>,
    k: usize,
    eta: f64,
    core: CoreConfig,
}

impl QueryJob {
    /// Runs on the blocking pool once a permit is free. Builds the index if
    /// none was stored.
    async fn compute(
        &self,
        permits: Arc<Semaphore>,
    ) -> Result<(CoreQueryResult, Option<ThresholdIndex>), ServiceError> {
        let permit = permits
            .acquire_owned()
            .await
            .map_err(|_| ServiceError::Internal("task pool closed".into()))?;
        let graph = self.graph.clone();
        let stored = self.index.clone();
        let (k, eta, core) = (self.k, self.eta, self.core);
        tokio::task::spawn_blocking(move || -> Result<_, ServiceError> {
            let _permit = permit;
            let (index, built) = match stored {
                Some(index) => (index, false),
                None => {
                    let index = build_index(&graph, &core)?;
                    (index, true)
                }
            };
            let result = k_eta_core(&graph, &index, k, eta)?;
            Ok((result, built.then_some(index)))
        })
        .await
        .map_err(|err| ServiceError::Internal(format!("query task failed: {err}")))?
    }

    /// Caches the result, and saves a freshly built index, if the stored
    /// graph still matches the one the query ran on.
    async fn publish<S: GraphStore>(
        &self,
        store: &Mutex<S>,
        result: &CoreQueryResult,
        built: Option<ThresholdIndex>,
    ) {
        let mut store = store.lock().await;
        let current = match store.load_graph(self.graph_id) {
            Ok(graph) => graph,
            Err(err) => {
                debug!(task = %self.task_id, error = %err, "graph gone; not caching");
                return;
            }
        };
        if graph_fingerprint(&current) != graph_fingerprint(&self.graph) {
            debug!(task = %self.task_id, "graph changed during query; not caching");
            return;
        }
        if let Some(index) = built {
            if let Err(err) = store.save_index(self.graph_id, index) {
                warn!(task = %self.task_id, error = %err, "could not save index");
            }
        }
        if let Err(err) = store.put_cached(self.graph_id, self.key.clone(), result.clone()) {
            warn!(task = %self.task_id, error = %err, "could not cache result");
        }
    }
}
