//! In-memory implementation of [`GraphStore`].
//!
//! [`InMemoryStore`] backs tests, the CLI, and the query service. All data
//! lives in HashMaps.

use std::collections::HashMap;

use tracing::debug;
use ucore_core::{CoreQueryResult, ThresholdIndex, UncertainGraph};

use crate::error::StorageError;
use crate::hash::CacheKey;
use crate::traits::GraphStore;
use crate::types::{GraphId, GraphSummary};

/// Data stored for a single graph.
#[derive(Debug, Clone)]
struct StoredGraph {
    name: String,
    graph: UncertainGraph,
    index: Option<ThresholdIndex>,
}

#[derive(Debug, Clone)]
struct CachedResult {
    graph: GraphId,
    result: CoreQueryResult,
}

#[derive(Debug)]
pub struct InMemoryStore {
    graphs: HashMap<GraphId, StoredGraph>,
    cache: HashMap<CacheKey, CachedResult>,
    next_graph_id: i64,
}

impl InMemoryStore {
    pub fn new() -> Self {
        InMemoryStore {
            graphs: HashMap::new(),
            cache: HashMap::new(),
            next_graph_id: 1,
        }
    }

    fn get_stored(&self, id: GraphId) -> Result<&StoredGraph, StorageError> {
        self.graphs.get(&id).ok_or(StorageError::GraphNotFound(id.0))
    }

    fn get_stored_mut(&mut self, id: GraphId) -> Result<&mut StoredGraph, StorageError> {
        self.graphs
            .get_mut(&id)
            .ok_or(StorageError::GraphNotFound(id.0))
    }

    /// Number of cached query results across all graphs.
    pub fn cached_count(&self) -> usize {
        self.cache.len()
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphStore for InMemoryStore {
    fn create_graph(&mut self, name: &str, graph: UncertainGraph) -> Result<GraphId, StorageError> {
        let id = GraphId(self.next_graph_id);
        self.next_graph_id += 1;
        self.graphs.insert(
            id,
            StoredGraph {
                name: name.to_string(),
                graph,
                index: None,
            },
        );
        Ok(id)
    }

    fn load_graph(&self, id: GraphId) -> Result<UncertainGraph, StorageError> {
        Ok(self.get_stored(id)?.graph.clone())
    }

    fn update_graph(&mut self, id: GraphId, graph: UncertainGraph) -> Result<(), StorageError> {
        let stored = self.get_stored_mut(id)?;
        stored.graph = graph;
        stored.index = None;
        self.invalidate_cached(id)?;
        Ok(())
    }

    fn delete_graph(&mut self, id: GraphId) -> Result<(), StorageError> {
        self.graphs
            .remove(&id)
            .ok_or(StorageError::GraphNotFound(id.0))?;
        self.invalidate_cached(id)?;
        Ok(())
    }

    fn list_graphs(&self) -> Result<Vec<GraphSummary>, StorageError> {
        let mut summaries: Vec<GraphSummary> = self
            .graphs
            .iter()
            .map(|(&id, stored)| GraphSummary {
                id,
                name: stored.name.clone(),
                vertex_count: stored.graph.vertex_count(),
                edge_count: stored.graph.edge_count(),
                indexed: stored.index.is_some(),
            })
            .collect();
        summaries.sort_by_key(|s| s.id);
        Ok(summaries)
    }

    fn save_index(&mut self, id: GraphId, index: ThresholdIndex) -> Result<(), StorageError> {
        self.get_stored_mut(id)?.index = Some(index);
        Ok(())
    }

    fn load_index(&self, id: GraphId) -> Result<Option<ThresholdIndex>, StorageError> {
        Ok(self.get_stored(id)?.index.clone())
    }

    fn get_cached(&self, key: &CacheKey) -> Result<Option<CoreQueryResult>, StorageError> {
        Ok(self.cache.get(key).map(|c| c.result.clone()))
    }

    fn put_cached(
        &mut self,
        graph: GraphId,
        key: CacheKey,
        result: CoreQueryResult,
    ) -> Result<(), StorageError> {
        self.get_stored(graph)?;
        self.cache.insert(key, CachedResult { graph, result });
        Ok(())
    }

    fn invalidate_cached(&mut self, graph: GraphId) -> Result<usize, StorageError> {
        let before = self.cache.len();
        self.cache.retain(|_, cached| cached.graph != graph);
        let dropped = before - self.cache.len();
        debug!(graph = %graph, dropped, "invalidated cached results");
        Ok(dropped)
    }
}
