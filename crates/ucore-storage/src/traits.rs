//! The [`GraphStore`] trait defining the storage contract for uncertain
//! graphs, their threshold indexes, and cached query results.
//!
//! Invariant shared by all backends: replacing or deleting a graph drops
//! its stored index and every cached query result keyed to it.

use ucore_core::{CoreQueryResult, ThresholdIndex, UncertainGraph};

use crate::error::StorageError;
use crate::hash::CacheKey;
use crate::types::{GraphId, GraphSummary};

/// The storage contract for uncertain graphs.
///
/// The trait is synchronous; the query service serializes access.
pub trait GraphStore {
    // -------------------------------------------------------------------
    // Graph-level operations
    // -------------------------------------------------------------------

    /// Stores a new graph under `name` and returns its allocated id.
    fn create_graph(&mut self, name: &str, graph: UncertainGraph) -> Result<GraphId, StorageError>;

    fn load_graph(&self, id: GraphId) -> Result<UncertainGraph, StorageError>;

    /// Replaces the stored graph. Drops the stored index and cached results.
    fn update_graph(&mut self, id: GraphId, graph: UncertainGraph) -> Result<(), StorageError>;

    /// Deletes a graph with its index and cached results.
    fn delete_graph(&mut self, id: GraphId) -> Result<(), StorageError>;

    /// Lists all stored graphs, ordered by id.
    fn list_graphs(&self) -> Result<Vec<GraphSummary>, StorageError>;

    // -------------------------------------------------------------------
    // Threshold index
    // -------------------------------------------------------------------

    fn save_index(&mut self, id: GraphId, index: ThresholdIndex) -> Result<(), StorageError>;

    /// The stored index, or `None` if the graph has not been indexed since
    /// it last changed.
    fn load_index(&self, id: GraphId) -> Result<Option<ThresholdIndex>, StorageError>;

    // -------------------------------------------------------------------
    // Query cache
    // -------------------------------------------------------------------

    fn get_cached(&self, key: &CacheKey) -> Result<Option<CoreQueryResult>, StorageError>;

    /// Caches `result` under `key`, owned by `graph`.
    fn put_cached(
        &mut self,
        graph: GraphId,
        key: CacheKey,
        result: CoreQueryResult,
    ) -> Result<(), StorageError>;

    /// Drops every cached result owned by `graph`; returns how many.
    fn invalidate_cached(&mut self, graph: GraphId) -> Result<usize, StorageError>;
}
