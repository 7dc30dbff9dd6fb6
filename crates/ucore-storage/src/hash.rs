//! Deterministic content hashing with blake3.
//!
//! - [`cache_key`] identifies a (k, η)-core query against one stored graph.
//!   The parameters are serialized with `serde_json` from a struct with a
//!   fixed field order, so equal parameters always hash equally.
//! - [`graph_fingerprint`] hashes the probabilities themselves, so two
//!   graphs with the same edges fingerprint equally regardless of how they
//!   were built.

use std::fmt;

use serde::{Deserialize, Serialize};
use ucore_core::UncertainGraph;

use crate::error::StorageError;
use crate::types::GraphId;

/// Hex-encoded blake3 key of a query's parameters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CacheKey(pub String);

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Serialize)]
struct QueryParams {
    eta: f64,
    graph_id: i64,
    k: usize,
}

/// Cache key for the (k, η)-core query on `graph`.
pub fn cache_key(graph: GraphId, k: usize, eta: f64) -> Result<CacheKey, StorageError> {
    let bytes = serde_json::to_vec(&QueryParams {
        eta,
        graph_id: graph.0,
        k,
    })?;
    Ok(CacheKey(blake3::hash(&bytes).to_hex().to_string()))
}

/// Hash of the vertex count and every positive edge in `(u, v)` order.
pub fn graph_fingerprint(graph: &UncertainGraph) -> blake3::Hash {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&(graph.vertex_count() as u64).to_le_bytes());
    for (u, v, p) in graph.edges() {
        hasher.update(&u.0.to_le_bytes());
        hasher.update(&v.0.to_le_bytes());
        hasher.update(&p.to_bits().to_le_bytes());
    }
    hasher.finalize()
}
