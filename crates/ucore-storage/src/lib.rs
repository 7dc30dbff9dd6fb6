//! Storage and ingestion for uncertain graphs.
//!
//! Provides the [`GraphStore`] trait defining what the query service needs
//! from a backend, plus the [`InMemoryStore`] backend.
//!
//! # Modules
//!
//! - [`error`]: StorageError enum with all failure modes
//! - [`types`]: GraphId, GraphSummary storage-layer types
//! - [`parse`]: `v1 v2 p` edge-list reader and writer
//! - [`hash`]: blake3 cache keys and graph fingerprints
//! - [`traits`]: GraphStore trait definition
//! - [`memory`]: InMemoryStore implementation
//! - [`perturb`]: seeded random edge changes

pub mod error;
pub mod hash;
pub mod memory;
pub mod parse;
pub mod perturb;
pub mod traits;
pub mod types;

// Re-export key types for ergonomic use.
pub use error::StorageError;
pub use hash::{cache_key, graph_fingerprint, CacheKey};
pub use memory::InMemoryStore;
pub use parse::{parse_edge_list, parse_edge_list_with, read_edge_list, write_edge_list, Normalize};
pub use perturb::{Direction, Perturber};
pub use traits::GraphStore;
pub use types::{GraphId, GraphSummary};
