pub mod config;
pub mod error;
pub mod graph;
pub mod heap;
pub mod id;
pub mod kcore;
pub mod maintenance;
pub mod peel;
pub mod probability;
pub mod query;
pub mod tree;
pub mod union_find;

// Re-export commonly used types
pub use config::CoreConfig;
pub use error::CoreError;
pub use graph::UncertainGraph;
pub use heap::PriorityQueue;
pub use id::{TreeNodeId, VertexId};
pub use kcore::core_numbers;
pub use maintenance::{update_index, update_order, ChangeKind, EdgeChange, MaintenanceOutcome, OrderUpdate};
pub use peel::{build_index, peel_order, PeelStep, PeelTrace, ThresholdIndex};
pub use probability::k_probability;
pub use query::{k_eta_core, CoreQueryResult};
pub use tree::{build_core_forests, CoreForest, CoreTreeNode, ForestView, PendingNode, TreeView};
pub use union_find::UnionFind;
