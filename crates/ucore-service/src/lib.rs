//! Query service around the uncertain-core engine.
//!
//! Runs (k, η)-core queries as background tasks tracked in a
//! [`TaskRegistry`], memoizes their results in a [`GraphStore`] under blake3
//! cache keys, and serializes edge updates per graph.
//!
//! [`GraphStore`]: ucore_storage::GraphStore

pub mod config;
pub mod error;
pub mod service;
pub mod tasks;

pub use config::ServiceConfig;
pub use error::ServiceError;
pub use service::{QueryService, Submission};
pub use tasks::{TaskId, TaskRegistry, TaskStatus};
