//! Service configuration from environment variables.
//!
//! - `UCORE_MAX_TASKS`: concurrent query computations (default: 4)
//! - `UCORE_TASK_TIMEOUT_SECS`: per-query time limit (default: 300)
//! - `UCORE_RETAINED_TASKS`: task count above which finished tasks are
//!   pruned on the next submission (default: 1024)

use std::time::Duration;

use tracing::warn;
use ucore_core::CoreConfig;

pub const DEFAULT_MAX_TASKS: usize = 4;
pub const DEFAULT_TASK_TIMEOUT_SECS: u64 = 300;
pub const DEFAULT_RETAINED_TASKS: usize = 1024;

#[derive(Debug, Clone, PartialEq)]
pub struct ServiceConfig {
    pub max_tasks: usize,
    pub task_timeout: Duration,
    pub retained_tasks: usize,
    pub core: CoreConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        ServiceConfig {
            max_tasks: DEFAULT_MAX_TASKS,
            task_timeout: Duration::from_secs(DEFAULT_TASK_TIMEOUT_SECS),
            retained_tasks: DEFAULT_RETAINED_TASKS,
            core: CoreConfig::default(),
        }
    }
}

impl ServiceConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds a config from `lookup`, falling back to defaults for missing or
    /// unparsable values.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let max_tasks = read_var(&lookup, "UCORE_MAX_TASKS", DEFAULT_MAX_TASKS).max(1);
        let timeout_secs = read_var(&lookup, "UCORE_TASK_TIMEOUT_SECS", DEFAULT_TASK_TIMEOUT_SECS);
        let retained_tasks =
            read_var(&lookup, "UCORE_RETAINED_TASKS", DEFAULT_RETAINED_TASKS).max(1);
        ServiceConfig {
            max_tasks,
            task_timeout: Duration::from_secs(timeout_secs),
            retained_tasks,
            core: CoreConfig::default(),
        }
    }
}

fn read_var<T: std::str::FromStr + Copy>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
    default: T,
) -> T {
    match lookup(name) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!(name, value = %raw, "ignoring unparsable setting");
            default
        }),
        None => default,
    }
}
