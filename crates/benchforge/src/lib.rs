pub mod common;
pub mod config;
pub mod launch;
pub mod maintenance;
pub mod modules;
pub mod report;
pub mod results;
pub mod scheduler;

pub type Error = crate::common::error::BenchError;
pub type Result<T> = std::result::Result<T, Error>;

/// Ordered map used across the crate. Deterministic iteration order matters
/// for report layout and override application.
pub type Map<K, V> = std::collections::BTreeMap<K, V>;
pub type Set<T> = std::collections::BTreeSet<T>;

// Reexports
pub use common::settings::Settings;
pub use scheduler::{JobId, JobStatus};
