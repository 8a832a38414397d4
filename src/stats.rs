//! Engine statistics

use std::sync::atomic::{AtomicU64, Ordering};

/// Per-machine statistics
pub struct EngineStats {
    /// Start events handled
    pub starts_received: AtomicU64,
    /// Instances created by a start
    pub instances_created: AtomicU64,
    /// Starts rejected because the id already existed
    pub duplicate_starts: AtomicU64,
    /// Starts that failed in the start action or the store
    pub failed_starts: AtomicU64,
    /// Status queries handled
    pub queries_received: AtomicU64,
    /// Queries answered with a status
    pub queries_answered: AtomicU64,
    /// Queries for an id with no instance
    pub missing_instances: AtomicU64,
    /// Queries that failed in the status hook or the store
    pub failed_queries: AtomicU64,
}

impl EngineStats {
    /// All counters at zero
    pub fn new() -> Self {
        Self {
            starts_received: AtomicU64::new(0),
            instances_created: AtomicU64::new(0),
            duplicate_starts: AtomicU64::new(0),
            failed_starts: AtomicU64::new(0),
            queries_received: AtomicU64::new(0),
            queries_answered: AtomicU64::new(0),
            missing_instances: AtomicU64::new(0),
            failed_queries: AtomicU64::new(0),
        }
    }

    pub(crate) fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time copy of every counter
    pub fn snapshot(&self) -> EngineStatsSnapshot {
        EngineStatsSnapshot {
            starts_received: self.starts_received.load(Ordering::Relaxed),
            instances_created: self.instances_created.load(Ordering::Relaxed),
            duplicate_starts: self.duplicate_starts.load(Ordering::Relaxed),
            failed_starts: self.failed_starts.load(Ordering::Relaxed),
            queries_received: self.queries_received.load(Ordering::Relaxed),
            queries_answered: self.queries_answered.load(Ordering::Relaxed),
            missing_instances: self.missing_instances.load(Ordering::Relaxed),
            failed_queries: self.failed_queries.load(Ordering::Relaxed),
        }
    }
}

impl Default for EngineStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Plain copy of [`EngineStats`]
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EngineStatsSnapshot {
    /// Start events handled
    pub starts_received: u64,
    /// Instances created by a start
    pub instances_created: u64,
    /// Starts rejected because the id already existed
    pub duplicate_starts: u64,
    /// Starts that failed in the start action or the store
    pub failed_starts: u64,
    /// Status queries handled
    pub queries_received: u64,
    /// Queries answered with a status
    pub queries_answered: u64,
    /// Queries for an id with no instance
    pub missing_instances: u64,
    /// Queries that failed in the status hook or the store
    pub failed_queries: u64,
}
