//! Capability traits a replicated state machine can offer the engine.
//!
//! The engine calls `apply`/`apply_batch` one at a time, in committed log
//! order, and `&mut self` keeps anything else off the machine while an
//! apply runs.

use std::io::Read;

use raft_chunking_core::{Configuration, LogEntry};

/// Application logic driven by the committed log.
pub trait StateMachine {
    /// What `apply` hands back to whoever submitted the entry.
    type Response;

    /// Point-in-time copy of application state, persisted by the engine.
    type Snapshot;

    /// Apply one committed entry.
    fn apply(&mut self, entry: &LogEntry) -> Self::Response;

    fn snapshot(&self) -> anyhow::Result<Self::Snapshot>;

    /// Replace all application state with a persisted snapshot.
    fn restore(&mut self, source: &mut dyn Read) -> anyhow::Result<()>;
}

/// A state machine that can take several committed entries in one call.
pub trait BatchingStateMachine: StateMachine {
    /// Must return exactly one response per entry, in the same order.
    fn apply_batch(&mut self, entries: &[LogEntry]) -> Vec<Self::Response>;
}

/// A state machine that also wants to see committed membership changes.
pub trait ConfigurationStore: StateMachine {
    fn store_configuration(&mut self, index: u64, configuration: Configuration);
}
