//! Reassembly for state machines that also persist cluster configuration.
//!
//! Configuration changes never travel as chunks, so they go straight to the
//! wrapped store. Everything else behaves exactly like
//! [`ChunkingStateMachine`].

use std::io::Read;

use raft_chunking_core::{Configuration, LogEntry};

use crate::fsm::{ChunkedResponse, ChunkingStateMachine};
use crate::pending::PendingTable;
use crate::state_machine::{ConfigurationStore, StateMachine};

/// [`ChunkingStateMachine`] for a wrapped machine that stores configurations.
pub struct ChunkingConfigurationStore<M> {
    chunking: ChunkingStateMachine<M>,
}

impl<M: ConfigurationStore> ChunkingConfigurationStore<M> {
    pub fn new(inner: M) -> Self {
        Self {
            chunking: ChunkingStateMachine::new(inner),
        }
    }

    pub fn chunking(&self) -> &ChunkingStateMachine<M> {
        &self.chunking
    }

    pub fn inner(&self) -> &M {
        self.chunking.inner()
    }

    pub fn into_inner(self) -> M {
        self.chunking.into_inner()
    }

    pub fn pending_ops(&self) -> usize {
        self.chunking.pending_ops()
    }

    pub fn export_pending(&self) -> PendingTable {
        self.chunking.export_pending()
    }

    pub fn import_pending(&mut self, table: PendingTable) {
        self.chunking.import_pending(table)
    }
}

impl<M: ConfigurationStore> StateMachine for ChunkingConfigurationStore<M> {
    type Response = ChunkedResponse<M::Response>;
    type Snapshot = M::Snapshot;

    fn apply(&mut self, entry: &LogEntry) -> Self::Response {
        self.chunking.apply(entry)
    }

    fn snapshot(&self) -> anyhow::Result<Self::Snapshot> {
        self.chunking.snapshot()
    }

    fn restore(&mut self, source: &mut dyn Read) -> anyhow::Result<()> {
        self.chunking.restore(source)
    }
}

impl<M: ConfigurationStore> ConfigurationStore for ChunkingConfigurationStore<M> {
    fn store_configuration(&mut self, index: u64, configuration: Configuration) {
        tracing::debug!(
            index,
            servers = configuration.servers.len(),
            "storing configuration"
        );
        self.chunking
            .inner_mut()
            .store_configuration(index, configuration);
    }
}
