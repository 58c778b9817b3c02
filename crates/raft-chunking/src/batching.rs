//! Batched reassembly.
//!
//! A batch can interleave chunks of several operations with plain entries.
//! Every entry goes through the same bookkeeping as single-entry apply, then
//! everything ready for the wrapped machine (plain entries and operations
//! finished inside this batch) is handed over in one `apply_batch` call, in
//! arrival order. Responses land at the position of the entry that
//! triggered them.

use std::io::Read;

use raft_chunking_core::LogEntry;

use crate::error::ChunkError;
use crate::fsm::{ChunkedResponse, ChunkingStateMachine, Ingested};
use crate::pending::PendingTable;
use crate::state_machine::{BatchingStateMachine, StateMachine};

/// [`ChunkingStateMachine`] for a wrapped machine that takes batches.
pub struct ChunkingBatchingStateMachine<M> {
    chunking: ChunkingStateMachine<M>,
}

impl<M: BatchingStateMachine> ChunkingBatchingStateMachine<M> {
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

impl<M: BatchingStateMachine> StateMachine for ChunkingBatchingStateMachine<M> {
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

impl<M: BatchingStateMachine> BatchingStateMachine for ChunkingBatchingStateMachine<M> {
    fn apply_batch(&mut self, entries: &[LogEntry]) -> Vec<Self::Response> {
        let mut responses: Vec<Self::Response> = Vec::with_capacity(entries.len());
        let mut forward = Vec::new();
        let mut positions = Vec::new();

        for (position, entry) in entries.iter().enumerate() {
            match self.chunking.ingest(entry) {
                Ok(Ingested::PassThrough) => {
                    forward.push(entry.clone());
                    positions.push(position);
                    responses.push(Err(ChunkError::MissingBatchResponse { index: entry.index }));
                }
                Ok(Ingested::Buffered) => responses.push(Ok(None)),
                Ok(Ingested::Rebuilt(rebuilt)) => {
                    forward.push(rebuilt);
                    positions.push(position);
                    responses.push(Err(ChunkError::MissingBatchResponse { index: entry.index }));
                }
                Err(e) => responses.push(Err(e)),
            }
        }

        if forward.is_empty() {
            return responses;
        }

        let applied = self.chunking.inner_mut().apply_batch(&forward);
        if applied.len() != forward.len() {
            tracing::warn!(
                sent = forward.len(),
                returned = applied.len(),
                "wrapped state machine returned wrong number of batch responses"
            );
        }
        // Forwarded positions the wrapped machine did not answer keep their
        // MissingBatchResponse error.
        for (position, response) in positions.into_iter().zip(applied) {
            responses[position] = Ok(Some(response));
        }

        tracing::debug!(
            entries = entries.len(),
            forwarded = forward.len(),
            pending_ops = self.chunking.pending_ops(),
            "batch applied"
        );
        responses
    }
}
