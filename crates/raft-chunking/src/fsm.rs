//! Reassembling state machine. Buffers chunks per operation and hands the
//! wrapped machine whole commands only.
//!
//! Chunked entries are recognised by the chunk info in their extensions.
//! Anything else is forwarded untouched. When the last chunk of an
//! operation arrives the payloads are concatenated into one synthetic entry
//! carrying the final chunk's index, term and kind, with the trailing
//! extension as its extensions, and that entry is applied to the wrapped
//! machine.
//!
//! A term change throws away every pending operation. A new leader means
//! clients will retry under new op ids, so nothing buffered under the old
//! term can ever complete correctly.

use std::io::Read;

use raft_chunking_core::wire::op_id_hex;
use raft_chunking_core::LogEntry;

use crate::error::ChunkError;
use crate::pending::PendingTable;
use crate::state_machine::StateMachine;

/// Result of applying an entry through a reassembling state machine.
///
/// `Ok(None)` means the entry was a chunk and more are expected.
pub type ChunkedResponse<R> = Result<Option<R>, ChunkError>;

/// What one entry amounts to once chunking is accounted for.
#[derive(Debug)]
pub(crate) enum Ingested {
    /// Not a chunk; apply the original entry.
    PassThrough,
    /// Chunk buffered; nothing to apply yet.
    Buffered,
    /// Last chunk arrived; apply this rebuilt entry.
    Rebuilt(LogEntry),
}

/// Wraps a state machine so it can receive commands split by
/// [`chunking_apply`](crate::encoder::chunking_apply).
pub struct ChunkingStateMachine<M> {
    inner: M,
    pending: PendingTable,
}

impl<M: StateMachine> ChunkingStateMachine<M> {
    pub fn new(inner: M) -> Self {
        Self {
            inner,
            pending: PendingTable::new(),
        }
    }

    pub fn inner(&self) -> &M {
        &self.inner
    }

    pub fn inner_mut(&mut self) -> &mut M {
        &mut self.inner
    }

    pub fn into_inner(self) -> M {
        self.inner
    }

    /// Operations currently waiting for more chunks.
    pub fn pending_ops(&self) -> usize {
        self.pending.len()
    }

    /// Term the pending table is scoped to.
    pub fn last_term(&self) -> u64 {
        self.pending.term()
    }

    /// Independent copy of the pending table, for crash recovery.
    ///
    /// Not wired into snapshot/restore: pending chunks are apply-time state,
    /// not committed application state.
    pub fn export_pending(&self) -> PendingTable {
        self.pending.deep_copy()
    }

    /// Replace the pending table wholesale, term included.
    pub fn import_pending(&mut self, table: PendingTable) {
        tracing::info!(
            term = table.term(),
            ops = table.len(),
            replaced = self.pending.len(),
            "importing pending chunk state"
        );
        self.pending = table;
    }

    /// Run the chunk bookkeeping for one entry without applying anything.
    pub(crate) fn ingest(&mut self, entry: &LogEntry) -> Result<Ingested, ChunkError> {
        let info = match entry.chunk_info() {
            None => {
                tracing::trace!(index = entry.index, "not a chunk, passing through");
                return Ok(Ingested::PassThrough);
            }
            Some(info) => info,
        };

        if entry.term != self.pending.term() {
            let was = self.pending.term();
            let dropped = self.pending.reset(entry.term);
            if dropped > 0 {
                tracing::warn!(
                    was,
                    now = entry.term,
                    dropped,
                    "term changed, discarding pending chunked operations"
                );
            }
        }

        let info = info.map_err(|e| {
            tracing::warn!(index = entry.index, error = %e, "malformed chunk info");
            ChunkError::from(e)
        })?;
        if info.op_id == 0 {
            tracing::warn!(index = entry.index, "chunk without op ID");
            return Err(ChunkError::InvalidOpId);
        }

        let finished = self
            .pending
            .accept(&info, entry.term, entry.data.clone())
            .map_err(|e| {
                tracing::warn!(
                    op_id = %op_id_hex(info.op_id),
                    index = entry.index,
                    error = %e,
                    "rejecting chunk"
                );
                e
            })?;

        let Some(op) = finished else {
            tracing::debug!(
                op_id = %op_id_hex(info.op_id),
                sequence = info.sequence,
                total = info.total,
                "chunk buffered"
            );
            return Ok(Ingested::Buffered);
        };

        let chunks = op.chunks.len();
        let data = op.assemble(info.op_id).map_err(|e| {
            tracing::warn!(op_id = %op_id_hex(info.op_id), error = %e, "discarding operation");
            e
        })?;

        tracing::info!(
            op_id = %op_id_hex(info.op_id),
            index = entry.index,
            chunks,
            bytes = data.len(),
            "chunked command reassembled"
        );

        Ok(Ingested::Rebuilt(LogEntry {
            index: entry.index,
            term: entry.term,
            kind: entry.kind,
            data,
            extensions: info.next_extensions,
        }))
    }
}

impl<M: StateMachine> StateMachine for ChunkingStateMachine<M> {
    type Response = ChunkedResponse<M::Response>;
    type Snapshot = M::Snapshot;

    fn apply(&mut self, entry: &LogEntry) -> Self::Response {
        match self.ingest(entry)? {
            Ingested::PassThrough => Ok(Some(self.inner.apply(entry))),
            Ingested::Buffered => Ok(None),
            // Rebuilt entries carry no chunk info, so they go straight to the
            // wrapped machine rather than back through `apply`.
            Ingested::Rebuilt(rebuilt) => Ok(Some(self.inner.apply(&rebuilt))),
        }
    }

    fn snapshot(&self) -> anyhow::Result<Self::Snapshot> {
        self.inner.snapshot()
    }

    fn restore(&mut self, source: &mut dyn Read) -> anyhow::Result<()> {
        self.inner.restore(source)
    }
}
