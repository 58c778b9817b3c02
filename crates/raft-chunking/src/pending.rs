//! Pending table: chunks received for operations that are not complete yet.
//!
//! One table per reassembling state machine, scoped to the term it was last
//! observed in. Sequencing is strict contiguous-append: chunk `n` of an
//! operation is accepted only when exactly `n` chunks are already held.
//!
//! Known gap: a chunk that declares a larger total raises the operation's
//! expected total, so an inflated count is not caught here. It shows up
//! downstream as reassembly that never completes, or completes with data of
//! the wrong length.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use raft_chunking_core::wire::op_id_hex;
use raft_chunking_core::ChunkInfo;

use crate::error::ChunkError;

/// One received chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingChunk {
    /// Term of the log entry that carried the chunk.
    pub term: u64,
    #[serde(with = "hex_bytes")]
    pub data: Bytes,
}

/// Chunks held for one operation, in sequence order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingOp {
    /// Number of chunks the operation is expected to have.
    pub total: u32,
    pub chunks: Vec<PendingChunk>,
}

impl PendingOp {
    pub fn new(total: u32) -> Self {
        Self {
            total,
            chunks: Vec::new(),
        }
    }

    pub fn received(&self) -> u32 {
        self.chunks.len() as u32
    }

    pub fn is_complete(&self) -> bool {
        self.received() >= self.total
    }

    /// Concatenate every chunk, checking they were all committed in one term.
    pub fn assemble(self, op_id: u64) -> Result<Bytes, ChunkError> {
        let first = match self.chunks.first() {
            Some(chunk) => chunk.term,
            None => return Ok(Bytes::new()),
        };
        if let Some(stray) = self.chunks.iter().find(|c| c.term != first) {
            return Err(ChunkError::TermMismatch {
                op_id,
                first,
                found: stray.term,
            });
        }

        let len = self.chunks.iter().map(|c| c.data.len()).sum();
        let mut data = Vec::with_capacity(len);
        for chunk in &self.chunks {
            data.extend_from_slice(&chunk.data);
        }
        Ok(Bytes::from(data))
    }
}

/// All in-flight operations for one state machine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingTable {
    /// Term the table belongs to. Chunks from any other term never join it.
    term: u64,
    ops: BTreeMap<u64, PendingOp>,
}

impl PendingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// An empty table scoped to `term`.
    pub fn with_term(term: u64) -> Self {
        Self {
            term,
            ops: BTreeMap::new(),
        }
    }

    pub fn term(&self) -> u64 {
        self.term
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn get(&self, op_id: u64) -> Option<&PendingOp> {
        self.ops.get(&op_id)
    }

    pub fn ops(&self) -> impl Iterator<Item = (&u64, &PendingOp)> {
        self.ops.iter()
    }

    /// Insert or replace an operation. Used to build tables for import.
    pub fn insert(&mut self, op_id: u64, op: PendingOp) {
        self.ops.insert(op_id, op);
    }

    pub fn remove(&mut self, op_id: u64) -> Option<PendingOp> {
        self.ops.remove(&op_id)
    }

    /// Drop every operation and move the table to `term`. Returns how many
    /// operations were discarded.
    pub fn reset(&mut self, term: u64) -> usize {
        let dropped = self.ops.len();
        self.ops.clear();
        self.term = term;
        dropped
    }

    /// Independent copy. Payloads are copied into fresh buffers so nothing
    /// is shared with the live table.
    pub fn deep_copy(&self) -> Self {
        let ops = self
            .ops
            .iter()
            .map(|(op_id, op)| {
                let chunks = op
                    .chunks
                    .iter()
                    .map(|c| PendingChunk {
                        term: c.term,
                        data: Bytes::copy_from_slice(&c.data),
                    })
                    .collect();
                (
                    *op_id,
                    PendingOp {
                        total: op.total,
                        chunks,
                    },
                )
            })
            .collect();
        Self {
            term: self.term,
            ops,
        }
    }

    /// Record one chunk.
    ///
    /// Returns the finished operation, already removed from the table, once
    /// its last chunk arrives. A sequencing violation discards the operation
    /// so the client has to resubmit it under a new op id.
    pub fn accept(
        &mut self,
        info: &ChunkInfo,
        term: u64,
        data: Bytes,
    ) -> Result<Option<PendingOp>, ChunkError> {
        let op_id = info.op_id;
        let op = match self.ops.entry(op_id) {
            Entry::Occupied(e) => e.into_mut(),
            Entry::Vacant(e) if info.sequence == 0 => e.insert(PendingOp::new(info.total)),
            Entry::Vacant(_) => {
                return Err(ChunkError::NoExistingChunks {
                    op_id,
                    sequence: info.sequence,
                })
            }
        };

        let expected = op.received();
        if info.sequence != expected {
            self.ops.remove(&op_id);
            return Err(ChunkError::SequenceMismatch {
                op_id,
                expected,
                got: info.sequence,
            });
        }

        if info.total > op.total {
            tracing::debug!(
                op_id = %op_id_hex(op_id),
                was = op.total,
                now = info.total,
                "chunk raised expected total"
            );
            op.total = info.total;
        }
        op.chunks.push(PendingChunk { term, data });

        if !op.is_complete() {
            return Ok(None);
        }
        Ok(self.ops.remove(&op_id))
    }

    // ── Persistence ───────────────────────────────────────────────────────────

    /// Serialize for crash recovery: BLAKE3 hash of the body, then the body
    /// as JSON.
    pub fn to_bytes(&self) -> Result<Vec<u8>, PendingStateError> {
        let body = serde_json::to_vec(self).map_err(PendingStateError::Encode)?;
        let mut out = Vec::with_capacity(32 + body.len());
        out.extend_from_slice(blake3::hash(&body).as_bytes());
        out.extend_from_slice(&body);
        Ok(out)
    }

    /// Parse a table written by [`PendingTable::to_bytes`]. A checksum
    /// mismatch rejects the whole table rather than importing partial state.
    pub fn from_bytes(raw: &[u8]) -> Result<Self, PendingStateError> {
        if raw.len() < 32 {
            return Err(PendingStateError::Truncated(raw.len()));
        }
        let (checksum, body) = raw.split_at(32);
        if blake3::hash(body).as_bytes() != checksum {
            return Err(PendingStateError::ChecksumMismatch);
        }
        serde_json::from_slice(body).map_err(PendingStateError::Decode)
    }
}

/// Failures reading or writing a persisted pending table.
#[derive(Debug, thiserror::Error)]
pub enum PendingStateError {
    #[error("pending state truncated: {0} bytes")]
    Truncated(usize),

    #[error("pending state checksum mismatch")]
    ChecksumMismatch,

    #[error("failed to encode pending state: {0}")]
    Encode(serde_json::Error),

    #[error("failed to decode pending state: {0}")]
    Decode(serde_json::Error),
}

mod hex_bytes {
    use bytes::Bytes;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &Bytes, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Bytes, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        hex::decode(&s)
            .map(Bytes::from)
            .map_err(serde::de::Error::custom)
    }
}
