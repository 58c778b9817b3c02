//! Errors raised while submitting or reassembling chunked commands.
//!
//! None of these are fatal. Every one of them means the same thing to a
//! client: resubmit the whole command, which gets a fresh op id.

use raft_chunking_core::{ApplyError, WireError};

/// Reassembly failures, returned from `apply` in place of a response.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChunkError {
    #[error("no op ID found when reconstructing chunks")]
    InvalidOpId,

    #[error("op {op_id:016x}: no existing chunks but sequence number {sequence}")]
    NoExistingChunks { op_id: u64, sequence: u32 },

    #[error("op {op_id:016x}: sequence number skipped, expected {expected}, got {got}")]
    SequenceMismatch { op_id: u64, expected: u32, got: u32 },

    #[error("op {op_id:016x}: term mismatch during reconstruction ({first} vs {found}), please resubmit")]
    TermMismatch { op_id: u64, first: u64, found: u64 },

    #[error("malformed chunk info: {0}")]
    Malformed(#[from] WireError),

    #[error("wrapped state machine returned no batch response for entry {index}")]
    MissingBatchResponse { index: u64 },
}

/// Submission failures, reported by the aggregate future.
#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    #[error("failed to generate op ID: {0}")]
    Random(#[from] rand::Error),

    #[error("failed to read command: {0}")]
    Read(#[from] std::io::Error),

    #[error("error encoding chunk info: {0}")]
    Encode(#[from] WireError),

    #[error("chunk {sequence} failed to apply: {source}")]
    Apply {
        sequence: u32,
        #[source]
        source: ApplyError,
    },
}

impl SubmitError {
    /// The engine's error, if the failure came from applying a chunk.
    pub fn apply_error(&self) -> Option<&ApplyError> {
        match self {
            SubmitError::Apply { source, .. } => Some(source),
            _ => None,
        }
    }
}
