//! Log entries and the types the consensus engine hands back to callers.
//!
//! The engine itself lives outside this workspace. These types are the
//! narrow contract between it, the chunk encoder, and the state machine
//! decorators.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::wire::{ChunkInfo, WireError};

// ── Log Entry ─────────────────────────────────────────────────────────────────

/// What a log entry carries. Only commands ever reach application logic
/// as chunks; everything else is engine bookkeeping.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    #[default]
    Command,
    Noop,
    Barrier,
    Configuration,
}

/// One committed entry, as delivered to a state machine.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogEntry {
    /// Position in the log. Assigned by the engine at commit.
    pub index: u64,
    /// Leadership term the entry was appended in.
    pub term: u64,
    pub kind: EntryKind,
    pub data: Bytes,
    /// Out-of-band metadata. Chunked entries keep their [`ChunkInfo`] here.
    pub extensions: Bytes,
}

impl LogEntry {
    /// A command entry with no index or term yet.
    pub fn command(data: impl Into<Bytes>) -> Self {
        Self {
            data: data.into(),
            ..Self::default()
        }
    }

    pub fn with_extensions(mut self, extensions: impl Into<Bytes>) -> Self {
        self.extensions = extensions.into();
        self
    }

    pub fn at(mut self, index: u64, term: u64) -> Self {
        self.index = index;
        self.term = term;
        self
    }

    /// Chunk metadata carried by this entry.
    ///
    /// `None` means the entry is not a chunk and should be applied as-is.
    /// `Some(Err(_))` means it claims to be a chunk but the metadata is bad.
    pub fn chunk_info(&self) -> Option<Result<ChunkInfo, WireError>> {
        if self.kind != EntryKind::Command || !ChunkInfo::is_tagged(&self.extensions) {
            return None;
        }
        Some(ChunkInfo::decode(&self.extensions))
    }
}

// ── Apply Results ─────────────────────────────────────────────────────────────

/// A successfully committed and applied entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Applied<R> {
    /// Log index the entry was committed at.
    pub index: u64,
    /// Whatever the state machine returned for it.
    pub response: R,
}

/// Why the engine could not apply an entry.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApplyError {
    #[error("node is not the leader")]
    NotLeader,

    #[error("leadership lost while committing entry")]
    LeadershipLost,

    #[error("timed out enqueuing entry")]
    EnqueueTimeout,

    #[error("consensus engine is shutting down")]
    Shutdown,

    #[error("{0}")]
    Other(String),
}

// ── Cluster Configuration ─────────────────────────────────────────────────────

/// Whether a server's vote counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Suffrage {
    Voter,
    Nonvoter,
    Staging,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Server {
    pub suffrage: Suffrage,
    pub id: String,
    pub address: String,
}

/// Cluster membership as committed to the log.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Configuration {
    pub servers: Vec<Server>,
}
