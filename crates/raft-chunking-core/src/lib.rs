//! raft-chunking-core: log entry model, chunk metadata wire format and
//! configuration. The state machine decorators and the encoder depend on
//! this crate.

pub mod config;
pub mod log;
pub mod wire;

pub use config::{ChunkingConfig, ConfigError};
pub use log::{Applied, ApplyError, Configuration, EntryKind, LogEntry, Server, Suffrage};
pub use wire::{ChunkInfo, WireError, SUGGESTED_MAX_DATA_SIZE};
