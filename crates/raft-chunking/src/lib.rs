//! raft-chunking: submit commands larger than a log entry may hold, and
//! rebuild them on every replica before the application sees them.
//!
//! The client side is [`chunking_apply`] and friends, which split a command,
//! tag each slice with [`ChunkInfo`](raft_chunking_core::ChunkInfo) and
//! return an [`AggregateFuture`]. The replica side is one of the
//! decorators: [`ChunkingStateMachine`], [`ChunkingBatchingStateMachine`]
//! or [`ChunkingConfigurationStore`], chosen by what the wrapped machine
//! supports.

pub mod batching;
pub mod config_store;
pub mod encoder;
pub mod error;
pub mod fsm;
pub mod future;
pub mod pending;
pub mod state_machine;

#[cfg(test)]
mod test_support;

pub use batching::ChunkingBatchingStateMachine;
pub use config_store::ChunkingConfigurationStore;
pub use encoder::{
    chunking_apply, chunking_apply_reader, chunking_apply_with_config, read_chunks, split_command,
};
pub use error::{ChunkError, SubmitError};
pub use fsm::{ChunkedResponse, ChunkingStateMachine};
pub use future::{AggregateFuture, AggregateOutcome, AggregateResult};
pub use pending::{PendingChunk, PendingOp, PendingStateError, PendingTable};
pub use state_machine::{BatchingStateMachine, ConfigurationStore, StateMachine};
