//! raft-chunking integration test harness.
//!
//! Tests run against an in-process replicated log: several replicas, each
//! behind a reassembling decorator, fed the same committed entries in the
//! same order. Nothing here needs the network or root.
//!
//!   cargo test --test integration
//!
//! Set `RUST_LOG=raft_chunking=debug` to see the decorators' logs.

mod batching;
mod config_store;

pub use infra::*;

pub use std::time::Duration;

pub use anyhow::Result;
pub use bytes::Bytes;
pub use raft_chunking::{chunking_apply, chunking_apply_reader, chunking_apply_with_config};
pub use raft_chunking_core::{ApplyError, ChunkingConfig, LogEntry, SUGGESTED_MAX_DATA_SIZE};

/// Install a test-writer subscriber once. Later calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Deterministic payload of `len` bytes.
pub fn payload(len: usize, seed: u64) -> Vec<u8> {
    use rand::{rngs::StdRng, RngCore, SeedableRng};
    let mut data = vec![0u8; len];
    StdRng::seed_from_u64(seed).fill_bytes(&mut data);
    data
}

// ── Harness self-checks ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_plain_command_reaches_every_replica() {
    init_tracing();
    let cluster = Cluster::new(3);

    let handle = cluster.submit_plain(Bytes::from_static(b"hello"));
    assert_eq!(cluster.commit(), 1);

    let applied = handle.await.expect("plain command applies");
    assert_eq!(applied.index, 1);
    assert_eq!(applied.response, Ok(Some(1)));
    for replica in 0..3 {
        assert_eq!(cluster.commands(replica), vec![Bytes::from_static(b"hello")]);
    }
}

#[tokio::test]
async fn test_step_down_rejects_submissions() {
    init_tracing();
    let cluster = Cluster::new(1);
    cluster.step_down();

    let err = cluster
        .submit_plain(Bytes::from_static(b"nope"))
        .await
        .unwrap_err();
    assert_eq!(err, ApplyError::NotLeader);
    assert_eq!(cluster.queued(), 0);
}
