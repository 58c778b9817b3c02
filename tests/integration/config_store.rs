use crate::*;

use raft_chunking::{ChunkingConfigurationStore, ConfigurationStore, StateMachine};
use raft_chunking_core::{Configuration, EntryKind, Server, Suffrage};

// ══════════════════════════════════════════════════════════════════════════════
//  Configuration store over the replicated log
// ══════════════════════════════════════════════════════════════════════════════

fn membership(voters: u16) -> Configuration {
    Configuration {
        servers: (1..=voters)
            .map(|n| Server {
                suffrage: Suffrage::Voter,
                id: format!("node-{n}"),
                address: format!("10.0.0.{n}:7000"),
            })
            .collect(),
    }
}

/// Replay the committed log into a configuration store, the way an engine
/// would on start-up. Configuration entries go to `store_configuration`,
/// everything else through `apply`.
fn replay(entries: &[LogEntry]) -> ChunkingConfigurationStore<Recorder> {
    let mut store = ChunkingConfigurationStore::new(Recorder::default());
    for entry in entries {
        if entry.kind == EntryKind::Configuration {
            let configuration = serde_json::from_slice(&entry.data).unwrap();
            store.store_configuration(entry.index, configuration);
        } else {
            let _ = store.apply(entry);
        }
    }
    store
}

/// A membership change committed in the middle of a chunked command reaches
/// the store at its own index and does not disturb reassembly.
#[tokio::test]
async fn test_membership_change_between_chunks() {
    init_tracing();
    let cluster = Cluster::new(2);
    let data = payload(3_500, 70);

    let handle = cluster.submit(&data, None, 1_000);
    let change = LogEntry {
        kind: EntryKind::Configuration,
        data: Bytes::from(serde_json::to_vec(&membership(3)).unwrap()),
        ..LogEntry::default()
    };
    let _ = cluster.append(change);
    cluster.interleave();
    assert_eq!(cluster.queued_entries()[1].kind, EntryKind::Configuration);

    cluster.commit();
    handle.await.unwrap().unwrap();

    let store = replay(&cluster.committed());
    assert_eq!(store.inner().configurations, vec![(2, membership(3))]);
    assert_eq!(store.inner().commands, vec![Bytes::from(data)]);
    assert_eq!(store.inner().indexes, vec![5]);
    assert_eq!(store.pending_ops(), 0);
}

/// A store recovered mid-operation from its snapshot and pending table
/// keeps both the configuration history it is given and the operation.
#[tokio::test]
async fn test_store_resumes_after_import() {
    init_tracing();
    let cluster = Cluster::new(1);
    let data = payload(4_000, 71);

    let handle = cluster.submit(&data, None, 1_000);
    cluster.commit();
    handle.await.unwrap().unwrap();
    let log = cluster.committed();

    let before = replay(&log[..2]);
    let pending = before.export_pending();
    assert_eq!(pending.len(), 1);

    let mut after = ChunkingConfigurationStore::new(Recorder::default());
    after.import_pending(pending);
    after.store_configuration(3, membership(1));
    for entry in &log[2..] {
        let _ = after.apply(entry);
    }

    assert_eq!(after.inner().commands, vec![Bytes::from(data)]);
    assert_eq!(after.inner().configurations, vec![(3, membership(1))]);
}
