use crate::*;

// ══════════════════════════════════════════════════════════════════════════════
//  Batched apply
// ══════════════════════════════════════════════════════════════════════════════

/// Two interleaved operations and a plain entry in one batch. The wrapped
/// machine gets a single batch of three, A then B then the plain entry, and
/// responses land on the positions that completed something.
#[tokio::test]
async fn test_interleaved_batch() {
    init_tracing();
    let cluster = Cluster::new(3);
    let a = payload(1_800, 20);
    let b = payload(1_900, 21);

    let ha = cluster.submit(&a, None, 1_000);
    let hb = cluster.submit(&b, None, 1_000);
    cluster.interleave();
    let hp = cluster.submit_plain(Bytes::from_static(b"plain"));
    assert_eq!(cluster.queued(), 5);

    assert_eq!(cluster.commit_batched(), 5);

    let ra = ha.await.unwrap().unwrap();
    let rb = hb.await.unwrap().unwrap();
    let rp = hp.await.unwrap();
    assert_eq!((ra.index, ra.response), (3, Ok(Some(1))));
    assert_eq!((rb.index, rb.response), (4, Ok(Some(2))));
    assert_eq!((rp.index, rp.response), (5, Ok(Some(3))));

    for replica in 0..3 {
        assert_eq!(cluster.batches(replica), vec![3]);
        assert_eq!(
            cluster.commands(replica),
            vec![Bytes::from(a.clone()), Bytes::from(b.clone()), Bytes::from_static(b"plain")]
        );
    }
}

#[tokio::test]
async fn test_large_command_in_one_batch() {
    init_tracing();
    let cluster = Cluster::new(2);
    let data = payload(6_000_000, 22);

    let handle = chunking_apply(
        Bytes::from(data.clone()),
        None,
        Duration::from_secs(5),
        cluster.applier(),
    );
    assert_eq!(cluster.commit_batched(), 12);

    let applied = handle.await.unwrap().unwrap();
    assert_eq!(applied.response, Ok(Some(1)));
    assert_eq!(cluster.batches(0), vec![1]);
    assert_eq!(cluster.commands(0), vec![Bytes::from(data)]);
}

/// Mixed plain and chunked entries, committed in several batches that cut
/// operations in half.
#[tokio::test]
async fn test_mixed_data_over_several_batches() {
    init_tracing();
    let cluster = Cluster::new(2);
    let mut expected = Vec::new();

    for round in 0..3u64 {
        let plain = Bytes::from(format!("plain-{round}"));
        let chunked = payload(2_600, 30 + round);
        let _ = cluster.submit_plain(plain.clone());
        let _ = cluster.submit(&chunked, None, 1_000);
        expected.push(plain);
        expected.push(Bytes::from(chunked));

        // Hold back the last two chunks so they share a batch with the
        // next round.
        cluster.commit_batched_up_to(cluster.queued() - 2);
        assert_eq!(cluster.pending_ops(0), 1);
    }
    cluster.commit_batched();

    for replica in 0..2 {
        assert_eq!(cluster.commands(replica), expected);
        assert_eq!(cluster.pending_ops(replica), 0);
    }
}

#[tokio::test]
async fn test_batch_with_no_completions_skips_wrapped_machine() {
    init_tracing();
    let cluster = Cluster::new(1);
    let handle = cluster.submit(&payload(5_000, 40), None, 1_000);

    assert_eq!(cluster.queued(), 5);

    cluster.commit_batched_up_to(4);
    assert!(cluster.batches(0).is_empty());
    assert_eq!(cluster.pending_ops(0), 1);

    cluster.commit_batched();
    assert_eq!(cluster.batches(0), vec![1]);
    assert_eq!(handle.await.unwrap().unwrap().response, Ok(Some(1)));
}
