use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use mockall::Sequence;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing_test::traced_test;

use crate::FeedBatch;
use crate::FeedEvent;
use crate::FeedEventKind;
use crate::MemBackend;
use crate::MockStreamKv;
use crate::PointRead;
use crate::StoreConfig;
use crate::StoreError;
use crate::StreamPair;
use crate::StreamStore;
use crate::TransportError;
use crate::Version;
use crate::VersionedStore;
use crate::WatchData;

fn store_over(backend: MemBackend) -> StreamStore<MemBackend> {
    StreamStore::new(
        Arc::new(backend),
        StoreConfig::default(),
        CancellationToken::new(),
    )
}

async fn next_value(sub: &mut crate::WatchSubscription) -> crate::NodeValue {
    match timeout(Duration::from_secs(5), sub.updates.recv()).await {
        Ok(Some(WatchData::Value(value))) => value,
        other => panic!("expected a value notification, got {other:?}"),
    }
}

#[tokio::test]
async fn test_watch_absent_path_fails_synchronously() {
    let store = store_over(MemBackend::new());
    let err = store.watch("shards/9").await.unwrap_err();
    assert!(matches!(err, StoreError::NoNode(_)));
}

#[tokio::test]
#[traced_test]
async fn test_watch_lifecycle_update_then_delete() {
    let store = store_over(MemBackend::new());
    let v1 = store.create("shards/0", b"x").await.unwrap();

    let mut sub = store.watch("shards/0").await.unwrap();
    assert_eq!(sub.initial.contents.as_ref(), b"x");
    assert_eq!(sub.initial.version, v1);

    let v2 = store.update("shards/0", b"y", Some(v1)).await.unwrap();
    let value = next_value(&mut sub).await;
    assert_eq!(value.contents.as_ref(), b"y");
    assert_eq!(value.version, v2);
    assert_ne!(v2, v1);

    store.delete("shards/0", None).await.unwrap();
    match timeout(Duration::from_secs(5), sub.updates.recv()).await {
        Ok(Some(WatchData::Terminal(StoreError::NoNode(_)))) => {}
        other => panic!("expected a terminal NoNode, got {other:?}"),
    }

    // Channel closes after the terminal; no further values.
    assert!(sub.updates.recv().await.is_none());
}

#[tokio::test]
async fn test_updates_arrive_in_revision_order() {
    let store = store_over(MemBackend::new());
    store.create("shards/0", b"0").await.unwrap();
    let mut sub = store.watch("shards/0").await.unwrap();

    for i in 1..=5u8 {
        store
            .update("shards/0", format!("{i}").as_bytes(), None)
            .await
            .unwrap();
    }

    let mut last = sub.initial.version;
    for i in 1..=5u8 {
        let value = next_value(&mut sub).await;
        assert_eq!(value.contents.as_ref(), format!("{i}").as_bytes());
        let (Version::Stream(prev), Version::Stream(current)) = (last, value.version) else {
            panic!("stream watch must mint stream versions");
        };
        assert!(current > prev);
        last = value.version;
    }

    sub.handle.cancel();
}

#[tokio::test]
#[traced_test]
async fn test_disruption_between_updates_is_invisible() {
    let backend = MemBackend::new();
    let store = store_over(backend.clone());
    store.create("shards/0", b"x").await.unwrap();

    let mut sub = store.watch("shards/0").await.unwrap();

    store.update("shards/0", b"before", None).await.unwrap();
    let value = next_value(&mut sub).await;
    assert_eq!(value.contents.as_ref(), b"before");

    // Kill every live feed mid-session, then write again. The session
    // must resubscribe from its resume point and deliver the
    // post-disruption value: no duplicate, no gap, no error.
    backend.sever_feeds();
    store.update("shards/0", b"after", None).await.unwrap();

    let value = next_value(&mut sub).await;
    assert_eq!(value.contents.as_ref(), b"after");

    sub.handle.cancel();
    assert!(sub.updates.recv().await.is_none());
}

#[tokio::test]
async fn test_compacted_resume_point_surfaces_as_error() {
    let backend = MemBackend::new();
    let store = store_over(backend.clone());
    store.create("shards/0", b"x").await.unwrap();

    let mut sub = store.watch("shards/0").await.unwrap();

    // Push the store revision past the session's resume point, compact
    // the history away, then sever the feed so the session must reopen.
    store.create("other/0", b"1").await.unwrap();
    store.update("other/0", b"2", None).await.unwrap();
    backend.compact(backend.revision());
    backend.sever_feeds();

    match timeout(Duration::from_secs(5), sub.updates.recv()).await {
        Ok(Some(WatchData::Terminal(StoreError::Communication(reason)))) => {
            assert!(reason.contains("compacted"));
        }
        other => panic!("expected a terminal communication error, got {other:?}"),
    }
    assert!(sub.updates.recv().await.is_none());
}

#[tokio::test]
async fn test_cancel_closes_channel_within_bounded_time() {
    let store = store_over(MemBackend::new());
    store.create("shards/0", b"x").await.unwrap();

    let mut sub = store.watch("shards/0").await.unwrap();
    sub.handle.cancel();
    sub.handle.cancel(); // idempotent

    match timeout(Duration::from_secs(1), sub.updates.recv()).await {
        Ok(None) => {}
        other => panic!("expected a silently closed channel, got {other:?}"),
    }
}

#[tokio::test]
async fn test_shutdown_surfaces_the_cause() {
    let shutdown = CancellationToken::new();
    let backend = MemBackend::new();
    let store = StreamStore::new(
        Arc::new(backend),
        StoreConfig::default(),
        shutdown.clone(),
    );
    store.create("shards/0", b"x").await.unwrap();

    let mut sub = store.watch("shards/0").await.unwrap();
    shutdown.cancel();

    match timeout(Duration::from_secs(1), sub.updates.recv()).await {
        Ok(Some(WatchData::Terminal(StoreError::Interrupted(_)))) => {}
        other => panic!("expected a terminal interrupted notice, got {other:?}"),
    }
    assert!(sub.updates.recv().await.is_none());
}

fn mock_read(revision: i64) -> PointRead {
    PointRead {
        revision,
        kv: Some(StreamPair {
            key: "/shards/0".to_string(),
            value: Bytes::from_static(b"x"),
            mod_revision: revision,
        }),
    }
}

#[tokio::test]
async fn test_unrecognized_event_is_terminal_internal() {
    let (tx, rx) = mpsc::unbounded_channel();
    let mut mock = MockStreamKv::new();
    mock.expect_read().returning(|_| Ok(mock_read(5)));
    mock.expect_subscribe().return_once(move |_, _| {
        let feed: crate::ChangeFeed = Box::pin(UnboundedReceiverStream::new(rx));
        Ok(feed)
    });

    let store = StreamStore::new(
        Arc::new(mock),
        StoreConfig::default(),
        CancellationToken::new(),
    );
    let mut sub = store.watch("shards/0").await.unwrap();

    tx.send(FeedBatch {
        revision: 6,
        events: vec![FeedEvent {
            kind: FeedEventKind::Other(99),
            value: Bytes::new(),
            revision: 6,
        }],
        canceled: None,
    })
    .unwrap();

    match timeout(Duration::from_secs(1), sub.updates.recv()).await {
        Ok(Some(WatchData::Terminal(StoreError::Internal(reason)))) => {
            assert!(reason.contains("99"));
        }
        other => panic!("expected a terminal internal error, got {other:?}"),
    }
    assert!(sub.updates.recv().await.is_none());
}

#[tokio::test(start_paused = true)]
#[traced_test]
async fn test_failed_resubscriptions_keep_retrying() {
    let mut seq = Sequence::new();
    let mut mock = MockStreamKv::new();
    mock.expect_read().returning(|_| Ok(mock_read(5)));

    // First feed ends immediately: a disruption.
    mock.expect_subscribe()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _| {
            let (_, rx) = mpsc::unbounded_channel();
            let feed: crate::ChangeFeed = Box::pin(UnboundedReceiverStream::new(rx));
            Ok(feed)
        });
    // The next attempts fail in transit.
    mock.expect_subscribe()
        .times(3)
        .in_sequence(&mut seq)
        .returning(|_, _| Err(TransportError::new("connection refused")));
    // Then the backend comes back and delivers a fresh value.
    mock.expect_subscribe()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, from_revision| {
            // The session must still resume from where it left off.
            assert_eq!(from_revision, 5);
            let (tx, rx) = mpsc::unbounded_channel();
            tx.send(FeedBatch {
                revision: 6,
                events: vec![FeedEvent {
                    kind: FeedEventKind::Put,
                    value: Bytes::from_static(b"recovered"),
                    revision: 6,
                }],
                canceled: None,
            })
            .unwrap();
            // Keep the sender alive inside the stream so the feed
            // stays open after the replay.
            let stream = UnboundedReceiverStream::new(rx);
            let feed: crate::ChangeFeed = Box::pin(futures::stream::unfold(
                (stream, tx),
                |(mut stream, tx)| async move {
                    use futures::StreamExt;
                    stream.next().await.map(|batch| (batch, (stream, tx)))
                },
            ));
            Ok(feed)
        });

    let store = StreamStore::new(
        Arc::new(mock),
        StoreConfig::default(),
        CancellationToken::new(),
    );
    let mut sub = store.watch("shards/0").await.unwrap();

    let Some(WatchData::Value(value)) = sub.updates.recv().await else {
        panic!("expected the post-recovery value");
    };
    assert_eq!(value.contents.as_ref(), b"recovered");
    assert_eq!(value.version, Version::Stream(6));

    sub.handle.cancel();
}
