//! Native watch session over a revision-ordered change feed.
//!
//! Session lifecycle:
//!
//! ```text
//!   open()                       run()
//! ┌───────────────┐   ┌───────────────────────────────────────┐
//! │ point read    │   │ feed event ───► deliver value,        │
//! │ + subscribe   ├──►│                 advance resume point  │
//! │ at the read's │   │ feed ends  ───► back off, resubscribe │
//! │ revision      │   │                 at the resume point   │
//! └───────────────┘   │ delete / unknown event / backend      │
//!                     │ cancel ───► one terminal notice,      │
//!                     │             channel closes            │
//!                     └───────────────────────────────────────┘
//! ```
//!
//! The feed is opened at the revision observed by the initial read,
//! not at the node's creation — the backend may not retain history
//! that far back. On every batch the resume point advances, so a
//! reopened feed neither replays delivered revisions nor skips missed
//! ones. Resubscription is invisible to the caller except as continued
//! delivery on the same channel.

use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::warn;

use crate::ChangeFeed;
use crate::FeedBatch;
use crate::FeedEventKind;
use crate::NodeValue;
use crate::Result;
use crate::StoreError;
use crate::StreamKv;
use crate::Version;
use crate::WatchData;
use crate::WatchHandle;
use crate::WatchPolicy;
use crate::WatchSubscription;

pub(crate) struct FeedWatcher<C: StreamKv> {
    client: Arc<C>,
    key: String,
    /// Last revision observed on the feed; where a reopened feed
    /// resumes.
    resume: i64,
    /// Consecutive resubscription attempts; reset on the first value
    /// delivered afterward.
    retries: u32,
    policy: WatchPolicy,
    tx: mpsc::Sender<WatchData>,
    cancel: CancellationToken,
    shutdown: CancellationToken,
}

impl<C: StreamKv> FeedWatcher<C> {
    /// Performs the initial read, opens the feed and spawns the
    /// session task.
    ///
    /// Fails synchronously with `NoNode` when the path is absent; no
    /// channel is opened in that case.
    pub(crate) async fn open(
        client: Arc<C>,
        key: String,
        policy: WatchPolicy,
        shutdown: CancellationToken,
    ) -> Result<WatchSubscription> {
        let read = client.read(&key).await?;
        let Some(pair) = read.kv else {
            return Err(StoreError::NoNode(key));
        };
        let initial = NodeValue {
            contents: pair.value,
            version: Version::Stream(pair.mod_revision),
        };

        // Subscribing at the read's revision closes the window between
        // the read and the subscription: a write landing in between is
        // past that revision and arrives on the feed.
        let feed = client.subscribe(&key, read.revision).await?;

        let (tx, rx) = mpsc::channel(policy.buffer_size);
        let cancel = CancellationToken::new();
        let handle = WatchHandle::new(cancel.clone());
        let watcher = Self {
            client,
            key,
            resume: read.revision,
            retries: 0,
            policy,
            tx,
            cancel,
            shutdown,
        };
        tokio::spawn(watcher.run(feed));

        Ok(WatchSubscription {
            initial,
            updates: rx,
            handle,
        })
    }

    async fn run(
        mut self,
        mut feed: ChangeFeed,
    ) {
        debug!(key = %self.key, resume = self.resume, "watch session started");
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    debug!(key = %self.key, "watch cancelled");
                    return;
                }
                _ = self.shutdown.cancelled() => {
                    self.deliver(WatchData::Terminal(StoreError::Interrupted(self.key.clone())))
                        .await;
                    return;
                }
                batch = feed.next() => match batch {
                    Some(batch) => {
                        if !self.handle_batch(batch).await {
                            return;
                        }
                    }
                    None => {
                        // The feed dropped without the backend
                        // cancelling it: a transient disruption.
                        match self.resubscribe().await {
                            Some(next) => feed = next,
                            None => return,
                        }
                    }
                }
            }
        }
    }

    /// Applies one feed batch. `false` ends the session.
    async fn handle_batch(
        &mut self,
        batch: FeedBatch,
    ) -> bool {
        if let Some(reason) = batch.canceled {
            // The backend closed the feed for cause, e.g. the resume
            // point was compacted away. Surfaced, never swallowed.
            warn!(key = %self.key, reason = %reason, "backend cancelled watch feed");
            self.deliver(WatchData::Terminal(StoreError::Communication(format!(
                "{}: watch feed cancelled by backend: {reason}",
                self.key
            ))))
            .await;
            return false;
        }

        self.resume = batch.revision;

        for event in batch.events {
            match event.kind {
                FeedEventKind::Put => {
                    self.retries = 0;
                    let value = NodeValue {
                        contents: event.value,
                        version: Version::Stream(event.revision),
                    };
                    if !self.deliver(WatchData::Value(value)).await {
                        return false;
                    }
                }
                FeedEventKind::Delete => {
                    // Node is gone: one terminal notice, then close.
                    debug!(key = %self.key, "watched node deleted");
                    self.deliver(WatchData::Terminal(StoreError::NoNode(self.key.clone())))
                        .await;
                    return false;
                }
                FeedEventKind::Other(code) => {
                    self.deliver(WatchData::Terminal(StoreError::Internal(format!(
                        "{}: unrecognized watch event type {code}",
                        self.key
                    ))))
                    .await;
                    return false;
                }
            }
        }
        true
    }

    /// Reopens the feed at the resume point, backing off as failed
    /// attempts pile up. `None` ends the session (cancelled or shut
    /// down mid-wait). Unbounded in attempts, bounded in delay.
    async fn resubscribe(&mut self) -> Option<ChangeFeed> {
        loop {
            self.retries += 1;
            let delay = self.policy.backoff(self.retries);
            if !delay.is_zero() {
                warn!(
                    key = %self.key,
                    retries = self.retries,
                    ?delay,
                    "watch feed lost, delaying resubscription"
                );
                tokio::select! {
                    _ = self.cancel.cancelled() => return None,
                    _ = self.shutdown.cancelled() => {
                        self.deliver(WatchData::Terminal(StoreError::Interrupted(
                            self.key.clone(),
                        )))
                        .await;
                        return None;
                    }
                    _ = sleep(delay) => {}
                }
            }

            match self.client.subscribe(&self.key, self.resume).await {
                Ok(feed) => {
                    debug!(
                        key = %self.key,
                        resume = self.resume,
                        retries = self.retries,
                        "watch feed reopened"
                    );
                    return Some(feed);
                }
                Err(err) => {
                    warn!(
                        key = %self.key,
                        retries = self.retries,
                        error = %err,
                        "resubscription failed"
                    );
                }
            }
        }
    }

    /// Sends one notification; `false` means the session is over
    /// (cancelled mid-send, or the receiver is gone).
    async fn deliver(
        &self,
        data: WatchData,
    ) -> bool {
        tokio::select! {
            _ = self.cancel.cancelled() => false,
            sent = self.tx.send(data) => {
                if sent.is_err() {
                    debug!(key = %self.key, "watch receiver dropped, ending session");
                }
                sent.is_ok()
            }
        }
    }
}
