//! Emulated watch session for backends without a native change feed.
//!
//! The backend offers only point reads, so the session re-reads the
//! node on a fixed cadence and reports modify-index advances. The
//! externally visible contract is the same as the native-feed
//! session's: delivery in index order, one terminal notice for
//! deletion, transparent recovery from transport failures.
//!
//! Writes landing between two reads coalesce into the latest value;
//! the index sequence stays strictly increasing either way.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::warn;

use crate::NodeValue;
use crate::Result;
use crate::StoreError;
use crate::TxnKv;
use crate::TxnPair;
use crate::Version;
use crate::WatchData;
use crate::WatchHandle;
use crate::WatchPolicy;
use crate::WatchSubscription;

pub(crate) struct PollWatcher<C: TxnKv> {
    client: Arc<C>,
    key: String,
    /// Modify index of the last delivered value.
    seen: u64,
    /// Consecutive failed reads; reset on the first successful one.
    retries: u32,
    policy: WatchPolicy,
    tx: mpsc::Sender<WatchData>,
    cancel: CancellationToken,
    shutdown: CancellationToken,
}

impl<C: TxnKv> PollWatcher<C> {
    /// Performs the initial read and spawns the session task.
    ///
    /// Fails synchronously with `NoNode` when the path is absent; no
    /// channel is opened in that case.
    pub(crate) async fn open(
        client: Arc<C>,
        key: String,
        policy: WatchPolicy,
        shutdown: CancellationToken,
    ) -> Result<WatchSubscription> {
        let Some(pair) = client.get(&key).await? else {
            return Err(StoreError::NoNode(key));
        };
        let initial = NodeValue {
            contents: pair.value,
            version: Version::Txn(pair.index),
        };

        let (tx, rx) = mpsc::channel(policy.buffer_size);
        let cancel = CancellationToken::new();
        let handle = WatchHandle::new(cancel.clone());
        let watcher = Self {
            client,
            key,
            seen: pair.index,
            retries: 0,
            policy,
            tx,
            cancel,
            shutdown,
        };
        tokio::spawn(watcher.run());

        Ok(WatchSubscription {
            initial,
            updates: rx,
            handle,
        })
    }

    async fn run(mut self) {
        debug!(key = %self.key, seen = self.seen, "poll watch session started");
        loop {
            // Transport trouble stretches the cadence with the shared
            // backoff curve. Cancellation preempts every wait,
            // including the read itself.
            let pause = self.policy.poll_interval() + self.policy.backoff(self.retries);
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    debug!(key = %self.key, "poll watch cancelled");
                    return;
                }
                _ = self.shutdown.cancelled() => {
                    self.deliver(WatchData::Terminal(StoreError::Interrupted(self.key.clone())))
                        .await;
                    return;
                }
                _ = sleep(pause) => {}
            }

            let read = tokio::select! {
                _ = self.cancel.cancelled() => return,
                _ = self.shutdown.cancelled() => {
                    self.deliver(WatchData::Terminal(StoreError::Interrupted(self.key.clone())))
                        .await;
                    return;
                }
                read = self.client.get(&self.key) => read,
            };

            match read {
                Ok(Some(pair)) => {
                    self.retries = 0;
                    if pair.index == self.seen {
                        continue;
                    }
                    if !self.deliver_value(pair).await {
                        return;
                    }
                }
                Ok(None) => {
                    // Node is gone: one terminal notice, then close.
                    debug!(key = %self.key, "watched node deleted");
                    self.deliver(WatchData::Terminal(StoreError::NoNode(self.key.clone())))
                        .await;
                    return;
                }
                Err(err) => {
                    self.retries += 1;
                    warn!(
                        key = %self.key,
                        retries = self.retries,
                        error = %err,
                        "poll watch read failed, backing off"
                    );
                }
            }
        }
    }

    async fn deliver_value(
        &mut self,
        pair: TxnPair,
    ) -> bool {
        self.seen = pair.index;
        let value = NodeValue {
            contents: pair.value,
            version: Version::Txn(pair.index),
        };
        self.deliver(WatchData::Value(value)).await
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
