//! In-memory backend implementing both capability families.
//!
//! An embedded stand-in for a real consensus service: one store-wide
//! revision counter, per-write mod revisions, and retained write
//! history so a feed can be reopened at any uncompacted revision
//! without gaps. Fault hooks (`sever_feeds`, `compact`) exercise the
//! watch recovery paths without a real network in the way.
//!
//! Feed dispatch happens while the state write lock is held, so
//! batches reach every tap in revision order.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use parking_lot::RwLock;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::trace;

use crate::ChangeFeed;
use crate::FeedBatch;
use crate::FeedEvent;
use crate::FeedEventKind;
use crate::PointRead;
use crate::RemoveOutcome;
use crate::StreamKv;
use crate::StreamPair;
use crate::TransportError;
use crate::TxnKv;
use crate::TxnOp;
use crate::TxnOutcome;
use crate::TxnPair;
use crate::TxnStepResult;
use crate::TxnVerb;
use crate::WriteGuard;
use crate::WriteOutcome;

/// In-memory revision-tracked KV, cheap to clone and share.
#[derive(Clone, Default)]
pub struct MemBackend {
    inner: Arc<MemInner>,
}

#[derive(Default)]
struct MemInner {
    state: RwLock<MemState>,
    /// Live feed senders per key.
    taps: DashMap<String, Vec<FeedTap>>,
}

#[derive(Default)]
struct MemState {
    revision: i64,
    /// Highest revision discarded from `history`.
    compacted: i64,
    nodes: BTreeMap<String, MemNode>,
    /// Write history by revision, replayed on subscribe.
    history: BTreeMap<i64, HistoryEvent>,
}

struct MemNode {
    contents: Bytes,
    mod_revision: i64,
}

struct HistoryEvent {
    key: String,
    kind: FeedEventKind,
    contents: Bytes,
}

struct FeedTap {
    tx: mpsc::UnboundedSender<FeedBatch>,
}

impl MemBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store-wide revision of the latest write.
    pub fn revision(&self) -> i64 {
        self.inner.state.read().revision
    }

    /// Drops every live feed without cancelling it, the way a
    /// transport failure would. Watch sessions are expected to
    /// resubscribe and pick up from their resume point.
    pub fn sever_feeds(&self) {
        let severed: usize = self.inner.taps.iter().map(|entry| entry.value().len()).sum();
        self.inner.taps.clear();
        trace!(severed, "severed all live feeds");
    }

    /// Discards history at and below `revision`. A later subscription
    /// asking for a start point inside the discarded range is answered
    /// with a cancelled batch, as a real backend would answer it.
    pub fn compact(
        &self,
        revision: i64,
    ) {
        let mut state = self.inner.state.write();
        let retained = state.history.split_off(&(revision + 1));
        state.history = retained;
        state.compacted = state.compacted.max(revision);
        trace!(revision, "compacted history");
    }

    fn apply_put(
        state: &mut MemState,
        taps: &DashMap<String, Vec<FeedTap>>,
        key: &str,
        contents: Bytes,
    ) -> i64 {
        state.revision += 1;
        let revision = state.revision;
        state.nodes.insert(
            key.to_string(),
            MemNode {
                contents: contents.clone(),
                mod_revision: revision,
            },
        );
        state.history.insert(
            revision,
            HistoryEvent {
                key: key.to_string(),
                kind: FeedEventKind::Put,
                contents: contents.clone(),
            },
        );
        Self::dispatch(
            taps,
            key,
            FeedBatch {
                revision,
                events: vec![FeedEvent {
                    kind: FeedEventKind::Put,
                    value: contents,
                    revision,
                }],
                canceled: None,
            },
        );
        revision
    }

    fn apply_delete(
        state: &mut MemState,
        taps: &DashMap<String, Vec<FeedTap>>,
        key: &str,
    ) -> i64 {
        state.revision += 1;
        let revision = state.revision;
        state.nodes.remove(key);
        state.history.insert(
            revision,
            HistoryEvent {
                key: key.to_string(),
                kind: FeedEventKind::Delete,
                contents: Bytes::new(),
            },
        );
        Self::dispatch(
            taps,
            key,
            FeedBatch {
                revision,
                events: vec![FeedEvent {
                    kind: FeedEventKind::Delete,
                    value: Bytes::new(),
                    revision,
                }],
                canceled: None,
            },
        );
        revision
    }

    /// Fans one batch out to the key's live feeds, pruning closed ones.
    fn dispatch(
        taps: &DashMap<String, Vec<FeedTap>>,
        key: &str,
        batch: FeedBatch,
    ) {
        if let Some(mut entry) = taps.get_mut(key) {
            entry.retain(|tap| tap.tx.send(batch.clone()).is_ok());
        }
    }
}

#[async_trait]
impl TxnKv for MemBackend {
    async fn txn(
        &self,
        ops: Vec<TxnOp>,
    ) -> std::result::Result<TxnOutcome, TransportError> {
        let mut state = self.inner.state.write();

        // Every step is checked against the pre-transaction state
        // before anything is applied: all-or-nothing.
        for (i, op) in ops.iter().enumerate() {
            let current = state.nodes.get(&op.key).map(|n| n.mod_revision as u64);
            let ok = match op.verb {
                TxnVerb::Get => current.is_some(),
                TxnVerb::Set | TxnVerb::Delete => true,
                TxnVerb::Cas => match current {
                    None => op.index == 0,
                    Some(index) => op.index == index,
                },
                TxnVerb::DeleteCas => current == Some(op.index),
            };
            if !ok {
                trace!(step = i, verb = ?op.verb, key = %op.key, "transaction rolled back");
                return Ok(TxnOutcome::RolledBack { failed_step: i });
            }
        }

        let mut results = Vec::with_capacity(ops.len());
        for op in &ops {
            let index = match op.verb {
                TxnVerb::Get => state
                    .nodes
                    .get(&op.key)
                    .map(|n| n.mod_revision as u64)
                    .unwrap_or_default(),
                TxnVerb::Set | TxnVerb::Cas => {
                    Self::apply_put(&mut state, &self.inner.taps, &op.key, op.value.clone()) as u64
                }
                TxnVerb::Delete | TxnVerb::DeleteCas => {
                    if state.nodes.contains_key(&op.key) {
                        Self::apply_delete(&mut state, &self.inner.taps, &op.key);
                    }
                    0
                }
            };
            results.push(TxnStepResult {
                key: op.key.clone(),
                index,
            });
        }
        Ok(TxnOutcome::Committed { results })
    }

    async fn get(
        &self,
        key: &str,
    ) -> std::result::Result<Option<TxnPair>, TransportError> {
        let state = self.inner.state.read();
        Ok(state.nodes.get(key).map(|node| TxnPair {
            key: key.to_string(),
            value: node.contents.clone(),
            index: node.mod_revision as u64,
        }))
    }
}

#[async_trait]
impl StreamKv for MemBackend {
    async fn read(
        &self,
        key: &str,
    ) -> std::result::Result<PointRead, TransportError> {
        let state = self.inner.state.read();
        Ok(PointRead {
            revision: state.revision,
            kv: state.nodes.get(key).map(|node| StreamPair {
                key: key.to_string(),
                value: node.contents.clone(),
                mod_revision: node.mod_revision,
            }),
        })
    }

    async fn write(
        &self,
        key: &str,
        value: Bytes,
        guard: WriteGuard,
    ) -> std::result::Result<WriteOutcome, TransportError> {
        let mut state = self.inner.state.write();
        let current = state.nodes.get(key).map(|n| n.mod_revision);
        let ok = match guard {
            WriteGuard::None => true,
            WriteGuard::IfAbsent => current.is_none(),
            WriteGuard::IfRevision(revision) => current == Some(revision),
        };
        if !ok {
            return Ok(WriteOutcome::Conflict);
        }
        let revision = Self::apply_put(&mut state, &self.inner.taps, key, value);
        Ok(WriteOutcome::Written { revision })
    }

    async fn remove(
        &self,
        key: &str,
        guard: WriteGuard,
    ) -> std::result::Result<RemoveOutcome, TransportError> {
        let mut state = self.inner.state.write();
        let Some(node) = state.nodes.get(key) else {
            return Ok(RemoveOutcome::Missing);
        };
        let ok = match guard {
            WriteGuard::None => true,
            WriteGuard::IfAbsent => false,
            WriteGuard::IfRevision(revision) => node.mod_revision == revision,
        };
        if !ok {
            return Ok(RemoveOutcome::Conflict);
        }
        Self::apply_delete(&mut state, &self.inner.taps, key);
        Ok(RemoveOutcome::Removed)
    }

    async fn subscribe(
        &self,
        key: &str,
        from_revision: i64,
    ) -> std::result::Result<ChangeFeed, TransportError> {
        // The read lock keeps writers out while the replay is collected
        // and the tap registered, so no event lands in the gap between
        // the two.
        let state = self.inner.state.read();
        let (tx, rx) = mpsc::unbounded_channel();

        if from_revision < state.compacted {
            let _ = tx.send(FeedBatch {
                revision: state.revision,
                events: vec![],
                canceled: Some(format!(
                    "required revision {from_revision} has been compacted"
                )),
            });
            // Sender dropped here: the feed ends after the cancel.
            return Ok(Box::pin(UnboundedReceiverStream::new(rx)));
        }

        // Replay retained history past the resume point, then go live.
        for (&revision, event) in state.history.range(from_revision + 1..) {
            if event.key != key {
                continue;
            }
            let _ = tx.send(FeedBatch {
                revision,
                events: vec![FeedEvent {
                    kind: event.kind,
                    value: event.contents.clone(),
                    revision,
                }],
                canceled: None,
            });
        }

        self.inner
            .taps
            .entry(key.to_string())
            .or_default()
            .push(FeedTap { tx });
        trace!(key, from_revision, "feed subscribed");
        Ok(Box::pin(UnboundedReceiverStream::new(rx)))
    }
}
