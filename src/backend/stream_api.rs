//! Revision-stream backend capability.
//!
//! Models a consensus KV service with native single-key CAS writes and
//! a revision-ordered change feed. Every write advances one store-wide
//! revision; a feed can be opened at any revision the backend still
//! retains.

use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;

#[cfg(test)]
use mockall::automock;

use super::TransportError;

/// Guard on a single-key write or delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteGuard {
    /// Unconditional.
    None,
    /// Only while the key does not exist yet.
    IfAbsent,
    /// Only while the key's current mod revision matches.
    IfRevision(i64),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    /// Applied; `revision` is the write's mod revision.
    Written { revision: i64 },
    /// Guard not satisfied; nothing changed.
    Conflict,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveOutcome {
    Removed,
    /// Key absent.
    Missing,
    /// Guard not satisfied; the key is still present.
    Conflict,
}

/// Result of a point read: the store-wide revision observed plus the
/// key's pair when present.
///
/// The header `revision` is what a change feed should be resumed from.
/// The node's own creation revision may already have been compacted
/// away; the revision of the read has not.
#[derive(Debug, Clone, PartialEq)]
pub struct PointRead {
    pub revision: i64,
    pub kv: Option<StreamPair>,
}

/// A key/value pair with the mod revision of its latest write.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamPair {
    pub key: String,
    pub value: Bytes,
    pub mod_revision: i64,
}

/// One event on a change feed.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedEvent {
    pub kind: FeedEventKind,
    /// New contents for `Put`; empty for `Delete`.
    pub value: Bytes,
    /// Mod revision of the write that produced the event.
    pub revision: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedEventKind {
    Put,
    Delete,
    /// Raw event code this client does not understand.
    Other(i32),
}

/// One feed message: zero or more events plus the store revision as of
/// the message.
///
/// `canceled` carries the backend's reason when it terminates the feed
/// itself, e.g. because the requested start revision has been
/// compacted away. A feed that ends without a canceled batch was lost
/// in transit and may be reopened.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedBatch {
    pub revision: i64,
    pub events: Vec<FeedEvent>,
    pub canceled: Option<String>,
}

/// Ordered stream of feed batches.
pub type ChangeFeed = Pin<Box<dyn Stream<Item = FeedBatch> + Send>>;

/// Client surface of a revision-stream backend.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait StreamKv: Send + Sync + 'static {
    /// Revisioned point read.
    async fn read(
        &self,
        key: &str,
    ) -> std::result::Result<PointRead, TransportError>;

    /// Guarded single-key write.
    async fn write(
        &self,
        key: &str,
        value: Bytes,
        guard: WriteGuard,
    ) -> std::result::Result<WriteOutcome, TransportError>;

    /// Guarded single-key delete.
    async fn remove(
        &self,
        key: &str,
        guard: WriteGuard,
    ) -> std::result::Result<RemoveOutcome, TransportError>;

    /// Opens a change feed for `key` positioned immediately after
    /// `from_revision`: only events with a strictly greater revision
    /// are delivered.
    async fn subscribe(
        &self,
        key: &str,
        from_revision: i64,
    ) -> std::result::Result<ChangeFeed, TransportError>;
}
