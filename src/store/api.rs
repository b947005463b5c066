//! Uniform store interface over heterogeneous consensus backends.
//!
//! Callers program against [`VersionedStore`] and never see which
//! backend family serves them. Conditional semantics are enforced by
//! the backend's own atomic primitives, so implementations carry no
//! client-side locking.
//!
//! # Implementations
//!
//! - [`TxnStore`](crate::TxnStore): transactional-CAS backends
//! - [`StreamStore`](crate::StreamStore): revision-stream backends

use async_trait::async_trait;
use bytes::Bytes;

use crate::Result;
use crate::Version;
use crate::WatchSubscription;

/// A value read from the store: contents plus the version that wrote
/// them.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeValue {
    pub contents: Bytes,
    pub version: Version,
}

/// CAS-versioned CRUD and watch over slash-separated paths.
///
/// Paths are relative to the store's configured root prefix. A `None`
/// version on `update`/`delete` means "unconditional, ignore the
/// current version".
///
/// # Thread Safety
///
/// Implementations are `Send + Sync`; independent calls may be issued
/// concurrently from any number of tasks.
#[async_trait]
pub trait VersionedStore: Send + Sync {
    /// Writes the first revision of `path`.
    ///
    /// The write is an atomic create: under concurrent creators exactly
    /// one call succeeds and the rest observe the conflict.
    ///
    /// # Errors
    ///
    /// - [`StoreError::NodeExists`](crate::StoreError::NodeExists) if a value is already present
    /// - [`StoreError::Communication`](crate::StoreError::Communication) on transport failures
    async fn create(
        &self,
        path: &str,
        contents: &[u8],
    ) -> Result<Version>;

    /// Overwrites `path`, optionally guarded by an expected version.
    ///
    /// With `Some(version)` the write succeeds only while the stored
    /// version still equals `version`; with `None` it is unconditional.
    /// Returns the version of the just-written value, captured in the
    /// same atomic unit as the write itself.
    ///
    /// # Errors
    ///
    /// - [`StoreError::BadVersion`](crate::StoreError::BadVersion) if the guard does not hold
    /// - [`StoreError::Communication`](crate::StoreError::Communication) on transport failures
    async fn update(
        &self,
        path: &str,
        contents: &[u8],
        version: Option<Version>,
    ) -> Result<Version>;

    /// Reads the current value at `path`.
    ///
    /// # Errors
    ///
    /// - [`StoreError::NoNode`](crate::StoreError::NoNode) if the path holds no value
    async fn get(
        &self,
        path: &str,
    ) -> Result<NodeValue>;

    /// Deletes `path`, optionally guarded by an expected version.
    ///
    /// The three outcomes are always distinguished: absent path,
    /// version mismatch, and successful delete.
    ///
    /// # Errors
    ///
    /// - [`StoreError::NoNode`](crate::StoreError::NoNode) if the path holds no value
    /// - [`StoreError::BadVersion`](crate::StoreError::BadVersion) if the guard does not hold
    async fn delete(
        &self,
        path: &str,
        version: Option<Version>,
    ) -> Result<()>;

    /// Opens a watch session on `path`.
    ///
    /// Resolves once the initial point read completes. On success the
    /// subscription carries the value observed by that read plus a
    /// channel delivering subsequent changes in revision order;
    /// transient stream disruptions are absorbed by resubscription and
    /// never surface on the channel. If the path is absent the call
    /// fails synchronously and no channel is opened.
    ///
    /// # Errors
    ///
    /// - [`StoreError::NoNode`](crate::StoreError::NoNode) if the path holds no value
    /// - [`StoreError::Communication`](crate::StoreError::Communication) on transport failures
    async fn watch(
        &self,
        path: &str,
    ) -> Result<WatchSubscription>;
}
