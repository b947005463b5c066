//! Versioned store over a revision-stream backend.
//!
//! The backend exposes guarded single-key writes directly, so CRUD is
//! one call per operation. A version is the mod revision minted by the
//! write — the same token the change feed reports, so a value seen on
//! a watch compares equal to the same write seen by `get`.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::stream_watcher::FeedWatcher;
use crate::utils::join_path;
use crate::NodeValue;
use crate::RemoveOutcome;
use crate::Result;
use crate::StoreConfig;
use crate::StoreError;
use crate::StreamKv;
use crate::Version;
use crate::VersionedStore;
use crate::WatchSubscription;
use crate::WriteGuard;
use crate::WriteOutcome;

/// Revision-stream adapter.
#[derive(Clone)]
pub struct StreamStore<C: StreamKv> {
    client: Arc<C>,
    config: StoreConfig,
    /// Parent scope for every watch session opened through this store.
    shutdown: CancellationToken,
}

impl<C: StreamKv> StreamStore<C> {
    pub fn new(
        client: Arc<C>,
        config: StoreConfig,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            client,
            config,
            shutdown,
        }
    }

    fn node_path(
        &self,
        path: &str,
    ) -> String {
        join_path(&self.config.root, path)
    }

    /// Extracts this backend's revision from a caller-supplied version.
    /// A token minted by another backend family is a guaranteed
    /// mismatch, not a coercion candidate.
    fn expected_revision(
        version: Version,
        path: &str,
    ) -> Result<i64> {
        match version {
            Version::Stream(revision) => Ok(revision),
            foreign => Err(StoreError::BadVersion(format!(
                "{path}: foreign version token {foreign}"
            ))),
        }
    }
}

#[async_trait]
impl<C: StreamKv> VersionedStore for StreamStore<C> {
    async fn create(
        &self,
        path: &str,
        contents: &[u8],
    ) -> Result<Version> {
        let node_path = self.node_path(path);

        let outcome = self
            .client
            .write(
                &node_path,
                Bytes::copy_from_slice(contents),
                WriteGuard::IfAbsent,
            )
            .await?;
        match outcome {
            WriteOutcome::Written { revision } => {
                debug!(path = %node_path, revision, "created node");
                Ok(Version::Stream(revision))
            }
            WriteOutcome::Conflict => Err(StoreError::NodeExists(node_path)),
        }
    }

    async fn update(
        &self,
        path: &str,
        contents: &[u8],
        version: Option<Version>,
    ) -> Result<Version> {
        let node_path = self.node_path(path);

        let guard = match version {
            Some(v) => WriteGuard::IfRevision(Self::expected_revision(v, &node_path)?),
            None => WriteGuard::None,
        };
        let outcome = self
            .client
            .write(&node_path, Bytes::copy_from_slice(contents), guard)
            .await?;
        match outcome {
            WriteOutcome::Written { revision } => {
                debug!(path = %node_path, revision, "updated node");
                Ok(Version::Stream(revision))
            }
            WriteOutcome::Conflict => Err(StoreError::BadVersion(node_path)),
        }
    }

    async fn get(
        &self,
        path: &str,
    ) -> Result<NodeValue> {
        let node_path = self.node_path(path);

        let read = self.client.read(&node_path).await?;
        match read.kv {
            Some(pair) => Ok(NodeValue {
                contents: pair.value,
                version: Version::Stream(pair.mod_revision),
            }),
            None => Err(StoreError::NoNode(node_path)),
        }
    }

    async fn delete(
        &self,
        path: &str,
        version: Option<Version>,
    ) -> Result<()> {
        let node_path = self.node_path(path);

        let guard = match version {
            Some(v) => WriteGuard::IfRevision(Self::expected_revision(v, &node_path)?),
            None => WriteGuard::None,
        };
        match self.client.remove(&node_path, guard).await? {
            RemoveOutcome::Removed => {
                debug!(path = %node_path, "deleted node");
                Ok(())
            }
            RemoveOutcome::Missing => Err(StoreError::NoNode(node_path)),
            RemoveOutcome::Conflict => Err(StoreError::BadVersion(node_path)),
        }
    }

    async fn watch(
        &self,
        path: &str,
    ) -> Result<WatchSubscription> {
        FeedWatcher::open(
            self.client.clone(),
            self.node_path(path),
            self.config.watch,
            self.shutdown.clone(),
        )
        .await
    }
}
