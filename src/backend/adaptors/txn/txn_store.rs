//! Versioned store over a transactional-CAS backend.
//!
//! The backend's only conditional primitive is the atomic multi-step
//! transaction, so every mutation here is phrased as one. A committed
//! transaction reports per-step results carrying the post-write modify
//! index; a rolled-back one reports which step refused, which is what
//! lets the adapter tell `NoNode` from `BadVersion` apart.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::txn_watcher::PollWatcher;
use crate::utils::join_path;
use crate::NodeValue;
use crate::Result;
use crate::StoreConfig;
use crate::StoreError;
use crate::TxnKv;
use crate::TxnOp;
use crate::TxnOutcome;
use crate::TxnStepResult;
use crate::Version;
use crate::VersionedStore;
use crate::WatchSubscription;

/// Transactional-CAS adapter.
#[derive(Clone)]
pub struct TxnStore<C: TxnKv> {
    client: Arc<C>,
    config: StoreConfig,
    /// Parent scope for every watch session opened through this store.
    shutdown: CancellationToken,
}

impl<C: TxnKv> TxnStore<C> {
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

    /// Extracts this backend's index from a caller-supplied version.
    /// A token minted by another backend family is a guaranteed
    /// mismatch, not a coercion candidate.
    fn expected_index(
        version: Version,
        path: &str,
    ) -> Result<u64> {
        match version {
            Version::Txn(index) => Ok(index),
            foreign => Err(StoreError::BadVersion(format!(
                "{path}: foreign version token {foreign}"
            ))),
        }
    }

    /// The modify index a single-step commit must carry. A result
    /// count that does not match the request is a malformed response.
    fn single_step_index(
        results: Vec<TxnStepResult>,
        path: &str,
    ) -> Result<u64> {
        match results.as_slice() {
            [step] => Ok(step.index),
            other => Err(StoreError::Internal(format!(
                "{path}: expected 1 transaction result, got {}",
                other.len()
            ))),
        }
    }
}

#[async_trait]
impl<C: TxnKv> VersionedStore for TxnStore<C> {
    async fn create(
        &self,
        path: &str,
        contents: &[u8],
    ) -> Result<Version> {
        let node_path = self.node_path(path);

        // A blind write followed by a read-back would race concurrent
        // creators. A CAS against index 0 inside a transaction both
        // enforces first-writer-wins and returns the minted index.
        let ops = vec![TxnOp::cas(
            node_path.as_str(),
            Bytes::copy_from_slice(contents),
            0,
        )];
        match self.client.txn(ops).await? {
            TxnOutcome::Committed { results } => {
                let index = Self::single_step_index(results, &node_path)?;
                debug!(path = %node_path, index, "created node");
                Ok(Version::Txn(index))
            }
            TxnOutcome::RolledBack { .. } => Err(StoreError::NodeExists(node_path)),
        }
    }

    async fn update(
        &self,
        path: &str,
        contents: &[u8],
        version: Option<Version>,
    ) -> Result<Version> {
        let node_path = self.node_path(path);

        // Even the unconditional flavor goes through a transaction: a
        // plain put does not report the post-write index, and reading
        // it back separately is unsound under concurrent writers.
        let op = match version {
            Some(v) => TxnOp::cas(
                node_path.as_str(),
                Bytes::copy_from_slice(contents),
                Self::expected_index(v, &node_path)?,
            ),
            None => TxnOp::set(node_path.as_str(), Bytes::copy_from_slice(contents)),
        };
        match self.client.txn(vec![op]).await? {
            TxnOutcome::Committed { results } => {
                let index = Self::single_step_index(results, &node_path)?;
                debug!(path = %node_path, index, "updated node");
                Ok(Version::Txn(index))
            }
            TxnOutcome::RolledBack { .. } => Err(StoreError::BadVersion(node_path)),
        }
    }

    async fn get(
        &self,
        path: &str,
    ) -> Result<NodeValue> {
        let node_path = self.node_path(path);

        match self.client.get(&node_path).await? {
            Some(pair) => Ok(NodeValue {
                contents: pair.value,
                version: Version::Txn(pair.index),
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

        // A bare delete reports success whether or not the key ever
        // existed. Bundling an existence check with the delete into one
        // transaction and inspecting which step refused is what
        // distinguishes the three outcomes.
        let guarded = match version {
            Some(v) => {
                TxnOp::delete_cas(node_path.as_str(), Self::expected_index(v, &node_path)?)
            }
            None => TxnOp::delete(node_path.as_str()),
        };
        let ops = vec![TxnOp::get(node_path.as_str()), guarded];
        match self.client.txn(ops).await? {
            TxnOutcome::Committed { .. } => {
                debug!(path = %node_path, "deleted node");
                Ok(())
            }
            TxnOutcome::RolledBack { failed_step: 0 } => Err(StoreError::NoNode(node_path)),
            TxnOutcome::RolledBack { failed_step: 1 } => Err(StoreError::BadVersion(node_path)),
            TxnOutcome::RolledBack { failed_step } => Err(StoreError::Internal(format!(
                "{node_path}: transaction refused at unexpected step {failed_step}"
            ))),
        }
    }

    async fn watch(
        &self,
        path: &str,
    ) -> Result<WatchSubscription> {
        PollWatcher::open(
            self.client.clone(),
            self.node_path(path),
            self.config.watch,
            self.shutdown.clone(),
        )
        .await
    }
}
