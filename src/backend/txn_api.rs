//! Transactional-CAS backend capability.
//!
//! Models a consensus KV service whose only conditional primitive is
//! the atomic multi-step transaction: a sequence of verbs that all
//! commit or all roll back, reporting which step refused on rollback.
//! There is no native change-feed primitive; watches over this
//! capability are emulated by polling the point read.

use async_trait::async_trait;
use bytes::Bytes;

#[cfg(test)]
use mockall::automock;

use super::TransportError;

/// One step of a transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct TxnOp {
    pub verb: TxnVerb,
    pub key: String,
    /// Payload for `Set`/`Cas`; ignored by the other verbs.
    pub value: Bytes,
    /// Expected modify index for `Cas`/`DeleteCas`. `0` on `Cas` means
    /// "only if the key does not exist yet".
    pub index: u64,
}

impl TxnOp {
    pub fn get(key: impl Into<String>) -> Self {
        Self {
            verb: TxnVerb::Get,
            key: key.into(),
            value: Bytes::new(),
            index: 0,
        }
    }

    pub fn set(
        key: impl Into<String>,
        value: Bytes,
    ) -> Self {
        Self {
            verb: TxnVerb::Set,
            key: key.into(),
            value,
            index: 0,
        }
    }

    pub fn cas(
        key: impl Into<String>,
        value: Bytes,
        index: u64,
    ) -> Self {
        Self {
            verb: TxnVerb::Cas,
            key: key.into(),
            value,
            index,
        }
    }

    pub fn delete(key: impl Into<String>) -> Self {
        Self {
            verb: TxnVerb::Delete,
            key: key.into(),
            value: Bytes::new(),
            index: 0,
        }
    }

    pub fn delete_cas(
        key: impl Into<String>,
        index: u64,
    ) -> Self {
        Self {
            verb: TxnVerb::DeleteCas,
            key: key.into(),
            value: Bytes::new(),
            index,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxnVerb {
    /// Point read; fails the transaction when the key is absent.
    Get,
    /// Unconditional write.
    Set,
    /// Write guarded by `index`; `0` guards on absence.
    Cas,
    /// Unconditional delete; passes whether or not the key exists.
    Delete,
    /// Delete guarded by `index`; fails on absence or mismatch.
    DeleteCas,
}

/// Per-step result of a committed transaction, in request order.
#[derive(Debug, Clone, PartialEq)]
pub struct TxnStepResult {
    pub key: String,
    /// Modify index after the step: the current index for `Get`, the
    /// newly minted one for `Set`/`Cas`, `0` for the delete verbs.
    pub index: u64,
}

/// Outcome of one transaction round trip.
#[derive(Debug, Clone, PartialEq)]
pub enum TxnOutcome {
    /// Every step applied.
    Committed { results: Vec<TxnStepResult> },
    /// Nothing applied; `failed_step` is the offset of the step that
    /// refused.
    RolledBack { failed_step: usize },
}

/// A key/value pair with its modify index.
#[derive(Debug, Clone, PartialEq)]
pub struct TxnPair {
    pub key: String,
    pub value: Bytes,
    pub index: u64,
}

/// Client surface of a transactional-CAS backend.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait TxnKv: Send + Sync + 'static {
    /// Executes `ops` atomically: all-or-nothing.
    async fn txn(
        &self,
        ops: Vec<TxnOp>,
    ) -> std::result::Result<TxnOutcome, TransportError>;

    /// Point read; `None` when the key is absent.
    async fn get(
        &self,
        key: &str,
    ) -> std::result::Result<Option<TxnPair>, TransportError>;
}
