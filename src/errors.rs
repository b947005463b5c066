//! Versioned Store Error Taxonomy
//!
//! Every CRUD and watch operation resolves to one of the outcomes
//! defined here. Backend-specific failure codes never reach a caller:
//! the adapters translate them at the capability-trait boundary.

#[doc(hidden)]
pub type Result<T> = std::result::Result<T, StoreError>;

/// Operation outcome taxonomy, uniform across backends.
///
/// `Clone + PartialEq` so terminal notices can ride a watch channel
/// and tests can assert on them directly.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// Create on a path that already holds a value.
    #[error("node already exists: {0}")]
    NodeExists(String),

    /// Operation on a path with no value.
    #[error("node not found: {0}")]
    NoNode(String),

    /// Conditional write or delete lost a race or used a stale version.
    #[error("bad node version: {0}")]
    BadVersion(String),

    /// Transport failure, timeout, or unreachable backend.
    #[error("backend communication error: {0}")]
    Communication(String),

    /// The enclosing scope shut down while the operation was in flight.
    #[error("interrupted: {0}")]
    Interrupted(String),

    /// Malformed or unexpected backend response.
    #[error("internal error: {0}")]
    Internal(String),
}

impl StoreError {
    /// Failures a watch session absorbs by resubscribing rather than
    /// surfacing to the caller.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Communication(_))
    }

    /// Outcomes decided by the store's semantics rather than by the
    /// health of the backend.
    pub fn is_semantic(&self) -> bool {
        matches!(
            self,
            StoreError::NodeExists(_) | StoreError::NoNode(_) | StoreError::BadVersion(_)
        )
    }
}
