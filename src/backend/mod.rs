mod adaptors;
mod stream_api;
mod txn_api;

pub use adaptors::*;
pub use stream_api::*;
pub use txn_api::*;

use crate::StoreError;

/// Failure raised by a backend transport.
///
/// The only error the capability traits may produce. Adapters translate
/// it into [`StoreError::Communication`], so backend-specific codes
/// stop at this boundary.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("transport failure: {0}")]
pub struct TransportError(pub String);

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

impl From<TransportError> for StoreError {
    fn from(err: TransportError) -> Self {
        StoreError::Communication(err.0)
    }
}
