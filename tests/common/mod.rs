//! Shared fixtures: both adapter families over an in-memory backend.

use std::sync::Arc;

use metakv::MemBackend;
use metakv::StoreConfig;
use metakv::StreamStore;
use metakv::TxnStore;
use metakv::VersionedStore;
use metakv::WatchPolicy;
use tokio_util::sync::CancellationToken;

/// Short poll cadence so emulated watches react quickly under test.
pub fn fast_config() -> StoreConfig {
    let mut config = StoreConfig::default();
    config.watch = WatchPolicy {
        poll_interval_ms: 10,
        ..WatchPolicy::default()
    };
    config
}

pub fn txn_store() -> (MemBackend, Arc<dyn VersionedStore>) {
    let backend = MemBackend::new();
    let store = TxnStore::new(
        Arc::new(backend.clone()),
        fast_config(),
        CancellationToken::new(),
    );
    (backend, Arc::new(store))
}

pub fn stream_store() -> (MemBackend, Arc<dyn VersionedStore>) {
    let backend = MemBackend::new();
    let store = StreamStore::new(
        Arc::new(backend.clone()),
        fast_config(),
        CancellationToken::new(),
    );
    (backend, Arc::new(store))
}

/// One store of each adapter family, labeled for assertion messages.
pub fn both_stores() -> Vec<(&'static str, Arc<dyn VersionedStore>)> {
    vec![("txn", txn_store().1), ("stream", stream_store().1)]
}
