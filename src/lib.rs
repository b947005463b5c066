//! # metakv
//!
//! Client-side versioned metadata store for cluster managers.
//!
//! A cluster manager keeps its own metadata (shard topology, tablet
//! assignments, configuration) in an external consensus-backed KV
//! service. Different services expose very different primitives — some
//! only atomic multi-step transactions, some native revision-ordered
//! change feeds — and this crate papers over that behind one contract:
//!
//! - [`VersionedStore`]: CAS-versioned `create`/`update`/`get`/`delete`
//!   over slash-separated paths, with a uniform error taxonomy
//!   ([`StoreError`]) and backend-tagged version identity ([`Version`]).
//! - `watch`: a long-lived subscription delivering value changes in
//!   revision order, surviving transient stream disruptions through
//!   automatic resubscription, with an idempotent cancellation handle.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//!
//! use metakv::{MemBackend, StoreConfig, StreamStore, VersionedStore, WatchData};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let backend = Arc::new(MemBackend::new());
//!     let store = StreamStore::new(backend, StoreConfig::default(), CancellationToken::new());
//!
//!     let v1 = store.create("shards/0", b"primary=node-1").await?;
//!     let mut sub = store.watch("shards/0").await?;
//!     assert_eq!(sub.initial.version, v1);
//!
//!     store.update("shards/0", b"primary=node-2", Some(v1)).await?;
//!     if let Some(WatchData::Value(value)) = sub.updates.recv().await {
//!         println!("shards/0 -> {:?}", value.contents);
//!     }
//!     sub.handle.cancel();
//!     Ok(())
//! }
//! ```
//!
//! ## Backends
//!
//! Two adapter families implement the contract:
//! - [`TxnStore`] for transactional-CAS services (conditional writes
//!   only via atomic multi-step transactions, watches emulated by
//!   polling);
//! - [`StreamStore`] for revision-stream services (native CAS writes
//!   and a change-feed primitive).
//!
//! Both consume their service through a capability trait ([`TxnKv`] /
//! [`StreamKv`]); wire transports live behind those seams. The bundled
//! [`MemBackend`] implements both for embedded and test use.

mod backend;
mod config;
mod constants;
mod errors;
mod store;
pub mod utils;

pub use backend::*;
pub use config::*;
pub use errors::*;
pub use store::*;
