mod txn_store;
mod txn_watcher;


pub use txn_store::*;
