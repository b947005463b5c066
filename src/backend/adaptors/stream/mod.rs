mod stream_store;
mod stream_watcher;

#[cfg(test)]
mod stream_watcher_test;

pub use stream_store::*;
