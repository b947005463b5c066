//! Watch session surface: notification data and cancellation.

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::NodeValue;
use crate::StoreError;

/// One notification on a watch channel.
#[derive(Debug, Clone, PartialEq)]
pub enum WatchData {
    /// A live value observed at the watched path.
    Value(NodeValue),

    /// Terminal notice. Nothing further is delivered on the channel,
    /// which closes right after: a deleted node arrives as `NoNode`,
    /// a shut-down parent scope as `Interrupted`.
    Terminal(StoreError),
}

/// A live watch session.
///
/// `initial` is the value observed by the point read that opened the
/// session; `updates` then delivers changes in revision order. The
/// channel closes after a [`WatchData::Terminal`] or after
/// cancellation, so reading it to exhaustion always reveals why the
/// session ended — unless the caller itself asked for the stop.
#[derive(Debug)]
pub struct WatchSubscription {
    pub initial: NodeValue,
    pub updates: mpsc::Receiver<WatchData>,
    pub handle: WatchHandle,
}

/// Cancellation handle for one watch session.
///
/// Cancelling makes the session's background task stop within bounded
/// time whatever it is waiting on, close the notification channel
/// without emitting further values, and release the backend feed.
#[derive(Debug, Clone)]
pub struct WatchHandle {
    token: CancellationToken,
}

impl WatchHandle {
    pub(crate) fn new(token: CancellationToken) -> Self {
        Self { token }
    }

    /// Stops the session. Idempotent; a second call is a no-op.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// True once the session has been asked to stop.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}
