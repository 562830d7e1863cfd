//! Feed subscription handles

use tokio::sync::mpsc;

/// Receiving end of a room feed.
///
/// Dropping the handle unsubscribes: the backend prunes closed senders on its
/// next fan-out.
#[derive(Debug)]
pub struct Subscription<T> {
    rx: mpsc::UnboundedReceiver<T>,
}

impl<T> Subscription<T> {
    /// Create a connected sender/subscription pair.
    pub fn channel() -> (mpsc::UnboundedSender<T>, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        (tx, Self { rx })
    }

    /// Next item. `None` once the backend has dropped the feed.
    pub async fn next(&mut self) -> Option<T> {
        self.rx.recv().await
    }

    /// Next item if one is already queued.
    pub fn try_next(&mut self) -> Option<T> {
        self.rx.try_recv().ok()
    }

    /// Returns true once the feed has ended and every queued item was read.
    pub fn is_finished(&self) -> bool {
        self.rx.is_closed() && self.rx.is_empty()
    }
}
