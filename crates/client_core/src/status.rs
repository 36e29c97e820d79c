use std::sync::Arc;

use tokio::sync::watch;

/// Holds exactly one value. Every write replaces the previous one unconditionally; readers see
/// the latest value only, with no history or queuing.
#[derive(Debug)]
pub struct Slot<T> {
    tx: Arc<watch::Sender<T>>,
}

impl<T> Clone for Slot<T> {
    fn clone(&self) -> Self {
        Self {
            tx: Arc::clone(&self.tx),
        }
    }
}

impl<T: Clone> Slot<T> {
    pub fn new(initial: T) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx: Arc::new(tx) }
    }

    pub fn set(&self, value: T) {
        self.tx.send_replace(value);
    }

    pub fn get(&self) -> T {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<T> {
        self.tx.subscribe()
    }
}

impl<T: Clone + Default> Default for Slot<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

/// Page-wide progress indicator shared by every controller. Last writer wins.
#[derive(Debug, Clone, Default)]
pub struct StatusChannel {
    slot: Slot<String>,
}

impl StatusChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, message: impl Into<String>) {
        let message = message.into();
        tracing::trace!(status = %message, "status updated");
        self.slot.set(message);
    }

    pub fn clear(&self) {
        self.set(String::new());
    }

    pub fn current(&self) -> String {
        self.slot.get()
    }

    pub fn subscribe(&self) -> watch::Receiver<String> {
        self.slot.subscribe()
    }
}
