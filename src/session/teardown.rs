//! Teardown signalling for in-flight session work.

use tokio::sync::broadcast;

/// Coordinator for cancelling work tied to a session generation.
///
/// Every disconnect or reselection triggers the signal with the generation
/// that was torn down. Long-running waits subscribe before they start.
pub struct Teardown {
    /// Broadcast channel sender.
    tx: broadcast::Sender<u64>,
}

impl Teardown {
    /// Create a new teardown coordinator.
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(16);
        Self { tx }
    }

    /// Subscribe to the teardown signal.
    pub fn subscribe(&self) -> broadcast::Receiver<u64> {
        self.tx.subscribe()
    }

    /// Announce that `generation` was torn down.
    pub fn trigger(&self, generation: u64) {
        let _ = self.tx.send(generation);
    }

    /// Number of waits currently listening.
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for Teardown {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_trigger_reaches_subscribers() {
        let teardown = Teardown::new();
        let mut rx = teardown.subscribe();
        assert_eq!(teardown.receiver_count(), 1);

        teardown.trigger(3);
        assert_eq!(rx.recv().await.unwrap(), 3);
    }

    #[test]
    fn test_trigger_without_subscribers() {
        let teardown = Teardown::default();
        teardown.trigger(1);
        assert_eq!(teardown.receiver_count(), 0);
    }
}
