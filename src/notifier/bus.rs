//! Synchronous publish/subscribe bus.

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, OnceLock, Weak};

use arc_swap::ArcSwap;

use crate::notifier::ChangeEvent;
use crate::observability::metrics;

pub type EventHandler = Arc<dyn Fn(&ChangeEvent) + Send + Sync>;

struct Subscriber {
    id: u64,
    active: AtomicBool,
    handler: EventHandler,
}

struct NotifierInner {
    /// Copy-on-write list so dispatch never holds a lock while running handlers.
    subscribers: ArcSwap<Vec<Arc<Subscriber>>>,
    next_id: AtomicU64,
}

/// Publish/subscribe channel for session change events. Cloning shares the bus.
#[derive(Clone)]
pub struct ChangeNotifier {
    inner: Arc<NotifierInner>,
}

impl ChangeNotifier {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(NotifierInner {
                subscribers: ArcSwap::from_pointee(Vec::new()),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// The process-wide bus.
    pub fn global() -> &'static ChangeNotifier {
        static GLOBAL: OnceLock<ChangeNotifier> = OnceLock::new();
        GLOBAL.get_or_init(ChangeNotifier::new)
    }

    /// Register `handler` for all events.
    pub fn subscribe<F>(&self, handler: F) -> SubscriptionHandle
    where
        F: Fn(&ChangeEvent) + Send + Sync + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let subscriber = Arc::new(Subscriber {
            id,
            active: AtomicBool::new(true),
            handler: Arc::new(handler),
        });

        self.inner.subscribers.rcu(|current| {
            let mut next = Vec::clone(current);
            next.push(subscriber.clone());
            next
        });
        metrics::record_subscribers(self.subscriber_count());

        SubscriptionHandle {
            id,
            notifier: Arc::downgrade(&self.inner),
        }
    }

    /// Remove a subscription. Returns false if it was already gone.
    pub fn unsubscribe(&self, id: u64) -> bool {
        let removed = unsubscribe_from(&self.inner, id);
        if removed {
            metrics::record_subscribers(self.subscriber_count());
        }
        removed
    }

    /// Invoke every active handler in registration order.
    ///
    /// A panicking handler is logged and skipped; dispatch continues.
    pub fn publish(&self, event: ChangeEvent) {
        let snapshot = self.inner.subscribers.load_full();
        tracing::trace!(event = event.name(), subscribers = snapshot.len(), "Publishing change event");

        for subscriber in snapshot.iter() {
            // Removed earlier in this dispatch.
            if !subscriber.active.load(Ordering::Acquire) {
                continue;
            }

            let handler = &subscriber.handler;
            if catch_unwind(AssertUnwindSafe(|| handler(&event))).is_err() {
                tracing::error!(
                    subscription = subscriber.id,
                    event = event.name(),
                    "Change handler panicked"
                );
            }
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.load().len()
    }
}

impl Default for ChangeNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ChangeNotifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeNotifier")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

fn unsubscribe_from(inner: &NotifierInner, id: u64) -> bool {
    let current = inner.subscribers.load_full();
    let Some(subscriber) = current.iter().find(|s| s.id == id) else {
        return false;
    };
    subscriber.active.store(false, Ordering::Release);

    inner.subscribers.rcu(|current| {
        current
            .iter()
            .filter(|s| s.id != id)
            .cloned()
            .collect::<Vec<_>>()
    });
    true
}

/// Handle for one subscription.
///
/// Dropping the handle does not unsubscribe; call [`unsubscribe`](Self::unsubscribe).
#[derive(Debug)]
pub struct SubscriptionHandle {
    id: u64,
    notifier: Weak<NotifierInner>,
}

impl SubscriptionHandle {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// End the subscription. Takes effect immediately, including for a
    /// dispatch already in progress.
    pub fn unsubscribe(self) -> bool {
        match self.notifier.upgrade() {
            Some(inner) => {
                let removed = unsubscribe_from(&inner, self.id);
                if removed {
                    metrics::record_subscribers(inner.subscribers.load().len());
                }
                removed
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn recorder() -> (Arc<Mutex<Vec<String>>>, impl Fn(&str) -> EventHandler) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let log_for = log.clone();
        let make = move |tag: &str| -> EventHandler {
            let log = log_for.clone();
            let tag = tag.to_string();
            Arc::new(move |event: &ChangeEvent| {
                log.lock().unwrap().push(format!("{tag}:{}", event.name()));
            })
        };
        (log, make)
    }

    #[test]
    fn test_dispatch_in_registration_order() {
        let notifier = ChangeNotifier::new();
        let (log, make) = recorder();

        let a = make("a");
        let b = make("b");
        notifier.subscribe(move |e| a(e));
        notifier.subscribe(move |e| b(e));

        notifier.publish(ChangeEvent::ConnectionLost);
        assert_eq!(
            *log.lock().unwrap(),
            vec!["a:connection_lost", "b:connection_lost"]
        );
    }

    #[test]
    fn test_unsubscribe() {
        let notifier = ChangeNotifier::new();
        let (log, make) = recorder();

        let a = make("a");
        let handle = notifier.subscribe(move |e| a(e));
        assert_eq!(notifier.subscriber_count(), 1);
        assert!(handle.unsubscribe());
        assert_eq!(notifier.subscriber_count(), 0);

        notifier.publish(ChangeEvent::ConnectionLost);
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn test_drop_keeps_subscription() {
        let notifier = ChangeNotifier::new();
        let (log, make) = recorder();

        let a = make("a");
        drop(notifier.subscribe(move |e| a(e)));

        notifier.publish(ChangeEvent::ConnectionLost);
        assert_eq!(log.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_panicking_handler_is_isolated() {
        let notifier = ChangeNotifier::new();
        let (log, make) = recorder();

        notifier.subscribe(|_| panic!("handler failure"));
        let b = make("b");
        notifier.subscribe(move |e| b(e));

        notifier.publish(ChangeEvent::ConnectionLost);
        assert_eq!(*log.lock().unwrap(), vec!["b:connection_lost"]);
    }

    #[test]
    fn test_removed_during_dispatch_is_skipped() {
        let notifier = ChangeNotifier::new();
        let (log, make) = recorder();

        // Second subscriber's id is known once it registers; the first removes it.
        let target = Arc::new(AtomicU64::new(0));
        let remover = notifier.clone();
        let target_id = target.clone();
        notifier.subscribe(move |_| {
            remover.unsubscribe(target_id.load(Ordering::SeqCst));
        });

        let b = make("b");
        let handle = notifier.subscribe(move |e| b(e));
        target.store(handle.id(), Ordering::SeqCst);

        notifier.publish(ChangeEvent::ConnectionLost);
        assert!(log.lock().unwrap().is_empty());
        assert_eq!(notifier.subscriber_count(), 1);
    }

    #[test]
    fn test_handle_outlives_notifier() {
        let notifier = ChangeNotifier::new();
        let handle = notifier.subscribe(|_| {});
        drop(notifier);
        assert!(!handle.unsubscribe());
    }
}
