//! Auth state change notifications.
//!
//! An explicit observer list: subscribers register a callback and receive
//! every transition synchronously, in registration order. Unsubscription is
//! idempotent and safe to call from inside a callback during delivery.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex};

use tracing::warn;

use super::Session;

/// Kind of session transition being broadcast.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthEvent {
    SignedIn,
    SignedOut,
    TokenRefreshed,
    UserUpdated,
}

type Callback = Arc<dyn Fn(AuthEvent, Option<&Session>) + Send + Sync>;

#[derive(Default)]
pub(crate) struct SubscriberList {
    next_id: u64,
    entries: Vec<(u64, Callback)>,
}

pub(crate) type SharedSubscribers = Arc<Mutex<SubscriberList>>;

impl SubscriberList {
    fn add(&mut self, callback: Callback) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.entries.push((id, callback));
        id
    }

    fn remove(&mut self, id: u64) {
        self.entries.retain(|(entry_id, _)| *entry_id != id);
    }

    fn snapshot(&self) -> Vec<(u64, Callback)> {
        self.entries.clone()
    }
}

pub(crate) fn subscribe(
    subscribers: &SharedSubscribers,
    callback: impl Fn(AuthEvent, Option<&Session>) + Send + Sync + 'static,
) -> Subscription {
    let id = subscribers
        .lock()
        .expect("subscriber lock poisoned")
        .add(Arc::new(callback));
    Subscription {
        id,
        subscribers: Arc::clone(subscribers),
    }
}

/// Deliver an event to every subscriber registered at the start of the round.
/// The list lock is not held during delivery, so callbacks may subscribe or
/// unsubscribe without deadlocking; a panicking callback is contained and
/// does not stop delivery to the rest.
pub(crate) fn notify(subscribers: &SharedSubscribers, event: AuthEvent, session: Option<&Session>) {
    let snapshot = subscribers
        .lock()
        .expect("subscriber lock poisoned")
        .snapshot();

    for (id, callback) in snapshot {
        if catch_unwind(AssertUnwindSafe(|| callback(event, session))).is_err() {
            warn!(subscriber = id, ?event, "Auth subscriber panicked during notification");
        }
    }
}

/// Handle returned by `SessionManager::subscribe`. Dropping it does nothing;
/// delivery stops only on an explicit `unsubscribe`.
pub struct Subscription {
    id: u64,
    subscribers: SharedSubscribers,
}

impl Subscription {
    /// Stop receiving notifications. Idempotent.
    pub fn unsubscribe(&self) {
        self.subscribers
            .lock()
            .expect("subscriber lock poisoned")
            .remove(self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn shared() -> SharedSubscribers {
        Arc::new(Mutex::new(SubscriberList::default()))
    }

    #[test]
    fn test_delivery_in_registration_order() {
        let subs = shared();
        let order = Arc::new(Mutex::new(Vec::new()));

        for tag in ["first", "second", "third"] {
            let order = Arc::clone(&order);
            let _sub = subscribe(&subs, move |_, _| {
                order.lock().unwrap().push(tag);
            });
        }

        notify(&subs, AuthEvent::SignedIn, None);
        assert_eq!(*order.lock().unwrap(), vec!["first", "second", "third"]);
    }

    #[test]
    fn test_unsubscribe_before_any_event_delivers_nothing() {
        let subs = shared();
        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);

        let sub = subscribe(&subs, move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        sub.unsubscribe();

        notify(&subs, AuthEvent::SignedIn, None);
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_unsubscribe_is_idempotent() {
        let subs = shared();
        let sub = subscribe(&subs, |_, _| {});
        sub.unsubscribe();
        sub.unsubscribe();
        notify(&subs, AuthEvent::SignedOut, None);
    }

    #[test]
    fn test_self_unsubscribe_does_not_affect_current_round() {
        let subs = shared();
        let count = Arc::new(AtomicUsize::new(0));

        // First callback unsubscribes itself mid-round
        let slot: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));
        let slot_clone = Arc::clone(&slot);
        let sub = subscribe(&subs, move |_, _| {
            if let Some(s) = slot_clone.lock().unwrap().as_ref() {
                s.unsubscribe();
            }
        });
        *slot.lock().unwrap() = Some(sub);

        let counter = Arc::clone(&count);
        let _second = subscribe(&subs, move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        notify(&subs, AuthEvent::TokenRefreshed, None);
        assert_eq!(count.load(Ordering::SeqCst), 1, "second subscriber still notified");

        // Next round skips the unsubscribed callback without error
        notify(&subs, AuthEvent::SignedOut, None);
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_panicking_subscriber_does_not_stop_delivery() {
        let subs = shared();
        let _bad = subscribe(&subs, |_, _| panic!("subscriber bug"));

        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);
        let _good = subscribe(&subs, move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        notify(&subs, AuthEvent::SignedIn, None);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
