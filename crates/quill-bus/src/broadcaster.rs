// SPDX-FileCopyrightText: 2026 Quill Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-process publish/subscribe hub for [`StateEvent`]s.
//!
//! Delivery is synchronous and ordered: `emit` calls every live subscriber in
//! subscription order before returning. A subscriber whose callback returns an
//! error or panics is dropped on the spot; the others still get the event.
//! Nothing is queued for observers that are not connected.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use quill_core::StateEvent;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Error type returned by subscriber callbacks.
pub type SubscriberError = Box<dyn std::error::Error + Send + Sync>;

type Callback = Arc<dyn Fn(&StateEvent) -> Result<(), SubscriberError> + Send + Sync>;

struct Subscriber {
    id: String,
    callback: Callback,
}

#[derive(Default)]
struct Inner {
    subscribers: Mutex<Vec<Subscriber>>,
    /// Held for the whole of one `emit` so concurrent emitters cannot interleave.
    delivery: Mutex<()>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl Inner {
    fn remove(&self, id: &str) -> bool {
        let mut subscribers = lock(&self.subscribers);
        let before = subscribers.len();
        subscribers.retain(|s| s.id != id);
        subscribers.len() != before
    }
}

/// Process-scoped change broadcaster.
///
/// Cheap to clone; clones share one subscriber set. Callbacks must not call
/// [`emit`](Self::emit) themselves.
#[derive(Clone, Default)]
pub struct ChangeBroadcaster {
    inner: Arc<Inner>,
}

/// Handle to a live subscription. Dropping it unsubscribes.
pub struct Subscription {
    id: String,
    inner: Weak<Inner>,
}

impl Subscription {
    /// Diagnostic subscriber id, also carried by the `connected` event.
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn unsubscribe(self) {
        // Drop does the work.
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let removed = self
            .inner
            .upgrade()
            .is_some_and(|inner| inner.remove(&self.id));
        if removed {
            debug!(subscriber_id = %self.id, "subscriber unsubscribed");
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

impl ChangeBroadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `callback` and immediately delivers a `connected` event to it.
    ///
    /// If the callback rejects the `connected` event it is never registered.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&StateEvent) -> Result<(), SubscriberError> + Send + Sync + 'static,
    {
        let id = uuid::Uuid::new_v4().to_string();
        let callback: Callback = Arc::new(callback);
        let subscription = Subscription {
            id: id.clone(),
            inner: Arc::downgrade(&self.inner),
        };

        let connected = StateEvent::Connected {
            subscriber_id: id.clone(),
        };
        if !deliver(&id, &callback, &connected) {
            return subscription;
        }

        lock(&self.inner.subscribers).push(Subscriber { id, callback });
        debug!(subscriber_id = %subscription.id, "subscriber connected");
        subscription
    }

    /// Subscribes a channel. The receiver sees `connected` first.
    ///
    /// The subscription ends on its own once the receiver is dropped and the
    /// next event fails to send.
    pub fn subscribe_channel(&self) -> (Subscription, mpsc::UnboundedReceiver<StateEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let subscription = self.subscribe(move |event| {
            tx.send(event.clone())
                .map_err(|_| SubscriberError::from("receiver closed"))
        });
        (subscription, rx)
    }

    /// Delivers `event` to every current subscriber, in subscription order.
    pub fn emit(&self, event: StateEvent) {
        let _delivery = lock(&self.inner.delivery);

        let snapshot: Vec<(String, Callback)> = lock(&self.inner.subscribers)
            .iter()
            .map(|s| (s.id.clone(), Arc::clone(&s.callback)))
            .collect();

        let failed: Vec<String> = snapshot
            .iter()
            .filter(|(id, callback)| !deliver(id, callback, &event))
            .map(|(id, _)| id.clone())
            .collect();

        if !failed.is_empty() {
            lock(&self.inner.subscribers).retain(|s| !failed.contains(&s.id));
        }
        debug!(
            event = event.kind(),
            delivered = snapshot.len() - failed.len(),
            dropped = failed.len(),
            "state event emitted"
        );
    }

    pub fn subscriber_count(&self) -> usize {
        lock(&self.inner.subscribers).len()
    }
}

/// Runs one callback, isolating errors and panics. Returns `false` on failure.
fn deliver(id: &str, callback: &Callback, event: &StateEvent) -> bool {
    match catch_unwind(AssertUnwindSafe(|| callback(event))) {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            warn!(subscriber_id = %id, error = %e, "subscriber failed, removing");
            false
        }
        Err(_) => {
            warn!(subscriber_id = %id, "subscriber panicked, removing");
            false
        }
    }
}
