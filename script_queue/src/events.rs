//! Observer lists for queue and script notifications
//!
//! A [`Multicast`] maps subscriber identities to callbacks and delivers each
//! broadcast in registration order. The queue exposes one channel per
//! notification kind through [`QueueEvents`]; every script carries its own
//! [`ScriptEvents`](crate::script::ScriptEvents) set.

use crate::registry::ScriptClassId;
use crate::script::ScriptHandle;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_SUBSCRIBER_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of an observer, used to unsubscribe all of its callbacks at once
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u64);

impl SubscriberId {
    /// Allocate a process-unique subscriber id
    pub fn unique() -> Self {
        Self(NEXT_SUBSCRIBER_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

type Callback<E> = Box<dyn FnMut(&E) + Send + Sync>;

/// Ordered list of subscriber callbacks for a single notification kind
pub struct Multicast<E> {
    subscribers: Vec<(SubscriberId, Callback<E>)>,
}

impl<E> Default for Multicast<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> Multicast<E> {
    pub fn new() -> Self {
        Self {
            subscribers: Vec::new(),
        }
    }

    /// Register a callback for `subscriber`
    ///
    /// A subscriber may register several callbacks; each one is delivered
    /// in the order it was added.
    pub fn subscribe<F>(&mut self, subscriber: SubscriberId, callback: F)
    where
        F: FnMut(&E) + Send + Sync + 'static,
    {
        self.subscribers.push((subscriber, Box::new(callback)));
    }

    /// Remove every callback registered by `subscriber`, returning how many were removed
    pub fn unsubscribe(&mut self, subscriber: SubscriberId) -> usize {
        let before = self.subscribers.len();
        self.subscribers.retain(|(id, _)| *id != subscriber);
        before - self.subscribers.len()
    }

    pub fn is_subscribed(&self, subscriber: SubscriberId) -> bool {
        self.subscribers.iter().any(|(id, _)| *id == subscriber)
    }

    /// Drop all registrations
    pub fn clear(&mut self) {
        self.subscribers.clear();
    }

    /// Deliver `event` to every registered callback in registration order
    pub fn broadcast(&mut self, event: &E) {
        for (_, callback) in self.subscribers.iter_mut() {
            callback(event);
        }
    }

    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }
}

impl<E> fmt::Debug for Multicast<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Multicast")
            .field(
                "subscribers",
                &self.subscribers.iter().map(|(id, _)| id).collect::<Vec<_>>(),
            )
            .finish()
    }
}

/// Payload for notifications about a single script
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScriptInfo {
    pub handle: ScriptHandle,
    pub class: ScriptClassId,
}

/// Payload for finish notifications
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScriptOutcome {
    pub script: ScriptInfo,
    pub success: bool,
}

/// Notification channels exposed by a [`ScriptQueue`](crate::ScriptQueue)
#[derive(Debug, Default)]
pub struct QueueEvents {
    pub script_added: Multicast<ScriptInfo>,
    pub script_started: Multicast<ScriptInfo>,
    // TODO: broadcast once bulk cancellation of a script class is implemented
    pub script_cancelled: Multicast<ScriptInfo>,
    pub script_finished: Multicast<ScriptOutcome>,
    pub queue_finished: Multicast<()>,
}

impl QueueEvents {
    /// Remove `subscriber` from the added, started, finished and queue-finished channels
    pub fn clear_all(&mut self, subscriber: SubscriberId) {
        self.script_added.unsubscribe(subscriber);
        self.script_started.unsubscribe(subscriber);
        self.script_finished.unsubscribe(subscriber);
        self.queue_finished.unsubscribe(subscriber);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_broadcast_in_registration_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut channel = Multicast::<u32>::new();

        for tag in ["first", "second", "third"] {
            let log = log.clone();
            channel.subscribe(SubscriberId::unique(), move |value| {
                log.lock().unwrap().push(format!("{tag}:{value}"));
            });
        }

        channel.broadcast(&7);
        assert_eq!(
            *log.lock().unwrap(),
            vec!["first:7", "second:7", "third:7"]
        );
    }

    #[test]
    fn test_unsubscribe_removes_every_registration() {
        let hits = Arc::new(Mutex::new(0));
        let observer = SubscriberId::unique();
        let other = SubscriberId::unique();
        let mut channel = Multicast::<()>::new();

        for _ in 0..2 {
            let hits = hits.clone();
            channel.subscribe(observer, move |_| *hits.lock().unwrap() += 1);
        }
        channel.subscribe(other, |_| {});

        assert_eq!(channel.unsubscribe(observer), 2);
        assert!(!channel.is_subscribed(observer));
        assert!(channel.is_subscribed(other));

        channel.broadcast(&());
        assert_eq!(*hits.lock().unwrap(), 0);
        assert_eq!(channel.len(), 1);
    }

    #[test]
    fn test_clear_all_leaves_cancelled_channel() {
        let observer = SubscriberId::unique();
        let mut events = QueueEvents::default();
        events.script_added.subscribe(observer, |_| {});
        events.script_started.subscribe(observer, |_| {});
        events.script_cancelled.subscribe(observer, |_| {});
        events.script_finished.subscribe(observer, |_| {});
        events.queue_finished.subscribe(observer, |_| {});

        events.clear_all(observer);

        assert!(events.script_added.is_empty());
        assert!(events.script_started.is_empty());
        assert!(events.script_finished.is_empty());
        assert!(events.queue_finished.is_empty());
        assert!(events.script_cancelled.is_subscribed(observer));
    }

    #[test]
    fn test_unique_ids_differ() {
        assert_ne!(SubscriberId::unique(), SubscriberId::unique());
    }
}
