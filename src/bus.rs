use crate::error::Error;
use crate::event::EventReceiver;
use crate::flag::Flag;
use crate::matcher::{Matcher, PathMatch};
use crate::middleware::{Middleware, flag};
use crate::registry::Registry;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::debug;

/// Shared state behind every clone of a [`Bus`].
///
/// One mutex guards the whole registry — both maps and the default
/// capacity. It is only ever held for matching, enumeration and
/// mutation, never across an await.
pub(crate) struct Inner {
    pub(crate) registry: Mutex<Registry>,
    pub(crate) matcher: Arc<dyn Matcher>,
}

/// In-process topic pub/sub event bus.
///
/// Producers publish events under string topics; consumers subscribe
/// with topics or glob patterns and read from bounded queues. Matching
/// works in both directions, so `emit("*", ..)` fans out to every
/// stored topic and a listener on `"*"` catches any concrete one.
///
/// `Bus` is a cheap handle; clones share the same registry and can be
/// moved freely across tasks.
#[derive(Clone)]
pub struct Bus {
    pub(crate) inner: Arc<Inner>,
}

impl Default for Bus {
    /// A bus whose listeners get rendezvous queues (capacity 0).
    fn default() -> Self {
        Self::new(0)
    }
}

impl Bus {
    /// Creates a bus. `capacity` is the default queue capacity for new
    /// listeners; 0 means rendezvous, where a send completes only when
    /// a consumer is already waiting.
    pub fn new(capacity: usize) -> Self {
        Self::with_matcher(capacity, PathMatch)
    }

    /// As [`Bus::new`], with a custom pattern [`Matcher`].
    pub fn with_matcher(capacity: usize, matcher: impl Matcher + 'static) -> Self {
        Self {
            inner: Arc::new(Inner {
                registry: Mutex::new(Registry::new(capacity)),
                matcher: Arc::new(matcher),
            }),
        }
    }

    /// Registers pattern-wide middlewares, replacing any prior entry for
    /// `pattern`. An empty middleware list deletes the entry.
    pub fn use_(
        &self,
        pattern: &str,
        middlewares: impl IntoIterator<Item = Middleware>,
    ) -> Result<(), Error> {
        // Syntactic probe; the name is irrelevant.
        self.inner.matcher.matches(pattern, "---")?;
        let middlewares: Vec<Middleware> = middlewares.into_iter().collect();
        debug!(pattern, count = middlewares.len(), "pattern middlewares");
        self.inner.registry.lock().install(pattern, middlewares);
        Ok(())
    }

    /// Subscribes to `topic` (stored verbatim, never expanded) and
    /// returns the new listener's queue handle. Never fails.
    pub fn on(
        &self,
        topic: &str,
        middlewares: impl IntoIterator<Item = Middleware>,
    ) -> EventReceiver {
        self.subscribe(topic, None, middlewares.into_iter().collect())
    }

    /// As [`Bus::on`], with an explicit queue capacity for this listener
    /// overriding the bus default.
    pub fn on_with_cap(
        &self,
        topic: &str,
        capacity: usize,
        middlewares: impl IntoIterator<Item = Middleware>,
    ) -> EventReceiver {
        self.subscribe(topic, Some(capacity), middlewares.into_iter().collect())
    }

    /// Subscribes for a single delivery: the listener is removed after
    /// the first event that reaches its queue.
    pub fn once(
        &self,
        topic: &str,
        middlewares: impl IntoIterator<Item = Middleware>,
    ) -> EventReceiver {
        let mut list = vec![flag(Flag::ONCE)];
        list.extend(middlewares);
        self.subscribe(topic, None, list)
    }

    fn subscribe(
        &self,
        topic: &str,
        capacity: Option<usize>,
        middlewares: Vec<Middleware>,
    ) -> EventReceiver {
        debug!(topic, "subscribe");
        self.inner
            .registry
            .lock()
            .subscribe(topic, capacity, middlewares)
    }

    /// Unsubscribes listeners covered by `topic` (a pattern, matched in
    /// both directions). Without handles every covered listener is
    /// removed and its queue closed; with handles only the listeners
    /// owning those exact queues.
    pub fn off<'a>(
        &self,
        topic: &str,
        handles: impl IntoIterator<Item = &'a EventReceiver>,
    ) -> Result<(), Error> {
        let handles: Vec<EventReceiver> = handles.into_iter().cloned().collect();
        let mut registry = self.inner.registry.lock();
        let matched = registry.matched(topic, self.inner.matcher.as_ref())?;
        for stored in matched {
            let removed = registry.remove(&stored, &handles);
            if removed > 0 {
                debug!(topic = stored.as_str(), removed, "unsubscribed");
            }
        }
        Ok(())
    }

    /// Flag-driven removal from the dispatcher: the stored key is known
    /// exactly, no pattern expansion. Safe to race with an explicit
    /// `off`; whoever gets the lock first drops the listener.
    pub(crate) fn remove_listener(&self, topic: &str, handle: &EventReceiver) {
        self.inner
            .registry
            .lock()
            .remove(topic, std::slice::from_ref(handle));
    }

    /// Queue handles of every listener covered by `topic`.
    pub fn listeners(&self, topic: &str) -> Result<Vec<EventReceiver>, Error> {
        let registry = self.inner.registry.lock();
        let matched = registry.matched(topic, self.inner.matcher.as_ref())?;
        let mut acc = Vec::new();
        for stored in matched {
            acc.extend(registry.handles_of(&stored));
        }
        Ok(acc)
    }

    /// Snapshot of all stored topic keys.
    pub fn topics(&self) -> Vec<String> {
        self.inner.registry.lock().topics()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Value;
    use crate::middleware::middleware;

    #[test]
    fn off_removes_every_listener_of_the_topic() {
        let bus = Bus::default();
        bus.on("test", []);
        bus.on("test", []);
        assert_eq!(bus.topics().len(), 1);
        assert_eq!(bus.listeners("test").unwrap().len(), 2);

        bus.off("test", []).unwrap();
        assert!(bus.listeners("test").unwrap().is_empty());
        assert!(bus.topics().is_empty());
    }

    #[test]
    fn off_by_handle_closes_only_that_queue() {
        let bus = Bus::default();
        let first = bus.on("test", []);
        let second = bus.on("test", []);

        bus.off("test", [&first]).unwrap();
        assert!(first.is_disconnected());
        assert!(!second.is_disconnected());
        assert_eq!(bus.listeners("test").unwrap().len(), 1);
    }

    #[test]
    fn off_expands_the_topic_as_a_pattern() {
        let bus = Bus::default();
        bus.on("*", []);
        assert_eq!(bus.listeners("test").unwrap().len(), 1);

        bus.off("*", []).unwrap();
        assert!(bus.listeners("test").unwrap().is_empty());
    }

    #[test]
    fn pattern_errors_surface() {
        let bus = Bus::default();
        bus.on("test", []);
        assert_eq!(
            bus.use_("[", [flag(Flag::VOID)]),
            Err(Error::BadPattern)
        );
        assert_eq!(bus.off("[", []), Err(Error::BadPattern));
        assert!(matches!(bus.listeners("\\"), Err(Error::BadPattern)));
    }

    #[test]
    fn topics_are_stored_verbatim() {
        let bus = Bus::default();
        bus.on("user/*", []);
        assert_eq!(bus.topics(), vec!["user/*".to_string()]);
    }

    #[tokio::test]
    async fn use_with_no_middlewares_deletes_the_pattern() {
        let bus = Bus::new(1);
        bus.use_("*", [flag(Flag::VOID)]).unwrap();
        let pipe = bus.on("test", []);

        bus.emit("test", []).await.await.unwrap();
        assert!(pipe.is_empty());

        bus.use_("*", []).unwrap();
        bus.emit("test", []).await.await.unwrap();
        assert_eq!(pipe.len(), 1);
    }

    #[tokio::test]
    async fn once_prepends_the_once_flag() {
        let bus = Bus::new(1);
        let seen = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false));
        let witness = seen.clone();
        let pipe = bus.once(
            "test",
            [middleware(move |event| {
                // The flag middleware prepended by `once` ran first.
                witness.store(
                    event.flags.contains(Flag::ONCE),
                    std::sync::atomic::Ordering::SeqCst,
                );
            })],
        );

        bus.emit("test", [Value::from(7)]).await.await.unwrap();
        assert_eq!(pipe.recv_async().await.unwrap().int(0), 7);
        assert!(seen.load(std::sync::atomic::Ordering::SeqCst));
        assert!(bus.listeners("test").unwrap().is_empty());
    }
}
