use crate::error::Error;
use crate::event::{Event, EventReceiver};
use crate::matcher::Matcher;
use crate::middleware::Middleware;
use std::collections::HashMap;

/// A subscriber's bounded queue plus its private middleware list.
///
/// The registry keeps the queue's only long-lived sender; dropping the
/// listener is what closes the queue for its consumers, and since
/// removal takes it out of the map, that can happen at most once.
#[derive(Clone)]
pub(crate) struct Listener {
    queue: flume::Sender<Event>,
    handle: EventReceiver,
    middlewares: Vec<Middleware>,
}

impl Listener {
    fn new(capacity: usize, middlewares: Vec<Middleware>) -> Self {
        let (queue, handle) = flume::bounded(capacity);
        Self {
            queue,
            handle,
            middlewares,
        }
    }

    pub fn queue(&self) -> &flume::Sender<Event> {
        &self.queue
    }

    pub fn handle(&self) -> &EventReceiver {
        &self.handle
    }

    pub fn middlewares(&self) -> &[Middleware] {
        &self.middlewares
    }
}

/// Mutable bus state. Always accessed under the bus mutex; none of the
/// methods here suspend.
pub(crate) struct Registry {
    listeners: HashMap<String, Vec<Listener>>,
    middlewares: HashMap<String, Vec<Middleware>>,
    capacity: usize,
}

impl Registry {
    pub fn new(capacity: usize) -> Self {
        Self {
            listeners: HashMap::new(),
            middlewares: HashMap::new(),
            capacity,
        }
    }

    /// Appends a listener under the exact `topic` key and returns its
    /// queue handle. The capacity is fixed for the listener's lifetime.
    pub fn subscribe(
        &mut self,
        topic: &str,
        capacity: Option<usize>,
        middlewares: Vec<Middleware>,
    ) -> EventReceiver {
        let listener = Listener::new(capacity.unwrap_or(self.capacity), middlewares);
        let handle = listener.handle.clone();
        self.listeners
            .entry(topic.to_owned())
            .or_default()
            .push(listener);
        handle
    }

    /// Stores `middlewares` verbatim under `pattern`, replacing any
    /// prior entry; an empty list deletes the entry instead.
    pub fn install(&mut self, pattern: &str, middlewares: Vec<Middleware>) {
        if middlewares.is_empty() {
            self.middlewares.remove(pattern);
        } else {
            self.middlewares.insert(pattern.to_owned(), middlewares);
        }
    }

    /// Removes listeners stored under the exact `topic` key, in reverse
    /// index order. With no handles every listener goes; otherwise only
    /// those whose queue is identical to one of the handles. An emptied
    /// topic loses its key. Returns how many listeners were dropped.
    pub fn remove(&mut self, topic: &str, handles: &[EventReceiver]) -> usize {
        let Some(list) = self.listeners.get_mut(topic) else {
            return 0;
        };
        let before = list.len();
        if handles.is_empty() {
            while list.pop().is_some() {}
        } else {
            for i in (0..list.len()).rev() {
                if handles.iter().any(|h| h.same_channel(list[i].handle())) {
                    list.remove(i);
                }
            }
        }
        let removed = before - list.len();
        if list.is_empty() {
            self.listeners.remove(topic);
        }
        removed
    }

    /// Stored topics covered by `topic`, in either match direction.
    ///
    /// Matcher errors surface only for the forward direction; a stored
    /// topic the matcher cannot parse simply never matches backward.
    pub fn matched(&self, topic: &str, matcher: &dyn Matcher) -> Result<Vec<String>, Error> {
        let mut acc = Vec::new();
        for stored in self.listeners.keys() {
            if matcher.matches(topic, stored)?
                || matcher.matches(stored, topic).unwrap_or(false)
            {
                acc.push(stored.clone());
            }
        }
        Ok(acc)
    }

    /// Concatenation of every pattern-wide middleware list covering the
    /// stored `topic`, in either match direction.
    pub fn pattern_middlewares(&self, topic: &str, matcher: &dyn Matcher) -> Vec<Middleware> {
        let mut acc = Vec::new();
        for (pattern, list) in &self.middlewares {
            let covered = matcher.matches(pattern, topic).unwrap_or(false)
                || matcher.matches(topic, pattern).unwrap_or(false);
            if covered {
                acc.extend(list.iter().cloned());
            }
        }
        acc
    }

    /// Clones the listener sequence of one stored topic for dispatch.
    pub fn snapshot(&self, topic: &str) -> Vec<Listener> {
        self.listeners.get(topic).cloned().unwrap_or_default()
    }

    /// Queue handles of one stored topic, in insertion order.
    pub fn handles_of(&self, topic: &str) -> Vec<EventReceiver> {
        self.listeners
            .get(topic)
            .map(|list| list.iter().map(|l| l.handle.clone()).collect())
            .unwrap_or_default()
    }

    /// Snapshot of all stored topic keys.
    pub fn topics(&self) -> Vec<String> {
        self.listeners.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::PathMatch;

    #[test]
    fn subscribe_stores_under_the_exact_key() {
        let mut registry = Registry::new(0);
        registry.subscribe("user/*", None, Vec::new());
        assert_eq!(registry.topics(), vec!["user/*".to_string()]);
        assert_eq!(registry.handles_of("user/*").len(), 1);
    }

    #[test]
    fn matched_covers_both_directions() {
        let mut registry = Registry::new(0);
        registry.subscribe("foo", None, Vec::new());
        registry.subscribe("*", None, Vec::new());

        let mut forward = registry.matched("*", &PathMatch).unwrap();
        forward.sort();
        assert_eq!(forward, ["*", "foo"]);

        let mut backward = registry.matched("foo", &PathMatch).unwrap();
        backward.sort();
        assert_eq!(backward, ["*", "foo"]);

        assert_eq!(registry.matched("[", &PathMatch), Err(Error::BadPattern));
    }

    #[test]
    fn remove_by_handle_keeps_survivors_in_order() {
        let mut registry = Registry::new(0);
        let first = registry.subscribe("test", None, Vec::new());
        let second = registry.subscribe("test", None, Vec::new());
        let third = registry.subscribe("test", None, Vec::new());

        assert_eq!(registry.remove("test", std::slice::from_ref(&second)), 1);
        assert!(second.is_disconnected());
        assert!(!first.is_disconnected());

        let handles = registry.handles_of("test");
        assert_eq!(handles.len(), 2);
        assert!(handles[0].same_channel(&first));
        assert!(handles[1].same_channel(&third));
    }

    #[test]
    fn emptied_topic_loses_its_key() {
        let mut registry = Registry::new(0);
        registry.subscribe("test", None, Vec::new());
        registry.subscribe("test", None, Vec::new());
        assert_eq!(registry.remove("test", &[]), 2);
        assert!(registry.topics().is_empty());
        assert_eq!(registry.remove("test", &[]), 0);
    }

    #[test]
    fn install_with_nothing_deletes_the_pattern() {
        let mut registry = Registry::new(0);
        registry.install("te*", vec![crate::middleware::flag(crate::Flag::VOID)]);
        assert_eq!(registry.pattern_middlewares("test", &PathMatch).len(), 1);
        registry.install("te*", Vec::new());
        assert!(registry.pattern_middlewares("test", &PathMatch).is_empty());
    }

    #[test]
    fn pattern_middlewares_cover_the_backward_direction() {
        let mut registry = Registry::new(0);
        registry.install("test", vec![crate::middleware::flag(crate::Flag::CLOSE)]);
        // A listener stored under "*" picks up middlewares registered
        // for the concrete topic.
        assert_eq!(registry.pattern_middlewares("*", &PathMatch).len(), 1);
    }
}
