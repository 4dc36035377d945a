use crate::bus::Bus;
use crate::done::Done;
use crate::event::{Event, Value};
use crate::flag::Flag;
use crate::middleware::{self, Middleware};
use crate::registry::Listener;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

/// One matched topic's share of a publication, snapshotted under the
/// registry lock so deliveries run without it.
struct Fanout {
    topic: String,
    middlewares: Vec<Middleware>,
    listeners: Vec<Listener>,
}

/// The single outcome of one (listener, publication) pair.
enum Delivery {
    Sent,
    Dropped,
    Canceled,
}

impl Bus {
    /// Publishes `args` to every listener covered by `topic`.
    ///
    /// Listeners within a matched topic are considered in reverse index
    /// order. Deliveries run on their own tasks unless the effective
    /// flags carry [`Flag::SYNC`], which keeps them on the publisher's
    /// task. The returned [`Done`] resolves once every delivery reached
    /// its outcome and doubles as the cancellation trigger; a malformed
    /// `topic` pattern is reported through it.
    pub async fn emit(&self, topic: &str, args: impl IntoIterator<Item = Value>) -> Done {
        let args: Vec<Value> = args.into_iter().collect();
        let (done, outcome, cancel) = Done::pending();

        let fanouts = {
            let registry = self.inner.registry.lock();
            let matched = match registry.matched(topic, self.inner.matcher.as_ref()) {
                Ok(matched) => matched,
                Err(err) => {
                    drop(registry);
                    let _ = outcome.send(Err(err));
                    return done;
                }
            };
            matched
                .into_iter()
                .map(|stored| Fanout {
                    middlewares: registry.pattern_middlewares(&stored, self.inner.matcher.as_ref()),
                    listeners: registry.snapshot(&stored),
                    topic: stored,
                })
                .collect::<Vec<_>>()
        };
        trace!(topic, matched = fanouts.len(), "dispatch");

        let mut deliveries: JoinSet<()> = JoinSet::new();

        for fanout in fanouts {
            let Fanout {
                topic: stored,
                middlewares,
                listeners,
            } = fanout;

            let mut base = Event::new(stored.clone(), topic.to_owned(), args.clone());
            middleware::apply(&middlewares, &mut base);
            if base.flags.contains(Flag::VOID) {
                // The whole topic is suppressed.
                continue;
            }

            for listener in listeners.into_iter().rev() {
                let mut event = base.clone();
                middleware::apply(listener.middlewares(), &mut event);
                if event.flags.contains(Flag::VOID) {
                    continue;
                }

                if event.flags.contains(Flag::SYNC) {
                    self.deliver(&cancel, &stored, &listener, event).await;
                } else {
                    let bus = self.clone();
                    let cancel = cancel.clone();
                    let stored = stored.clone();
                    deliveries.spawn(async move {
                        bus.deliver(&cancel, &stored, &listener, event).await;
                    });
                }
            }
        }

        if deliveries.is_empty() {
            let _ = outcome.send(Ok(()));
        } else {
            tokio::spawn(async move {
                while deliveries.join_next().await.is_some() {}
                let _ = outcome.send(Ok(()));
            });
        }
        done
    }

    /// Runs one delivery to its outcome and applies flag-driven removal:
    /// `ONCE` after a successful send, `CLOSE` after a blocked one. A
    /// canceled delivery removes nothing.
    async fn deliver(
        &self,
        cancel: &CancellationToken,
        topic: &str,
        listener: &Listener,
        event: Event,
    ) {
        let flags = event.flags;
        match push_event(cancel, listener.queue(), event).await {
            Delivery::Sent if flags.contains(Flag::ONCE) => {
                self.remove_listener(topic, listener.handle());
            }
            Delivery::Dropped if flags.contains(Flag::CLOSE) => {
                debug!(topic, "queue blocked, dropping listener");
                self.remove_listener(topic, listener.handle());
            }
            Delivery::Canceled => trace!(topic, "delivery canceled"),
            _ => {}
        }
    }
}

/// The single send primitive. `SKIP` and `CLOSE` make the send
/// non-blocking; otherwise it waits, racing the cancellation token so a
/// not-yet-committed send can be abandoned (the event is reclaimed, not
/// delivered).
async fn push_event(
    cancel: &CancellationToken,
    queue: &flume::Sender<Event>,
    event: Event,
) -> Delivery {
    let flags = event.flags;
    let wait = !(flags.contains(Flag::SKIP) || flags.contains(Flag::CLOSE));

    if cancel.is_cancelled() {
        return Delivery::Canceled;
    }
    if !wait {
        return match queue.try_send(event) {
            Ok(()) => Delivery::Sent,
            Err(_) => Delivery::Dropped,
        };
    }
    tokio::select! {
        _ = cancel.cancelled() => Delivery::Canceled,
        sent = queue.send_async(event) => match sent {
            Ok(()) => Delivery::Sent,
            // The queue went away underneath the send.
            Err(_) => Delivery::Dropped,
        },
    }
}
