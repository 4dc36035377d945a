use crate::event::{Event, EventReceiver};
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::trace;

/// Merges several subscription queues into one output queue.
///
/// The group owns its output; source queues are only borrowed and never
/// closed by it. One forwarder task per source moves events into the
/// shared output, with no fairness guarantee beyond channel semantics.
/// The output is closed by exactly one path: [`Group::off`] with no
/// handles (or with the output's own handle), which is idempotent and a
/// no-op on a group that never started.
pub struct Group {
    capacity: usize,
    state: Mutex<State>,
}

#[derive(Default)]
struct State {
    out: Option<Output>,
    taps: Vec<Tap>,
}

struct Output {
    queue: flume::Sender<Event>,
    handle: EventReceiver,
}

struct Tap {
    source: EventReceiver,
    stop: CancellationToken,
}

impl Default for Group {
    /// A group with a rendezvous output queue.
    fn default() -> Self {
        Self::new(0)
    }
}

impl Group {
    /// A group whose output queue has the given capacity (0 means
    /// rendezvous).
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            state: Mutex::new(State::default()),
        }
    }

    /// Starts forwarding from each source into the output queue,
    /// creating the output lazily.
    pub fn add(&self, sources: impl IntoIterator<Item = EventReceiver>) {
        let mut state = self.state.lock();
        let out = Self::output(self.capacity, &mut state).queue.clone();
        for source in sources {
            let stop = CancellationToken::new();
            state.taps.push(Tap {
                source: source.clone(),
                stop: stop.clone(),
            });
            tokio::spawn(forward(source, out.clone(), stop));
        }
    }

    /// A consumer handle to the merged output, starting it lazily.
    pub fn on(&self) -> EventReceiver {
        let mut state = self.state.lock();
        Self::output(self.capacity, &mut state).handle.clone()
    }

    /// Stops forwarders by source handle. Passing no handles at all, or
    /// any handle identical to the output, closes the output and stops
    /// everything.
    pub fn off<'a>(&self, handles: impl IntoIterator<Item = &'a EventReceiver>) {
        let mut state = self.state.lock();
        let handles: Vec<&EventReceiver> = handles.into_iter().collect();

        let close_out = handles.is_empty()
            || state
                .out
                .as_ref()
                .is_some_and(|out| handles.iter().any(|h| h.same_channel(&out.handle)));
        if close_out {
            for tap in state.taps.drain(..) {
                tap.stop.cancel();
            }
            if state.out.take().is_some() {
                trace!("group output closed");
            }
            return;
        }

        state.taps.retain(|tap| {
            let stopped = handles.iter().any(|h| h.same_channel(&tap.source));
            if stopped {
                tap.stop.cancel();
            }
            !stopped
        });
    }

    /// Stops and forgets every forwarder without closing the output, so
    /// the group can be reused.
    pub fn flush(&self) {
        let mut state = self.state.lock();
        for tap in state.taps.drain(..) {
            tap.stop.cancel();
        }
    }

    fn output(capacity: usize, state: &mut State) -> &Output {
        state.out.get_or_insert_with(|| {
            let (queue, handle) = flume::bounded(capacity);
            Output { queue, handle }
        })
    }
}

async fn forward(source: EventReceiver, out: flume::Sender<Event>, stop: CancellationToken) {
    loop {
        let event = tokio::select! {
            biased;
            _ = stop.cancelled() => break,
            received = source.recv_async() => match received {
                Ok(event) => event,
                // The source was closed by its bus.
                Err(_) => break,
            },
        };
        tokio::select! {
            biased;
            _ = stop.cancelled() => break,
            sent = out.send_async(event) => {
                if sent.is_err() {
                    break;
                }
            }
        }
    }
    trace!("forwarder stopped");
}
