use crate::event::Event;
use crate::flag::Flag;
use std::sync::Arc;

/// Per-delivery event transform.
///
/// Middlewares run in registration order, topic-wide ones first, then
/// the listener's own, each on that listener's private copy of the
/// event. They may rewrite `flags` and `args` freely; whatever mask is
/// left afterwards is the effective behavior for the delivery.
pub type Middleware = Arc<dyn Fn(&mut Event) + Send + Sync>;

/// Wraps a closure into a [`Middleware`].
pub fn middleware<F>(f: F) -> Middleware
where
    F: Fn(&mut Event) + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Middleware that merges `flag` into the effective flags.
///
/// [`Flag::RESET`] instead clears everything accumulated so far, which
/// lets a later middleware undo earlier ones.
pub fn flag(flag: Flag) -> Middleware {
    Arc::new(move |event: &mut Event| {
        if flag == Flag::RESET {
            event.flags = Flag::RESET;
        } else {
            event.flags |= flag;
        }
    })
}

pub(crate) fn apply(middlewares: &[Middleware], event: &mut Event) {
    for mw in middlewares {
        mw(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Value;

    fn event() -> Event {
        Event::new("test".into(), "test".into(), Vec::new())
    }

    #[test]
    fn flags_accumulate_in_order() {
        let mut event = event();
        apply(&[flag(Flag::SKIP), flag(Flag::ONCE)], &mut event);
        assert!(event.flags.contains(Flag::SKIP | Flag::ONCE));
    }

    #[test]
    fn reset_clears_earlier_flags() {
        let mut event = event();
        apply(&[flag(Flag::VOID), flag(Flag::RESET)], &mut event);
        assert!(event.flags.is_empty());

        apply(&[flag(Flag::RESET), flag(Flag::CLOSE)], &mut event);
        assert!(event.flags.contains(Flag::CLOSE));
    }

    #[test]
    fn closures_see_and_mutate_the_event() {
        let mut event = event();
        apply(
            &[
                middleware(|e| e.args.push(Value::from(1))),
                middleware(|e| {
                    if e.int(0) == 1 {
                        e.flags |= Flag::VOID;
                    }
                }),
            ],
            &mut event,
        );
        assert!(event.flags.contains(Flag::VOID));
        assert_eq!(event.args.len(), 1);
    }
}
