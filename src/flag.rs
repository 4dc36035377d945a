use std::ops::{BitOr, BitOrAssign};

/// Behavior bits attached to an event for a single delivery.
///
/// Flags combine with `|` and are normally installed through the
/// [`flag`](crate::flag()) middleware constructor, either bus-wide via
/// `use_` or per listener via `on`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Flag(u8);

impl Flag {
    /// Sentinel that clears every flag accumulated so far. Meaningful
    /// only inside a middleware chain; as a mask it is empty.
    pub const RESET: Flag = Flag(0);
    /// Remove the listener after a successful delivery.
    pub const ONCE: Flag = Flag(1);
    /// Skip the delivery entirely.
    pub const VOID: Flag = Flag(1 << 1);
    /// Non-blocking send; drop the delivery if the queue is full.
    pub const SKIP: Flag = Flag(1 << 2);
    /// Non-blocking send; drop the delivery and remove the listener if
    /// the queue is full.
    pub const CLOSE: Flag = Flag(1 << 3);
    /// Deliver on the publisher's task instead of a spawned one.
    pub const SYNC: Flag = Flag(1 << 4);

    /// Whether every bit of `other` is set in `self`.
    pub const fn contains(self, other: Flag) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for Flag {
    type Output = Flag;

    fn bitor(self, rhs: Flag) -> Flag {
        Flag(self.0 | rhs.0)
    }
}

impl BitOrAssign for Flag {
    fn bitor_assign(&mut self, rhs: Flag) {
        self.0 |= rhs.0;
    }
}
