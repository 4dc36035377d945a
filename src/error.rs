use thiserror::Error as ThisError;

/// Errors surfaced by the bus.
///
/// The only failure a caller can see is a malformed glob pattern. Full
/// queues, absent topics and canceled deliveries are ordinary control
/// flow, directed by [`Flag`](crate::Flag)s.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ThisError)]
pub enum Error {
    /// The pattern contains a trailing escape, an unterminated character
    /// class or a malformed range.
    #[error("syntax error in pattern")]
    BadPattern,
}
