use crate::error::Error;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

/// Completion handle for one publication.
///
/// Awaiting it resolves once every delivery of the publication reached
/// its outcome — with `Err` only when the published topic itself was a
/// malformed pattern. [`Done::cancel`] aborts deliveries that have not
/// yet committed to their queue; the future still resolves afterwards,
/// once the in-flight work has drained.
#[derive(Debug)]
pub struct Done {
    cancel: CancellationToken,
    outcome: oneshot::Receiver<Result<(), Error>>,
}

impl Done {
    /// A handle plus its publish side: the slot the coordinator resolves
    /// and the token every delivery of the publication watches.
    pub(crate) fn pending() -> (Self, oneshot::Sender<Result<(), Error>>, CancellationToken) {
        let (tx, rx) = oneshot::channel();
        let cancel = CancellationToken::new();
        let done = Self {
            cancel: cancel.clone(),
            outcome: rx,
        };
        (done, tx, cancel)
    }

    /// Aborts deliveries that have not yet committed to their queue.
    ///
    /// Deliveries already committed complete normally; canceled ones are
    /// neither delivered nor trigger listener removal. Canceling twice,
    /// or racing completion, is a no-op.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }
}

impl Future for Done {
    type Output = Result<(), Error>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.get_mut().outcome).poll(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            // The publish side is gone; nothing further can happen.
            Poll::Ready(Err(_)) => Poll::Ready(Ok(())),
            Poll::Pending => Poll::Pending,
        }
    }
}
