//! Pending work returned by event handlers.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use taximoto_core::Error;
use tokio::task::JoinHandle;

/// Work an event handler has started on behalf of the host.
///
/// The event is only handled once this resolves: install must finish before
/// activation, and a fetch has its answer only when this yields. Dropping it
/// detaches the task without cancelling it.
#[must_use = "the event is not handled until its pending work is awaited"]
#[derive(Debug)]
pub struct PendingWork<T> {
    handle: JoinHandle<Result<T, Error>>,
}

impl<T: Send + 'static> PendingWork<T> {
    pub(crate) fn spawn<F>(work: F) -> Self
    where
        F: Future<Output = Result<T, Error>> + Send + 'static,
    {
        Self { handle: tokio::spawn(work) }
    }
}

impl<T> PendingWork<T> {
    /// Whether the underlying task has completed.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl<T> Future for PendingWork<T> {
    type Output = Result<T, Error>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.handle).poll(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            Poll::Ready(Err(e)) => Poll::Ready(Err(Error::TaskFailed(e.to_string()))),
            Poll::Pending => Poll::Pending,
        }
    }
}
