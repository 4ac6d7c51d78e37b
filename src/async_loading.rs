//! Future-based access to background loads
//!
//! Bridges the continuation API of the loader thread to `async` code with a
//! oneshot channel.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::channel::oneshot;

use crate::error::{ResourceError, Result};
use crate::resource::ResourceHandle;

/// Outcome of a background load, awaitable from any executor
#[derive(Debug)]
pub struct LoadFuture {
    receiver: oneshot::Receiver<Result<ResourceHandle>>,
}

impl LoadFuture {
    /// Take the outcome if it has arrived, without blocking
    ///
    /// Returns `None` while the load is still pending.
    pub fn try_take(&mut self) -> Option<Result<ResourceHandle>> {
        match self.receiver.try_recv() {
            Ok(Some(outcome)) => Some(outcome),
            Ok(None) => None,
            Err(oneshot::Canceled) => Some(Err(ResourceError::Cancelled)),
        }
    }
}

impl Future for LoadFuture {
    type Output = Result<ResourceHandle>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.receiver).poll(cx) {
            Poll::Ready(Ok(outcome)) => Poll::Ready(outcome),
            // The continuation was dropped without running
            Poll::Ready(Err(oneshot::Canceled)) => Poll::Ready(Err(ResourceError::Cancelled)),
            Poll::Pending => Poll::Pending,
        }
    }
}

/// Create a continuation and the future it completes
pub(crate) fn channel() -> (impl FnOnce(Result<ResourceHandle>) + Send + 'static, LoadFuture) {
    let (sender, receiver) = oneshot::channel();
    let continuation = move |outcome: Result<ResourceHandle>| {
        // The future may already be gone; the handle is then released here
        let _ = sender.send(outcome);
    };
    (continuation, LoadFuture { receiver })
}
