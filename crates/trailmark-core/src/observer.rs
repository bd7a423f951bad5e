//! Response completion observers
//!
//! A handler or middleware only sees the [`Response`](crate::Response) value
//! it returns. Whether that response actually reached the client, and with
//! which final status, is only known once the connection has written the whole
//! body. The engine inserts a [`CompletionHandle`] into every request's
//! extensions and wraps the outgoing body in a [`CompletionBody`]; code that
//! needs to act after delivery calls [`CompletionHandle::observe`] and waits on
//! the returned [`ResponseObserver`].
//!
//! ```rust,ignore
//! let observer = req
//!     .extensions()
//!     .get::<CompletionHandle>()
//!     .map(CompletionHandle::observe);
//! let response = next(req).await;
//! if let Some(observer) = observer {
//!     observer.on_complete(|status| async move {
//!         // runs after the body was handed to the connection
//!     });
//! }
//! ```
//!
//! A response that is dropped before its body was fully produced (client gone,
//! body error) completes observers with `None`.

use http::StatusCode;
use http_body::{Body, Frame, SizeHint};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

type Outcome = Option<StatusCode>;

#[derive(Default)]
struct HubState {
    outcome: Option<Outcome>,
    waiters: Vec<oneshot::Sender<Outcome>>,
}

/// Per-request completion signal, shared through request extensions
#[derive(Clone, Default)]
pub struct CompletionHandle {
    hub: Arc<Mutex<HubState>>,
}

impl CompletionHandle {
    /// Create a fresh, unresolved handle
    pub fn new() -> Self {
        Self::default()
    }

    /// Register interest in this request's outcome
    pub fn observe(&self) -> ResponseObserver {
        let (tx, rx) = oneshot::channel();
        match self.hub.lock() {
            Ok(mut state) => match state.outcome {
                Some(outcome) => {
                    let _ = tx.send(outcome);
                }
                None => state.waiters.push(tx),
            },
            // Poisoned: dropping the sender resolves the observer as aborted
            Err(_) => drop(tx),
        }
        ResponseObserver { rx }
    }

    /// Mark the response as fully delivered with the given status
    pub fn complete(&self, status: StatusCode) {
        self.resolve(Some(status));
    }

    /// Mark the response as abandoned before delivery finished
    pub fn abort(&self) {
        self.resolve(None);
    }

    /// Whether the outcome is already known
    pub fn is_resolved(&self) -> bool {
        self.hub
            .lock()
            .map(|state| state.outcome.is_some())
            .unwrap_or(true)
    }

    // First resolution wins
    fn resolve(&self, outcome: Outcome) {
        let waiters = match self.hub.lock() {
            Ok(mut state) => {
                if state.outcome.is_some() {
                    return;
                }
                state.outcome = Some(outcome);
                std::mem::take(&mut state.waiters)
            }
            Err(_) => return,
        };
        for waiter in waiters {
            let _ = waiter.send(outcome);
        }
    }
}

impl std::fmt::Debug for CompletionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionHandle")
            .field("resolved", &self.is_resolved())
            .finish()
    }
}

/// Receives the outcome of a single response
#[derive(Debug)]
pub struct ResponseObserver {
    rx: oneshot::Receiver<Outcome>,
}

impl ResponseObserver {
    /// Wait for the response to finish.
    ///
    /// Returns the status that was delivered, or `None` when the response was
    /// abandoned (or the handle was dropped without ever resolving).
    pub async fn final_status(self) -> Option<StatusCode> {
        self.rx.await.ok().flatten()
    }

    /// Run `callback` in a background task once the response was delivered.
    ///
    /// The callback is skipped entirely when the response is abandoned.
    pub fn on_complete<F, Fut>(self, callback: F) -> JoinHandle<()>
    where
        F: FnOnce(StatusCode) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        tokio::spawn(async move {
            match self.final_status().await {
                Some(status) => callback(status).await,
                None => tracing::debug!("Response abandoned before completion"),
            }
        })
    }
}

/// Response body wrapper that resolves a [`CompletionHandle`] when the inner
/// body has been fully produced, or aborts it when dropped early
pub struct CompletionBody<B: Body> {
    inner: B,
    status: StatusCode,
    handle: Option<CompletionHandle>,
}

impl<B: Body> CompletionBody<B> {
    /// Wrap `inner`, reporting `status` on completion
    pub fn new(inner: B, status: StatusCode, handle: CompletionHandle) -> Self {
        Self {
            inner,
            status,
            handle: Some(handle),
        }
    }

    fn finish(&mut self, delivered: bool) {
        if let Some(handle) = self.handle.take() {
            if delivered {
                handle.complete(self.status);
            } else {
                handle.abort();
            }
        }
    }
}

impl<B> Body for CompletionBody<B>
where
    B: Body + Unpin,
{
    type Data = B::Data;
    type Error = B::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();
        let poll = Pin::new(&mut this.inner).poll_frame(cx);
        match &poll {
            Poll::Ready(None) => this.finish(true),
            Poll::Ready(Some(Err(_))) => this.finish(false),
            Poll::Ready(Some(Ok(_))) if this.inner.is_end_stream() => this.finish(true),
            _ => {}
        }
        poll
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

impl<B: Body> Drop for CompletionBody<B> {
    fn drop(&mut self) {
        let delivered = self.inner.is_end_stream();
        self.finish(delivered);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use http_body_util::{BodyExt, Full};

    #[tokio::test]
    async fn test_complete_notifies_all_observers() {
        let handle = CompletionHandle::new();
        let first = handle.observe();
        let second = handle.observe();

        handle.complete(StatusCode::OK);
        handle.abort();

        assert_eq!(first.final_status().await, Some(StatusCode::OK));
        assert_eq!(second.final_status().await, Some(StatusCode::OK));
    }

    #[tokio::test]
    async fn test_observe_after_resolution() {
        let handle = CompletionHandle::new();
        handle.abort();
        assert!(handle.is_resolved());
        assert_eq!(handle.observe().final_status().await, None);
    }

    #[tokio::test]
    async fn test_dropped_handle_resolves_as_aborted() {
        let handle = CompletionHandle::new();
        let observer = handle.observe();
        drop(handle);
        assert_eq!(observer.final_status().await, None);
    }

    #[tokio::test]
    async fn test_body_completes_after_collect() {
        let handle = CompletionHandle::new();
        let observer = handle.observe();

        let body = CompletionBody::new(
            Full::new(Bytes::from("done")),
            StatusCode::CREATED,
            handle.clone(),
        );
        let bytes = body.collect().await.unwrap().to_bytes();

        assert_eq!(bytes, Bytes::from("done"));
        assert_eq!(observer.final_status().await, Some(StatusCode::CREATED));
    }

    #[tokio::test]
    async fn test_unread_body_aborts_on_drop() {
        let handle = CompletionHandle::new();
        let observer = handle.observe();

        let body = CompletionBody::new(
            Full::new(Bytes::from("never sent")),
            StatusCode::OK,
            handle,
        );
        drop(body);

        assert_eq!(observer.final_status().await, None);
    }

    #[tokio::test]
    async fn test_empty_body_completes_on_drop() {
        let handle = CompletionHandle::new();
        let observer = handle.observe();

        let body = CompletionBody::new(Full::new(Bytes::new()), StatusCode::NO_CONTENT, handle);
        drop(body);

        assert_eq!(observer.final_status().await, Some(StatusCode::NO_CONTENT));
    }

    #[tokio::test]
    async fn test_on_complete_runs_callback() {
        let handle = CompletionHandle::new();
        let (tx, rx) = oneshot::channel();

        let task = handle.observe().on_complete(move |status| async move {
            let _ = tx.send(status);
        });
        handle.complete(StatusCode::NO_CONTENT);
        task.await.unwrap();

        assert_eq!(rx.await.unwrap(), StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn test_on_complete_skipped_on_abort() {
        let handle = CompletionHandle::new();
        let (tx, rx) = oneshot::channel::<StatusCode>();

        let task = handle.observe().on_complete(move |status| async move {
            let _ = tx.send(status);
        });
        handle.abort();
        task.await.unwrap();

        // Sender dropped without sending
        assert!(rx.await.is_err());
    }
}
