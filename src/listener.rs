use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::time::Duration;

use async_trait::async_trait;
use displaydoc::Display;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Terminal failure reported by a live subscription.
/// Ends delivery for that subscription; the listener never retries after it.
#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
pub enum StreamError {
    /// Subscription lagged behind and dropped {0} notifications
    Lagged(u64),
    /// {0}
    Failed(String),
}

/// Represents errors that can end an event listener.
/// Cancellation and a clean close of the stream are not errors, see [`StopReason`].
#[derive(Debug, Display, Error)]
pub enum ListenerError {
    /// Failed to subscribe: {0}
    Subscribe(String),
    /// Subscription stream failed: {0}
    Stream(#[from] StreamError),
    /// Notification handler failed: {0}
    Handler(anyhow::Error),
    /// Failed to unsubscribe: {0}
    Unsubscribe(String),
    /// Listener task did not complete: {0}
    Task(String),
}

/// Why a listener stopped without an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The caller fired the cancellation token.
    Cancelled,
    /// The collaborator closed the stream without reporting an error.
    Closed,
}

/// A live registration that delivers notifications until released.
///
/// `next` folds the notification and error channels of the underlying
/// subscription into one result: `Some(Ok(_))` is a notification,
/// `Some(Err(_))` is the terminal [`StreamError`] and `None` means the
/// collaborator closed the stream cleanly.
///
/// `unsubscribe` consumes the subscription, so it can be released at most once.
#[async_trait]
pub trait EventSubscription: Send {
    /// The notification payload.
    type Item: Send;

    /// Waits for the next notification. Must be cancel safe.
    async fn next(&mut self) -> Option<Result<Self::Item, StreamError>>;

    /// Releases the collaborator-side resources held by the subscription.
    async fn unsubscribe(self) -> anyhow::Result<()>
    where
        Self: Sized;
}

/// Forwards every notification of `subscription` to `handler` until the stream
/// fails, the stream closes, the handler fails, or `cancel` fires.
///
/// The subscription is released exactly once before this function returns,
/// whichever way the loop ended.
pub async fn listen<S, H>(
    mut subscription: S,
    mut handler: H,
    cancel: CancellationToken,
) -> Result<StopReason, ListenerError>
where
    S: EventSubscription,
    H: FnMut(S::Item) -> anyhow::Result<()> + Send,
{
    log::info!("Start listening");
    let mut delivered: u64 = 0;

    let outcome = loop {
        let next = tokio::select! {
            biased;
            () = cancel.cancelled() => break Ok(StopReason::Cancelled),
            next = subscription.next() => next,
        };

        match next {
            Some(Ok(notification)) => {
                delivered += 1;
                log::trace!("Delivering notification #{delivered}");
                match panic::catch_unwind(AssertUnwindSafe(|| handler(notification))) {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => break Err(ListenerError::Handler(e)),
                    Err(payload) => {
                        let msg = panic_message(payload.as_ref());
                        break Err(ListenerError::Handler(anyhow::anyhow!(
                            "Handler panicked: {msg}"
                        )));
                    }
                }
            }
            Some(Err(e)) => break Err(ListenerError::Stream(e)),
            None => break Ok(StopReason::Closed),
        }
    };

    let released = subscription.unsubscribe().await;

    match &outcome {
        Ok(reason) => log::info!("Stop listening ({reason:?}) after {delivered} notifications"),
        Err(e) => log::warn!("Stop listening after {delivered} notifications: {e}"),
    }

    match (outcome, released) {
        (Ok(_), Err(e)) => Err(ListenerError::Unsubscribe(e.to_string())),
        (Err(e), Err(unsub)) => {
            log::warn!("Failed to unsubscribe: {unsub}");
            Err(e)
        }
        (outcome, Ok(())) => outcome,
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        *msg
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.as_str()
    } else {
        "unknown panic"
    }
}

/// Runs [`listen`] on its own tokio task and returns a handle to it.
/// The caller keeps running and can cancel or join the listener later.
pub fn spawn_listener<S, H>(subscription: S, handler: H, cancel: CancellationToken) -> ListenerHandle
where
    S: EventSubscription + 'static,
    H: FnMut(S::Item) -> anyhow::Result<()> + Send + 'static,
{
    let finished = CancellationToken::new();
    let done = finished.clone().drop_guard();
    let token = cancel.clone();
    let task = tokio::spawn(async move {
        let _done = done;
        listen(subscription, handler, token).await
    });
    ListenerHandle {
        cancel,
        finished,
        task,
    }
}

/// Handle to a listener running on a background task.
pub struct ListenerHandle {
    cancel: CancellationToken,
    /// Fired when the listener task ends, even by panic.
    finished: CancellationToken,
    task: JoinHandle<Result<StopReason, ListenerError>>,
}

impl ListenerHandle {
    /// Asks the listener to stop. It returns [`StopReason::Cancelled`] once it notices.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Cancels the listener once `deadline` has elapsed.
    /// The returned timer task ends early when the listener stops first.
    pub fn cancel_after(&self, deadline: Duration) -> JoinHandle<()> {
        let cancel = self.cancel.clone();
        let finished = self.finished.clone();
        tokio::spawn(async move {
            tokio::select! {
                biased;
                () = finished.cancelled() => {}
                () = cancel.cancelled() => {}
                () = tokio::time::sleep(deadline) => {
                    log::debug!("Listener deadline of {deadline:?} reached");
                    cancel.cancel();
                }
            }
        })
    }

    /// The token observed by the listener.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Returns `true` once the listener task has finished.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Waits for the listener to finish and returns its outcome.
    pub async fn join(self) -> Result<StopReason, ListenerError> {
        self.task
            .await
            .map_err(|e| ListenerError::Task(e.to_string()))?
    }
}
