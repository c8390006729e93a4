use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use ethwatch_sdk::{EventSubscription, StreamError};
use tokio::sync::mpsc;

/// Default URL of a local development node in tests
pub const NODE_URL: &str = "http://localhost:8545";
pub const NODE_WS_URL: &str = "ws://localhost:8545";

/// Initializes `env_logger` once. `verbose` enables debug output for this crate.
pub fn init_logger(verbose: bool) {
    let level = if verbose { "ethwatch_sdk=trace,debug" } else { "info" };
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .is_test(true)
        .try_init();
}

/// Counts how often a [`MockSubscription`] was released.
#[derive(Clone, Default)]
pub struct UnsubscribeCounter(Arc<AtomicUsize>);

impl UnsubscribeCounter {
    pub fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

/// Scripted subscription driven by a [`MockFeed`].
///
/// Notifications and errors come out in the order they were pushed. Once every
/// feed is dropped the subscription reports a clean close.
pub struct MockSubscription<T> {
    rx: mpsc::UnboundedReceiver<Result<T, StreamError>>,
    unsubscribed: UnsubscribeCounter,
    unsubscribe_error: Arc<Mutex<Option<String>>>,
}

/// Producer side of a [`MockSubscription`].
#[derive(Clone)]
pub struct MockFeed<T> {
    tx: mpsc::UnboundedSender<Result<T, StreamError>>,
    unsubscribe_error: Arc<Mutex<Option<String>>>,
}

impl<T> MockSubscription<T> {
    /// Creates a subscription together with the feed that drives it.
    pub fn channel() -> (Self, MockFeed<T>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let unsubscribe_error = Arc::new(Mutex::new(None));
        let subscription = Self {
            rx,
            unsubscribed: UnsubscribeCounter::default(),
            unsubscribe_error: unsubscribe_error.clone(),
        };
        (
            subscription,
            MockFeed {
                tx,
                unsubscribe_error,
            },
        )
    }

    /// Creates a subscription that replays `notifications` and then either
    /// fails with `error` or, without one, closes cleanly.
    pub fn scripted(notifications: Vec<T>, error: Option<StreamError>) -> Self {
        let (subscription, feed) = Self::channel();
        for notification in notifications {
            feed.send(notification);
        }
        if let Some(error) = error {
            feed.fail(error);
        }
        subscription
    }

    pub fn unsubscribe_counter(&self) -> UnsubscribeCounter {
        self.unsubscribed.clone()
    }
}

impl<T> MockFeed<T> {
    /// Delivers a notification. Returns `false` if the subscription is gone.
    pub fn send(&self, notification: T) -> bool {
        self.tx.send(Ok(notification)).is_ok()
    }

    /// Reports a terminal stream error.
    pub fn fail(&self, error: StreamError) -> bool {
        self.tx.send(Err(error)).is_ok()
    }

    /// Makes the next unsubscribe call fail with `message`.
    pub fn fail_unsubscribe(&self, message: &str) {
        if let Ok(mut slot) = self.unsubscribe_error.lock() {
            *slot = Some(message.to_string());
        }
    }
}

#[async_trait]
impl<T: Send> EventSubscription for MockSubscription<T> {
    type Item = T;

    async fn next(&mut self) -> Option<Result<T, StreamError>> {
        self.rx.recv().await
    }

    async fn unsubscribe(mut self) -> anyhow::Result<()> {
        self.unsubscribed.0.fetch_add(1, Ordering::SeqCst);
        self.rx.close();
        let error = self
            .unsubscribe_error
            .lock()
            .map_err(|_| anyhow::anyhow!("unsubscribe error slot poisoned"))?
            .take();
        match error {
            Some(message) => Err(anyhow::anyhow!(message)),
            None => Ok(()),
        }
    }
}
