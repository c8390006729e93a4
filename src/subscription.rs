use alloy::providers::{DynProvider, Provider};
use alloy::pubsub::Subscription;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tokio::sync::broadcast::error::RecvError;

use crate::listener::{EventSubscription, StreamError};

/// An `eth_subscribe` subscription opened through a websocket provider.
/// Keeps the provider around so the server-side registration can be released.
pub struct ProviderSubscription<T> {
    provider: DynProvider,
    inner: Subscription<T>,
}

impl<T> ProviderSubscription<T> {
    pub(crate) fn new(provider: DynProvider, inner: Subscription<T>) -> Self {
        Self { provider, inner }
    }
}

#[async_trait]
impl<T> EventSubscription for ProviderSubscription<T>
where
    T: DeserializeOwned + Send + 'static,
{
    type Item = T;

    async fn next(&mut self) -> Option<Result<T, StreamError>> {
        match self.inner.recv().await {
            Ok(item) => Some(Ok(item)),
            Err(RecvError::Lagged(skipped)) => Some(Err(StreamError::Lagged(skipped))),
            Err(RecvError::Closed) => None,
        }
    }

    async fn unsubscribe(self) -> anyhow::Result<()> {
        let id = *self.inner.local_id();
        log::debug!("Unsubscribing from subscription {id}");
        self.provider
            .unsubscribe(id)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to unsubscribe {id}: {e}"))
    }
}
