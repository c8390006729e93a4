use alloy::eips::BlockNumberOrTag;
use alloy::primitives::{Address, B256};
use alloy::providers::{DynProvider, Provider, ProviderBuilder, WsConnect};
use alloy::rpc::types::eth::Filter;
use alloy::rpc::types::{Header, Log};
use alloy::sol_types::SolEvent;
use anyhow::Result;
use std::convert::TryFrom;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::listener::{spawn_listener, ListenerError, ListenerHandle};
use crate::store::Store;
use crate::subscription::ProviderSubscription;
use crate::utils::bytes32_to_string;

/// A `Store` contract event parsed from a blockchain log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// A value was stored under a key.
    ItemSet {
        /// The raw key
        key: B256,
        /// The raw value
        value: B256,
        /// The block number where the event occurred
        block_number: u64,
        /// The transaction hash that triggered the event
        transaction_hash: B256,
    },
}

impl Event {
    /// Renders the key and value of an `ItemSet` event as strings.
    pub fn item_strings(&self) -> (String, String) {
        match self {
            Event::ItemSet { key, value, .. } => (bytes32_to_string(key), bytes32_to_string(value)),
        }
    }
}

impl TryFrom<Log> for Event {
    type Error = anyhow::Error;

    /// Attempts to parse a blockchain log into an `Event`.
    /// Returns an error if required fields are missing or the event type is unknown.
    fn try_from(log: Log) -> Result<Self> {
        let block_number = log
            .block_number
            .ok_or_else(|| anyhow::anyhow!("Missing block number"))?;
        let transaction_hash = log
            .transaction_hash
            .ok_or_else(|| anyhow::anyhow!("Missing transaction hash"))?;
        let parsed = Store::ItemSet::decode_log(&log.inner)?;
        Ok(Event::ItemSet {
            key: parsed.data.key,
            value: parsed.data.value,
            block_number,
            transaction_hash,
        })
    }
}

/// Client for subscribing to chain notifications over a websocket connection.
pub struct EventsClient {
    provider: DynProvider,
}

impl EventsClient {
    /// Creates a new `EventsClient` by connecting to the given websocket `Url`.
    pub async fn new(url: Url) -> Result<Self> {
        log::debug!("Connecting to websocket provider: {url}");

        let provider = ProviderBuilder::new()
            .connect_ws(WsConnect::new(url.clone()))
            .await?
            .erased();

        log::info!("Connected to websocket provider: {url}");
        Ok(Self { provider })
    }

    /// Subscribes to new block headers.
    pub async fn subscribe_blocks(&self) -> Result<ProviderSubscription<Header>, ListenerError> {
        let subscription = self
            .provider
            .subscribe_blocks()
            .await
            .map_err(|e| ListenerError::Subscribe(format!("new heads: {e}")))?;
        log::debug!("Subscribed to new heads");
        Ok(ProviderSubscription::new(self.provider.clone(), subscription))
    }

    /// Subscribes to `ItemSet` logs emitted by the `Store` contract at `store`,
    /// starting from the latest block.
    pub async fn subscribe_item_sets(
        &self,
        store: Address,
    ) -> Result<ProviderSubscription<Log>, ListenerError> {
        let filter = Self::item_set_filter(store);
        let subscription = self
            .provider
            .subscribe_logs(&filter)
            .await
            .map_err(|e| ListenerError::Subscribe(format!("ItemSet logs of {store}: {e}")))?;
        log::debug!("Subscribed to ItemSet logs of {store}");
        Ok(ProviderSubscription::new(self.provider.clone(), subscription))
    }

    /// Subscribes to new block headers and forwards them to `handler` on a
    /// background task until `cancel` fires or the stream ends.
    pub async fn watch_blocks<H>(
        &self,
        handler: H,
        cancel: CancellationToken,
    ) -> Result<ListenerHandle, ListenerError>
    where
        H: FnMut(Header) -> Result<()> + Send + 'static,
    {
        let subscription = self.subscribe_blocks().await?;
        Ok(spawn_listener(subscription, handler, cancel))
    }

    /// Subscribes to `ItemSet` events of the `Store` at `store` and forwards the
    /// decoded events to `handler` on a background task.
    /// A log that cannot be decoded stops the listener with a handler error.
    pub async fn watch_item_sets<H>(
        &self,
        store: Address,
        mut handler: H,
        cancel: CancellationToken,
    ) -> Result<ListenerHandle, ListenerError>
    where
        H: FnMut(Event) -> Result<()> + Send + 'static,
    {
        let subscription = self.subscribe_item_sets(store).await?;
        Ok(spawn_listener(
            subscription,
            move |log: Log| handler(Event::try_from(log)?),
            cancel,
        ))
    }

    /// Creates a filter for `ItemSet` events of one contract.
    fn item_set_filter(store: Address) -> Filter {
        Filter::new()
            .address(store)
            .from_block(BlockNumberOrTag::Latest)
            .event_signature(Store::ItemSet::SIGNATURE_HASH)
    }
}
