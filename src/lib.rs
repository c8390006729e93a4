// # ethwatch SDK
//!
//! A small SDK for watching an Ethereum node from Rust: subscribe to new block
//! headers or contract events and forward them to a handler, query balances and
//! blocks, talk to a deployed key/value `Store` contract, and manage local
//! wallets and JSON keystores.
//!
//! The heart of the crate is the [event listener](crate::listener): it owns one
//! subscription, feeds every notification to a handler in arrival order and
//! stops when the stream fails, the stream closes, the handler fails, or the
//! caller cancels. Whatever ends it, the subscription is released exactly once.
//!
//! ```no_run
//! # async fn run() -> anyhow::Result<()> {
//! use ethwatch_sdk::{CancellationToken, EthClient, Url};
//!
//! let client = EthClient::new(Url::parse("http://127.0.0.1:8545")?);
//! let events = client.events_client().await?;
//!
//! let cancel = CancellationToken::new();
//! let handle = events
//!     .watch_blocks(
//!         |header| {
//!             log::info!("new block {} ({})", header.number, header.hash);
//!             Ok(())
//!         },
//!         cancel.clone(),
//!     )
//!     .await?;
//!
//! tokio::signal::ctrl_c().await?;
//! cancel.cancel();
//! handle.join().await?;
//! # Ok(())
//! # }
//! ```
//!
//! Nothing here retries or reconnects. A caller that wants to survive a
//! dropped connection subscribes again after the listener returns an error.

/// Re-export commonly used types from `alloy`.
pub use alloy::primitives::{keccak256, Address, B256, U256};
pub use alloy::signers::local::PrivateKeySigner;
pub use alloy::transports::http::reqwest::Url;
pub use tokio_util::sync::CancellationToken;

pub use client::EthClient;
pub use config::Config;
pub use events::{Event, EventsClient};
pub use listener::{
    listen, spawn_listener, EventSubscription, ListenerError, ListenerHandle, StopReason,
    StreamError,
};

/// Module for the event listener loop.
/// Consumes one subscription and forwards its notifications to a handler.
pub mod listener;

/// Module adapting `alloy` pubsub subscriptions to the listener.
pub mod subscription;

/// Module for event subscriptions and `Store` event decoding.
pub mod events;

/// Module for one-shot chain queries.
pub mod client;

/// Module for the `Store` contract.
pub mod store;

/// Module for local wallets and keystore files.
pub mod wallet;

/// Module for runtime configuration.
pub mod config;

/// Module with utility functions.
/// Includes unit conversions and fixed-size word packing.
pub mod utils;
