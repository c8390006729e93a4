use alloy::consensus::Transaction as _;
use alloy::eips::BlockNumberOrTag;
use alloy::primitives::{Address, B256, U256};
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::rpc::types::BlockTransactions;
use alloy::transports::http::reqwest::Url;
use bigdecimal::BigDecimal;
use bon::bon;

use crate::config::{Config, TransactionConfig};
use crate::events::EventsClient;
use crate::store::StoreClient;
use crate::utils::wei_to_eth;
use crate::wallet::LocalWallet;

/// Summary of a single transaction in a block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionSummary {
    pub hash: B256,
    pub gas_limit: u64,
    /// Legacy gas price, or the fee cap of EIP-1559 transactions.
    pub gas_price: u128,
    pub from: Address,
}

/// Summary of a block and its transactions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockSummary {
    pub number: u64,
    pub hash: B256,
    pub timestamp: u64,
    pub difficulty: U256,
    pub nonce: u64,
    pub transactions: Vec<TransactionSummary>,
}

impl BlockSummary {
    /// Number of transactions in the block.
    pub fn transaction_count(&self) -> usize {
        self.transactions.len()
    }
}

/// A client for one-shot queries against an Ethereum node.
#[derive(Clone)]
pub struct EthClient {
    /// The underlying provider for making RPC calls.
    pub(crate) provider: DynProvider,
    /// The HTTP endpoint of the node.
    pub(crate) rpc_url: Url,
    /// The websocket endpoint used for subscriptions.
    pub(crate) ws_url: Option<Url>,
}

#[bon]
impl EthClient {
    /// Creates a new builder for `EthClient` with the given RPC URL.
    /// Without a websocket URL, subscriptions go to the RPC URL with a `ws` scheme.
    #[builder]
    pub fn builder(rpc_url: Url, ws_url: Option<Url>) -> Self {
        let provider = ProviderBuilder::new()
            .connect_http(rpc_url.clone())
            .erased();

        Self {
            provider,
            rpc_url,
            ws_url,
        }
    }

    /// Creates a new client with the given endpoint.
    pub fn new(endpoint: Url) -> Self {
        Self::builder().rpc_url(endpoint).build()
    }

    /// Creates a client from the endpoints in `config`.
    pub fn from_config(config: &Config) -> Self {
        Self::builder()
            .rpc_url(config.rpc_url.clone())
            .ws_url(config.ws_url.clone())
            .build()
    }

    /// Gets the underlying RPC client (provider) used for blockchain interactions.
    pub fn get_rpc_client(&self) -> DynProvider {
        self.provider.clone()
    }

    /// Gets the chain ID from the provider.
    pub async fn get_chain_id(&self) -> anyhow::Result<u64> {
        self.provider
            .get_chain_id()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to get chain ID: {}", e))
    }

    /// Gets an account's balance in wei at the latest block.
    pub async fn get_balance_wei(&self, account: Address) -> anyhow::Result<U256> {
        self.provider
            .get_balance(account)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to get balance of {account}: {e}"))
    }

    /// Gets an account's ETH balance as a `BigDecimal`.
    pub async fn get_balance(&self, account: Address) -> anyhow::Result<BigDecimal> {
        Ok(wei_to_eth(self.get_balance_wei(account).await?))
    }

    /// Gets an account's balance in wei including pending transactions.
    pub async fn get_pending_balance(&self, account: Address) -> anyhow::Result<U256> {
        self.provider
            .get_balance(account)
            .pending()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to get pending balance of {account}: {e}"))
    }

    /// Checks whether `address` holds contract code at the latest block.
    pub async fn is_contract(&self, address: Address) -> anyhow::Result<bool> {
        let code = self
            .provider
            .get_code_at(address)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to get code of {address}: {e}"))?;
        Ok(!code.is_empty())
    }

    /// Gets the current block number from the chain.
    pub async fn get_current_block_number(&self) -> anyhow::Result<u64> {
        self.provider
            .get_block_number()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to get block number: {e}"))
    }

    /// Fetches a block with its full transactions and summarizes it.
    /// `None` selects the latest block.
    pub async fn get_block_summary(&self, number: Option<u64>) -> anyhow::Result<BlockSummary> {
        let tag = number.map_or(BlockNumberOrTag::Latest, BlockNumberOrTag::Number);
        let block = self
            .provider
            .get_block_by_number(tag)
            .full()
            .await?
            .ok_or_else(|| anyhow::anyhow!("Block {tag} not found"))?;

        let transactions: Vec<TransactionSummary> = match &block.transactions {
            BlockTransactions::Full(txs) => txs
                .iter()
                .map(|tx| TransactionSummary {
                    hash: *tx.inner.tx_hash(),
                    gas_limit: tx.gas_limit(),
                    gas_price: tx.gas_price().unwrap_or_else(|| tx.max_fee_per_gas()),
                    from: tx.inner.signer(),
                })
                .collect(),
            _ => anyhow::bail!("Node returned block {tag} without full transactions"),
        };

        let header = &block.header;
        log::debug!(
            "Block {} ({}) has {} transactions",
            header.number,
            header.hash,
            transactions.len()
        );
        Ok(BlockSummary {
            number: header.number,
            hash: header.hash,
            timestamp: header.timestamp,
            difficulty: header.difficulty,
            nonce: u64::from_be_bytes(header.nonce.0),
            transactions,
        })
    }

    /// Creates a websocket client for event subscriptions.
    pub async fn events_client(&self) -> anyhow::Result<EventsClient> {
        let ws_url = match &self.ws_url {
            Some(url) => url.clone(),
            None => {
                let mut url = self.rpc_url.clone();
                let scheme = if url.scheme() == "https" { "wss" } else { "ws" };
                url.set_scheme(scheme)
                    .map_err(|_| anyhow::anyhow!("Cannot derive websocket URL from {}", self.rpc_url))?;
                url
            }
        };
        EventsClient::new(ws_url).await
    }

    /// Creates a read-only client for the `Store` contract at `address`.
    pub fn store(&self, address: Address) -> StoreClient {
        StoreClient::read_only(self.rpc_url.clone(), address)
    }

    /// Creates a `Store` client that signs transactions with `wallet`.
    pub fn store_with_wallet(
        &self,
        address: Address,
        wallet: &LocalWallet,
        tx_config: TransactionConfig,
    ) -> StoreClient {
        StoreClient::with_wallet(self.rpc_url.clone(), address, wallet, tx_config)
    }
}
