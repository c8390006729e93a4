use alloy::network::EthereumWallet;
use alloy::primitives::{Address, B256};
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::rpc::types::TransactionReceipt;
use alloy::sol;
use url::Url;

use crate::config::TransactionConfig;
use crate::utils::{bytes32_to_string, string_to_bytes32};
use crate::wallet::LocalWallet;

sol! {
    /// The subset of the key/value `Store` contract used by this crate.
    #[sol(rpc)]
    contract Store {
        event ItemSet(bytes32 key, bytes32 value);

        function version() external view returns (string);
        function items(bytes32 key) external view returns (bytes32);
        function setItem(bytes32 key, bytes32 value) external;
    }
}

/// Client for a deployed `Store` contract.
/// Reads go through a plain HTTP provider; writes need a wallet.
pub struct StoreClient {
    address: Address,
    provider: DynProvider,
    tx_config: TransactionConfig,
    can_sign: bool,
}

impl StoreClient {
    /// Creates a read-only client for the contract at `address`.
    pub fn read_only(rpc_url: Url, address: Address) -> Self {
        let provider = ProviderBuilder::new().connect_http(rpc_url).erased();
        Self {
            address,
            provider,
            tx_config: TransactionConfig::default(),
            can_sign: false,
        }
    }

    /// Creates a client that signs `setItem` transactions with `wallet`.
    /// Nonce, gas price and chain id are filled in from the node.
    pub fn with_wallet(
        rpc_url: Url,
        address: Address,
        wallet: &LocalWallet,
        tx_config: TransactionConfig,
    ) -> Self {
        let provider = ProviderBuilder::new()
            .wallet(EthereumWallet::from(wallet.signer().clone()))
            .connect_http(rpc_url)
            .erased();
        Self {
            address,
            provider,
            tx_config,
            can_sign: true,
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// Reads the contract's version string.
    pub async fn version(&self) -> anyhow::Result<String> {
        let store = Store::new(self.address, self.provider.clone());
        store
            .version()
            .call()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to get version: {e}"))
    }

    /// Reads the raw 32-byte value stored under `key`.
    pub async fn item_raw(&self, key: B256) -> anyhow::Result<B256> {
        let store = Store::new(self.address, self.provider.clone());
        store
            .items(key)
            .call()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to get item 0x{key:x}: {e}"))
    }

    /// Reads the string stored under the string `key`.
    /// Unset keys read back as an empty string.
    pub async fn item(&self, key: &str) -> anyhow::Result<String> {
        let value = self.item_raw(string_to_bytes32(key)?).await?;
        Ok(bytes32_to_string(&value))
    }

    /// Stores `value` under `key` and waits for the transaction receipt.
    pub async fn set_item(&self, key: &str, value: &str) -> anyhow::Result<TransactionReceipt> {
        if !self.can_sign {
            anyhow::bail!("Store client for {} has no wallet to sign with", self.address);
        }
        let key = string_to_bytes32(key)?;
        let value = string_to_bytes32(value)?;

        let store = Store::new(self.address, self.provider.clone());
        let pending = store
            .setItem(key, value)
            .gas(self.tx_config.gas_limit)
            .send()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to send setItem transaction: {e}"))?;
        log::info!("Transaction sent: {}", pending.tx_hash());

        let receipt = pending
            .get_receipt()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to get transaction receipt: {e}"))?;
        if !receipt.status() {
            anyhow::bail!(
                "Transaction {} failed despite being mined.",
                receipt.transaction_hash
            );
        }
        log::debug!(
            "setItem mined in block {:?}, gas used {}",
            receipt.block_number,
            receipt.gas_used
        );
        Ok(receipt)
    }
}
