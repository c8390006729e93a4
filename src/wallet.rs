use std::fs;
use std::path::{Path, PathBuf};

use alloy::hex;
use alloy::primitives::{keccak256, Address};
use alloy::signers::k256::ecdsa::{SigningKey, VerifyingKey};
use alloy::signers::local::{LocalSignerError, PrivateKeySigner};
use anyhow::Context;
use displaydoc::Display;
use rand::thread_rng;
use thiserror::Error;

const DEFAULT_KEYSTORE_DIR: &str = "ethwatch";

/// Errors raised by wallet and keystore operations.
#[derive(Debug, Display, Error)]
pub enum WalletError {
    /// Invalid private key: {0}
    InvalidPrivateKey(String),
    /// Keystore error: {0}
    Keystore(String),
    /// Keystore file {0} not found
    NotFound(PathBuf),
    /// I/O error: {0}
    Io(#[from] std::io::Error),
}

impl From<LocalSignerError> for WalletError {
    fn from(e: LocalSignerError) -> Self {
        match e {
            LocalSignerError::EcdsaError(e) => Self::InvalidPrivateKey(e.to_string()),
            LocalSignerError::EthKeystoreError(e) => Self::Keystore(e.to_string()),
            e => Self::Keystore(e.to_string()),
        }
    }
}

/// A wallet that keeps its private key in memory.
#[derive(Clone)]
pub struct LocalWallet {
    signer: PrivateKeySigner,
}

impl LocalWallet {
    /// Generates a new random private key
    pub fn generate() -> Self {
        Self {
            signer: PrivateKeySigner::random(),
        }
    }

    /// Imports a hex encoded private key, with or without the `0x` prefix.
    pub fn from_private_key_hex(key: &str) -> Result<Self, WalletError> {
        let signer = key
            .trim()
            .parse::<PrivateKeySigner>()
            .map_err(|e| WalletError::InvalidPrivateKey(e.to_string()))?;
        Ok(Self { signer })
    }

    pub fn address(&self) -> Address {
        self.signer.address()
    }

    /// Returns the private key
    pub fn private_key(&self) -> &SigningKey {
        self.signer.credential()
    }

    /// Private key as 64 hex digits without prefix.
    pub fn private_key_hex(&self) -> String {
        hex::encode(self.signer.credential().to_bytes())
    }

    /// Returns the public key
    pub fn public_key(&self) -> VerifyingKey {
        *self.signer.credential().verifying_key()
    }

    /// Uncompressed public key as 128 hex digits, without the `04` SEC1 tag.
    pub fn public_key_hex(&self) -> String {
        let point = self.public_key().to_encoded_point(false);
        hex::encode(&point.as_bytes()[1..])
    }

    /// Derives the address from the public key: the last 20 bytes of the
    /// keccak256 hash of the uncompressed key without its tag byte.
    pub fn derive_address(public_key: &VerifyingKey) -> Address {
        let point = public_key.to_encoded_point(false);
        let hash = keccak256(&point.as_bytes()[1..]);
        Address::from_slice(&hash[12..])
    }

    /// Gives access to the underlying signer, e.g. to build a signing provider.
    pub fn signer(&self) -> &PrivateKeySigner {
        &self.signer
    }
}

impl From<PrivateKeySigner> for LocalWallet {
    fn from(signer: PrivateKeySigner) -> Self {
        Self { signer }
    }
}

/// A directory of password protected JSON keystore files, one per account.
/// Files are named `key_<checksummed address>.json`.
#[derive(Debug, Clone)]
pub struct Keystore {
    dir: PathBuf,
}

impl Keystore {
    /// Opens a keystore directory, creating it if needed.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, WalletError> {
        let dir = dir.into();
        if !dir.exists() {
            fs::create_dir_all(&dir)?;
        }
        Ok(Self { dir })
    }

    /// Opens the keystore in the user's config directory.
    pub fn open_default() -> anyhow::Result<Self> {
        let dir = dirs::config_dir()
            .context("Could not find config directory")?
            .join(DEFAULT_KEYSTORE_DIR);
        Ok(Self::open(dir)?)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Generates a new account and stores it encrypted with `password`.
    /// Returns the wallet together with the keystore file path.
    pub fn create_account(&self, password: &str) -> Result<(LocalWallet, PathBuf), WalletError> {
        let wallet = LocalWallet::generate();
        let path = self.store(&wallet, password)?;
        Ok((wallet, path))
    }

    /// Encrypts `wallet` into this keystore.
    pub fn store(&self, wallet: &LocalWallet, password: &str) -> Result<PathBuf, WalletError> {
        let name = Self::file_name(wallet.address());
        let mut rng = thread_rng();
        PrivateKeySigner::encrypt_keystore(
            &self.dir,
            &mut rng,
            wallet.private_key().to_bytes(),
            password,
            Some(name.as_str()),
        )?;
        let path = self.dir.join(name);
        log::info!("Stored account {} in {}", wallet.address(), path.display());
        Ok(path)
    }

    /// Loads an account from this keystore.
    pub fn load(&self, address: Address, password: &str) -> Result<LocalWallet, WalletError> {
        let path = self.dir.join(Self::file_name(address));
        Self::decrypt_file(&path, password)
    }

    /// Imports a keystore file from elsewhere: decrypts it with `password`,
    /// re-encrypts it into this keystore with `new_password` and removes the
    /// source file.
    pub fn import(
        &self,
        source: &Path,
        password: &str,
        new_password: &str,
    ) -> Result<LocalWallet, WalletError> {
        let wallet = Self::decrypt_file(source, password)?;
        let stored = self.store(&wallet, new_password)?;
        if stored != source {
            fs::remove_file(source)?;
            log::debug!("Removed imported keystore file {}", source.display());
        }
        Ok(wallet)
    }

    /// Lists the accounts stored in this keystore.
    pub fn list_accounts(&self) -> Result<Vec<Address>, WalletError> {
        let mut accounts = Vec::new();
        for entry in fs::read_dir(&self.dir)?.flatten() {
            if let Some(address) = entry.file_name().to_str().and_then(Self::parse_file_name) {
                accounts.push(address);
            }
        }
        accounts.sort();
        Ok(accounts)
    }

    fn decrypt_file(path: &Path, password: &str) -> Result<LocalWallet, WalletError> {
        if !path.exists() {
            return Err(WalletError::NotFound(path.to_path_buf()));
        }
        let signer = PrivateKeySigner::decrypt_keystore(path, password)?;
        Ok(LocalWallet { signer })
    }

    fn file_name(address: Address) -> String {
        format!("key_{address}.json")
    }

    /// Parses an address from a keystore filename
    fn parse_file_name(file_name: &str) -> Option<Address> {
        file_name
            .strip_prefix("key_")
            .and_then(|s| s.strip_suffix(".json"))
            .and_then(|address| Address::parse_checksummed(address, None).ok())
    }
}
