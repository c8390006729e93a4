use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use ethwatch_sdk::utils::is_valid_address;
use ethwatch_sdk::wallet::{Keystore, LocalWallet};
use ethwatch_sdk::{
    Address, CancellationToken, Config, EthClient, ListenerHandle, StopReason, Url,
};
use log::info;
use tokio::sync::mpsc;

/// Program to watch and query an Ethereum node
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// HTTP URL of the node, overrides ETHWATCH_RPC_URL
    #[arg(short, long)]
    url: Option<Url>,

    /// Websocket URL of the node, overrides ETHWATCH_WS_URL
    #[arg(short, long)]
    ws_url: Option<Url>,

    /// Command to execute
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show the balance of an account
    Balance {
        /// Account address
        address: Address,
    },
    /// Validate an address and check whether it is a contract
    Address {
        /// Address to check
        address: String,
    },
    /// Show a block and its transactions
    Block {
        /// Block number, latest if omitted
        #[arg(short, long)]
        number: Option<u64>,
    },
    /// Print new block headers until Ctrl-C
    WatchBlocks {
        /// Stop after this many seconds
        #[arg(short, long)]
        timeout: Option<u64>,
    },
    /// Print `ItemSet` events of the store contract until Ctrl-C
    WatchItems {
        /// Stop after this many seconds
        #[arg(short, long)]
        timeout: Option<u64>,
    },
    /// Store contract commands
    Store {
        #[command(subcommand)]
        command: StoreCommand,
    },
    /// Wallet and keystore commands
    Wallet {
        #[command(subcommand)]
        command: WalletCommand,
    },
}

#[derive(Debug, Subcommand)]
enum StoreCommand {
    /// Show the contract version
    Version,
    /// Read the value stored under a key
    Get {
        key: String,
    },
    /// Store a value under a key, signed with ETHWATCH_PRIVATE_KEY
    Set {
        key: String,
        value: String,
    },
}

#[derive(Debug, Subcommand)]
enum WalletCommand {
    /// Generate a key pair and print it
    Generate,
    /// Create a new account in the keystore
    Create {
        /// Password for the keystore file
        #[arg(short, long)]
        password: String,
    },
    /// Import a keystore file into the keystore, removing the original
    Import {
        /// Keystore file to import
        path: PathBuf,
        /// Password of the file
        #[arg(short, long)]
        password: String,
        /// Password for the imported copy, defaults to the current one
        #[arg(long)]
        new_password: Option<String>,
    },
    /// List accounts in the keystore
    List,
}

impl Command {
    async fn execute(&self, config: &Config) -> Result<()> {
        let client = EthClient::from_config(config);
        match self {
            Command::Balance { address } => {
                let balance = client.get_balance(*address).await?;
                let pending = client.get_pending_balance(*address).await?;
                println!("{address}: {balance} ETH (pending: {pending} wei)");
            }
            Command::Address { address } => {
                if !is_valid_address(address) {
                    println!("{address} is not a valid address");
                    return Ok(());
                }
                let is_contract = client.is_contract(address.parse()?).await?;
                println!("{address} is valid, contract: {is_contract}");
            }
            Command::Block { number } => {
                let block = client.get_block_summary(*number).await?;
                println!("block {} {}", block.number, block.hash);
                println!("  time: {}", block.timestamp);
                println!("  difficulty: {}", block.difficulty);
                println!("  nonce: {}", block.nonce);
                println!("  transactions: {}", block.transaction_count());
                for tx in &block.transactions {
                    println!(
                        "    {} from {} gas {} price {}",
                        tx.hash, tx.from, tx.gas_limit, tx.gas_price
                    );
                }
            }
            Command::WatchBlocks { timeout } => {
                let events = client.events_client().await?;
                let (tx, mut rx) = mpsc::unbounded_channel();
                let handle = events
                    .watch_blocks(
                        move |header| {
                            let _ = tx.send(header.number);
                            Ok(())
                        },
                        cancel_on_ctrl_c(),
                    )
                    .await?;
                if let Some(secs) = timeout {
                    handle.cancel_after(Duration::from_secs(*secs));
                }
                // The sender lives in the handler, so this ends with the listener.
                while let Some(number) = rx.recv().await {
                    let block = client.get_block_summary(Some(number)).await?;
                    println!(
                        "block {} {} time {} nonce {} transactions {}",
                        block.number,
                        block.hash,
                        block.timestamp,
                        block.nonce,
                        block.transaction_count()
                    );
                }
                report(handle.join().await?);
            }
            Command::WatchItems { timeout } => {
                let store = config.require_store_address()?;
                let events = client.events_client().await?;
                let handle = events
                    .watch_item_sets(
                        store,
                        |event| {
                            let (key, value) = event.item_strings();
                            println!("new data {key} {value}");
                            Ok(())
                        },
                        cancel_on_ctrl_c(),
                    )
                    .await?;
                wait(handle, *timeout).await?;
            }
            Command::Store { command } => command.execute(&client, config).await?,
            Command::Wallet { command } => command.execute(config)?,
        }
        Ok(())
    }
}

impl StoreCommand {
    async fn execute(&self, client: &EthClient, config: &Config) -> Result<()> {
        let address = config.require_store_address()?;
        match self {
            StoreCommand::Version => {
                let version = client.store(address).version().await?;
                println!("Store version: {version}");
            }
            StoreCommand::Get { key } => {
                let value = client.store(address).item(key).await?;
                println!("{key} = {value}");
            }
            StoreCommand::Set { key, value } => {
                let wallet = LocalWallet::from_private_key_hex(config.require_private_key()?)?;
                let store = client.store_with_wallet(address, &wallet, config.tx.clone());
                let receipt = store.set_item(key, value).await?;
                println!(
                    "tx {} mined in block {:?}, gas used {}",
                    receipt.transaction_hash, receipt.block_number, receipt.gas_used
                );
            }
        }
        Ok(())
    }
}

impl WalletCommand {
    fn execute(&self, config: &Config) -> Result<()> {
        if let WalletCommand::Generate = self {
            let wallet = LocalWallet::generate();
            println!("private key: {}", wallet.private_key_hex());
            println!("public key: {}", wallet.public_key_hex());
            println!("address: {}", wallet.address());
            return Ok(());
        }

        let keystore = match &config.keystore_dir {
            Some(dir) => Keystore::open(dir)?,
            None => Keystore::open_default()?,
        };
        match self {
            WalletCommand::Generate => {}
            WalletCommand::Create { password } => {
                let (wallet, path) = keystore.create_account(password)?;
                println!("Created account {} in {}", wallet.address(), path.display());
            }
            WalletCommand::Import {
                path,
                password,
                new_password,
            } => {
                let new_password = new_password.as_deref().unwrap_or(password);
                let wallet = keystore.import(path, password, new_password)?;
                println!("Imported account {}", wallet.address());
            }
            WalletCommand::List => {
                println!("Accounts in {}:", keystore.dir().display());
                for address in keystore.list_accounts()? {
                    println!("  {address}");
                }
            }
        }
        Ok(())
    }
}

/// Returns a token that is cancelled on the first Ctrl-C.
fn cancel_on_ctrl_c() -> CancellationToken {
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted, stopping");
            token.cancel();
        }
    });
    cancel
}

async fn wait(handle: ListenerHandle, timeout: Option<u64>) -> Result<()> {
    if let Some(secs) = timeout {
        handle.cancel_after(Duration::from_secs(secs));
    }
    report(handle.join().await?);
    Ok(())
}

fn report(reason: StopReason) {
    match reason {
        StopReason::Cancelled => info!("Listener cancelled"),
        StopReason::Closed => info!("Node closed the subscription"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let mut config = Config::from_env()?;
    if let Some(url) = args.url {
        config.rpc_url = url;
    }
    if let Some(ws_url) = args.ws_url {
        config.ws_url = ws_url;
    }

    args.command.execute(&config).await
}
