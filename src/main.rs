//! Wallet session driver.
//!
//! Runs session flows against the in-process simulated wallet and prints
//! every change event as a JSON line on stdout. Logs go to stderr.
//!
//! ```text
//! wallet-session [--config FILE] spaces
//! wallet-session [--config FILE] connect      [--space S] [--provider P]
//! wallet-session [--config FILE] balance      [--space S] [--provider P]
//! wallet-session [--config FILE] block-number [--space S] [--provider P]
//! wallet-session [--config FILE] send --to ADDR --amount AMT [--space S] [--provider P]
//! ```

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use alloy::primitives::Address;
use clap::{Args, Parser, Subcommand};
use serde_json::json;

use wallet_session::config::{self, SessionConfig};
use wallet_session::observability::{logging, metrics};
use wallet_session::provider::{InjectionSlot, SimFlavor, SimWallet, StaticDiscovery};
use wallet_session::{Amount, ChangeNotifier, SessionManager, Space};

#[derive(Parser)]
#[command(name = "wallet-session")]
#[command(about = "Drive a wallet session against a simulated wallet", long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct Target {
    /// Chain space ("espace" or "core")
    #[arg(long, default_value = "espace")]
    space: String,

    /// Provider name valid in the space
    #[arg(long, default_value = "MetaMask")]
    provider: String,
}

#[derive(Subcommand)]
enum Commands {
    /// List spaces and the providers valid in each
    Spaces,
    /// Connect and print the session snapshot
    Connect {
        #[command(flatten)]
        target: Target,
    },
    /// Connect and fetch the account balance
    Balance {
        #[command(flatten)]
        target: Target,
    },
    /// Connect and fetch the current block or epoch number
    BlockNumber {
        #[command(flatten)]
        target: Target,
    },
    /// Connect, send native currency, and wait for the receipt
    Send {
        #[command(flatten)]
        target: Target,

        /// Recipient in the space's address format
        #[arg(long)]
        to: String,

        /// Amount in whole native units, e.g. "1.5"
        #[arg(long)]
        amount: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => config::load_config(path)?,
        None => SessionConfig::default(),
    };

    logging::init_logging(&config.observability);
    tracing::info!("wallet-session v{} starting", env!("CARGO_PKG_VERSION"));

    if config.observability.metrics_enabled {
        if let Ok(addr) = config.observability.metrics_address.parse() {
            metrics::init_metrics(addr);
        } else {
            tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            );
        }
    }

    let discovery = simulated_discovery(&config)?;
    let manager = SessionManager::builder()
        .config(config)
        .discovery(discovery)
        .notifier(ChangeNotifier::global().clone())
        .build();

    let printer = manager.subscribe(|event| match serde_json::to_string(event) {
        Ok(line) => println!("{line}"),
        Err(e) => tracing::error!(error = %e, "Failed to encode event"),
    });

    let result = run(&manager, cli.command).await;

    if manager.get_account().await.is_some() {
        manager.disconnect().await;
    }
    printer.unsubscribe();

    if let Err(e) = &result {
        tracing::error!(error = %e, "Command failed");
    }
    result
}

async fn run(manager: &SessionManager, command: Commands) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Commands::Spaces => {
            let registry = manager.registry();
            let mut spaces = serde_json::Map::new();
            for space in registry.list_spaces() {
                let providers: Vec<_> = registry
                    .list_providers(space)?
                    .iter()
                    .map(|d| d.name())
                    .collect();
                spaces.insert(space.to_string(), json!(providers));
            }
            println!("{}", serde_json::to_string_pretty(&spaces)?);
        }
        Commands::Connect { target } => {
            open_session(manager, &target).await?;
            let snapshot = manager.snapshot().await;
            println!("{}", serde_json::to_string_pretty(&snapshot)?);
        }
        Commands::Balance { target } => {
            open_session(manager, &target).await?;
            manager.get_balance().await?;
        }
        Commands::BlockNumber { target } => {
            open_session(manager, &target).await?;
            manager.get_block_number().await?;
        }
        Commands::Send {
            target,
            to,
            amount,
        } => {
            open_session(manager, &target).await?;

            let pending = tokio::spawn({
                let manager = manager.clone();
                async move { manager.send_transaction(&to, &amount).await }
            });
            let abort = manager.clone();
            let interrupt = tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::warn!("Interrupted, disconnecting");
                    abort.disconnect().await;
                }
            });

            let outcome = pending.await?;
            interrupt.abort();
            let hash = outcome?;
            tracing::info!(tx_hash = %hash, "Transaction confirmed");
        }
    }

    Ok(())
}

async fn open_session(manager: &SessionManager, target: &Target) -> Result<(), Box<dyn std::error::Error>> {
    manager.select_space(&target.space).await?;
    manager.select_provider(&target.provider).await?;
    manager.connect().await?;
    Ok(())
}

/// Wire simulated wallets into the `ethereum` and `conflux` slots.
fn simulated_discovery(config: &SessionConfig) -> Result<StaticDiscovery, Box<dyn std::error::Error>> {
    let sim = &config.simulator;
    let accounts = sim
        .accounts
        .iter()
        .map(|a| Address::from_str(a))
        .collect::<Result<Vec<_>, _>>()?;

    let wallet = |flavor: SimFlavor, space: Space| -> Result<SimWallet, Box<dyn std::error::Error>> {
        let chain = config.spaces.chain_info(space);
        let balance = Amount::parse(&sim.balance, chain.decimals)?;
        let builder = SimWallet::builder(flavor)
            .accounts(accounts.clone())
            .chain_id(sim.start_chain_id.unwrap_or(chain.id.0))
            .balance(balance.raw())
            .block_number(sim.block_number)
            .receipt_after(sim.receipt_after_polls);

        let builder = match (flavor, sim.ethereum_flavor.as_str()) {
            (SimFlavor::Evm, "fluent") | (SimFlavor::Conflux, _) => builder.fluent(),
            _ => builder.metamask(),
        };
        Ok(builder.build())
    };

    Ok(StaticDiscovery::empty()
        .inject(InjectionSlot::Ethereum, Arc::new(wallet(SimFlavor::Evm, Space::ESpace)?))
        .inject(InjectionSlot::Conflux, Arc::new(wallet(SimFlavor::Conflux, Space::Core)?)))
}
