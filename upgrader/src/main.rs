//! Command line entrypoint.
//!
//! Reads the upgrade parameters from a TOML file and the node endpoint and
//! signing key from `RPC_URL` and `PRIVATE_KEY`, which may be placed in a
//! `.env` file:
//!
//! ```plain
//! RPC_URL="https://..."
//! PRIVATE_KEY="0x..."
//! ```
use std::path::PathBuf;

use alloy::primitives::{utils::format_ether, Address};
use chain::{ChainClient, Client};
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use eyre::WrapErr;
use proxy_upgrader::{
    config::DEFAULT_CONFIG_PATH, Orchestrator, ProxyStatus, Stage,
    UpgradeConfig,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    /// Path to the upgrade config file
    #[arg(
        long,
        global = true,
        env = "UPGRADE_CONFIG",
        default_value = DEFAULT_CONFIG_PATH
    )]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Deploy the new implementation (not idempotent)
    Deploy,
    /// Call `initializeV2` through the proxy unless it already ran
    Init,
    /// Allow-list the liquidity pair unless it already is
    SetPair,
    /// Point the proxy at the new implementation
    Upgrade {
        /// Implementation to switch to, overriding the config file
        #[arg(long)]
        implementation: Option<Address>,
    },
    /// Run every stage in order, deploying first if no implementation is
    /// configured
    Run,
    /// Print the current state of the proxy without sending anything
    Status,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> eyre::Result<()> {
    // A missing `.env` is fine, variables may come from the shell.
    dotenv().ok();

    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = UpgradeConfig::load(&cli.config)
        .wrap_err("failed to load the upgrade config")?;
    let client = Client::from_env()?
        .with_confirmations(config.confirmation.confirmations)
        .with_timeout(config.confirmation.timeout());

    let stages = match cli.command {
        Command::Deploy => vec![config.deploy_stage()?],
        Command::Init => vec![config.initialize_stage()],
        Command::SetPair => vec![config.register_pair_stage()],
        Command::Upgrade { implementation } => {
            vec![config.switch_stage(implementation)]
        }
        Command::Run => config.plan()?,
        Command::Status => return status(&client, &config).await,
    };

    let report = Orchestrator::new(&client, config.limits)
        .starting_at(config.starting_state())
        .run(&stages)
        .await
        .into_result()
        .wrap_err("upgrade stopped")?;

    if let Some(address) = report.deployed {
        info!("verify with `forge verify-contract {address} <CONTRACT>`");
        if config.implementation.is_none() {
            info!("set `implementation = \"{address}\"` before re-running");
        }
    }

    let touches_proxy = stages
        .iter()
        .any(|stage| !matches!(stage, Stage::DeployImplementation { .. }));
    if touches_proxy {
        let status = ProxyStatus::read(&client, config.proxy, config.pair)
            .await
            .wrap_err("failed to read the proxy back")?;
        println!("{status}");
    }

    Ok(())
}

async fn status(client: &Client, config: &UpgradeConfig) -> eyre::Result<()> {
    let signer = client.signer();
    let balance = client
        .balance(signer)
        .await
        .wrap_err("failed to read the signer balance")?;
    let status = ProxyStatus::read(client, config.proxy, config.pair)
        .await
        .wrap_err("failed to read the proxy")?;

    println!("signer:            {signer}");
    println!("balance:           {} ETH", format_ether(balance));
    println!("{status}");
    Ok(())
}
