//! Marketplace command-line client.
//!
//! # Usage
//!
//! ```bash
//! # accounts exposed by the node
//! marketplace accounts
//!
//! # unsold products
//! marketplace list --json
//!
//! # list a product for 0.5 ether
//! marketplace create --name "Vintage lamp" --price 500000000000000000
//!
//! # buy product 1 at its listed price
//! marketplace buy --id 1
//!
//! # interactive loop
//! marketplace --provider local --demo shell
//! ```

use clap::{Parser, Subcommand, ValueEnum};
use marketplace_client::config::ProviderKind;
use marketplace_client::local::dev_account;
use marketplace_client::shell::{render_products, run_shell};
use marketplace_client::{
    Config, DeploymentRegistry, JsonRpcProvider, LocalLedger, NetworkId, Provider, Session, Wei,
};
use std::sync::Arc;
use tokio::io::BufReader;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "marketplace")]
#[command(author, version, about = "Contract-backed product marketplace client")]
struct Cli {
    /// Config file (toml/json/yaml). Defaults to ./marketplace.* when present.
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Override the configured provider
    #[arg(long, global = true)]
    provider: Option<ProviderArg>,

    /// Override the node JSON-RPC endpoint
    #[arg(long, global = true)]
    rpc_url: Option<String>,

    /// Override the contract artifact path
    #[arg(long, global = true)]
    registry: Option<String>,

    /// Seed the local ledger with sample products
    #[arg(long, global = true)]
    demo: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum ProviderArg {
    Rpc,
    Local,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the accounts the provider exposes
    Accounts,
    /// Show unsold products
    List {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// List a new product for sale
    Create {
        /// Product name
        #[arg(short, long)]
        name: String,

        /// Price in wei
        #[arg(short, long, allow_negative_numbers = true)]
        price: i128,
    },
    /// Buy a product at its listed price
    Buy {
        /// Product id
        #[arg(short, long)]
        id: u64,
    },
    /// Interactive list/create/buy loop on stdin
    Shell,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        match e.downcast_ref::<marketplace_client::Error>() {
            Some(client_error) => {
                error!(error = %client_error, "Command failed");
                eprintln!("{}", client_error.user_message());
            }
            None => error!("Command failed: {e}"),
        }
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(provider) = cli.provider {
        config.provider = match provider {
            ProviderArg::Rpc => ProviderKind::Rpc,
            ProviderArg::Local => ProviderKind::Local,
        };
    }
    if let Some(url) = cli.rpc_url {
        config.rpc_url = url;
    }
    if let Some(path) = cli.registry {
        config.registry_path = path;
    }
    let config = config.validate()?;
    info!(provider = ?config.provider, rpc = %config.rpc_url, "Configuration loaded");

    let (provider, registry) = build_provider(&config, cli.demo)?;

    if let Commands::Accounts = cli.command {
        let accounts = provider
            .request_accounts()
            .await
            .map_err(|e| marketplace_client::Error::ProviderUnavailable(e.to_string()))?;
        for (index, account) in accounts.iter().enumerate() {
            println!("{index}: {account}");
        }
        return Ok(());
    }

    let session = Session::connect(provider, &registry, &config).await?;

    match cli.command {
        Commands::Accounts => {}
        Commands::List { json } => {
            let view = session.list_unsold_products().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&*view)?);
            } else {
                print!("{}", render_products(&view));
            }
        }
        Commands::Create { name, price } => {
            let confirmation = session.create_product(&name, price).await?;
            println!("created {name:?} in {}", confirmation.tx_id);
        }
        Commands::Buy { id } => {
            session.list_unsold_products().await?;
            let product = session.find_product(id).ok_or_else(|| {
                marketplace_client::Error::InvalidInput(format!("product {id} is not for sale"))
            })?;
            let confirmation = session.buy_product(id, product.price).await?;
            println!(
                "bought {:?} for {} ether in {}",
                product.name,
                product.price.to_ether_string(),
                confirmation.tx_id
            );
        }
        Commands::Shell => {
            run_shell(&session, BufReader::new(tokio::io::stdin()), tokio::io::stdout()).await?;
        }
    }
    Ok(())
}

fn build_provider(
    config: &Config,
    demo: bool,
) -> Result<(Arc<dyn Provider>, DeploymentRegistry), marketplace_client::Error> {
    match config.provider {
        ProviderKind::Rpc => {
            let registry = DeploymentRegistry::load(&config.registry_path)?;
            let provider = JsonRpcProvider::new(config)?;
            Ok((Arc::new(provider), registry))
        }
        ProviderKind::Local => {
            let ledger = LocalLedger::with_dev_accounts(NetworkId(config.local_network_id));
            if demo {
                let seller = dev_account(3);
                for (name, price) in [
                    ("Vintage lamp", 500_000_000_000_000_000),
                    ("Road bike", 2_000_000_000_000_000_000),
                    ("Desk plant", 10_000_000_000_000_000),
                ] {
                    ledger
                        .seed(name, Wei(price), &seller)
                        .map_err(|e| marketplace_client::Error::Config(format!("demo seed: {e}")))?;
                }
            }
            let registry = ledger.registry();
            Ok((Arc::new(ledger), registry))
        }
    }
}
