//! # fulfil: Order Fulfilment Calculator
//!
//! Command-line front end over `fulfil-engine`, for operators checking what a
//! cart ships as and what it will cost before it reaches checkout.
//!
//! ## Usage
//!
//! ```bash
//! # Parcel dimensions for a cart
//! fulfil shipment --lines cart.json
//!
//! # Delivery fee to a pincode, cash on delivery
//! fulfil quote --lines cart.json --pincode 560034 --cod
//!
//! # Check a coupon against a ₹2,000 cart for a returning customer
//! fulfil coupon --coupons coupons.json --code FESTIVE20 --cart-value 2000 --returning
//!
//! # What returning one unit of line 0 pays back
//! fulfil refund --lines cart.json --select 0:1
//!
//! # Write a default fulfil.toml
//! fulfil config init
//! ```
//!
//! Cart files are JSON arrays of cart lines; amounts inside are in paise.
//! Set `RUST_LOG=debug` to see courier requests and coupon decisions.

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use fulfil_core::PackingKind;
use fulfil_engine::EngineConfig;

mod commands;

#[derive(Parser)]
#[command(name = "fulfil")]
#[command(author, version, about = "Order fulfilment calculator")]
struct Cli {
    /// Config file (defaults to fulfil.toml in the platform config dir)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Aggregate a cart into parcel weight and dimensions
    Shipment {
        /// JSON file with the cart lines
        #[arg(short, long)]
        lines: PathBuf,

        /// Override the configured packing policy (`stacked`, `single_box`)
        #[arg(short, long)]
        packing: Option<PackingKind>,
    },
    /// Quote the delivery fee with the configured rate card
    Quote {
        #[arg(short, long)]
        lines: PathBuf,

        /// 6-digit destination pincode
        #[arg(short, long)]
        pincode: String,

        /// Cash on delivery
        #[arg(long)]
        cod: bool,
    },
    /// Validate a coupon code against a cart value
    Coupon {
        /// JSON file with coupon definitions
        #[arg(long)]
        coupons: PathBuf,

        #[arg(long)]
        code: String,

        /// Cart sub-total in whole rupees
        #[arg(long)]
        cart_value: i64,

        /// The customer already has a delivered order
        #[arg(long)]
        returning: bool,
    },
    /// Compute the refund for returning part or all of an order
    Refund {
        #[arg(short, long)]
        lines: PathBuf,

        /// Returned quantity as `line:qty`; repeat for more lines, omit for all
        #[arg(short, long)]
        select: Vec<String>,

        /// Coupon discount on the order, in whole rupees
        #[arg(long, default_value_t = 0)]
        discount: i64,

        /// Delivery fee charged on the order, in whole rupees
        #[arg(long, default_value_t = 0)]
        shipping: i64,
    },
    /// Inspect or create the configuration file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration
    Show,
    /// Write the default configuration
    Init,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::error!("Command failed: {e:#}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let Cli { config, command } = cli;
    match command {
        Commands::Shipment { lines, packing } => {
            commands::shipment::run(&EngineConfig::load(config)?, &lines, packing)
        }
        Commands::Quote {
            lines,
            pincode,
            cod,
        } => commands::quote::run(&EngineConfig::load(config)?, &lines, &pincode, cod).await,
        Commands::Coupon {
            coupons,
            code,
            cart_value,
            returning,
        } => commands::coupon::run(&coupons, &code, cart_value, returning).await,
        Commands::Refund {
            lines,
            select,
            discount,
            shipping,
        } => commands::refund::run(&lines, &select, discount, shipping),
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config::show(&EngineConfig::load(config)?),
            ConfigAction::Init => commands::config::init(config),
        },
    }
}
