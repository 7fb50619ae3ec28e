//! Shopfront CLI - command-line storefront client.
//!
//! # Usage
//!
//! ```bash
//! # Store the bearer token issued by the backend
//! shopfront login --token eyJhbGciOi...
//!
//! # Edit the cart interactively (changes sync in the background)
//! shopfront cart
//!
//! # Add a product without opening a session
//! shopfront cart add 64f1c2 --quantity 2
//!
//! # Save an address and check out the selected items
//! shopfront address add --name "Ada Lovelace" --line1 "12 Analytical Row" \
//!     --city London --postal-code "N1 9GU" --country UK --phone +447700900123
//! shopfront checkout --payment card
//! ```
//!
//! # Commands
//!
//! - `login` / `logout` - Manage the stored bearer token
//! - `cart` - Interactive cart session, or `add` / `clear`
//! - `address` - Manage saved shipping addresses
//! - `checkout` - Place an order for the selected cart items

#![cfg_attr(not(test), forbid(unsafe_code))]
// Terminal output is the point of this binary.
#![allow(clippy::print_stdout, clippy::print_stderr)]

use clap::{Parser, Subcommand};
use sentry::integrations::tracing as sentry_tracing;
use shopfront_client::ClientConfig;
use shopfront_core::{AddressId, PaymentMethod, PhoneNumber};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

use commands::{CliError, Context};

#[derive(Parser)]
#[command(name = "shopfront")]
#[command(author, version, about = "Shopfront command-line storefront")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Store a bearer token for authenticated requests
    Login {
        /// Token issued by the storefront backend
        #[arg(short, long)]
        token: String,
    },
    /// Forget the stored bearer token
    Logout,
    /// Edit the cart (interactive session when no action is given)
    Cart {
        #[command(subcommand)]
        action: Option<CartAction>,
    },
    /// Manage saved shipping addresses
    Address {
        #[command(subcommand)]
        action: AddressAction,
    },
    /// Place an order for the selected cart items
    Checkout {
        /// Saved address to ship to (defaults to the default address)
        #[arg(short, long)]
        address: Option<AddressId>,

        /// Payment method (`card`, `cash-on-delivery`)
        #[arg(short, long, default_value = "card")]
        payment: PaymentMethod,
    },
}

#[derive(Subcommand)]
enum CartAction {
    /// Add a product to the cart
    Add {
        /// Product ID
        product_id: String,

        /// Quantity to add
        #[arg(short, long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
        quantity: u32,
    },
    /// Remove every item from the cart
    Clear,
}

#[derive(Subcommand)]
enum AddressAction {
    /// List saved addresses
    List,
    /// Save a new address
    Add {
        /// Recipient name
        #[arg(short, long)]
        name: String,

        /// Street address
        #[arg(long)]
        line1: String,

        #[arg(long)]
        city: String,

        #[arg(long)]
        postal_code: String,

        #[arg(long)]
        country: String,

        /// Contact phone number, e.g. +447700900123
        #[arg(long)]
        phone: PhoneNumber,
    },
    /// Delete a saved address
    Remove {
        /// Address ID
        id: AddressId,
    },
    /// Make an address the default
    Default {
        /// Address ID
        id: AddressId,
    },
}

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &ClientConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    tracing::info!("Sentry initialized");
    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match ClientConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            std::process::exit(2);
        }
    };

    // Initialize Sentry (must be done before tracing subscriber)
    let _sentry_guard = init_sentry(&config);

    // Logs go to stderr so they don't interleave with command output
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "shopfront_client=info,shopfront_cli=info".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();

    if let Err(e) = run(cli, Context::new(config)).await {
        tracing::error!("Command failed: {e}");
        if e.requires_login() {
            eprintln!("Sign in with `shopfront login --token <TOKEN>` and try again.");
        }
        std::process::exit(1);
    }
}

async fn run(cli: Cli, ctx: Context) -> Result<(), CliError> {
    match cli.command {
        Commands::Login { token } => commands::auth::login(&ctx, token).await?,
        Commands::Logout => commands::auth::logout(&ctx).await?,
        Commands::Cart { action } => match action {
            None => commands::cart::session(&ctx).await?,
            Some(CartAction::Add {
                product_id,
                quantity,
            }) => commands::cart::add(&ctx, &product_id, quantity).await?,
            Some(CartAction::Clear) => commands::cart::clear(&ctx).await?,
        },
        Commands::Address { action } => match action {
            AddressAction::List => commands::address::list(&ctx).await?,
            AddressAction::Add {
                name,
                line1,
                city,
                postal_code,
                country,
                phone,
            } => {
                let fields = shopfront_client::NewAddress {
                    full_name: name,
                    line1,
                    city,
                    postal_code,
                    country,
                    phone,
                };
                commands::address::add(&ctx, fields).await?;
            }
            AddressAction::Remove { id } => commands::address::remove(&ctx, id).await?,
            AddressAction::Default { id } => commands::address::set_default(&ctx, id).await?,
        },
        Commands::Checkout { address, payment } => {
            commands::checkout::run(&ctx, address, payment).await?;
        }
    }
    Ok(())
}
