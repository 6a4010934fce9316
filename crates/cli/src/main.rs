//! Brandpulse CLI - Database migrations and management tools.
//!
//! # Usage
//!
//! ```bash
//! # Run ingest database migrations
//! bp-cli migrate
//!
//! # Seed a demo brand with an owning user
//! bp-cli seed -n "Acme Apparel" -s acme.myshopify.com -e owner@acme.com
//!
//! # Register missing webhook subscriptions for every connected brand
//! bp-cli webhooks sync
//! ```
//!
//! # Commands
//!
//! - `migrate` - Run database migrations
//! - `seed` - Create a brand and user for local development
//! - `webhooks sync` - Ensure every connected brand has the required
//!   webhook subscriptions registered with Shopify

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "bp-cli")]
#[command(author, version, about = "Brandpulse CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run ingest database migrations
    Migrate,
    /// Seed a brand and owning user for local development
    Seed {
        /// Brand display name
        #[arg(short, long)]
        name: String,

        /// Shopify shop domain (e.g. acme.myshopify.com)
        #[arg(short, long)]
        shop_domain: Option<String>,

        /// Shopify Admin API access token for the shop
        #[arg(short, long)]
        access_token: Option<String>,

        /// IANA timezone for the brand
        #[arg(short, long, default_value = "UTC")]
        timezone: String,

        /// Email of the owning user
        #[arg(short, long)]
        email: String,
    },
    /// Manage Shopify webhook subscriptions
    Webhooks {
        #[command(subcommand)]
        action: WebhooksAction,
    },
}

#[derive(Subcommand)]
enum WebhooksAction {
    /// Register missing subscriptions for every connected brand
    Sync,
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::ingest().await?,
        Commands::Seed {
            name,
            shop_domain,
            access_token,
            timezone,
            email,
        } => {
            commands::seed::brand(
                &name,
                shop_domain.as_deref(),
                access_token.as_deref(),
                &timezone,
                &email,
            )
            .await?;
        }
        Commands::Webhooks { action } => match action {
            WebhooksAction::Sync => commands::webhooks::sync().await?,
        },
    }
    Ok(())
}
