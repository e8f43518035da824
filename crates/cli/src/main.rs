//! Basket CLI - Database migrations and catalog management.
//!
//! # Usage
//!
//! ```bash
//! # Run database migrations
//! basket-cli migrate
//!
//! # Add a product to the catalog
//! basket-cli product add -n "Gaming Phone" -p 499.00 --rating "4.5"
//!
//! # List the catalog
//! basket-cli product list
//! ```
//!
//! # Commands
//!
//! - `migrate` - Run database migrations
//! - `product add` - Create a catalog product
//! - `product list` - Print every catalog product

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};
use rust_decimal::Decimal;

mod commands;

#[derive(Parser)]
#[command(name = "basket-cli")]
#[command(author, version, about = "Basket CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Manage catalog products
    Product {
        #[command(subcommand)]
        action: ProductAction,
    },
}

#[derive(Subcommand)]
enum ProductAction {
    /// Add a product
    Add {
        /// Product display name
        #[arg(short, long)]
        name: String,

        /// Price in the store currency, e.g. 499.00
        #[arg(short, long)]
        price: Decimal,

        /// Rating label
        #[arg(short, long)]
        rating: Option<String>,

        /// Image URL
        #[arg(short, long)]
        image: Option<String>,
    },
    /// List all products
    List,
}

#[tokio::main]
async fn main() {
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
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Product { action } => match action {
            ProductAction::Add {
                name,
                price,
                rating,
                image,
            } => {
                commands::product::add(&name, price, rating, image).await?;
            }
            ProductAction::List => commands::product::list().await?,
        },
    }
    Ok(())
}
