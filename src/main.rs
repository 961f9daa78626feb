//! Command-line front end for the meal subscription client.
//!
//! ```text
//! meal-client [--config client.toml] <command>
//! ```
//!
//! Every command prints the resulting envelope as pretty JSON on stdout;
//! logs go to stderr. A stale cached answer is printed immediately and its
//! refresh is awaited before the cache file is saved, so the next run sees it.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use reqwest::Method;
use serde::Serialize;

use meal_client::config::{load_config, load_from_env};
use meal_client::observability::{logging, metrics};
use meal_client::ApiClient;

#[derive(Parser)]
#[command(name = "meal-client")]
#[command(about = "Client for the meal subscription backend", long_about = None)]
struct Cli {
    /// TOML configuration file. Defaults plus MEAL_CLIENT_* variables when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in and store the session token
    Login { email: String, password: String },
    /// End the session and clear cached data
    Logout,
    /// List meal plans
    MealPlans {
        /// Bypass the cache
        #[arg(long)]
        refresh: bool,
    },
    /// List your subscriptions
    Subscriptions {
        #[arg(long)]
        refresh: bool,
    },
    /// List your orders
    Orders {
        #[arg(long)]
        refresh: bool,
    },
    /// List orders assigned to you as a driver
    DriverOrders {
        #[arg(long)]
        refresh: bool,
    },
    /// List notifications
    Notifications {
        #[arg(long)]
        refresh: bool,
    },
    /// List active discounts
    Discounts {
        #[arg(long)]
        refresh: bool,
    },
    /// GET an arbitrary endpoint, e.g. /mealplans/42
    Get { endpoint: String },
    /// Show cache counters
    CacheStats,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => load_from_env()?,
    };

    logging::init_logging(&config.observability)?;

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    tracing::info!(
        base_url = %config.api.base_url,
        environment = ?config.api.environment,
        "meal-client v{} starting",
        env!("CARGO_PKG_VERSION")
    );

    let client = ApiClient::new(config)?;

    match cli.command {
        Commands::Login { email, password } => print_json(&client.login(&email, &password).await)?,
        Commands::Logout => print_json(&client.logout().await)?,
        Commands::MealPlans { refresh } => print_json(&client.meal_plans(refresh).await)?,
        Commands::Subscriptions { refresh } => print_json(&client.subscriptions(refresh).await)?,
        Commands::Orders { refresh } => print_json(&client.orders(refresh).await)?,
        Commands::DriverOrders { refresh } => print_json(&client.driver_orders(refresh).await)?,
        Commands::Notifications { refresh } => print_json(&client.notifications(refresh).await)?,
        Commands::Discounts { refresh } => print_json(&client.active_discounts(refresh).await)?,
        Commands::Get { endpoint } => print_json(&client.request(Method::GET, &endpoint, None).await)?,
        Commands::CacheStats => print_json(&client.cache_stats())?,
    }

    // Stale hits were printed as-is; let their revalidation land before saving.
    client.wait_for_refreshes().await;
    if let Err(e) = client.persist_cache() {
        tracing::warn!(error = %e, "Failed to persist cache");
    }

    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<(), serde_json::Error> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
