mod detect;
mod geocode;
mod records;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use rtumap_backend::BackendClient;
use rtumap_core::{AppConfig, RecordId};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "rtumap")]
#[command(about = "Rooftop-unit map annotation command line interface")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// List saved records
    History {
        /// Forward-geocode records that lack coordinates before listing
        #[arg(long)]
        locate: bool,
    },
    /// Forward-geocode an address or place name
    Geocode {
        /// Free-form address, e.g. "123 Main St, Pittsburgh"
        address: String,
    },
    /// Reverse-geocode a coordinate
    Reverse {
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,
        #[arg(long, allow_hyphen_values = true)]
        lng: f64,
    },
    /// Run rooftop-unit detection on a map image centered at a coordinate
    Detect {
        /// PNG or JPEG of the map viewport
        #[arg(long)]
        image: PathBuf,
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,
        #[arg(long, allow_hyphen_values = true)]
        lng: f64,
        /// Building name to save the record under
        #[arg(long)]
        building_name: Option<String>,
        /// Persist the result as a record after detection
        #[arg(long)]
        save: bool,
    },
    /// Delete a saved record
    Delete { id: i64 },
    /// Approve a saved record
    Approve { id: i64 },
    /// Show aggregate detection statistics
    Stats,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = rtumap_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    tracing::debug!(env = %config.env, api = %config.api_base_url, "starting");

    match cli.command {
        Commands::History { locate: false } => records::run_history(&backend(&config)?).await,
        Commands::History { locate: true } => records::run_located_history(&config).await,
        Commands::Geocode { address } => geocode::run_forward(&config, &address).await,
        Commands::Reverse { lat, lng } => geocode::run_reverse(&config, lat, lng).await,
        Commands::Detect {
            image,
            lat,
            lng,
            building_name,
            save,
        } => {
            let options = detect::DetectOptions {
                image,
                lat,
                lng,
                building_name,
                save,
            };
            detect::run_detect(&config, options).await
        }
        Commands::Delete { id } => records::run_delete(&backend(&config)?, RecordId(id)).await,
        Commands::Approve { id } => records::run_approve(&backend(&config)?, RecordId(id)).await,
        Commands::Stats => records::run_stats(&backend(&config)?).await,
    }
}

fn backend(config: &AppConfig) -> anyhow::Result<BackendClient> {
    Ok(BackendClient::new(
        &config.api_base_url,
        config.request_timeout_secs,
        &config.user_agent,
    )?)
}

#[cfg(test)]
mod tests;
