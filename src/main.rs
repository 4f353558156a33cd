//! `popsub-tail`: subscribe to topics and print every message received.

use std::path::PathBuf;

use clap::Parser;
use popsub_client::client::{ConnectionStatus, Credential, RealtimeClient};
use popsub_client::config::{load_config, load_config_from};
use popsub_client::transport::Filter;
use popsub_client::utils::logging;
use tracing::{error, info, warn};

const API_KEY_VAR: &str = "POPSUB_AUTH__API_KEY";

#[derive(Parser)]
#[command(name = "popsub-tail", about = "Tail realtime topics from a PopSub server")]
struct Args {
    /// Topic to subscribe to (repeatable)
    #[arg(long = "topic", short, required = true)]
    topics: Vec<String>,

    /// Config file to load instead of config/default
    #[arg(long)]
    config: Option<PathBuf>,

    /// API key; falls back to auth.api_key, then $POPSUB_AUTH__API_KEY
    #[arg(long)]
    api_key: Option<String>,

    /// Subscription filter as a JSON object, applied to every topic
    #[arg(long)]
    filter: Option<String>,
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    if let Err(e) = run(args).await {
        // no-op when the configured subscriber is already installed
        logging::init("info");
        error!("popsub-tail failed: {}", e);
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let settings = match &args.config {
        Some(path) => load_config_from(&path.to_string_lossy())?,
        None => load_config()?,
    };
    logging::init(&settings.logging.level);

    let filter: Option<Filter> = args
        .filter
        .as_deref()
        .map(serde_json::from_str::<Filter>)
        .transpose()?;

    let credential = match args.api_key.or_else(|| settings.auth.api_key.clone()) {
        Some(key) => Credential::fixed(key),
        None => Credential::from_env(API_KEY_VAR),
    };

    let client = RealtimeClient::new(settings, credential);
    client.on_status_change(|status| match status {
        ConnectionStatus::Reconnecting => warn!("connection lost, reconnecting"),
        status => info!(%status, "connection status"),
    });
    client.on_max_retries_exceeded(|attempts| {
        error!(attempts, "giving up on the server");
    });

    client.connect().await?;

    for topic in &args.topics {
        let name = topic.clone();
        client
            .channel(topic.as_str(), filter.clone())
            .on(move |message| info!(topic = %name, %message, "message"))
            .subscribe()?;
        info!(topic = %topic, "subscribed");
    }

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received. Exiting gracefully.");

    client.disconnect().await?;
    Ok(())
}
