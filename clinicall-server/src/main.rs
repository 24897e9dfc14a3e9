use std::sync::Arc;

use clap::Parser;
use clinicall_core::{CallLifecycle, ClinicallConfig, VapiClient};
use tokio::sync::broadcast;
use tracing_subscriber::{fmt, EnvFilter};

use clinicall_server::http::{self, HttpState};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value = "clinicall.toml")]
    config: String,

    /// Report which calling-service credentials are configured and exit
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (dev convenience — production uses real env vars)
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Load config
    let config = match ClinicallConfig::load(&args.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config from {}: {}", args.config, e);
            std::process::exit(1);
        }
    };

    // Init logging
    let default_level = config
        .service
        .log_level
        .parse::<tracing::Level>()
        .unwrap_or(tracing::Level::INFO);
    fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(default_level.into()))
        .init();

    if args.check {
        let vapi = &config.vapi;
        let checks = [
            ("api key", !vapi.api_key.is_empty()),
            ("assistant id", !vapi.assistant_id.is_empty()),
            ("phone number id", !vapi.phone_number_id.is_empty()),
        ];
        for (name, ok) in checks {
            if ok {
                println!("✅ {} configured", name);
            } else {
                println!("❌ {} missing", name);
            }
        }
        println!("   base url: {}", vapi.base_url);
        if !vapi.is_complete() {
            std::process::exit(1);
        }
        println!("✅ Clinicall config check passed");
        return Ok(());
    }

    let client = VapiClient::new(config.vapi.clone())?;
    let calls: Arc<dyn CallLifecycle> = Arc::new(client);
    tracing::info!(backend = calls.name(), "Call lifecycle client ready");

    let (tx, _rx) = broadcast::channel(1);
    let shutdown_tx = tx.clone();

    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            return;
        }
        tracing::info!("Shutdown signal received");
        let _ = shutdown_tx.send(());
    });

    let state = Arc::new(HttpState { config, calls });
    http::start_http_server(state, tx.subscribe()).await?;

    Ok(())
}
