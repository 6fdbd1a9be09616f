//! # Switchboard Gateway Binary
//!
//! Serves the OpenAI-compatible surface over the smart router.
//!
//! ```bash
//! # Default configuration file (config.toml)
//! switchboard-gateway
//!
//! # Custom configuration, host and port
//! switchboard-gateway --config gateway.toml --host 0.0.0.0 --port 8080
//!
//! # Verbose logging
//! switchboard-gateway --log-level debug
//! ```
//!
//! Environment overrides: `GATEWAY_HOST`, `GATEWAY_PORT`,
//! `GATEWAY_TIMEOUT`, `GATEWAY_LOG_LEVEL`.

use clap::Parser;
use std::net::SocketAddr;
use switchboard_gateway::{config::Config, server::create_server};

/// Command line arguments for the gateway server.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Port for the HTTP server.
    #[arg(short, long, default_value_t = 3000)]
    port: u16,

    /// Host address to bind.
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Logging level: trace, debug, info, warn, error.
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(&args.log_level)
        .init();

    let config = if std::path::Path::new(&args.config).exists() {
        Config::load(&args.config)?
    } else {
        tracing::warn!(
            path = %args.config,
            "configuration file not found; starting with defaults and no providers"
        );
        Config::default()
    };
    config.validate()?;

    let app = create_server(config).await?;

    let addr = SocketAddr::new(args.host.parse()?, args.port);
    tracing::info!("starting switchboard gateway on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
