/*!
 * AMBIENT BRIDGE - entrypoint
 *
 * ROLE: bootstrap of the translation pipeline: config, catalog, MQTT,
 * InfluxDB writer, then the HTTP listener the weather station posts to.
 * Anything failing before the listener is up stops the process.
 */

mod catalog;
mod config;
mod discovery;
mod error;
mod fields;
mod http;
mod influx;
mod ingest;
mod mqtt;
mod state;
mod topics;

use crate::catalog::ComponentCatalog;
use crate::config::load_config;
use crate::state::AppContext;

use anyhow::{Context, Result};
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "ambient-bridge", version, about = "Weather station reports to MQTT, Home Assistant and InfluxDB")]
struct Args {
    /// TOML configuration file
    #[arg(short, long, env = "AMBIENT_BRIDGE_CONFIG")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    // .env is optional
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("ambient_bridge=info")),
        )
        .init();

    let args = Args::parse();

    let cfg = load_config(&args.config)
        .await
        .with_context(|| format!("loading {}", args.config.display()))?;
    let catalog = ComponentCatalog::bundled().context("loading bundled component catalog")?;
    info!("loaded {} catalog components", catalog.len());

    let publisher = mqtt::connect(&cfg.mqtt).await.context("connecting to MQTT broker")?;

    if cfg.hass.discovery {
        info!("Home Assistant discovery enabled (prefix {})", cfg.hass.discovery_prefix);
    }
    match &cfg.influx {
        Some(influx) => info!("writing points to InfluxDB {}:{}/{}", influx.hostname, influx.port, influx.database),
        None => info!("no [influx] section, time-series storage disabled"),
    }

    let addr = SocketAddr::from(([0, 0, 0, 0], cfg.http.port));
    let ctx = AppContext::new(cfg, catalog, publisher).shared();
    let app = http::build_router(ctx);

    let listener = TcpListener::bind(addr).await.with_context(|| format!("binding {addr}"))?;
    info!("listening for inbound Ambient Weather HTTP requests on {addr}");
    axum::serve(listener, app).await.context("HTTP server stopped")?;
    Ok(())
}
