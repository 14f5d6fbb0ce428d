//! Flocktrack server binary.
//!
//! Configuration comes from environment variables:
//!
//! - `FLOCKTRACK_PORT`: listen port (default 3000)
//! - `FLOCKTRACK_DATA_DIR`: directory for the JSON stores (default `data`)
//! - `RUST_LOG`: tracing filter, on top of a `flocktrack=info` baseline

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use flocktrack::api::router;
use flocktrack::service::FarmService;

/// Default port if not specified via environment variable.
const DEFAULT_PORT: u16 = 3000;

/// Default data directory if not specified via environment variable.
const DEFAULT_DATA_DIR: &str = "data";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive("flocktrack=info".parse()?))
        .init();

    let port: u16 = env::var("FLOCKTRACK_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(DEFAULT_PORT);

    let data_dir: PathBuf = env::var("FLOCKTRACK_DATA_DIR")
        .unwrap_or_else(|_| DEFAULT_DATA_DIR.to_string())
        .into();

    info!(port, data_dir = %data_dir.display(), "Starting Flocktrack server");

    let service = FarmService::open(&data_dir)?;
    info!("Stores loaded");

    let app = router(service);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;

    info!(%addr, "Flocktrack is listening");

    axum::serve(listener, app).await?;

    Ok(())
}
