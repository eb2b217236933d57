//! Relay Application
//!
//! Standalone topic fan-out broker: publishers push framed messages, every
//! current subscriber of the topic gets a copy, best-effort.

use anyhow::Result;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use opuscast::constants::DEFAULT_RELAY_PORT;
use opuscast::transport::relay;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let bind = std::env::args()
        .nth(1)
        .unwrap_or_else(|| format!("0.0.0.0:{DEFAULT_RELAY_PORT}"));

    let listener = TcpListener::bind(&bind).await?;
    relay::serve(listener).await?;
    Ok(())
}
