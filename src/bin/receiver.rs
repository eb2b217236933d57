//! Audio Receiver Application
//!
//! Subscribes to the relay topic, decodes incoming packets (concealing
//! losses), and writes the reconstructed stream to a WAV file. Transport
//! closure — the controller's timeout or the remote going away — is a
//! normal, zero-exit termination.

use anyhow::Result;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use opuscast::{
    config::AppConfig,
    pipeline::{ReceiverController, WavSink},
    transport::Subscription,
};

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting audio receiver");

    // Defaults, then config file, then positional overrides:
    //   receiver [relay_addr] [topic] [output.wav] [duration_secs]
    let mut config = match std::env::var("OPUSCAST_CONFIG") {
        Ok(path) => AppConfig::from_path(path)?,
        Err(_) => AppConfig::default(),
    };
    let mut args = std::env::args().skip(1);
    if let Some(addr) = args.next() {
        config.relay.address = addr;
    }
    if let Some(topic) = args.next() {
        config.relay.topic = topic;
    }
    if let Some(path) = args.next() {
        config.session.output_path = path.into();
    }
    if let Some(duration) = args.next() {
        config.session.receive_duration_secs = duration.parse()?;
    }

    let subscription =
        Subscription::connect(&config.relay.address[..], &config.relay.topic)?;
    let sink = WavSink::create(&config.session.output_path);

    tracing::info!(
        "Listening on {} (topic '{}') for {} s, writing {}",
        config.relay.address,
        config.relay.topic,
        config.session.receive_duration_secs,
        config.session.output_path.display()
    );

    // The receive loop blocks on its own thread; after the timeout the
    // controller forces the subscription closed, which the loop observes as
    // a normal end of stream.
    let controller = ReceiverController::spawn(subscription, sink)?;
    let (stats, _sink) = controller.run_for(Duration::from_secs(
        config.session.receive_duration_secs,
    ))?;

    tracing::info!(
        "Received {} packets, decoded {}, concealed {}, {} decode failures",
        stats.packets_received,
        stats.frames_decoded,
        stats.frames_concealed,
        stats.decode_failures
    );
    Ok(())
}
