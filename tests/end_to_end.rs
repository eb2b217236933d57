//! Full-stack tests: sender session -> relay -> receiver pipeline over real
//! sockets, including the controller's forced-close cancellation.

use std::net::SocketAddr;
use std::thread;
use std::time::Duration;

use opuscast::audio::format::{i16_to_bytes, SampleFormat, StreamFormat};
use opuscast::pipeline::{MemorySink, ReceiverController, SenderSession};
use opuscast::transport::{relay, Subscription, TcpPublisher};
use tokio::net::TcpListener;

fn spawn_relay() -> SocketAddr {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();
    let listener = runtime.block_on(async { TcpListener::bind("127.0.0.1:0").await.unwrap() });
    let addr = listener.local_addr().unwrap();
    thread::spawn(move || {
        runtime.block_on(async {
            let _ = relay::serve(listener).await;
        });
    });
    addr
}

/// 20 ms of a quiet tone at 48 kHz mono, as capture bytes.
fn tone_chunk(step: u32) -> Vec<u8> {
    let samples: Vec<i16> = (0..960)
        .map(|i| {
            let t = (step * 960 + i) as f32 / 48000.0;
            ((t * 330.0 * 2.0 * std::f32::consts::PI).sin() * 6000.0) as i16
        })
        .collect();
    i16_to_bytes(&samples)
}

#[test]
fn test_stream_reaches_receiver_and_cancels_cleanly() {
    let addr = spawn_relay();

    let subscription = Subscription::connect(addr, "e2e").unwrap();
    let controller = ReceiverController::spawn(subscription, MemorySink::default()).unwrap();
    // Let the relay register the subscription before anything is published.
    thread::sleep(Duration::from_millis(150));

    let mut publisher = TcpPublisher::connect(addr, "e2e").unwrap();
    let format = StreamFormat::new(48000, 1, SampleFormat::I16);
    let mut session = SenderSession::new(format).unwrap();

    // Half a second of audio in 20 ms chunks: 50 packets.
    for step in 0..25 {
        session.ingest(&tone_chunk(step), &mut publisher).unwrap();
    }
    session.finish(&mut publisher).unwrap();
    assert_eq!(session.stats().packets_published, 50);

    // Give the relay time to drain, then cancel: the blocked read must
    // resolve to a normal close, not an error.
    thread::sleep(Duration::from_millis(300));
    let (stats, sink) = controller.stop().unwrap();

    assert_eq!(stats.packets_received, 50);
    assert_eq!(stats.frames_decoded, 50);
    assert_eq!(stats.frames_concealed, 0);
    assert_eq!(sink.sample_rate, 48000);
    assert_eq!(sink.channels, 1);
    assert_eq!(sink.samples.len(), 50 * 480);
}

#[test]
fn test_receiver_joins_mid_stream() {
    let addr = spawn_relay();

    let mut publisher = TcpPublisher::connect(addr, "midstream").unwrap();
    let format = StreamFormat::new(48000, 1, SampleFormat::I16);
    let mut session = SenderSession::new(format).unwrap();

    // First 20 frames go out with nobody listening.
    for step in 0..10 {
        session.ingest(&tone_chunk(step), &mut publisher).unwrap();
    }
    // Let the relay drain (and drop) the unheard frames before anyone joins.
    thread::sleep(Duration::from_millis(300));

    let subscription = Subscription::connect(addr, "midstream").unwrap();
    let controller = ReceiverController::spawn(subscription, MemorySink::default()).unwrap();
    thread::sleep(Duration::from_millis(150));

    // 30 more frames, indices 21..=50. Every packet is self-describing, so
    // the late joiner decodes without any handshake.
    for step in 10..25 {
        session.ingest(&tone_chunk(step), &mut publisher).unwrap();
    }
    session.finish(&mut publisher).unwrap();

    thread::sleep(Duration::from_millis(300));
    let (stats, sink) = controller.stop().unwrap();

    assert_eq!(stats.packets_received, 30);
    assert_eq!(stats.frames_decoded, 30);
    // Frames missed before joining are not a gap to conceal; the session
    // starts at the first index it sees.
    assert_eq!(stats.frames_concealed, 0);
    assert_eq!(sink.samples.len(), 30 * 480);
}

#[test]
fn test_publish_without_subscribers_succeeds() {
    let addr = spawn_relay();

    let mut publisher = TcpPublisher::connect(addr, "void").unwrap();
    let format = StreamFormat::new(48000, 1, SampleFormat::I16);
    let mut session = SenderSession::new(format).unwrap();

    session.ingest(&tone_chunk(0), &mut publisher).unwrap();
    let stats = session.stats();
    assert_eq!(stats.packets_published, 2);
    assert_eq!(stats.publish_failures, 0);
}
