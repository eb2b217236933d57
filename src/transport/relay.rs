//! Topic fan-out relay
//!
//! A minimal broker so the system needs no external message service: accepts
//! publisher and subscriber connections, forwards every published message to
//! the topic's current subscribers. Delivery is best-effort — a subscriber
//! that cannot keep up is skipped ahead, losing the lagged messages, which is
//! exactly the delivery contract the pipelines are built to tolerate.

use bytes::Bytes;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;

use crate::constants::MAX_MESSAGE_LEN;
use crate::transport::{ROLE_PUBLISH, ROLE_SUBSCRIBE};

/// Messages buffered per topic before laggards start losing them
const TOPIC_BUFFER: usize = 256;

type TopicMap = Arc<DashMap<String, broadcast::Sender<Bytes>>>;

/// Accept loop. Runs until the listener errors.
pub async fn serve(listener: TcpListener) -> std::io::Result<()> {
    let topics: TopicMap = Arc::new(DashMap::new());
    tracing::info!("Relay listening on {}", listener.local_addr()?);

    loop {
        let (socket, peer) = listener.accept().await?;
        let topics = topics.clone();
        tokio::spawn(async move {
            if let Err(e) = handle_client(socket, topics).await {
                tracing::debug!("Client {peer} disconnected: {e}");
            }
        });
    }
}

fn topic_channel(topics: &TopicMap, topic: &str) -> broadcast::Sender<Bytes> {
    topics
        .entry(topic.to_string())
        .or_insert_with(|| broadcast::channel(TOPIC_BUFFER).0)
        .clone()
}

async fn handle_client(mut socket: TcpStream, topics: TopicMap) -> std::io::Result<()> {
    socket.set_nodelay(true)?;

    let role = socket.read_u8().await?;
    let topic_len = socket.read_u16_le().await? as usize;
    let mut topic = vec![0u8; topic_len];
    socket.read_exact(&mut topic).await?;
    let topic = String::from_utf8(topic)
        .map_err(|_| std::io::Error::new(std::io::ErrorKind::InvalidData, "non-utf8 topic"))?;

    match role {
        ROLE_PUBLISH => run_publisher(socket, topic_channel(&topics, &topic), topic).await,
        ROLE_SUBSCRIBE => run_subscriber(socket, topic_channel(&topics, &topic), topic).await,
        other => Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("unknown role byte {other:#04x}"),
        )),
    }
}

async fn run_publisher(
    mut socket: TcpStream,
    tx: broadcast::Sender<Bytes>,
    topic: String,
) -> std::io::Result<()> {
    tracing::info!("Publisher joined topic '{topic}'");
    loop {
        let len = match socket.read_u32_le().await {
            Ok(len) => len as usize,
            // Publisher hung up between frames.
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(()),
            Err(e) => return Err(e),
        };
        if len > MAX_MESSAGE_LEN {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("frame of {len} bytes exceeds limit"),
            ));
        }
        let mut body = vec![0u8; len];
        socket.read_exact(&mut body).await?;
        // No subscribers is not an error; the message just goes nowhere.
        let _ = tx.send(Bytes::from(body));
    }
}

async fn run_subscriber(
    mut socket: TcpStream,
    tx: broadcast::Sender<Bytes>,
    topic: String,
) -> std::io::Result<()> {
    tracing::info!("Subscriber joined topic '{topic}'");
    let mut rx = tx.subscribe();
    loop {
        match rx.recv().await {
            Ok(message) => {
                socket.write_u32_le(message.len() as u32).await?;
                socket.write_all(&message).await?;
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!("Subscriber on '{topic}' lagged, dropped {skipped} messages");
            }
            Err(broadcast::error::RecvError::Closed) => return Ok(()),
        }
    }
}
