//! Blocking relay client
//!
//! Wire framing in both directions is a `u32` little-endian length followed
//! by that many payload bytes, bounded by
//! [`crate::constants::MAX_MESSAGE_LEN`]. A connection opens with one role
//! byte and a length-prefixed topic string, then carries frames one way.
//!
//! Cancellation: the transport has no cooperative cancel primitive, so the
//! controller shuts the socket down from outside the receiving thread. The
//! shared handle makes that safe — `close` is idempotent, acts on a
//! duplicated OS handle (the descriptor stays valid for any read in flight),
//! and a read that fails after `close` is reported as normal closure.

use bytes::Bytes;
use std::io::{Read, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::constants::MAX_MESSAGE_LEN;
use crate::error::TransportError;
use crate::transport::{Publish, Receive, ROLE_PUBLISH, ROLE_SUBSCRIBE};

fn connect_and_handshake(
    addr: impl ToSocketAddrs,
    role: u8,
    topic: &str,
) -> Result<TcpStream, TransportError> {
    let stream = TcpStream::connect(addr).map_err(|e| TransportError::Connect(e.to_string()))?;
    stream
        .set_nodelay(true)
        .map_err(|e| TransportError::Connect(e.to_string()))?;

    let topic = topic.as_bytes();
    if topic.is_empty() || topic.len() > u16::MAX as usize {
        return Err(TransportError::Handshake(format!(
            "bad topic length {}",
            topic.len()
        )));
    }

    let mut hello = Vec::with_capacity(3 + topic.len());
    hello.push(role);
    hello.extend_from_slice(&(topic.len() as u16).to_le_bytes());
    hello.extend_from_slice(topic);

    let mut stream_ref = &stream;
    stream_ref
        .write_all(&hello)
        .map_err(|e| TransportError::Handshake(e.to_string()))?;

    Ok(stream)
}

/// Publishing side of a relay connection
pub struct TcpPublisher {
    stream: TcpStream,
}

impl TcpPublisher {
    pub fn connect(addr: impl ToSocketAddrs, topic: &str) -> Result<Self, TransportError> {
        let stream = connect_and_handshake(addr, ROLE_PUBLISH, topic)?;
        tracing::info!("Publisher connected (topic: {topic})");
        Ok(Self { stream })
    }
}

impl Publish for TcpPublisher {
    fn publish(&mut self, message: &[u8]) -> Result<(), TransportError> {
        if message.len() > MAX_MESSAGE_LEN {
            return Err(TransportError::FrameTooLarge(message.len()));
        }
        let len = (message.len() as u32).to_le_bytes();
        self.stream
            .write_all(&len)
            .and_then(|_| self.stream.write_all(message))
            .map_err(|e| TransportError::Send(e.to_string()))
    }
}

/// State shared between a subscription and its handles
struct SubscriptionShared {
    stream: TcpStream,
    closed: AtomicBool,
}

/// Clonable controller-side handle; `close` may be called from any thread,
/// any number of times, including while a read is blocked on the socket.
#[derive(Clone)]
pub struct SubscriptionHandle {
    shared: Arc<SubscriptionShared>,
}

impl SubscriptionHandle {
    /// Force the subscription closed. The receiving side observes this as a
    /// normal end of stream.
    pub fn close(&self) {
        if !self.shared.closed.swap(true, Ordering::SeqCst) {
            // Shutdown, not close: the descriptor stays alive for any
            // in-flight read, which simply returns EOF or a reset.
            let _ = self.shared.stream.shutdown(Shutdown::Both);
        }
    }

    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::SeqCst)
    }
}

/// Subscribing side of a relay connection
pub struct Subscription {
    stream: TcpStream,
    shared: Arc<SubscriptionShared>,
}

impl Subscription {
    pub fn connect(addr: impl ToSocketAddrs, topic: &str) -> Result<Self, TransportError> {
        let stream = connect_and_handshake(addr, ROLE_SUBSCRIBE, topic)?;
        let control = stream
            .try_clone()
            .map_err(|e| TransportError::Connect(e.to_string()))?;
        tracing::info!("Subscribed (topic: {topic})");
        Ok(Self {
            stream,
            shared: Arc::new(SubscriptionShared {
                stream: control,
                closed: AtomicBool::new(false),
            }),
        })
    }

    /// Handle for cancelling this subscription from another thread
    pub fn handle(&self) -> SubscriptionHandle {
        SubscriptionHandle {
            shared: self.shared.clone(),
        }
    }

    fn read_message(&mut self) -> std::io::Result<Bytes> {
        let mut len = [0u8; 4];
        self.stream.read_exact(&mut len)?;
        let len = u32::from_le_bytes(len) as usize;
        if len > MAX_MESSAGE_LEN {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("frame of {len} bytes exceeds limit"),
            ));
        }
        let mut body = vec![0u8; len];
        self.stream.read_exact(&mut body)?;
        Ok(Bytes::from(body))
    }
}

impl Receive for Subscription {
    fn receive(&mut self) -> Result<Option<Bytes>, TransportError> {
        match self.read_message() {
            Ok(message) => Ok(Some(message)),
            // Clean EOF at a frame boundary: the remote closed the stream.
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Ok(None),
            Err(e) => {
                // A failure after close() was requested is the cancellation
                // path, not an error.
                if self.shared.closed.load(Ordering::SeqCst) {
                    Ok(None)
                } else {
                    Err(TransportError::Receive(e.to_string()))
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_close_unblocks_pending_read() {
        // A listener that accepts and then never writes keeps the
        // subscriber's read blocked until the handle is closed.
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let server = thread::spawn(move || {
            let (sock, _) = listener.accept().unwrap();
            thread::sleep(Duration::from_secs(1));
            drop(sock);
        });

        let mut sub = Subscription::connect(addr, "topic").unwrap();
        let handle = sub.handle();
        let closer = thread::spawn(move || {
            thread::sleep(Duration::from_millis(100));
            handle.close();
            handle.close(); // idempotent
        });

        // Blocked read resolves to normal closure, not an error.
        let outcome = sub.receive().unwrap();
        assert!(outcome.is_none());

        closer.join().unwrap();
        assert!(sub.handle().is_closed());
        drop(sub);
        server.join().unwrap();
    }

    #[test]
    fn test_oversized_frame_is_fatal() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let server = thread::spawn(move || {
            let (mut sock, _) = listener.accept().unwrap();
            let mut hello = [0u8; 8];
            let _ = sock.read(&mut hello);
            let bogus = (u32::MAX).to_le_bytes();
            sock.write_all(&bogus).unwrap();
            // Hold the socket open so the client sees bad framing, not EOF.
            thread::sleep(Duration::from_millis(500));
        });

        let mut sub = Subscription::connect(addr, "topic").unwrap();
        assert!(sub.receive().is_err());
        server.join().unwrap();
    }
}
