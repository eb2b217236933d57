//! Topic-based pub/sub transport
//!
//! Delivery is best-effort with no ordering guarantee: the relay fans each
//! published message out to whoever is subscribed at that moment, and slow
//! subscribers lose messages rather than stalling the stream. The pipelines
//! talk to the transport only through the [`Publish`] and [`Receive`] seams,
//! which is also how the offline file format and the tests stand in for it.

pub mod client;
pub mod relay;

pub use client::{Subscription, SubscriptionHandle, TcpPublisher};

use bytes::Bytes;

use crate::error::TransportError;

/// Sender side of the transport seam
pub trait Publish {
    /// Best-effort publish of one message. An error is reported, never
    /// retried.
    fn publish(&mut self, message: &[u8]) -> Result<(), TransportError>;
}

/// Receiver side of the transport seam
pub trait Receive {
    /// Block until the next message. `Ok(None)` means the channel is closed
    /// (remote end gone or cancelled locally) and is a normal termination.
    fn receive(&mut self) -> Result<Option<Bytes>, TransportError>;
}

/// Role bytes exchanged at connection time
pub(crate) const ROLE_PUBLISH: u8 = 0x01;
pub(crate) const ROLE_SUBSCRIBE: u8 = 0x02;
