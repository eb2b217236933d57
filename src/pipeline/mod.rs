//! Sender and receiver pipelines
//!
//! The sender loop is single-threaded and sleep-paced; the receiver's
//! blocking read loop runs on a dedicated thread and is cancelled from the
//! outside by closing the subscription handle.

pub mod receiver;
pub mod sender;

pub use receiver::{
    MemorySink, PcmSink, ReceiverController, ReceiverPipeline, ReceiverStats, WavSink,
};
pub use sender::{SenderPipeline, SenderSession, SenderStats};
