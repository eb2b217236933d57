//! Lock-free hand-off between the capture callback and the sender loop
//!
//! The capture callback runs on the audio backend's thread and must never
//! block; it pushes raw byte blocks into an SPSC-style queue that the sender
//! loop drains at its own pace.

use crossbeam::queue::ArrayQueue;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// One capture callback's worth of raw little-endian sample bytes.
///
/// Owned copy of the device buffer: the hardware view is only valid inside
/// the callback, so the bytes cross threads by value.
pub struct CaptureBlock {
    pub bytes: Vec<u8>,
}

impl CaptureBlock {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Bounded queue of capture blocks with overflow accounting
pub struct ChunkQueue {
    queue: ArrayQueue<CaptureBlock>,
    overflow_count: AtomicUsize,
    blocks_queued: AtomicUsize,
}

impl ChunkQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            queue: ArrayQueue::new(capacity),
            overflow_count: AtomicUsize::new(0),
            blocks_queued: AtomicUsize::new(0),
        }
    }

    /// Push a block from the capture callback.
    /// Returns false if the consumer has fallen behind (block dropped).
    pub fn push(&self, block: CaptureBlock) -> bool {
        match self.queue.push(block) {
            Ok(()) => {
                self.blocks_queued.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(_) => {
                self.overflow_count.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }

    /// Pop the next block, if any
    pub fn pop(&self) -> Option<CaptureBlock> {
        self.queue.pop()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Blocks dropped because the queue was full
    pub fn overflow_count(&self) -> usize {
        self.overflow_count.load(Ordering::Relaxed)
    }

    /// Blocks accepted since creation
    pub fn blocks_queued(&self) -> usize {
        self.blocks_queued.load(Ordering::Relaxed)
    }
}

/// Thread-safe handle to a chunk queue
pub type SharedChunkQueue = Arc<ChunkQueue>;

/// Create a new shared chunk queue
pub fn create_shared_queue(capacity: usize) -> SharedChunkQueue {
    Arc::new(ChunkQueue::new(capacity))
}
