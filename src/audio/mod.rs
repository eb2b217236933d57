//! Audio subsystem module

pub mod buffer;
pub mod capture;
pub mod format;
pub mod frame;
pub mod resample;

pub use buffer::{create_shared_queue, CaptureBlock, ChunkQueue, SharedChunkQueue};
pub use capture::CaptureStream;
pub use format::{SampleFormat, StreamFormat};
pub use frame::{FrameAccumulator, FrameSource};
pub use resample::RateAdapter;
