//! Frame accumulation
//!
//! Capture hardware delivers variable-length chunks; the codec wants exact
//! 10 ms frames. [`FrameAccumulator`] converts between the two. Whole frames
//! are served zero-copy out of the live chunk whenever possible; partial
//! leftovers go through a small rolling buffer that never holds more than one
//! incomplete frame.

/// Where an acquired frame's bytes live. `release` dispatches on this tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameSource {
    /// Borrowed directly from the chunk passed to `feed` (zero-copy)
    Live,
    /// Assembled in the accumulator's rolling buffer
    Rolling,
}

/// One acquirable frame: exactly `frame_len` contiguous bytes plus its source.
#[derive(Debug)]
pub struct Frame<'s> {
    pub bytes: &'s [u8],
    pub source: FrameSource,
}

/// Converts a sequence of variable-length chunks into fixed-size frames.
///
/// Frames are only ever emitted at exact boundaries. The rolling buffer holds
/// the not-yet-frame-aligned tail of previous chunks; once drained frames are
/// released its logical size stays below one frame length, which bounds memory
/// under bursty input.
pub struct FrameAccumulator {
    frame_len: usize,
    rolling: Vec<u8>,
}

impl FrameAccumulator {
    /// `frame_len` is the exact byte size of every emitted frame.
    pub fn new(frame_len: usize) -> Self {
        assert!(frame_len > 0, "frame length must be non-zero");
        Self {
            frame_len,
            rolling: Vec::with_capacity(frame_len),
        }
    }

    pub fn frame_len(&self) -> usize {
        self.frame_len
    }

    /// Bytes currently parked in the rolling buffer
    pub fn pending_len(&self) -> usize {
        self.rolling.len()
    }

    /// Register `chunk` as the current live source. The returned session
    /// borrows the accumulator exclusively, so a second chunk cannot be fed
    /// until this one has been fully drained; dropping the session moves any
    /// unconsumed live bytes into the rolling buffer before the chunk memory
    /// goes away.
    pub fn feed<'a>(&'a mut self, chunk: &'a [u8]) -> ChunkSession<'a> {
        ChunkSession {
            acc: self,
            chunk,
            cursor: 0,
        }
    }

    /// Take the sub-frame tail at end of stream. The accumulator is empty
    /// afterwards.
    pub fn take_remainder(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.rolling)
    }
}

/// Exclusive access to the accumulator while one live chunk is registered.
pub struct ChunkSession<'a> {
    acc: &'a mut FrameAccumulator,
    chunk: &'a [u8],
    cursor: usize,
}

impl<'a> ChunkSession<'a> {
    /// Returns the next full frame if one is available, in priority order:
    /// a frame already complete in the rolling buffer, then the rolling
    /// buffer topped up from the live chunk, then the live chunk directly.
    pub fn try_acquire(&mut self) -> Option<Frame<'_>> {
        let frame_len = self.acc.frame_len;
        let remaining = self.chunk.len() - self.cursor;

        // Frame already assembled from earlier chunks.
        if self.acc.rolling.len() >= frame_len {
            return Some(Frame {
                bytes: &self.acc.rolling[..frame_len],
                source: FrameSource::Rolling,
            });
        }

        // A partial frame is parked: it must be completed (or nothing is
        // returned) so that output stays in capture order.
        if !self.acc.rolling.is_empty() {
            if self.acc.rolling.len() + remaining >= frame_len {
                let need = frame_len - self.acc.rolling.len();
                self.acc
                    .rolling
                    .extend_from_slice(&self.chunk[self.cursor..self.cursor + need]);
                self.cursor += need;
                return Some(Frame {
                    bytes: &self.acc.rolling[..frame_len],
                    source: FrameSource::Rolling,
                });
            }
            return None;
        }

        // Rolling buffer empty: serve straight from the live chunk.
        if remaining >= frame_len {
            return Some(Frame {
                bytes: &self.chunk[self.cursor..self.cursor + frame_len],
                source: FrameSource::Live,
            });
        }

        None
    }

    /// Return `len` consumed bytes of an acquired frame. Rolling frames
    /// compact the buffer in place; live frames advance the read cursor.
    pub fn release(&mut self, source: FrameSource, len: usize) {
        match source {
            FrameSource::Rolling => {
                debug_assert!(len <= self.acc.rolling.len());
                self.acc.rolling.drain(..len);
            }
            FrameSource::Live => {
                debug_assert!(self.cursor + len <= self.chunk.len());
                self.cursor += len;
            }
        }
    }

    /// Bytes of the live chunk not yet consumed
    pub fn live_remaining(&self) -> usize {
        self.chunk.len() - self.cursor
    }

    /// End the session, draining unconsumed live bytes into the rolling
    /// buffer. Equivalent to dropping the session; spelled out at call sites
    /// where the hand-off matters.
    pub fn finish(self) {}
}

impl Drop for ChunkSession<'_> {
    fn drop(&mut self) {
        let rest = &self.chunk[self.cursor..];
        if !rest.is_empty() {
            self.acc.rolling.extend_from_slice(rest);
            self.cursor = self.chunk.len();
        }
    }
}
