//! # Frame source boundary
//!
//! Decoding lives behind this trait: container demuxing, bitstream decoding
//! and frame reconstruction are an external collaborator's job. The library
//! only requires that produced frames arrive with their macroblock-type and
//! motion-vector grids populated.

use crate::frame::Frame;
use anyhow::Result;

/// Producer of decoded frames, one per call, in decode order.
///
/// Opening the underlying stream is each implementation's constructor;
/// closing it is `Drop`. Implementations own whatever per-stream cursor
/// state the decode loop needs - none of it is shared or process-wide.
pub trait FrameSource {
    /// Produce the next decoded frame.
    ///
    /// Blocks until one full frame is available. Returns `Ok(Some(frame))`
    /// for a decoded frame, `Ok(None)` once the stream is exhausted, and
    /// `Err` when decoding fails. End of stream is an expected outcome, not
    /// an error, and the two are never conflated.
    fn next_frame(&mut self) -> Result<Option<Frame>>;
}
