//! # Deterministic text reporter
//!
//! Serializes extracted frames one block at a time. The grouping mirrors the
//! extraction order exactly: vectors per macroblock, a `--` line after every
//! macroblock, a `====` line after every macroblock row.

use crate::extract::FrameMotion;
use anyhow::Result;
use std::io::Write;

/// Sentinel printed when no vector applies to a partition.
///
/// Kept for output compatibility; internally the case is an explicit `None`.
pub const NO_MV: i32 = 10000;

/// Writes frame blocks to an output stream.
pub struct Reporter<W> {
    writer: W,
}

impl<W: Write> Reporter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Recover the underlying writer, e.g. to flush it.
    pub fn into_inner(self) -> W {
        self.writer
    }

    /// Write one frame block.
    ///
    /// # Arguments
    ///
    /// * `index` - decode-order frame number.
    /// * `motion` - the frame's extracted vector sequence.
    pub fn write_frame(&mut self, index: usize, motion: &FrameMotion) -> Result<()> {
        writeln!(
            self.writer,
            "frame {}, {} x {}",
            index, motion.mb_height, motion.mb_width
        )?;

        for row in motion.rows() {
            for mb in row {
                for vector in &mb.vectors {
                    let (dx, dy) = match vector {
                        Some(v) => (v.x, v.y),
                        None => (NO_MV, NO_MV),
                    };
                    writeln!(self.writer, "{} {} ; {} {}", mb.mb_x, mb.mb_y, dx, dy)?;
                }
                writeln!(self.writer, "--")?;
            }
            writeln!(self.writer, "====")?;
        }

        Ok(())
    }
}
