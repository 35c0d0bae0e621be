//! Serialized frame dump format.
//!
//! One record per frame, all integers little-endian:
//!
//! ```text
//! u8  picture type (0 = I, 1 = P, 2 = B)
//! u16 pixel width
//! u16 pixel height
//! u8  motion subsample log2
//! u8  flags (1 = quarter-pixel, 2 = unpadded motion rows)
//! u32 * mb_width * mb_height   macroblock type bitmasks, row-major
//! u8  has motion data
//! then per prediction direction (forward, backward):
//! u32 sample count, followed by that many (i16, i16) raw vector pairs
//! ```
//!
//! A clean EOF at a record boundary is end of stream; EOF inside a record is
//! a parse error.

use mvgrid::prelude::v1::*;
use std::io::{ErrorKind, Read, Write};

const FLAG_QPEL: u8 = 1;
const FLAG_UNPADDED: u8 = 2;

/// Frame source reading serialized frame dumps.
pub struct MbfSource<T> {
    reader: T,
}

impl<T> MbfSource<T> {
    pub fn new(reader: T) -> Self {
        Self { reader }
    }
}

impl<T: Read> FrameSource for MbfSource<T> {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        read_frame(&mut self.reader)
    }
}

fn read_array<const N: usize>(reader: &mut impl Read) -> Result<[u8; N]> {
    let mut data = [0u8; N];
    reader.read_exact(&mut data)?;
    Ok(data)
}

/// Read one serialized frame, or `None` on a clean end of stream.
pub fn read_frame(reader: &mut impl Read) -> Result<Option<Frame>> {
    let mut tag = [0u8; 1];
    match reader.read_exact(&mut tag) {
        Err(e) if e.kind() == ErrorKind::UnexpectedEof => return Ok(None),
        r => r?,
    }

    let pict_type = match tag[0] {
        0 => PictureType::I,
        1 => PictureType::P,
        2 => PictureType::B,
        t => return Err(anyhow!("invalid picture type {}", t)),
    };

    let width = u16::from_le_bytes(read_array(reader)?) as usize;
    let height = u16::from_le_bytes(read_array(reader)?) as usize;
    let subsample = u8::from_le_bytes(read_array(reader)?) as u32;
    let flags = u8::from_le_bytes(read_array(reader)?);

    if width == 0 || height == 0 || !(1..=4).contains(&subsample) {
        return Err(anyhow!("invalid frame geometry {}x{}", width, height));
    }

    let mut frame = Frame::new(
        pict_type,
        width,
        height,
        subsample,
        flags & FLAG_QPEL != 0,
        flags & FLAG_UNPADDED == 0,
    );

    for mb_y in 0..frame.mb_height() {
        for mb_x in 0..frame.mb_width() {
            let bits = u32::from_le_bytes(read_array(reader)?);
            frame.set_mb_type(mb_x, mb_y, bits);
        }
    }

    if u8::from_le_bytes(read_array(reader)?) != 0 {
        frame.alloc_motion();
        for direction in 0..2 {
            let count = u32::from_le_bytes(read_array(reader)?) as usize;
            if count != frame.motion_samples() {
                return Err(anyhow!(
                    "motion grid length {} does not match geometry ({})",
                    count,
                    frame.motion_samples()
                ));
            }
            for index in 0..count {
                let dx = i16::from_le_bytes(read_array(reader)?);
                let dy = i16::from_le_bytes(read_array(reader)?);
                frame.set_motion_sample(direction, index, RawMotion::new(dx, dy));
            }
        }
    }

    Ok(Some(frame))
}

/// Serialize one frame in the record layout `read_frame` parses.
pub fn write_frame(writer: &mut impl Write, frame: &Frame) -> Result<()> {
    let tag: u8 = match frame.pict_type() {
        PictureType::I => 0,
        PictureType::P => 1,
        PictureType::B => 2,
    };
    writer.write_all(&[tag])?;
    writer.write_all(&((frame.mb_width() * 16) as u16).to_le_bytes())?;
    writer.write_all(&((frame.mb_height() * 16) as u16).to_le_bytes())?;
    writer.write_all(&[frame.motion_subsample_log2() as u8])?;

    let mut flags = 0u8;
    if frame.quarter_pixel() {
        flags |= FLAG_QPEL;
    }
    if !frame.padded_mv_rows() {
        flags |= FLAG_UNPADDED;
    }
    writer.write_all(&[flags])?;

    for mb_y in 0..frame.mb_height() {
        for mb_x in 0..frame.mb_width() {
            writer.write_all(&frame.mb_type_at(mb_x, mb_y).to_le_bytes())?;
        }
    }

    if let Some(grids) = frame.motion_grids() {
        writer.write_all(&[1])?;
        for grid in grids {
            writer.write_all(&(grid.len() as u32).to_le_bytes())?;
            for raw in grid {
                writer.write_all(&raw.x.to_le_bytes())?;
                writer.write_all(&raw.y.to_le_bytes())?;
            }
        }
    } else {
        writer.write_all(&[0])?;
    }

    Ok(())
}
