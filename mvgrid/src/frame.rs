//! # Decoded frame model
//!
//! A [`Frame`] carries the macroblock-type and motion-vector grids a decoder
//! populates for one picture. Grid geometry follows the usual conventions of
//! block-based codecs: the macroblock grid has one padding column, and the
//! motion grid is finer-grained by `4 - motion_subsample_log2` bits per axis.

use nalgebra as na;

/// Raw stored motion vector sample, in sub-pixel units.
pub type RawMotion = na::Vector2<i16>;

/// Picture coding type of a decoded frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PictureType {
    /// Intra-coded.
    I,
    /// Predicted from one reference list.
    P,
    /// Bidirectionally predicted.
    B,
}

// Macroblock type bitmask layout, matching the libavcodec convention.
pub const MB_TYPE_16X16: u32 = 0x0008;
pub const MB_TYPE_16X8: u32 = 0x0010;
pub const MB_TYPE_8X16: u32 = 0x0020;
pub const MB_TYPE_8X8: u32 = 0x0040;
pub const MB_TYPE_INTERLACED: u32 = 0x0080;
pub const MB_TYPE_P0L0: u32 = 0x1000;
pub const MB_TYPE_P1L0: u32 = 0x2000;
pub const MB_TYPE_P0L1: u32 = 0x4000;
pub const MB_TYPE_P1L1: u32 = 0x8000;

/// Macroblock partition shape.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Partition {
    /// Single 16x16 partition.
    Whole,
    /// Two stacked 16x8 halves.
    TopBottom,
    /// Two side-by-side 8x16 halves.
    LeftRight,
    /// Four 8x8 quarters.
    Quad,
}

impl Partition {
    /// Number of sub-partitions the shape implies.
    pub fn count(self) -> usize {
        match self {
            Partition::Whole => 1,
            Partition::TopBottom | Partition::LeftRight => 2,
            Partition::Quad => 4,
        }
    }
}

/// Per-macroblock metadata, decoded out of the type bitmask once rather than
/// re-tested bit by bit at each use site.
#[derive(Clone, Copy, Debug)]
pub struct MacroblockType {
    pub partition: Partition,
    pub interlaced: bool,
    /// Whether the forward (0) and backward (1) reference lists are used.
    pub uses_list: [bool; 2],
}

impl MacroblockType {
    /// Decode a type bitmask.
    ///
    /// A bitmask with no recognized shape bit decodes to [`Partition::Whole`].
    /// It is unclear whether that case is reachable for conforming streams,
    /// so it stays a fallback rather than an error.
    pub fn from_bits(bits: u32) -> Self {
        let partition = if bits & MB_TYPE_8X8 != 0 {
            Partition::Quad
        } else if bits & MB_TYPE_16X8 != 0 {
            Partition::TopBottom
        } else if bits & MB_TYPE_8X16 != 0 {
            Partition::LeftRight
        } else {
            Partition::Whole
        };

        Self {
            partition,
            interlaced: bits & MB_TYPE_INTERLACED != 0,
            uses_list: [
                bits & (MB_TYPE_P0L0 | MB_TYPE_P1L0) != 0,
                bits & (MB_TYPE_P0L1 | MB_TYPE_P1L1) != 0,
            ],
        }
    }
}

/// One decoded frame's macroblock metadata.
///
/// Produced once per decode step by a [`crate::decoder::FrameSource`],
/// consumed whole by [`crate::extract::extract`], then discarded. Immutable
/// once handed over; no state is carried across frames.
pub struct Frame {
    pict_type: PictureType,
    mb_width: usize,
    mb_height: usize,
    mb_stride: usize,
    motion_subsample_log2: u32,
    mv_stride: usize,
    quarter_pixel: bool,
    mb_type: Vec<u32>,
    motion_val: Option<[Vec<RawMotion>; 2]>,
}

impl Frame {
    /// Create a frame with zeroed macroblock metadata and no motion data.
    ///
    /// # Arguments
    ///
    /// * `pict_type` - picture coding type.
    /// * `width`, `height` - pixel dimensions, rounded up here to whole
    ///   macroblocks.
    /// * `motion_subsample_log2` - log2 of the motion sample spacing in pixels
    ///   (3 for 8px MPEG-style grids, 2 for 4px H.264-style grids).
    /// * `quarter_pixel` - whether vector components are stored at
    ///   quarter-pixel precision.
    /// * `padded_mv_rows` - whether motion rows carry one extra padding sample
    ///   (false for the H.264 family, true otherwise).
    pub fn new(
        pict_type: PictureType,
        width: usize,
        height: usize,
        motion_subsample_log2: u32,
        quarter_pixel: bool,
        padded_mv_rows: bool,
    ) -> Self {
        assert!(width > 0 && height > 0, "empty frame");
        assert!(
            (1..=4).contains(&motion_subsample_log2),
            "invalid motion subsampling {}",
            motion_subsample_log2
        );

        let mb_width = (width + 15) / 16;
        let mb_height = (height + 15) / 16;
        let mb_stride = mb_width + 1;
        let mv_sample_log2 = 4 - motion_subsample_log2;
        let mv_stride = (mb_width << mv_sample_log2) + usize::from(padded_mv_rows);

        Self {
            pict_type,
            mb_width,
            mb_height,
            mb_stride,
            motion_subsample_log2,
            mv_stride,
            quarter_pixel,
            mb_type: vec![0; mb_stride * mb_height],
            motion_val: None,
        }
    }

    pub fn pict_type(&self) -> PictureType {
        self.pict_type
    }

    /// Macroblock grid width.
    pub fn mb_width(&self) -> usize {
        self.mb_width
    }

    /// Macroblock grid height.
    pub fn mb_height(&self) -> usize {
        self.mb_height
    }

    pub fn motion_subsample_log2(&self) -> u32 {
        self.motion_subsample_log2
    }

    /// Shift turning macroblock coordinates into motion sample coordinates.
    pub fn mv_sample_log2(&self) -> u32 {
        4 - self.motion_subsample_log2
    }

    pub fn mv_stride(&self) -> usize {
        self.mv_stride
    }

    /// Whether motion rows carry the extra padding sample.
    pub fn padded_mv_rows(&self) -> bool {
        self.mv_stride != self.mb_width << self.mv_sample_log2()
    }

    pub fn quarter_pixel(&self) -> bool {
        self.quarter_pixel
    }

    /// Arithmetic shift scaling raw components to output units.
    pub fn shift(&self) -> u32 {
        1 + u32::from(self.quarter_pixel)
    }

    /// Motion sample layout used by the addressing arithmetic.
    pub fn sample_layout(&self) -> crate::geometry::SampleLayout {
        crate::geometry::SampleLayout {
            mv_stride: self.mv_stride,
            mv_sample_log2: self.mv_sample_log2(),
        }
    }

    /// Type bitmask of the macroblock at grid coordinates.
    pub fn mb_type_at(&self, mb_x: usize, mb_y: usize) -> u32 {
        assert!(mb_x < self.mb_width && mb_y < self.mb_height);
        self.mb_type[mb_x + mb_y * self.mb_stride]
    }

    /// Set the type bitmask of the macroblock at grid coordinates.
    pub fn set_mb_type(&mut self, mb_x: usize, mb_y: usize, bits: u32) {
        assert!(mb_x < self.mb_width && mb_y < self.mb_height);
        self.mb_type[mb_x + mb_y * self.mb_stride] = bits;
    }

    /// Number of samples in each direction's motion grid.
    pub fn motion_samples(&self) -> usize {
        self.mv_stride * (self.mb_height << self.mv_sample_log2())
    }

    /// Allocate zeroed motion grids for both prediction directions.
    pub fn alloc_motion(&mut self) {
        let len = self.motion_samples();
        self.motion_val = Some([
            vec![RawMotion::zeros(); len],
            vec![RawMotion::zeros(); len],
        ]);
    }

    /// Whether the frame carries inter-prediction data at all.
    pub fn has_motion(&self) -> bool {
        self.motion_val.is_some()
    }

    /// Both directions' motion grids, if present.
    pub fn motion_grids(&self) -> Option<[&[RawMotion]; 2]> {
        self.motion_val
            .as_ref()
            .map(|[fwd, bwd]| [fwd.as_slice(), bwd.as_slice()])
    }

    /// Store a raw sample into one direction's motion grid.
    ///
    /// Panics if the frame carries no motion data or the index is out of the
    /// grid; both are contract violations of the producing decoder.
    pub fn set_motion_sample(&mut self, direction: usize, index: usize, raw: RawMotion) {
        let grids = self
            .motion_val
            .as_mut()
            .expect("motion data not allocated");
        grids[direction][index] = raw;
    }
}
