//! # Macroblock partition geometry
//!
//! The heart of the addressing scheme: translating a macroblock's partition
//! shape into the flat motion-grid sample index of every sub-partition, in
//! canonical order, together with the per-partition vertical scaling rule.

use crate::frame::{Partition, RawMotion};
use nalgebra as na;

/// Motion sample layout of one frame.
#[derive(Clone, Copy, Debug)]
pub struct SampleLayout {
    /// Samples per motion grid row, padding included.
    pub mv_stride: usize,
    /// Shift turning macroblock coordinates into sample coordinates.
    pub mv_sample_log2: u32,
}

/// One sub-partition's resolved motion sample slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PartitionSample {
    /// Flat index into a direction's motion grid.
    pub index: usize,
    /// Whether the vertical component is doubled to frame-coded units.
    pub double_vertical: bool,
}

/// Enumerate a macroblock's sub-partitions in canonical order.
///
/// Quarters come in `(0,0), (1,0), (0,1), (1,1)` order relative to the
/// top-left 8x8 cell; halves top-to-bottom or left-to-right. Field-coded
/// halves get the vertical doubling flag. The flat index is shifted as a
/// whole, not per coordinate - sub-macroblock addressing works on the 2x
/// grid and requires `mv_sample_log2 >= 1`.
pub fn partition_samples(
    partition: Partition,
    interlaced: bool,
    mb_x: usize,
    mb_y: usize,
    layout: SampleLayout,
) -> Vec<PartitionSample> {
    let SampleLayout {
        mv_stride,
        mv_sample_log2,
    } = layout;

    if partition != Partition::Whole {
        assert!(
            mv_sample_log2 >= 1,
            "sub-macroblock partitions on a 16px motion grid"
        );
    }

    match partition {
        Partition::Quad => (0..4)
            .map(|i| PartitionSample {
                index: (2 * mb_x + (i & 1) + (2 * mb_y + (i >> 1)) * mv_stride)
                    << (mv_sample_log2 - 1),
                double_vertical: false,
            })
            .collect(),
        Partition::TopBottom => (0..2)
            .map(|i| PartitionSample {
                index: (2 * mb_x + (2 * mb_y + i) * mv_stride) << (mv_sample_log2 - 1),
                double_vertical: interlaced,
            })
            .collect(),
        Partition::LeftRight => (0..2)
            .map(|i| PartitionSample {
                index: (2 * mb_x + i + 2 * mb_y * mv_stride) << (mv_sample_log2 - 1),
                double_vertical: interlaced,
            })
            .collect(),
        Partition::Whole => vec![PartitionSample {
            index: (mb_x + mb_y * mv_stride) << mv_sample_log2,
            double_vertical: false,
        }],
    }
}

/// Scale a raw stored vector to output units.
///
/// The shift is arithmetic, so negative components keep the stored codec
/// convention rather than truncating towards zero. Field-coded vertical
/// components are doubled before the shift.
pub fn scale_vector(raw: RawMotion, shift: u32, double_vertical: bool) -> na::Vector2<i32> {
    let dy = i32::from(raw.y) * if double_vertical { 2 } else { 1 };
    na::Vector2::new(i32::from(raw.x) >> shift, dy >> shift)
}
