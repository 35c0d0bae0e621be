//! # Per-frame motion vector extraction
//!
//! Drives the partition geometry across one frame's macroblock grid in
//! row-major order, producing the full ordered vector sequence, sentinels
//! included.

use crate::frame::{Frame, MacroblockType, PictureType};
use crate::geometry::{partition_samples, scale_vector};
use nalgebra as na;

/// One scaled motion vector; `None` when no vector applies to the partition.
pub type MacroblockVector = Option<na::Vector2<i32>>;

/// One macroblock's extracted vectors, in emission order.
#[derive(Clone, Debug)]
pub struct MacroblockMotion {
    pub mb_x: usize,
    pub mb_y: usize,
    pub vectors: Vec<MacroblockVector>,
}

/// Full ordered extraction result of one frame.
///
/// Macroblocks come row-major, and within each macroblock vectors come in
/// type-pass then partition order. Every macroblock of the grid is present,
/// also those that emitted no vectors.
#[derive(Clone, Debug)]
pub struct FrameMotion {
    pub mb_width: usize,
    pub mb_height: usize,
    pub macroblocks: Vec<MacroblockMotion>,
}

impl FrameMotion {
    /// Iterate macroblock rows in top-to-bottom order.
    pub fn rows(&self) -> impl Iterator<Item = &[MacroblockMotion]> {
        self.macroblocks.chunks(self.mb_width)
    }
}

// Fixed type-pass order: pass 0 applies to P pictures, passes 1 and 2 to B
// pictures, with the prediction direction of each pass.
const TYPE_PASSES: [(PictureType, usize); 3] = [
    (PictureType::P, 0),
    (PictureType::B, 0),
    (PictureType::B, 1),
];

/// Extract the ordered motion vector sequence of one frame.
///
/// A pure function of the frame: intra pictures and frames without motion
/// data produce empty per-macroblock entries, an unused prediction list
/// produces one sentinel per sub-partition, and out-of-grid sample indices
/// panic as decoder contract violations.
pub fn extract(frame: &Frame) -> FrameMotion {
    let layout = frame.sample_layout();
    let shift = frame.shift();

    let mut macroblocks = Vec::with_capacity(frame.mb_width() * frame.mb_height());

    for mb_y in 0..frame.mb_height() {
        for mb_x in 0..frame.mb_width() {
            let mut vectors = Vec::new();

            if let Some(grids) = frame.motion_grids() {
                let mb = MacroblockType::from_bits(frame.mb_type_at(mb_x, mb_y));

                for (pict_type, direction) in TYPE_PASSES {
                    if frame.pict_type() != pict_type {
                        continue;
                    }

                    let samples =
                        partition_samples(mb.partition, mb.interlaced, mb_x, mb_y, layout);

                    if mb.uses_list[direction] {
                        let grid = grids[direction];
                        vectors.extend(
                            samples
                                .iter()
                                .map(|s| Some(scale_vector(grid[s.index], shift, s.double_vertical))),
                        );
                    } else {
                        // Shape still determines the sentinel count, so
                        // per-macroblock vector counts stay usable downstream.
                        vectors.extend(samples.iter().map(|_| None));
                    }
                }
            }

            macroblocks.push(MacroblockMotion {
                mb_x,
                mb_y,
                vectors,
            });
        }
    }

    FrameMotion {
        mb_width: frame.mb_width(),
        mb_height: frame.mb_height(),
        macroblocks,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::*;

    fn single_mb_frame(pict_type: PictureType, quarter_pixel: bool, bits: u32) -> Frame {
        let mut frame = Frame::new(pict_type, 16, 16, 3, quarter_pixel, true);
        frame.alloc_motion();
        frame.set_mb_type(0, 0, bits);
        frame
    }

    #[test]
    fn intra_frames_emit_no_vectors() {
        let frame = single_mb_frame(PictureType::I, false, MB_TYPE_16X16 | MB_TYPE_P0L0);
        let motion = extract(&frame);
        assert_eq!(motion.macroblocks.len(), 1);
        assert!(motion.macroblocks[0].vectors.is_empty());
    }

    #[test]
    fn missing_motion_data_emits_no_vectors() {
        let mut frame = Frame::new(PictureType::P, 32, 32, 3, false, true);
        frame.set_mb_type(0, 0, MB_TYPE_16X16 | MB_TYPE_P0L0);
        let motion = extract(&frame);
        assert_eq!(motion.macroblocks.len(), 4);
        assert!(motion.macroblocks.iter().all(|mb| mb.vectors.is_empty()));
    }

    #[test]
    fn whole_partition_scales_the_stored_vector() {
        let mut frame = single_mb_frame(PictureType::P, false, MB_TYPE_16X16 | MB_TYPE_P0L0);
        frame.set_motion_sample(0, 0, RawMotion::new(8, -8));
        let motion = extract(&frame);
        assert_eq!(
            motion.macroblocks[0].vectors,
            vec![Some(nalgebra::Vector2::new(4, -4))]
        );
    }

    #[test]
    fn unused_list_emits_shape_count_sentinels() {
        for (bits, count) in [
            (MB_TYPE_16X16, 1),
            (MB_TYPE_16X8, 2),
            (MB_TYPE_8X16, 2),
            (MB_TYPE_8X8, 4),
        ] {
            let frame = single_mb_frame(PictureType::P, false, bits);
            let motion = extract(&frame);
            assert_eq!(motion.macroblocks[0].vectors.len(), count);
            assert!(motion.macroblocks[0].vectors.iter().all(|v| v.is_none()));
        }
    }

    #[test]
    fn quad_emits_quarters_in_raster_order() {
        let mut frame = single_mb_frame(PictureType::P, false, MB_TYPE_8X8 | MB_TYPE_P0L0);
        let layout = frame.sample_layout();
        let samples =
            crate::geometry::partition_samples(Partition::Quad, false, 0, 0, layout);
        for (i, s) in samples.iter().enumerate() {
            frame.set_motion_sample(0, s.index, RawMotion::new(2 * i as i16, 0));
        }

        let motion = extract(&frame);
        let dx = motion.macroblocks[0]
            .vectors
            .iter()
            .map(|v| v.unwrap().x)
            .collect::<Vec<_>>();
        assert_eq!(dx, vec![0, 1, 2, 3]);
    }

    #[test]
    fn b_frames_run_forward_then_backward_passes() {
        // Interlaced 16x8 macroblock with both lists used, quarter-pixel
        // stored vectors (4,2) and (4,6): each pass emits two vectors with
        // the vertical component doubled then shifted by 2.
        let mut frame = single_mb_frame(
            PictureType::B,
            true,
            MB_TYPE_16X8 | MB_TYPE_INTERLACED | MB_TYPE_P0L0 | MB_TYPE_P0L1,
        );
        let layout = frame.sample_layout();
        let samples =
            crate::geometry::partition_samples(Partition::TopBottom, true, 0, 0, layout);
        for direction in 0..2 {
            frame.set_motion_sample(direction, samples[0].index, RawMotion::new(4, 2));
            frame.set_motion_sample(direction, samples[1].index, RawMotion::new(4, 6));
        }

        let motion = extract(&frame);
        let expected = vec![
            Some(nalgebra::Vector2::new(1, 1)),
            Some(nalgebra::Vector2::new(1, 3)),
            Some(nalgebra::Vector2::new(1, 1)),
            Some(nalgebra::Vector2::new(1, 3)),
        ];
        assert_eq!(motion.macroblocks[0].vectors, expected);
    }

    #[test]
    fn b_frame_with_one_unused_list_mixes_real_and_sentinel_passes() {
        let mut frame =
            single_mb_frame(PictureType::B, false, MB_TYPE_16X16 | MB_TYPE_P0L0);
        frame.set_motion_sample(0, 0, RawMotion::new(6, 2));
        let motion = extract(&frame);
        assert_eq!(
            motion.macroblocks[0].vectors,
            vec![Some(nalgebra::Vector2::new(3, 1)), None]
        );
    }

    #[test]
    fn macroblocks_come_row_major() {
        let frame = Frame::new(PictureType::I, 48, 32, 3, false, true);
        let motion = extract(&frame);
        let coords = motion
            .macroblocks
            .iter()
            .map(|mb| (mb.mb_x, mb.mb_y))
            .collect::<Vec<_>>();
        assert_eq!(
            coords,
            vec![(0, 0), (1, 0), (2, 0), (0, 1), (1, 1), (2, 1)]
        );
        assert_eq!(motion.rows().count(), 2);
    }
}
