//! # Macroblock Motion Vector Grid
//!
//! This library extracts, for every macroblock of a decoded video frame, the
//! set of motion vectors describing inter-frame prediction. Decoding itself is
//! out of scope - frames enter through the [`decoder::FrameSource`] boundary
//! with their macroblock-type and motion-vector grids already populated, and
//! the library resolves which samples of the motion grid belong to which
//! macroblock partition, scales them, and serializes them deterministically.
//!
//! The easiest way to use the library is to import its prelude:
//!
//! ```
//! use mvgrid::prelude::v1::*;
//! ```

pub mod decoder;
pub mod extract;
pub mod frame;
pub mod geometry;
pub mod report;

pub mod prelude {
    pub mod v1 {
        pub use crate::{
            decoder::FrameSource,
            extract::{extract, FrameMotion, MacroblockMotion},
            frame::{Frame, MacroblockType, Partition, PictureType, RawMotion},
            geometry::{partition_samples, PartitionSample, SampleLayout},
            report::{Reporter, NO_MV},
        };
        pub use anyhow::{anyhow, Error, Result};
    }
}
