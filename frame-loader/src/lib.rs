//! Common `FrameSource` instance loader.

use log::debug;
use mvgrid::prelude::v1::*;
use std::io::BufReader;

pub mod mbf;

/// Create a frame source for the given input.
///
/// Inputs ending with `.mbf` are parsed as serialized frame dumps. Anything
/// else goes to the FFmpeg decoder, which is only available when the `av`
/// feature is enabled.
pub fn create_source(input: &str) -> Result<Box<dyn FrameSource>> {
    if input.ends_with(".mbf") {
        debug!("parsing {} as a frame dump", input);
        let reader = BufReader::new(std::fs::File::open(input)?);
        return Ok(Box::new(mbf::MbfSource::new(reader)));
    }

    create_av_source(input)
}

#[cfg(feature = "av")]
fn create_av_source(input: &str) -> Result<Box<dyn FrameSource>> {
    debug!("opening {} with the av decoder", input);
    mvgrid_av::AvSource::open(input).map(|s| Box::new(s) as _)
}

#[cfg(not(feature = "av"))]
fn create_av_source(input: &str) -> Result<Box<dyn FrameSource>> {
    Err(anyhow!(
        "no decoder available for {} (build with the `av` feature)",
        input
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use mvgrid::frame::*;

    #[test]
    fn dumped_stream_feeds_the_full_pipeline() {
        let mut frame = Frame::new(PictureType::P, 16, 16, 3, false, true);
        frame.alloc_motion();
        frame.set_mb_type(0, 0, MB_TYPE_16X16 | MB_TYPE_P0L0);
        frame.set_motion_sample(0, 0, RawMotion::new(8, -8));

        let mut data = Vec::new();
        // A leading intra frame: emits no block but still advances the
        // frame numbering.
        mbf::write_frame(&mut data, &Frame::new(PictureType::I, 16, 16, 3, false, true)).unwrap();
        mbf::write_frame(&mut data, &frame).unwrap();

        let mut source = mbf::MbfSource::new(std::io::Cursor::new(data));
        let mut reporter = Reporter::new(Vec::new());

        let mut index = 1;
        while let Some(frame) = source.next_frame().unwrap() {
            if frame.pict_type() != PictureType::I {
                reporter.write_frame(index, &extract(&frame)).unwrap();
            }
            index += 1;
        }

        assert_eq!(
            String::from_utf8(reporter.into_inner()).unwrap(),
            "frame 2, 1 x 1\n0 0 ; 4 -4\n--\n====\n"
        );
    }
}
