//! FFmpeg-backed frame source.
//!
//! Opens anything libavformat can demux, decodes the best video stream with
//! motion vector export enabled, and reassembles each picture's macroblock
//! type and motion sample grids from the exported vectors.

use c_str_macro::c_str;
use ffmpeg_sys_next::*;
use libc::c_int;
use log::*;
use mvgrid::frame::*;
use mvgrid::geometry::partition_samples;
use mvgrid::prelude::v1::*;
use std::ffi::CString;
use std::mem::MaybeUninit;
use std::{mem, ptr, slice};

/// Frame source decoding a media file through FFmpeg.
///
/// All decode-loop state (buffered packets, drain progress) lives in this
/// per-stream object; nothing is process-wide.
pub struct AvSource {
    fmt_ctx: *mut AVFormatContext,
    codec_ctx: *mut AVCodecContext,
    av_frame: *mut AVFrame,
    stream_idx: c_int,
    draining: bool,
}

impl Drop for AvSource {
    fn drop(&mut self) {
        unsafe {
            av_frame_free(&mut self.av_frame);
            avcodec_free_context(&mut self.codec_ctx);
            avformat_close_input(&mut self.fmt_ctx);
        }
    }
}

impl AvSource {
    /// Open a media file and set up the decoder of its best video stream.
    pub fn open(input: &str) -> Result<Self> {
        let path = CString::new(input)?;

        let mut fmt_ctx = ptr::null_mut();
        match unsafe {
            avformat_open_input(
                &mut fmt_ctx,
                path.as_ptr(),
                ptr::null_mut::<AVInputFormat>() as _,
                ptr::null_mut(),
            )
        } {
            0 => {}
            e => return Err(anyhow!("unable to open {} ({})", input, e)),
        }

        // Partially initialized handles are cleaned up by Drop on the error
        // paths below.
        let mut source = Self {
            fmt_ctx,
            codec_ctx: ptr::null_mut(),
            av_frame: ptr::null_mut(),
            stream_idx: -1,
            draining: false,
        };

        if unsafe { avformat_find_stream_info(source.fmt_ctx, ptr::null_mut()) } < 0 {
            return Err(anyhow!("unable to read stream info from {}", input));
        }

        let mut decoder: *mut AVCodec = ptr::null_mut();

        source.stream_idx = match unsafe {
            av_find_best_stream(
                source.fmt_ctx,
                AVMediaType::AVMEDIA_TYPE_VIDEO,
                -1,
                -1,
                &mut decoder as *mut *mut AVCodec as _,
                0,
            )
        } {
            e if e < 0 => return Err(anyhow!("no video stream in {} ({})", input, e)),
            i => i,
        };

        if decoder.is_null() {
            return Err(anyhow!("no decoder for the video stream of {}", input));
        }

        source.codec_ctx = unsafe { avcodec_alloc_context3(decoder as _) };
        if source.codec_ctx.is_null() {
            return Err(anyhow!("failed to allocate codec context"));
        }

        let stream = unsafe { *(*source.fmt_ctx).streams.offset(source.stream_idx as isize) };
        match unsafe { avcodec_parameters_to_context(source.codec_ctx, (*stream).codecpar) } {
            e if e < 0 => return Err(anyhow!("failed to get codec parameters ({})", e)),
            _ => {}
        }

        // Ask the codec to export motion vectors alongside decoded pictures.
        let mut av_opts: *mut AVDictionary = ptr::null_mut();
        unsafe {
            av_dict_set(
                &mut av_opts,
                c_str!("flags2").as_ptr(),
                c_str!("+export_mvs").as_ptr(),
                0,
            );
        }
        let ret = unsafe { avcodec_open2(source.codec_ctx, decoder as _, &mut av_opts) };
        unsafe { av_dict_free(&mut av_opts) };
        if ret < 0 {
            return Err(anyhow!("failed to open codec ({})", ret));
        }

        source.av_frame = unsafe { av_frame_alloc() };
        if source.av_frame.is_null() {
            return Err(anyhow!("unable to allocate frame"));
        }

        Ok(source)
    }

    /// Pull one decoded picture out of the codec, if it has one ready.
    fn receive_frame(&mut self) -> Result<Option<Frame>> {
        match unsafe { avcodec_receive_frame(self.codec_ctx, self.av_frame) } {
            e if e == AVERROR(libc::EAGAIN) || e == AVERROR_EOF => Ok(None),
            e if e < 0 => Err(anyhow!("failed to receive frame ({})", e)),
            _ => {
                let frame = self.translate_frame();
                unsafe { av_frame_unref(self.av_frame) };
                Ok(Some(frame))
            }
        }
    }

    /// Rebuild macroblock metadata for the picture sitting in `av_frame`.
    fn translate_frame(&mut self) -> Frame {
        let (ctx, av) = unsafe { (&*self.codec_ctx, &*self.av_frame) };

        let pict_type = match av.pict_type {
            AVPictureType::AV_PICTURE_TYPE_P
            | AVPictureType::AV_PICTURE_TYPE_S
            | AVPictureType::AV_PICTURE_TYPE_SP => PictureType::P,
            AVPictureType::AV_PICTURE_TYPE_B | AVPictureType::AV_PICTURE_TYPE_BI => PictureType::B,
            _ => PictureType::I,
        };

        let (width, height) = (ctx.width as usize, ctx.height as usize);

        let side_data = unsafe {
            av_frame_get_side_data(
                self.av_frame,
                AVFrameSideDataType::AV_FRAME_DATA_MOTION_VECTORS,
            )
            .as_ref()
        };

        let mvs = match side_data {
            Some(sd) => unsafe {
                slice::from_raw_parts(
                    sd.data as *const AVMotionVector,
                    sd.size as usize / mem::size_of::<AVMotionVector>(),
                )
            },
            None => {
                trace!("no motion vectors exported");
                return Frame::new(pict_type, width, height, 3, false, true);
            }
        };

        reassemble_frame(pict_type, width, height, mvs)
    }
}

impl FrameSource for AvSource {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        loop {
            if let Some(frame) = self.receive_frame()? {
                return Ok(Some(frame));
            }

            if self.draining {
                return Ok(None);
            }

            let mut packet = MaybeUninit::uninit();

            match unsafe { av_read_frame(self.fmt_ctx, packet.as_mut_ptr()) } {
                e if e == AVERROR_EOF => {
                    // Input exhausted - flush buffered pictures out of the
                    // decoder before signalling end of stream.
                    self.draining = true;
                    match unsafe { avcodec_send_packet(self.codec_ctx, ptr::null()) } {
                        e if e < 0 => return Err(anyhow!("failed to flush decoder ({})", e)),
                        _ => {}
                    }
                }
                e if e < 0 => return Err(anyhow!("failed to read frame ({})", e)),
                _ => {
                    let packet = unsafe { packet.assume_init_mut() };

                    trace!("read packet: {} {}", packet.stream_index, packet.size);

                    let ret = if packet.stream_index == self.stream_idx {
                        unsafe { avcodec_send_packet(self.codec_ctx, packet) }
                    } else {
                        0
                    };

                    unsafe { av_packet_unref(packet) };

                    if ret < 0 {
                        return Err(anyhow!("failed to send packet ({})", ret));
                    }
                }
            }
        }
    }
}

/// Reassemble a frame's macroblock metadata from exported motion vectors.
///
/// Each exported entry carries the block size, the block's pixel position,
/// the prediction direction and the raw sub-pixel motion. That is enough to
/// reconstruct the type bitmasks and an 8px-granularity motion sample grid
/// the partition addressing expects.
fn reassemble_frame(
    pict_type: PictureType,
    width: usize,
    height: usize,
    mvs: &[AVMotionVector],
) -> Frame {
    let quarter_pixel = mvs.first().map(|mv| mv.motion_scale >= 4).unwrap_or(false);

    let mut frame = Frame::new(pict_type, width, height, 3, quarter_pixel, true);
    frame.alloc_motion();
    let layout = frame.sample_layout();

    for mv in mvs {
        let (mb_x, mb_y) = ((mv.dst_x as isize) >> 4, (mv.dst_y as isize) >> 4);
        if mb_x < 0
            || mb_y < 0
            || mb_x as usize >= frame.mb_width()
            || mb_y as usize >= frame.mb_height()
        {
            trace!("vector outside the grid at {} {}", mv.dst_x, mv.dst_y);
            continue;
        }
        let (mb_x, mb_y) = (mb_x as usize, mb_y as usize);

        let direction = usize::from(mv.source > 0);

        // Sub-partition cell the block's position falls into.
        let (sub_x, sub_y) = ((mv.dst_x as usize >> 3) & 1, (mv.dst_y as usize >> 3) & 1);

        let (partition, shape_bits, sub) = match (mv.w, mv.h) {
            (16, 16) => (Partition::Whole, MB_TYPE_16X16, 0),
            (16, 8) => (Partition::TopBottom, MB_TYPE_16X8, sub_y),
            (8, 16) => (Partition::LeftRight, MB_TYPE_8X16, sub_x),
            (8, 8) => (Partition::Quad, MB_TYPE_8X8, sub_x + 2 * sub_y),
            // Codecs with larger block trees collapse onto the macroblock
            // the vector lands in.
            _ => (Partition::Whole, MB_TYPE_16X16, 0),
        };

        frame.set_mb_type(
            mb_x,
            mb_y,
            frame.mb_type_at(mb_x, mb_y) | shape_bits | (MB_TYPE_P0L0 << (2 * direction)),
        );

        let samples = partition_samples(partition, false, mb_x, mb_y, layout);
        frame.set_motion_sample(
            direction,
            samples[sub].index,
            RawMotion::new(mv.motion_x as i16, mv.motion_y as i16),
        );
    }

    frame
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exported(
        source: i32,
        (w, h): (u8, u8),
        (dst_x, dst_y): (i16, i16),
        (motion_x, motion_y): (i32, i32),
        motion_scale: u16,
    ) -> AVMotionVector {
        AVMotionVector {
            source,
            w,
            h,
            src_x: dst_x + (motion_x / motion_scale as i32) as i16,
            src_y: dst_y + (motion_y / motion_scale as i32) as i16,
            dst_x,
            dst_y,
            flags: 0,
            motion_x,
            motion_y,
            motion_scale,
        }
    }

    #[test]
    fn whole_blocks_land_on_macroblock_samples() {
        let mvs = [exported(-1, (16, 16), (24, 8), (8, -8), 2)];
        let frame = reassemble_frame(PictureType::P, 32, 16, &mvs);

        assert!(!frame.quarter_pixel());
        let mb = MacroblockType::from_bits(frame.mb_type_at(1, 0));
        assert_eq!(mb.partition, Partition::Whole);
        assert_eq!(mb.uses_list, [true, false]);

        let layout = frame.sample_layout();
        let whole = partition_samples(Partition::Whole, false, 1, 0, layout);
        assert_eq!(
            frame.motion_grids().unwrap()[0][whole[0].index],
            RawMotion::new(8, -8)
        );
    }

    #[test]
    fn quarters_and_directions_are_kept_apart() {
        // Backward-predicted bottom-right quarter of macroblock (0, 0).
        let mvs = [
            exported(1, (8, 8), (12, 12), (4, 4), 4),
            exported(-1, (8, 8), (4, 4), (-4, 0), 4),
        ];
        let frame = reassemble_frame(PictureType::B, 16, 16, &mvs);

        assert!(frame.quarter_pixel());
        let mb = MacroblockType::from_bits(frame.mb_type_at(0, 0));
        assert_eq!(mb.partition, Partition::Quad);
        assert_eq!(mb.uses_list, [true, true]);

        let layout = frame.sample_layout();
        let quads = partition_samples(Partition::Quad, false, 0, 0, layout);
        let grids = frame.motion_grids().unwrap();
        assert_eq!(grids[1][quads[3].index], RawMotion::new(4, 4));
        assert_eq!(grids[0][quads[0].index], RawMotion::new(-4, 0));
    }

    #[test]
    fn out_of_grid_vectors_are_dropped() {
        let mvs = [exported(-1, (16, 16), (120, 8), (2, 2), 2)];
        let frame = reassemble_frame(PictureType::P, 32, 16, &mvs);
        assert_eq!(frame.mb_type_at(0, 0), 0);
        assert_eq!(frame.mb_type_at(1, 0), 0);
    }
}
