use std::path::Path;

use crate::shared::frame::{Frame, CHANNELS};
use crate::shared::video_metadata::VideoMetadata;
use crate::video::domain::video_writer::VideoWriter;

type BoxError = Box<dyn std::error::Error>;

/// Encoder used when none is requested: MPEG-4 Part 2 is available in every
/// ffmpeg build and muxes into MP4, MKV and AVI.
pub const DEFAULT_ENCODER: &str = "mpeg4";

/// Encodes RGB frames via ffmpeg-next.
///
/// Output keeps the width, height and frame rate given to `open`. No audio
/// stream is written.
pub struct FfmpegWriter {
    encoder_name: String,
    octx: Option<ffmpeg_next::format::context::Output>,
    encoder: Option<ffmpeg_next::codec::encoder::video::Encoder>,
    scaler: Option<ffmpeg_next::software::scaling::Context>,
    width: u32,
    height: u32,
    time_base: ffmpeg_next::Rational,
    frame_count: usize,
    video_stream_index: usize,
}

// Safety: FfmpegWriter is only used from a single thread at a time.
// The raw pointers inside ffmpeg types are not shared across threads.
unsafe impl Send for FfmpegWriter {}

impl FfmpegWriter {
    pub fn new() -> Self {
        Self {
            encoder_name: DEFAULT_ENCODER.to_string(),
            octx: None,
            encoder: None,
            scaler: None,
            width: 0,
            height: 0,
            time_base: ffmpeg_next::Rational(1, 30),
            frame_count: 0,
            video_stream_index: 0,
        }
    }

    /// Selects the encoder by its ffmpeg name (e.g. `libx264`, `mpeg4`).
    pub fn with_encoder(mut self, name: &str) -> Self {
        self.encoder_name = name.to_string();
        self
    }

    #[cfg(test)]
    fn frames_written(&self) -> usize {
        self.frame_count
    }

    /// Flushes the encoder and writes the container trailer.
    fn finish(&mut self) -> Result<(), BoxError> {
        let Some(encoder) = self.encoder.as_mut() else {
            return Ok(());
        };
        encoder.send_eof()?;
        self.drain_packets()?;
        if let Some(octx) = self.octx.as_mut() {
            octx.write_trailer()?;
        }
        log::debug!("Encoder flushed after {} frames", self.frame_count);
        Ok(())
    }

    /// Drains every packet the encoder has ready into the output container.
    fn drain_packets(&mut self) -> Result<(), BoxError> {
        let (Some(encoder), Some(octx)) = (self.encoder.as_mut(), self.octx.as_mut()) else {
            return Ok(());
        };
        let ost_time_base = octx
            .stream(self.video_stream_index)
            .ok_or("FfmpegWriter: output stream missing")?
            .time_base();

        let mut encoded = ffmpeg_next::Packet::empty();
        while encoder.receive_packet(&mut encoded).is_ok() {
            encoded.set_stream(self.video_stream_index);
            encoded.rescale_ts(self.time_base, ost_time_base);
            encoded.write_interleaved(octx)?;
        }
        Ok(())
    }
}

impl Default for FfmpegWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl VideoWriter for FfmpegWriter {
    fn open(&mut self, path: &Path, metadata: &VideoMetadata) -> Result<(), BoxError> {
        ffmpeg_next::init()?;

        self.width = metadata.width;
        self.height = metadata.height;

        let mut octx = ffmpeg_next::format::output(path)?;

        let global_header = octx
            .format()
            .flags()
            .contains(ffmpeg_next::format::Flags::GLOBAL_HEADER);

        let codec = ffmpeg_next::encoder::find_by_name(&self.encoder_name)
            .ok_or_else(|| format!("encoder '{}' not found", self.encoder_name))?;

        let mut ost = octx.add_stream(Some(codec))?;

        let mut encoder_ctx = ffmpeg_next::codec::context::Context::new_with_codec(codec)
            .encoder()
            .video()?;

        encoder_ctx.set_width(metadata.width);
        encoder_ctx.set_height(metadata.height);
        encoder_ctx.set_format(ffmpeg_next::format::Pixel::YUV420P);

        let rate = frame_rate_rational(metadata.effective_fps());
        self.time_base = ffmpeg_next::Rational(rate.denominator(), rate.numerator());
        encoder_ctx.set_time_base(self.time_base);
        encoder_ctx.set_frame_rate(Some(rate));

        if global_header {
            encoder_ctx.set_flags(ffmpeg_next::codec::Flags::GLOBAL_HEADER);
        }

        let encoder = encoder_ctx.open_with(ffmpeg_next::Dictionary::new())?;
        ost.set_parameters(&encoder);
        ost.set_avg_frame_rate(rate);

        self.video_stream_index = 0; // first stream

        octx.write_header()?;

        // Set up RGB -> YUV scaler
        let scaler = ffmpeg_next::software::scaling::Context::get(
            ffmpeg_next::format::Pixel::RGB24,
            metadata.width,
            metadata.height,
            ffmpeg_next::format::Pixel::YUV420P,
            metadata.width,
            metadata.height,
            ffmpeg_next::software::scaling::Flags::BILINEAR,
        )?;

        log::debug!(
            "Encoding {} with {} at {}/{} fps",
            path.display(),
            self.encoder_name,
            rate.numerator(),
            rate.denominator()
        );

        self.octx = Some(octx);
        self.encoder = Some(encoder);
        self.scaler = Some(scaler);
        self.frame_count = 0;

        Ok(())
    }

    fn write(&mut self, frame: &Frame) -> Result<(), BoxError> {
        let (Some(encoder), Some(scaler)) = (self.encoder.as_mut(), self.scaler.as_mut()) else {
            return Err("FfmpegWriter: not opened".into());
        };
        if frame.width() != self.width || frame.height() != self.height {
            return Err(format!(
                "frame is {}x{}, output expects {}x{}",
                frame.width(),
                frame.height(),
                self.width,
                self.height
            )
            .into());
        }

        // Create RGB frame from input data
        let mut rgb_frame = ffmpeg_next::util::frame::video::Video::new(
            ffmpeg_next::format::Pixel::RGB24,
            self.width,
            self.height,
        );

        let stride = rgb_frame.stride(0);
        let data = rgb_frame.data_mut(0);
        let src = frame.data();
        let row_bytes = self.width as usize * CHANNELS;

        // Copy pixel data, respecting stride
        for row in 0..self.height as usize {
            let src_start = row * row_bytes;
            let dst_start = row * stride;
            data[dst_start..dst_start + row_bytes]
                .copy_from_slice(&src[src_start..src_start + row_bytes]);
        }

        // Convert RGB -> YUV
        let mut yuv_frame = ffmpeg_next::util::frame::video::Video::empty();
        scaler.run(&rgb_frame, &mut yuv_frame)?;
        yuv_frame.set_pts(Some(self.frame_count as i64));

        encoder.send_frame(&yuv_frame)?;
        self.drain_packets()?;

        self.frame_count += 1;
        Ok(())
    }

    fn close(&mut self) -> Result<(), BoxError> {
        let flushed = self.finish();

        self.octx = None;
        self.encoder = None;
        self.scaler = None;

        flushed
    }
}

/// Converts a floating-point frame rate to an exact rational with a
/// denominator MPEG-4 accepts (at most 65535).
///
/// Integer rates map to `n/1`, NTSC-style rates to `n/1001`, anything else
/// to millihertz precision.
pub fn frame_rate_rational(fps: f64) -> ffmpeg_next::Rational {
    const TOLERANCE: f64 = 1e-3;

    let whole = fps.round();
    if (fps - whole).abs() < TOLERANCE {
        return ffmpeg_next::Rational(whole as i32, 1);
    }
    let ntsc = (fps * 1001.0).round();
    if (ntsc / 1001.0 - fps).abs() < TOLERANCE && ntsc % 1000.0 == 0.0 {
        return ffmpeg_next::Rational(ntsc as i32, 1001);
    }
    ffmpeg_next::Rational((fps * 1000.0).round() as i32, 1000).reduce()
}
