use std::path::Path;

use ffmpeg_next::format::Pixel;
use ffmpeg_next::software::scaling;
use ffmpeg_next::util::frame::video::Video;
use ffmpeg_next::Rational;

use crate::shared::frame::Frame;
use crate::shared::video_metadata::VideoMetadata;
use crate::video::domain::video_writer::VideoWriter;

const FALLBACK_FPS: i32 = 30;
/// MPEG-4 caps the time base denominator, which is the frame rate numerator.
const MAX_RATE_NUMERATOR: f64 = 65535.0;
const STREAM_INDEX: usize = 0;

struct OpenOutput {
    octx: ffmpeg_next::format::context::Output,
    encoder: ffmpeg_next::codec::encoder::video::Encoder,
    scaler: scaling::Context,
    encoder_time_base: Rational,
    stream_time_base: Rational,
}

impl OpenOutput {
    /// Writes every packet the encoder has ready.
    fn drain(&mut self) -> Result<(), ffmpeg_next::Error> {
        let mut packet = ffmpeg_next::Packet::empty();
        while self.encoder.receive_packet(&mut packet).is_ok() {
            packet.set_stream(STREAM_INDEX);
            packet.rescale_ts(self.encoder_time_base, self.stream_time_base);
            packet.write_interleaved(&mut self.octx)?;
        }
        Ok(())
    }
}

/// MPEG-4 encoder writing RGB frames through libavformat.
///
/// Timestamps are frame counts in a `1/fps` time base.
pub struct FfmpegWriter {
    output: Option<OpenOutput>,
    width: u32,
    height: u32,
    frame_count: usize,
}

// Safety: the ffmpeg contexts are owned exclusively and only touched from
// the thread that currently owns the writer.
unsafe impl Send for FfmpegWriter {}

impl FfmpegWriter {
    pub fn new() -> Self {
        Self {
            output: None,
            width: 0,
            height: 0,
            frame_count: 0,
        }
    }
}

impl Default for FfmpegWriter {
    fn default() -> Self {
        Self::new()
    }
}

/// Frame rate as an exact fraction where possible, e.g. 30000/1001 or
/// 2997/100. Only a non-positive or non-finite rate takes the fallback.
fn encoder_fps(fps: f64) -> Rational {
    if !fps.is_finite() || fps <= 0.0 {
        return Rational(FALLBACK_FPS, 1);
    }
    for den in [1, 1001, 1000] {
        let num = (fps * f64::from(den)).round();
        if (1.0..=MAX_RATE_NUMERATOR).contains(&num) && (num / f64::from(den) - fps).abs() < 1e-9 {
            return Rational(num as i32, den);
        }
    }
    let den = (MAX_RATE_NUMERATOR / fps).floor().clamp(1.0, 1000.0);
    let num = (fps * den).round().clamp(1.0, MAX_RATE_NUMERATOR);
    Rational(num as i32, den as i32)
}

impl VideoWriter for FfmpegWriter {
    fn open(
        &mut self,
        path: &Path,
        metadata: &VideoMetadata,
    ) -> Result<(), Box<dyn std::error::Error>> {
        ffmpeg_next::init()?;

        let fps = encoder_fps(metadata.fps);
        let mut octx = ffmpeg_next::format::output(path)?;
        let global_header = octx
            .format()
            .flags()
            .contains(ffmpeg_next::format::Flags::GLOBAL_HEADER);

        let codec = ffmpeg_next::encoder::find(ffmpeg_next::codec::Id::MPEG4)
            .ok_or("MPEG-4 encoder not available")?;
        let mut stream = octx.add_stream(Some(codec))?;

        let mut ctx = ffmpeg_next::codec::context::Context::new_with_codec(codec)
            .encoder()
            .video()?;
        ctx.set_width(metadata.width);
        ctx.set_height(metadata.height);
        ctx.set_format(Pixel::YUV420P);
        let time_base = Rational(fps.denominator(), fps.numerator());
        ctx.set_time_base(time_base);
        ctx.set_frame_rate(Some(fps));
        if global_header {
            ctx.set_flags(ffmpeg_next::codec::Flags::GLOBAL_HEADER);
        }

        let encoder = ctx.open_with(ffmpeg_next::Dictionary::new())?;
        stream.set_parameters(&encoder);
        octx.write_header()?;

        // The muxer may pick its own time base during write_header
        let stream_time_base = octx
            .stream(STREAM_INDEX)
            .ok_or("output stream missing after header")?
            .time_base();

        let scaler = scaling::Context::get(
            Pixel::RGB24,
            metadata.width,
            metadata.height,
            Pixel::YUV420P,
            metadata.width,
            metadata.height,
            scaling::Flags::BILINEAR,
        )?;

        log::debug!(
            "Writing {}x{} @ {:.3} fps to {}",
            metadata.width,
            metadata.height,
            f64::from(fps),
            path.display()
        );
        self.output = Some(OpenOutput {
            octx,
            encoder,
            scaler,
            encoder_time_base: time_base,
            stream_time_base,
        });
        self.width = metadata.width;
        self.height = metadata.height;
        self.frame_count = 0;
        Ok(())
    }

    fn write(&mut self, frame: &Frame) -> Result<(), Box<dyn std::error::Error>> {
        let out = self.output.as_mut().ok_or("FfmpegWriter: not opened")?;
        if frame.width() != self.width || frame.height() != self.height {
            return Err(format!(
                "frame is {}x{}, writer expects {}x{}",
                frame.width(),
                frame.height(),
                self.width,
                self.height
            )
            .into());
        }

        let mut rgb = Video::new(Pixel::RGB24, self.width, self.height);
        let stride = rgb.stride(0);
        let row_len = self.width as usize * 3;
        let dst = rgb.data_mut(0);
        for (row, src) in frame.data().chunks_exact(row_len).enumerate() {
            dst[row * stride..row * stride + row_len].copy_from_slice(src);
        }

        let mut yuv = Video::empty();
        out.scaler.run(&rgb, &mut yuv)?;
        yuv.set_pts(Some(self.frame_count as i64));

        out.encoder.send_frame(&yuv)?;
        out.drain()?;
        self.frame_count += 1;
        Ok(())
    }

    fn close(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        let Some(mut out) = self.output.take() else {
            return Ok(());
        };
        out.encoder.send_eof()?;
        out.drain()?;
        out.octx.write_trailer()?;
        Ok(())
    }
}
