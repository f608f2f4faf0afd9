use std::path::Path;

use ffmpeg_next::format::Pixel;
use ffmpeg_next::software::scaling;
use ffmpeg_next::util::frame::video::Video;

use crate::shared::frame::Frame;
use crate::shared::video_metadata::VideoMetadata;
use crate::video::domain::video_reader::VideoReader;

struct OpenInput {
    ictx: ffmpeg_next::format::context::Input,
    decoder: ffmpeg_next::decoder::Video,
    scaler: scaling::Context,
    stream_index: usize,
    width: u32,
    height: u32,
}

/// Decodes the best video stream of a file into RGB24 frames.
pub struct FfmpegReader {
    input: Option<OpenInput>,
}

// Safety: the ffmpeg contexts are owned exclusively and only touched from
// the thread that currently owns the reader.
unsafe impl Send for FfmpegReader {}

impl FfmpegReader {
    pub fn new() -> Self {
        Self { input: None }
    }
}

impl Default for FfmpegReader {
    fn default() -> Self {
        Self::new()
    }
}

impl VideoReader for FfmpegReader {
    fn open(&mut self, path: &Path) -> Result<VideoMetadata, Box<dyn std::error::Error>> {
        ffmpeg_next::init()?;
        let ictx = ffmpeg_next::format::input(path)?;

        let stream = ictx
            .streams()
            .best(ffmpeg_next::media::Type::Video)
            .ok_or_else(|| format!("no video stream in {}", path.display()))?;
        let stream_index = stream.index();
        let rate = stream.rate();
        let fps = if rate.denominator() != 0 {
            rate.numerator() as f64 / rate.denominator() as f64
        } else {
            0.0
        };
        let total_frames = stream.frames().max(0) as usize;
        let decoder = ffmpeg_next::codec::context::Context::from_parameters(stream.parameters())?
            .decoder()
            .video()?;

        let (width, height) = (decoder.width(), decoder.height());
        let scaler = scaling::Context::get(
            decoder.format(),
            width,
            height,
            Pixel::RGB24,
            width,
            height,
            scaling::Flags::BILINEAR,
        )?;

        let metadata = VideoMetadata {
            width,
            height,
            fps,
            total_frames,
            codec: decoder
                .codec()
                .map(|c| c.name().to_string())
                .unwrap_or_default(),
            source_path: Some(path.to_path_buf()),
        };
        log::debug!(
            "Opened {}: {}x{} @ {:.2} fps, {} frames ({})",
            path.display(),
            width,
            height,
            fps,
            total_frames,
            metadata.codec
        );

        self.input = Some(OpenInput {
            ictx,
            decoder,
            scaler,
            stream_index,
            width,
            height,
        });
        Ok(metadata)
    }

    fn frames(
        &mut self,
    ) -> Box<dyn Iterator<Item = Result<Frame, Box<dyn std::error::Error>>> + '_> {
        match self.input.as_mut() {
            Some(input) => Box::new(FrameIter {
                input,
                next_index: 0,
                eof_sent: false,
                done: false,
            }),
            None => Box::new(std::iter::once(Err("FfmpegReader: not opened".into()))),
        }
    }

    fn close(&mut self) {
        self.input = None;
    }
}

/// Decodes lazily, one packet at a time.
struct FrameIter<'a> {
    input: &'a mut OpenInput,
    next_index: usize,
    eof_sent: bool,
    done: bool,
}

impl FrameIter<'_> {
    fn receive(&mut self) -> Option<Result<Frame, Box<dyn std::error::Error>>> {
        let mut decoded = Video::empty();
        self.input.decoder.receive_frame(&mut decoded).ok()?;

        let mut rgb = Video::empty();
        if let Err(e) = self.input.scaler.run(&decoded, &mut rgb) {
            return Some(Err(Box::new(e)));
        }
        let pixels = packed_rgb(&rgb, self.input.width, self.input.height);
        let frame = Frame::new(pixels, self.input.width, self.input.height, 3, self.next_index);
        self.next_index += 1;
        Some(Ok(frame))
    }
}

impl Iterator for FrameIter<'_> {
    type Item = Result<Frame, Box<dyn std::error::Error>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        loop {
            if let Some(result) = self.receive() {
                return Some(result);
            }
            if self.eof_sent {
                self.done = true;
                return None;
            }

            match self.input.ictx.packets().next() {
                Some((stream, packet)) => {
                    if stream.index() != self.input.stream_index {
                        continue;
                    }
                    if let Err(e) = self.input.decoder.send_packet(&packet) {
                        log::warn!("Skipping undecodable packet: {e}");
                    }
                }
                None => {
                    let _ = self.input.decoder.send_eof();
                    self.eof_sent = true;
                }
            }
        }
    }
}

/// Copies an RGB24 frame into a tightly packed buffer, dropping row padding.
fn packed_rgb(frame: &Video, width: u32, height: u32) -> Vec<u8> {
    let stride = frame.stride(0);
    let row_len = width as usize * 3;
    let data = frame.data(0);
    let mut pixels = Vec::with_capacity(row_len * height as usize);
    for row in 0..height as usize {
        let start = row * stride;
        pixels.extend_from_slice(&data[start..start + row_len]);
    }
    pixels
}
