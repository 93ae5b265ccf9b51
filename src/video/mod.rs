// Video I/O collaborators
//
// A source decodes frames sequentially (each frame is read exactly once)
// and a sink encodes them in the same order. The default implementations
// pipe rawvideo rgb24 through ffmpeg.

pub mod ffmpeg;

use async_trait::async_trait;
use std::path::Path;

pub use ffmpeg::{check_availability, probe, FfmpegVideoSink, FfmpegVideoSource, ProbeInfo};

use crate::config::MediaConfig;
use crate::error::Result;
use crate::frame::Frame;

/// Sequential decoded-frame reader.
#[async_trait]
pub trait VideoSource: Send {
    fn frame_count(&self) -> u64;
    fn fps(&self) -> f64;
    fn dimensions(&self) -> (u32, u32);

    /// Next decoded frame, or `None` at end of stream.
    async fn next_frame(&mut self) -> Result<Option<Frame>>;

    /// Release decoder resources. Must be called on every exit path;
    /// failures are logged by the caller and are non-fatal.
    async fn release(&mut self) -> Result<()>;
}

/// Sequential encoded-frame writer.
#[async_trait]
pub trait VideoSink: Send {
    async fn write_frame(&mut self, frame: &Frame) -> Result<()>;

    /// Flush and close the encoder. Must be called on every exit path.
    async fn release(&mut self) -> Result<()>;
}

/// Factory for creating video source/sink instances
pub struct VideoIoFactory;

impl VideoIoFactory {
    /// Open the default video source implementation (ffmpeg-based)
    pub async fn open_source(config: &MediaConfig, path: &Path) -> Result<Box<dyn VideoSource>> {
        Ok(Box::new(FfmpegVideoSource::open(config, path).await?))
    }

    /// Create the default video sink implementation (ffmpeg-based), writing
    /// with the source's frame rate and dimensions.
    pub async fn create_sink(
        config: &MediaConfig,
        path: &Path,
        width: u32,
        height: u32,
        fps: f64,
    ) -> Result<Box<dyn VideoSink>> {
        Ok(Box::new(
            FfmpegVideoSink::create(config, path, width, height, fps).await?,
        ))
    }
}
