use async_trait::async_trait;
use serde::Deserialize;
use std::path::Path;
use std::process::Stdio;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tracing::{debug, info};

use super::{VideoSink, VideoSource};
use crate::config::MediaConfig;
use crate::error::{Result, TextdubError};
use crate::frame::Frame;

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    streams: Vec<ProbeStream>,
    format: Option<ProbeFormat>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    width: u32,
    height: u32,
    r_frame_rate: String,
    nb_frames: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

/// Stream properties gathered before decoding starts.
#[derive(Debug, Clone, Copy)]
pub struct ProbeInfo {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub frame_count: u64,
}

/// Verify that both ffmpeg and ffprobe can be executed.
pub async fn check_availability(config: &MediaConfig) -> Result<()> {
    for tool in [&config.ffmpeg_path, &config.ffprobe_path] {
        let output = Command::new(tool)
            .arg("-version")
            .output()
            .await
            .map_err(|e| TextdubError::Media(format!("Failed to run {}: {}", tool, e)))?;
        if !output.status.success() {
            return Err(TextdubError::Media(format!(
                "{} is not available: {}",
                tool,
                String::from_utf8_lossy(&output.stderr)
            )));
        }
        debug!("Found {}", tool);
    }
    Ok(())
}

/// Run ffprobe on the first video stream of `path`.
pub async fn probe(config: &MediaConfig, path: &Path) -> Result<ProbeInfo> {
    let output = Command::new(&config.ffprobe_path)
        .arg("-v")
        .arg("error")
        .arg("-select_streams")
        .arg("v:0")
        .arg("-show_entries")
        .arg("stream=width,height,r_frame_rate,nb_frames")
        .arg("-show_entries")
        .arg("format=duration")
        .arg("-of")
        .arg("json")
        .arg(path)
        .output()
        .await
        .map_err(|e| TextdubError::Media(format!("Failed to run ffprobe: {}", e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(TextdubError::Media(format!(
            "ffprobe failed: {}",
            stderr.trim()
        )));
    }

    parse_probe(&String::from_utf8_lossy(&output.stdout))
}

/// Parse ffprobe JSON. Frame count prefers `nb_frames`; containers that omit
/// it fall back to `duration * fps`.
fn parse_probe(json: &str) -> Result<ProbeInfo> {
    let parsed: ProbeOutput = serde_json::from_str(json)
        .map_err(|e| TextdubError::Media(format!("Malformed ffprobe output: {}", e)))?;
    let stream = parsed
        .streams
        .first()
        .ok_or_else(|| TextdubError::Media("No video stream found".to_string()))?;

    let fps = parse_rate(&stream.r_frame_rate)?;

    let frame_count = match stream.nb_frames.as_deref().and_then(|n| n.parse::<u64>().ok()) {
        Some(count) => count,
        None => {
            let duration = parsed
                .format
                .as_ref()
                .and_then(|f| f.duration.as_deref())
                .and_then(|d| d.parse::<f64>().ok())
                .ok_or_else(|| {
                    TextdubError::Media("Stream reports neither nb_frames nor duration".to_string())
                })?;
            (duration * fps).round() as u64
        }
    };

    Ok(ProbeInfo {
        width: stream.width,
        height: stream.height,
        fps,
        frame_count,
    })
}

/// Parse an ffprobe rational like "30000/1001" or "25/1".
fn parse_rate(rate: &str) -> Result<f64> {
    let invalid = || TextdubError::Media(format!("Invalid frame rate: {}", rate));
    match rate.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.parse().map_err(|_| invalid())?;
            let den: f64 = den.parse().map_err(|_| invalid())?;
            if den == 0.0 {
                return Err(invalid());
            }
            Ok(num / den)
        }
        None => rate.parse().map_err(|_| invalid()),
    }
}

/// Decodes the video to interleaved rgb24 over a pipe, one sequential frame
/// per read. No seeking; each frame is read exactly once.
pub struct FfmpegVideoSource {
    child: Child,
    stdout: ChildStdout,
    info: ProbeInfo,
    frames_read: u64,
}

impl FfmpegVideoSource {
    pub async fn open(config: &MediaConfig, path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(TextdubError::FileNotFound(path.display().to_string()));
        }
        let info = probe(config, path).await?;
        info!(
            "Opened {}: {}x{} @ {:.3} fps, {} frames",
            path.display(),
            info.width,
            info.height,
            info.fps,
            info.frame_count
        );

        let mut child = Command::new(&config.ffmpeg_path)
            .arg("-v")
            .arg("error")
            .arg("-i")
            .arg(path)
            .arg("-f")
            .arg("rawvideo")
            .arg("-pix_fmt")
            .arg("rgb24")
            .arg("pipe:1")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| TextdubError::Media(format!("Failed to spawn ffmpeg: {}", e)))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| TextdubError::Media("ffmpeg stdout not captured".to_string()))?;

        Ok(Self {
            child,
            stdout,
            info,
            frames_read: 0,
        })
    }
}

#[async_trait]
impl VideoSource for FfmpegVideoSource {
    fn frame_count(&self) -> u64 {
        self.info.frame_count
    }

    fn fps(&self) -> f64 {
        self.info.fps
    }

    fn dimensions(&self) -> (u32, u32) {
        (self.info.width, self.info.height)
    }

    async fn next_frame(&mut self) -> Result<Option<Frame>> {
        let frame_size = (self.info.width * self.info.height * 3) as usize;
        let mut buffer = vec![0u8; frame_size];
        let mut filled = 0usize;
        while filled < frame_size {
            let read = self
                .stdout
                .read(&mut buffer[filled..])
                .await
                .map_err(|_| TextdubError::SourceRead(self.frames_read))?;
            if read == 0 {
                if filled == 0 {
                    return Ok(None);
                }
                // Truncated frame mid-stream
                return Err(TextdubError::SourceRead(self.frames_read));
            }
            filled += read;
        }

        let frame = Frame::from_raw(self.info.width, self.info.height, buffer)
            .ok_or(TextdubError::SourceRead(self.frames_read))?;
        self.frames_read += 1;
        Ok(Some(frame))
    }

    async fn release(&mut self) -> Result<()> {
        debug!("Releasing video source after {} frame(s)", self.frames_read);
        let _ = self.child.start_kill();
        self.child
            .wait()
            .await
            .map_err(|e| TextdubError::Media(format!("Failed to reap decoder: {}", e)))?;
        Ok(())
    }
}

/// Encodes rgb24 frames piped to ffmpeg's stdin into the output container.
pub struct FfmpegVideoSink {
    child: Child,
    stdin: Option<ChildStdin>,
    width: u32,
    height: u32,
    frames_written: u64,
}

impl FfmpegVideoSink {
    pub async fn create(
        config: &MediaConfig,
        path: &Path,
        width: u32,
        height: u32,
        fps: f64,
    ) -> Result<Self> {
        let mut command = Command::new(&config.ffmpeg_path);
        command
            .arg("-v")
            .arg("error")
            .arg("-f")
            .arg("rawvideo")
            .arg("-pix_fmt")
            .arg("rgb24")
            .arg("-s")
            .arg(format!("{}x{}", width, height))
            .arg("-r")
            .arg(format!("{:.6}", fps))
            .arg("-i")
            .arg("pipe:0")
            .arg("-c:v")
            .arg(&config.codec);
        for option in &config.encode_options {
            command.arg(option);
        }
        let mut child = command
            .arg("-y")
            .arg(path)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| TextdubError::Media(format!("Failed to spawn encoder: {}", e)))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| TextdubError::Media("ffmpeg stdin not captured".to_string()))?;

        info!("Encoding to {} ({}x{} @ {:.3} fps)", path.display(), width, height, fps);

        Ok(Self {
            child,
            stdin: Some(stdin),
            width,
            height,
            frames_written: 0,
        })
    }
}

#[async_trait]
impl VideoSink for FfmpegVideoSink {
    async fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        if frame.width() != self.width || frame.height() != self.height {
            return Err(TextdubError::Media(format!(
                "Frame {}x{} does not match sink {}x{}",
                frame.width(),
                frame.height(),
                self.width,
                self.height
            )));
        }
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| TextdubError::Media("Sink already released".to_string()))?;
        stdin
            .write_all(frame.as_image().as_raw())
            .await
            .map_err(|e| TextdubError::Media(format!("Failed to write frame: {}", e)))?;
        self.frames_written += 1;
        Ok(())
    }

    async fn release(&mut self) -> Result<()> {
        debug!("Releasing video sink after {} frame(s)", self.frames_written);
        // Closing stdin signals end of stream so the encoder can flush.
        self.stdin.take();
        let status = self
            .child
            .wait()
            .await
            .map_err(|e| TextdubError::Media(format!("Failed to reap encoder: {}", e)))?;
        if !status.success() {
            return Err(TextdubError::Media(format!(
                "Encoder exited with {}",
                status
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rate_rational() {
        assert!((parse_rate("30000/1001").unwrap() - 29.97).abs() < 0.01);
        assert_eq!(parse_rate("25/1").unwrap(), 25.0);
    }

    #[test]
    fn test_parse_rate_plain_and_invalid() {
        assert_eq!(parse_rate("24").unwrap(), 24.0);
        assert!(parse_rate("25/0").is_err());
        assert!(parse_rate("abc").is_err());
    }

    #[test]
    fn test_parse_probe_with_nb_frames() {
        let json = r#"{
            "streams": [{"width": 1280, "height": 720, "r_frame_rate": "25/1", "nb_frames": "250"}],
            "format": {"duration": "10.0"}
        }"#;
        let info = parse_probe(json).unwrap();
        assert_eq!(info.width, 1280);
        assert_eq!(info.height, 720);
        assert_eq!(info.fps, 25.0);
        assert_eq!(info.frame_count, 250);
    }

    #[test]
    fn test_parse_probe_falls_back_to_duration() {
        let json = r#"{
            "streams": [{"width": 640, "height": 480, "r_frame_rate": "30000/1001"}],
            "format": {"duration": "2.002"}
        }"#;
        let info = parse_probe(json).unwrap();
        assert_eq!(info.frame_count, 60);
    }

    #[test]
    fn test_parse_probe_without_video_stream() {
        let json = r#"{"streams": [], "format": {"duration": "1.0"}}"#;
        assert!(parse_probe(json).is_err());
    }
}
