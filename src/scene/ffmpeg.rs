use async_trait::async_trait;
use std::path::Path;
use tokio::process::Command;
use tracing::{debug, info};

use super::{boundaries_from_cuts, SceneDetector};
use crate::config::{MediaConfig, SceneConfig};
use crate::error::{Result, TextdubError};
use crate::region::SceneBoundary;

/// Scene detection via ffmpeg's `select='gt(scene,threshold)'` filter.
///
/// The filter chain discards all output (`-f null`) and the cut timestamps
/// are scraped from `showinfo` lines on stderr.
pub struct FfmpegSceneDetector {
    scene: SceneConfig,
    media: MediaConfig,
}

impl FfmpegSceneDetector {
    pub fn new(scene: SceneConfig, media: MediaConfig) -> Self {
        Self { scene, media }
    }
}

#[async_trait]
impl SceneDetector for FfmpegSceneDetector {
    async fn detect(&self, path: &Path, frame_count: u64, fps: f64) -> Result<Vec<SceneBoundary>> {
        info!("Detecting scene changes in {}", path.display());

        let filter = format!(
            "select='gt(scene,{})',showinfo",
            self.scene.threshold
        );
        let output = Command::new(&self.media.ffmpeg_path)
            .arg("-i")
            .arg(path)
            .arg("-vf")
            .arg(&filter)
            .arg("-f")
            .arg("null")
            .arg("-")
            .output()
            .await
            .map_err(|e| TextdubError::Scene(format!("Failed to run ffmpeg: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(TextdubError::Scene(format!(
                "ffmpeg scene detection failed: {}",
                stderr.lines().last().unwrap_or("unknown error")
            )));
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        let cuts = parse_cut_frames(&stderr, fps);
        debug!("ffmpeg reported {} scene cuts", cuts.len());

        let boundaries = boundaries_from_cuts(&cuts, frame_count, self.scene.min_scene_len);
        info!("Detected {} scenes", boundaries.len());
        Ok(boundaries)
    }
}

/// Extract the source frame index of every selected frame from showinfo
/// stderr output. The filter renumbers output frames, so the index is
/// recovered from `pts_time` and the source frame rate.
fn parse_cut_frames(stderr: &str, fps: f64) -> Vec<u64> {
    let mut cuts = Vec::new();
    for line in stderr.lines() {
        if !line.contains("Parsed_showinfo") {
            continue;
        }
        let Some(start) = line.find("pts_time:") else {
            continue;
        };
        let rest = &line[start + "pts_time:".len()..];
        let token: String = rest
            .chars()
            .take_while(|c| c.is_ascii_digit() || *c == '.')
            .collect();
        if let Ok(seconds) = token.parse::<f64>() {
            cuts.push((seconds * fps).round() as u64);
        }
    }
    cuts.sort_unstable();
    cuts.dedup();
    cuts
}
