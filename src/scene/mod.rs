// Scene boundary collaborator
//
// Produces the ordered, non-overlapping scene list the pipeline consumes.
// The default implementation shells out to ffmpeg's scene-change filter.

pub mod ffmpeg;

use async_trait::async_trait;
use std::path::Path;

pub use ffmpeg::FfmpegSceneDetector;

use crate::config::{MediaConfig, SceneConfig};
use crate::error::Result;
use crate::region::SceneBoundary;

/// Main trait for scene boundary detection
#[async_trait]
pub trait SceneDetector: Send + Sync {
    /// Detect scene boundaries for the video at `path`. `frame_count` and
    /// `fps` come from the video source probe; the returned list covers the
    /// whole video as half-open frame intervals.
    async fn detect(&self, path: &Path, frame_count: u64, fps: f64) -> Result<Vec<SceneBoundary>>;
}

/// Factory for creating scene detector instances
pub struct SceneDetectorFactory;

impl SceneDetectorFactory {
    /// Create the default scene detector implementation (ffmpeg-based)
    pub fn create_detector(scene: SceneConfig, media: MediaConfig) -> Box<dyn SceneDetector> {
        Box::new(FfmpegSceneDetector::new(scene, media))
    }
}

/// Turn a sorted list of cut frames into boundaries covering
/// `[0, frame_count)`, merging any scene shorter than `min_scene_len`
/// frames into its predecessor.
pub fn boundaries_from_cuts(
    cuts: &[u64],
    frame_count: u64,
    min_scene_len: u64,
) -> Vec<SceneBoundary> {
    if frame_count == 0 {
        return Vec::new();
    }

    let mut starts: Vec<u64> = vec![0];
    for &cut in cuts {
        if cut == 0 || cut >= frame_count {
            continue;
        }
        let current_start = *starts.last().unwrap_or(&0);
        if cut - current_start >= min_scene_len {
            starts.push(cut);
        }
    }

    // A trailing stub merges backward into the last full scene.
    if starts.len() > 1 && frame_count - *starts.last().unwrap() < min_scene_len {
        starts.pop();
    }

    starts
        .windows(2)
        .map(|pair| SceneBoundary::new(pair[0], pair[1]))
        .chain(std::iter::once(SceneBoundary::new(
            *starts.last().unwrap(),
            frame_count,
        )))
        .collect()
}
