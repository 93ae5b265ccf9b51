use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Result, TextdubError};

// Defaults for fields added after the first config format shipped
fn default_min_font_size() -> u32 {
    8
}

fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub scene: SceneConfig,
    pub ocr: OcrConfig,
    pub translate: TranslateConfig,
    pub render: RenderConfig,
    pub pipeline: PipelineConfig,
    pub media: MediaConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneConfig {
    /// Scene-change score threshold for the ffmpeg `select` filter (0.0-1.0)
    pub threshold: f64,
    /// Scenes shorter than this many frames are merged into their predecessor
    pub min_scene_len: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrConfig {
    /// Recognition language identifier (tesseract language code)
    pub lang_id: String,
    /// Detections below this confidence are dropped (0.0-1.0)
    pub conf_threshold: f32,
    /// Tesseract page segmentation mode
    pub page_seg_mode: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslateConfig {
    /// Translation service endpoint URL
    pub endpoint: String,
    /// Maximum retries for transient translation failures
    pub max_retries: u32,
    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TextAlign {
    /// Anchor every wrapped line at the region's left edge
    Left,
    /// Center each wrapped line within the region width
    Center,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderConfig {
    /// Path to the TrueType font used for overlay text
    pub font_path: String,
    /// Overlay fill color
    pub text_color: [u8; 3],
    /// Outline width in pixels for legibility against arbitrary backgrounds
    pub stroke_width: u32,
    /// Outline color
    pub stroke_color: [u8; 3],
    /// Line alignment within the region
    pub align: TextAlign,
    /// Smallest readable font size; layout degrades to this before skipping
    #[serde(default = "default_min_font_size")]
    pub min_font_size: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// When true, a scene whose translation fails is composited untranslated
    /// instead of aborting the run
    pub skip_failed_scenes: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaConfig {
    /// Path to ffmpeg binary
    pub ffmpeg_path: String,
    /// Path to ffprobe binary
    pub ffprobe_path: String,
    /// Output video codec passed to ffmpeg
    pub codec: String,
    /// Additional encoder options, e.g. ["-preset", "medium", "-crf", "23"]
    pub encode_options: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            scene: SceneConfig {
                threshold: 0.4,
                min_scene_len: 15,
            },
            ocr: OcrConfig {
                lang_id: "eng".to_string(),
                conf_threshold: 0.1,
                page_seg_mode: 6,
            },
            translate: TranslateConfig {
                endpoint: "http://localhost:8080/api/translatetext/batch".to_string(),
                max_retries: 3,
                timeout_secs: 30,
            },
            render: RenderConfig {
                font_path: "assets/NotoSans-Regular.ttf".to_string(),
                text_color: [255, 255, 255],
                stroke_width: 3,
                stroke_color: [0, 0, 0],
                align: TextAlign::Left,
                min_font_size: 8,
            },
            pipeline: PipelineConfig {
                skip_failed_scenes: false,
            },
            media: MediaConfig {
                ffmpeg_path: "ffmpeg".to_string(),
                ffprobe_path: "ffprobe".to_string(),
                codec: "libx264".to_string(),
                encode_options: vec![
                    "-pix_fmt".to_string(),
                    "yuv420p".to_string(),
                ],
            },
        }
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| TextdubError::Config(format!("Failed to read config file: {}", e)))?;

        toml::from_str(&content)
            .map_err(|e| TextdubError::Config(format!("Failed to parse config file: {}", e)))
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| TextdubError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| TextdubError::Config(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }
}
