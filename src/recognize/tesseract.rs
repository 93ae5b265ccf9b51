use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::process::Command;
use tracing::debug;

use super::TextRecognizer;
use crate::config::OcrConfig;
use crate::error::{Result, TextdubError};
use crate::frame::Frame;
use crate::region::{Detection, Quad};

/// Tesseract-based recognizer. The frame is written to a temporary PNG and
/// recognized via `tesseract <png> stdout ... tsv`; level-5 word rows are
/// regrouped into full lines with a union bounding box.
pub struct TesseractRecognizer {
    config: OcrConfig,
}

impl TesseractRecognizer {
    pub fn new(config: OcrConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl TextRecognizer for TesseractRecognizer {
    async fn recognize(&self, frame: &Frame) -> Result<Vec<Detection>> {
        let dir = tempfile::tempdir()
            .map_err(|e| TextdubError::Recognize(format!("Failed to create temp dir: {}", e)))?;
        let png_path = dir.path().join("frame.png");
        frame
            .as_image()
            .save(&png_path)
            .map_err(|e| TextdubError::Recognize(format!("Failed to write frame PNG: {}", e)))?;

        let output = Command::new("tesseract")
            .arg(&png_path)
            .arg("stdout")
            .arg("-l")
            .arg(&self.config.lang_id)
            .arg("--psm")
            .arg(self.config.page_seg_mode.to_string())
            .arg("tsv")
            .output()
            .await
            .map_err(|e| {
                TextdubError::Recognize(format!("Failed to run tesseract (is it installed?): {}", e))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(TextdubError::Recognize(format!(
                "tesseract failed: {}",
                stderr.trim()
            )));
        }

        let tsv = String::from_utf8_lossy(&output.stdout);
        let detections = parse_tsv(&tsv);
        debug!("tesseract returned {} line(s)", detections.len());
        Ok(detections)
    }
}

struct WordRow {
    text: String,
    left: i32,
    top: i32,
    width: i32,
    height: i32,
    conf: f32,
}

/// Group level-5 (word) rows by (page, block, paragraph, line) into one
/// detection per recognized line. Confidence is the character-weighted mean
/// of the word confidences, normalized to `0.0..=1.0`.
fn parse_tsv(tsv: &str) -> Vec<Detection> {
    let mut line_map: BTreeMap<(i32, i32, i32, i32), Vec<WordRow>> = BTreeMap::new();

    for (idx, row) in tsv.lines().enumerate() {
        if idx == 0 {
            continue;
        }
        let cols: Vec<&str> = row.split('\t').collect();
        if cols.len() < 12 {
            continue;
        }
        let level: i32 = cols[0].parse().unwrap_or(0);
        if level != 5 {
            continue;
        }
        let page_num: i32 = cols[1].parse().unwrap_or(0);
        let block_num: i32 = cols[2].parse().unwrap_or(0);
        let par_num: i32 = cols[3].parse().unwrap_or(0);
        let line_num: i32 = cols[4].parse().unwrap_or(0);
        let left: i32 = cols[6].parse().unwrap_or(0);
        let top: i32 = cols[7].parse().unwrap_or(0);
        let width: i32 = cols[8].parse().unwrap_or(0);
        let height: i32 = cols[9].parse().unwrap_or(0);
        let conf: f32 = cols[10].parse().unwrap_or(-1.0);
        let text = cols[11].trim();
        if text.is_empty() || conf < 0.0 {
            continue;
        }

        line_map
            .entry((page_num, block_num, par_num, line_num))
            .or_default()
            .push(WordRow {
                text: text.to_string(),
                left,
                top,
                width,
                height,
                conf,
            });
    }

    let mut detections = Vec::new();
    for (_, mut words) in line_map {
        words.sort_by_key(|word| word.left);

        let x1 = words.iter().map(|w| w.left).min().unwrap_or(0);
        let y1 = words.iter().map(|w| w.top).min().unwrap_or(0);
        let x2 = words.iter().map(|w| w.left + w.width).max().unwrap_or(0);
        let y2 = words.iter().map(|w| w.top + w.height).max().unwrap_or(0);

        let text = words
            .iter()
            .map(|w| w.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");

        let total_chars: usize = words.iter().map(|w| w.text.chars().count().max(1)).sum();
        let weighted: f32 = words
            .iter()
            .map(|w| w.conf * w.text.chars().count().max(1) as f32)
            .sum();
        let confidence = (weighted / total_chars.max(1) as f32) / 100.0;

        detections.push(Detection {
            quad: Quad::from_rect(x1, y1, x2 - x1, y2 - y1),
            text,
            confidence,
        });
    }
    detections
}
