use tracing::debug;

use crate::error::{Result, TextdubError};
use crate::font::FontMetrics;
use crate::region::Quad;

/// A fitted overlay layout: one font size plus the wrapped lines that render
/// within the region at that size.
///
/// Derived deterministically from (text, region dimensions, font metrics);
/// recomputation is idempotent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    pub font_size: u32,
    pub lines: Vec<String>,
}

/// Greedy single-pass search for a font size and line wrap that pack a
/// translated string into a region's bounding box.
///
/// One third of the region height is reserved as margin and leading; the
/// candidate size for `n` lines is `floor(2H/3 / n)`. The line count grows
/// until every wrapped line measures within the region width or the size
/// degenerates below the minimum readable size.
pub struct TextLayoutEngine {
    metrics: FontMetrics,
    min_font_size: u32,
}

impl TextLayoutEngine {
    pub fn new(metrics: FontMetrics, min_font_size: u32) -> Self {
        Self {
            metrics,
            min_font_size: min_font_size.max(1),
        }
    }

    /// Compute the layout for `text` inside `quad`.
    ///
    /// Returns `LayoutOverflow` when no line count yields a readable size
    /// whose widest wrapped line fits the region width.
    pub fn fit(&self, quad: &Quad, text: &str) -> Result<Layout> {
        let width = quad.width();
        let height = quad.height();
        let char_count = text.chars().count();

        let overflow = || TextdubError::LayoutOverflow {
            width,
            height,
            chars: char_count,
        };

        if width == 0 || height == 0 {
            return Err(overflow());
        }

        let words: Vec<&str> = text.split_whitespace().collect();
        if words.is_empty() {
            return Ok(Layout {
                font_size: self.min_font_size,
                lines: Vec::new(),
            });
        }

        // One third of the height is margin/leading; flooring 2H/3 here and
        // the per-line division below matches flooring the quotient once.
        let available = 2 * height / 3;

        // More requested lines than words cannot change the wrap again.
        for line_count in 1..=words.len() as u32 {
            let size = available / line_count;
            if size < self.min_font_size {
                break;
            }
            let target_chars = (char_count / line_count as usize).max(1);
            let lines = wrap_words(&words, target_chars);
            let widest = lines
                .iter()
                .map(|line| self.metrics.measure(line, size))
                .fold(0.0f32, f32::max);
            if widest <= width as f32 {
                debug!(
                    "Layout fit: {} line(s) at size {} in {}x{}",
                    lines.len(),
                    size,
                    width,
                    height
                );
                return Ok(Layout {
                    font_size: size,
                    lines,
                });
            }
        }

        Err(overflow())
    }

    /// Degradation path for regions where `fit` overflows: wrap greedily by
    /// measured width at the minimum readable size, allowing the block to
    /// overflow the region vertically.
    ///
    /// Returns `None` when even a single word exceeds the region width at
    /// minimum size; the caller then skips the overlay for this region.
    pub fn fit_clamped(&self, quad: &Quad, text: &str) -> Option<Layout> {
        let width = quad.width();
        if width == 0 {
            return None;
        }
        let size = self.min_font_size;

        let mut lines: Vec<String> = Vec::new();
        let mut current = String::new();
        for word in text.split_whitespace() {
            if self.metrics.measure(word, size) > width as f32 {
                return None;
            }
            let candidate = if current.is_empty() {
                word.to_string()
            } else {
                format!("{} {}", current, word)
            };
            if self.metrics.measure(&candidate, size) <= width as f32 {
                current = candidate;
            } else {
                lines.push(current);
                current = word.to_string();
            }
        }
        if !current.is_empty() {
            lines.push(current);
        }
        if lines.is_empty() {
            return None;
        }
        Some(Layout {
            font_size: size,
            lines,
        })
    }
}

/// Wrap words into roughly `target_chars`-wide lines without ever splitting
/// a word. A word longer than the target occupies a line of its own.
fn wrap_words(words: &[&str], target_chars: usize) -> Vec<String> {
    let mut lines: Vec<String> = Vec::new();
    let mut current = String::new();
    for word in words {
        if current.is_empty() {
            current.push_str(word);
        } else if current.chars().count() + 1 + word.chars().count() <= target_chars {
            current.push(' ');
            current.push_str(word);
        } else {
            lines.push(std::mem::take(&mut current));
            current.push_str(word);
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}
