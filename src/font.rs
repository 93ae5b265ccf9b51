// Font collaborator: width measurement for layout and glyph rasterization
// for overlay drawing. Measurement and drawing both derive from the same
// font file so measured and rendered widths agree.

use std::path::Path;
use std::sync::Arc;
use ttf_parser::Face;

use crate::error::{Result, TextdubError};
use crate::frame::Frame;

/// Horizontal text measurement backed by TrueType advance widths.
///
/// `estimated()` provides a font-free fallback with fixed per-character unit
/// widths; it keeps measurement deterministic when no font file is available
/// (and is what tests use).
#[derive(Clone)]
pub struct FontMetrics {
    data: Option<Arc<Vec<u8>>>,
    units_per_em: u16,
    space_advance: u16,
}

impl FontMetrics {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read(path)
            .map_err(|e| TextdubError::Font(format!("Failed to read font {}: {}", path.display(), e)))?;
        let face = Face::parse(&data, 0)
            .map_err(|e| TextdubError::Font(format!("Failed to parse font {}: {}", path.display(), e)))?;
        let units_per_em = face.units_per_em().max(1);
        let space_advance = face
            .glyph_index(' ')
            .and_then(|id| face.glyph_hor_advance(id))
            .unwrap_or(units_per_em / 2);
        Ok(Self {
            data: Some(Arc::new(data)),
            units_per_em,
            space_advance,
        })
    }

    /// Font-free metrics using per-character width estimates.
    pub fn estimated() -> Self {
        Self {
            data: None,
            units_per_em: 1,
            space_advance: 0,
        }
    }

    /// Rendered width in pixels of `text` at `size`, newline characters
    /// excluded. Unmapped glyphs fall back to the space advance.
    pub fn measure(&self, text: &str, size: u32) -> f32 {
        if let Some(data) = &self.data {
            if let Ok(face) = Face::parse(data, 0) {
                let mut advance = 0u32;
                for ch in text.chars() {
                    if ch == '\n' {
                        continue;
                    }
                    let glyph_advance = face
                        .glyph_index(ch)
                        .and_then(|id| face.glyph_hor_advance(id))
                        .unwrap_or(self.space_advance);
                    advance = advance.saturating_add(glyph_advance as u32);
                }
                return advance as f32 * (size as f32 / self.units_per_em as f32);
            }
        }
        estimate_text_width_units(text) * size as f32
    }
}

fn estimate_char_units(ch: char) -> f32 {
    if ch == '\n' {
        0.0
    } else if ch.is_whitespace() {
        0.25
    } else if ch.is_ascii_alphanumeric() {
        0.55
    } else if ch.is_ascii() {
        0.35
    } else if matches!(
        ch as u32,
        0x4E00..=0x9FFF | 0x3040..=0x30FF | 0x31F0..=0x31FF
    ) {
        1.0
    } else {
        0.9
    }
}

fn estimate_text_width_units(text: &str) -> f32 {
    text.chars().map(estimate_char_units).sum()
}

/// Glyph drawing collaborator used by the compositor.
pub trait FontRasterizer: Send + Sync {
    /// Draw one line of text with `(x, y)` as the top-left of its line box,
    /// filling with `fill` and outlining with `stroke_width` pixels of
    /// `stroke_color`.
    fn draw_line(
        &self,
        frame: &mut Frame,
        x: i32,
        y: i32,
        text: &str,
        size: u32,
        fill: [u8; 3],
        stroke_width: u32,
        stroke_color: [u8; 3],
    );
}

/// fontdue-backed rasterizer. The stroke pass re-renders the glyph coverage
/// at every integer offset within the stroke radius underneath the fill pass.
pub struct FontdueRasterizer {
    font: fontdue::Font,
}

impl FontdueRasterizer {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read(path)
            .map_err(|e| TextdubError::Font(format!("Failed to read font {}: {}", path.display(), e)))?;
        Self::from_data(&data)
    }

    pub fn from_data(data: &[u8]) -> Result<Self> {
        let font = fontdue::Font::from_bytes(data, fontdue::FontSettings::default())
            .map_err(|e| TextdubError::Font(format!("Failed to parse font: {}", e)))?;
        Ok(Self { font })
    }

    fn blit_glyph(
        frame: &mut Frame,
        coverage: &[u8],
        glyph_w: usize,
        glyph_h: usize,
        origin_x: i32,
        origin_y: i32,
        color: [u8; 3],
    ) {
        for row in 0..glyph_h {
            let py = origin_y + row as i32;
            if py < 0 || py >= frame.height() as i32 {
                continue;
            }
            for col in 0..glyph_w {
                let px = origin_x + col as i32;
                if px < 0 || px >= frame.width() as i32 {
                    continue;
                }
                let alpha = coverage[row * glyph_w + col] as u32;
                if alpha == 0 {
                    continue;
                }
                let dst = frame.pixel(px as u32, py as u32);
                let blended = [
                    ((color[0] as u32 * alpha + dst[0] as u32 * (255 - alpha)) / 255) as u8,
                    ((color[1] as u32 * alpha + dst[1] as u32 * (255 - alpha)) / 255) as u8,
                    ((color[2] as u32 * alpha + dst[2] as u32 * (255 - alpha)) / 255) as u8,
                ];
                frame.put_pixel(px as u32, py as u32, blended);
            }
        }
    }
}

impl FontRasterizer for FontdueRasterizer {
    fn draw_line(
        &self,
        frame: &mut Frame,
        x: i32,
        y: i32,
        text: &str,
        size: u32,
        fill: [u8; 3],
        stroke_width: u32,
        stroke_color: [u8; 3],
    ) {
        let px_size = size as f32;
        let ascent = self
            .font
            .horizontal_line_metrics(px_size)
            .map(|m| m.ascent)
            .unwrap_or(px_size * 0.8);
        let baseline = y + ascent.round() as i32;

        // Integer offsets within the stroke radius, drawn before the fill.
        let radius = stroke_width as i32;
        let mut offsets = Vec::new();
        for dy in -radius..=radius {
            for dx in -radius..=radius {
                if dx * dx + dy * dy <= radius * radius && (dx != 0 || dy != 0) {
                    offsets.push((dx, dy));
                }
            }
        }

        let mut pen_x = x as f32;
        for ch in text.chars() {
            let (metrics, coverage) = self.font.rasterize(ch, px_size);
            let glyph_x = pen_x.round() as i32 + metrics.xmin;
            let glyph_y = baseline - metrics.ymin - metrics.height as i32;

            if metrics.width > 0 && metrics.height > 0 {
                for &(dx, dy) in &offsets {
                    Self::blit_glyph(
                        frame,
                        &coverage,
                        metrics.width,
                        metrics.height,
                        glyph_x + dx,
                        glyph_y + dy,
                        stroke_color,
                    );
                }
                Self::blit_glyph(
                    frame,
                    &coverage,
                    metrics.width,
                    metrics.height,
                    glyph_x,
                    glyph_y,
                    fill,
                );
            }
            pen_x += metrics.advance_width;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_estimated_measure_is_deterministic() {
        let metrics = FontMetrics::estimated();
        let a = metrics.measure("PARAR", 12);
        let b = metrics.measure("PARAR", 12);
        assert_eq!(a, b);
    }

    #[test]
    fn test_estimated_measure_scales_with_size() {
        let metrics = FontMetrics::estimated();
        let small = metrics.measure("hello", 10);
        let large = metrics.measure("hello", 20);
        assert!((large - small * 2.0).abs() < 1e-3);
    }

    #[test]
    fn test_estimated_measure_ignores_newlines() {
        let metrics = FontMetrics::estimated();
        assert_eq!(metrics.measure("ab\ncd", 10), metrics.measure("abcd", 10));
    }

    #[test]
    fn test_longer_text_measures_wider() {
        let metrics = FontMetrics::estimated();
        assert!(metrics.measure("wrapping", 14) > metrics.measure("wrap", 14));
    }
}
