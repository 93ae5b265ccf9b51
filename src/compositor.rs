use crate::cache::DetectionCache;
use crate::config::{RenderConfig, TextAlign};
use crate::error::Result;
use crate::font::{FontMetrics, FontRasterizer};
use crate::frame::{Frame, RegionMask};
use crate::inpaint::Inpainter;

/// Value painted over each region before inpainting. The inpainter works
/// from the explicit mask, never from this pixel value.
const SENTINEL: [u8; 3] = [0, 0, 0];

/// Applies one scene's detection cache to a frame: masks every cached
/// region, inpaints the masked area, and overlays the laid-out translations.
pub struct FrameCompositor {
    inpainter: Box<dyn Inpainter>,
    rasterizer: Box<dyn FontRasterizer>,
    metrics: FontMetrics,
    render: RenderConfig,
}

impl FrameCompositor {
    pub fn new(
        inpainter: Box<dyn Inpainter>,
        rasterizer: Box<dyn FontRasterizer>,
        metrics: FontMetrics,
        render: RenderConfig,
    ) -> Self {
        Self {
            inpainter,
            rasterizer,
            metrics,
            render,
        }
    }

    /// Produce the composited frame. The cache is read-only; an empty cache
    /// yields a pixel-identical copy of the input.
    pub fn composite(&self, frame: &Frame, cache: &DetectionCache) -> Result<Frame> {
        if cache.is_empty() {
            return Ok(frame.clone());
        }

        let mut masked = frame.clone();
        let mut mask = RegionMask::new(frame.width(), frame.height());
        for (_, entry) in cache.entries() {
            masked.fill_quad(&entry.region.quad, SENTINEL);
            mask.fill_quad(&entry.region.quad);
        }

        let mut output = self.inpainter.inpaint(&masked, &mask)?;

        for (_, entry) in cache.entries() {
            let Some(layout) = &entry.layout else {
                continue;
            };
            let quad = &entry.region.quad;
            let anchor = quad.top_left();
            for (row, line) in layout.lines.iter().enumerate() {
                let x = match self.render.align {
                    TextAlign::Left => anchor.x,
                    TextAlign::Center => {
                        let line_width = self.metrics.measure(line, layout.font_size);
                        anchor.x + ((quad.width() as f32 - line_width) / 2.0).max(0.0) as i32
                    }
                };
                // The third of the region height reserved by the layout
                // absorbs leading, so lines advance by the font size alone.
                let y = anchor.y + (row as u32 * layout.font_size) as i32;
                self.rasterizer.draw_line(
                    &mut output,
                    x,
                    y,
                    line,
                    layout.font_size,
                    self.render.text_color,
                    self.render.stroke_width,
                    self.render.stroke_color,
                );
            }
        }

        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::inpaint::DiffusionInpainter;
    use crate::layout::Layout;
    use crate::region::{Detection, Quad};
    use std::sync::Mutex;

    /// Records draw calls instead of rasterizing glyphs.
    struct RecordingRasterizer {
        calls: Mutex<Vec<(i32, i32, String, u32)>>,
    }

    impl RecordingRasterizer {
        fn new() -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    impl FontRasterizer for RecordingRasterizer {
        fn draw_line(
            &self,
            _frame: &mut Frame,
            x: i32,
            y: i32,
            text: &str,
            size: u32,
            _fill: [u8; 3],
            _stroke_width: u32,
            _stroke_color: [u8; 3],
        ) {
            self.calls
                .lock()
                .unwrap()
                .push((x, y, text.to_string(), size));
        }
    }

    fn compositor_with_recorder() -> (FrameCompositor, std::sync::Arc<RecordingRasterizer>) {
        // A shared handle so the test can inspect calls after composite.
        struct Shared(std::sync::Arc<RecordingRasterizer>);
        impl FontRasterizer for Shared {
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
                self.0
                    .draw_line(frame, x, y, text, size, fill, stroke_width, stroke_color);
            }
        }

        let recorder = std::sync::Arc::new(RecordingRasterizer::new());
        let compositor = FrameCompositor::new(
            Box::new(DiffusionInpainter::new(1)),
            Box::new(Shared(recorder.clone())),
            FontMetrics::estimated(),
            Config::default().render,
        );
        (compositor, recorder)
    }

    fn cached_scene(layout: Option<Layout>) -> DetectionCache {
        let mut cache = DetectionCache::new();
        cache
            .populate(
                vec![Detection {
                    quad: Quad::from_rect(10, 20, 80, 30),
                    text: "STOP".to_string(),
                    confidence: 0.95,
                }],
                vec!["PARAR".to_string()],
            )
            .unwrap();
        cache.set_layout("STOP", layout);
        cache
    }

    #[test]
    fn test_empty_cache_is_identity() {
        let (compositor, recorder) = compositor_with_recorder();
        let frame = Frame::filled(64, 48, [120, 60, 200]);
        let output = compositor.composite(&frame, &DetectionCache::new()).unwrap();
        assert_eq!(output, frame);
        assert!(recorder.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_overlay_draws_each_layout_line() {
        let (compositor, recorder) = compositor_with_recorder();
        let frame = Frame::filled(128, 96, [90, 90, 90]);
        let cache = cached_scene(Some(Layout {
            font_size: 10,
            lines: vec!["PARAR".to_string(), "YA".to_string()],
        }));

        compositor.composite(&frame, &cache).unwrap();

        let calls = recorder.calls.lock().unwrap();
        assert_eq!(calls.len(), 2);
        // Lines anchored at the region's top-left, advancing by font size.
        assert_eq!(calls[0], (10, 20, "PARAR".to_string(), 10));
        assert_eq!(calls[1], (10, 30, "YA".to_string(), 10));
    }

    #[test]
    fn test_region_without_layout_is_masked_but_not_overlaid() {
        let (compositor, recorder) = compositor_with_recorder();
        let frame = Frame::filled(128, 96, [90, 90, 90]);
        let cache = cached_scene(None);

        let output = compositor.composite(&frame, &cache).unwrap();
        assert!(recorder.calls.lock().unwrap().is_empty());
        // Uniform background: inpainting restores the region seamlessly.
        assert_eq!(output.pixel(15, 25), [90, 90, 90]);
    }

    #[test]
    fn test_centered_lines_shift_right() {
        let recorder = std::sync::Arc::new(RecordingRasterizer::new());
        struct Shared(std::sync::Arc<RecordingRasterizer>);
        impl FontRasterizer for Shared {
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
                self.0
                    .draw_line(frame, x, y, text, size, fill, stroke_width, stroke_color);
            }
        }
        let mut render = Config::default().render;
        render.align = TextAlign::Center;
        let compositor = FrameCompositor::new(
            Box::new(DiffusionInpainter::new(1)),
            Box::new(Shared(recorder.clone())),
            FontMetrics::estimated(),
            render,
        );

        let frame = Frame::filled(128, 96, [90, 90, 90]);
        let cache = cached_scene(Some(Layout {
            font_size: 10,
            lines: vec!["YA".to_string()],
        }));
        compositor.composite(&frame, &cache).unwrap();

        let calls = recorder.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].0 > 10, "centered line should shift right of the anchor");
    }

    #[test]
    fn test_composite_does_not_mutate_input_frame() {
        let (compositor, _) = compositor_with_recorder();
        let frame = Frame::filled(64, 48, [10, 200, 10]);
        let original = frame.clone();
        let cache = cached_scene(Some(Layout {
            font_size: 10,
            lines: vec!["PARAR".to_string()],
        }));
        compositor.composite(&frame, &cache).unwrap();
        assert_eq!(frame, original);
    }
}
