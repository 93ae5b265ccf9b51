use indicatif::ProgressBar;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};

use crate::cache::DetectionCache;
use crate::compositor::FrameCompositor;
use crate::error::Result;
use crate::frame::Frame;
use crate::layout::TextLayoutEngine;
use crate::recognize::TextRecognizer;
use crate::region::{validate_boundaries, Detection, Quad, SceneBoundary};
use crate::translate::Translator;
use crate::video::{VideoSink, VideoSource};

/// Where the pipeline stands relative to the boundary list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PipelineState {
    /// No scene started yet, or past the last boundary
    Idle,
    /// Inside a scene with a populated cache
    SceneActive,
    /// Between two scenes, waiting for the next start frame
    SceneBoundary,
}

/// The frame-by-frame state machine.
///
/// Recognition and translation run at most once per scene, on exactly the
/// scene's start frame; every other frame of the scene is composited from
/// the cached, already-translated regions. The boundary list is consumed via
/// a single forward cursor.
pub struct ScenePipeline {
    recognizer: Box<dyn TextRecognizer>,
    translator: Box<dyn Translator>,
    layout: TextLayoutEngine,
    compositor: FrameCompositor,
    conf_threshold: f32,
    skip_failed_scenes: bool,
    state: PipelineState,
    cache: DetectionCache,
    cursor: usize,
}

impl ScenePipeline {
    pub fn new(
        recognizer: Box<dyn TextRecognizer>,
        translator: Box<dyn Translator>,
        layout: TextLayoutEngine,
        compositor: FrameCompositor,
        conf_threshold: f32,
        skip_failed_scenes: bool,
    ) -> Self {
        Self {
            recognizer,
            translator,
            layout,
            compositor,
            conf_threshold,
            skip_failed_scenes,
            state: PipelineState::Idle,
            cache: DetectionCache::new(),
            cursor: 0,
        }
    }

    /// Drive the full video through the state machine, writing every
    /// composited frame to the sink in order.
    ///
    /// The cancellation flag is checked once per frame; the caller is
    /// responsible for releasing the source and sink on every exit path.
    pub async fn run(
        &mut self,
        source: &mut dyn VideoSource,
        sink: &mut dyn VideoSink,
        boundaries: &[SceneBoundary],
        source_lang: &str,
        target_lang: &str,
        cancel: &AtomicBool,
    ) -> Result<()> {
        validate_boundaries(boundaries, source.frame_count())?;

        let progress = ProgressBar::new(source.frame_count());
        let mut frame_index = 0u64;
        loop {
            if cancel.load(Ordering::Relaxed) {
                info!("Cancellation requested at frame {}", frame_index);
                break;
            }
            let Some(frame) = source.next_frame().await? else {
                break;
            };
            let output = self
                .process_frame(frame_index, &frame, boundaries, source_lang, target_lang)
                .await?;
            sink.write_frame(&output).await?;
            frame_index += 1;
            progress.inc(1);
        }
        progress.finish_and_clear();
        info!("Processed {} frame(s)", frame_index);
        Ok(())
    }

    async fn process_frame(
        &mut self,
        frame_index: u64,
        frame: &Frame,
        boundaries: &[SceneBoundary],
        source_lang: &str,
        target_lang: &str,
    ) -> Result<Frame> {
        let Some(boundary) = boundaries.get(self.cursor).copied() else {
            // Past the last boundary
            self.state = PipelineState::Idle;
            return Ok(frame.clone());
        };

        if frame_index == boundary.start_frame {
            self.start_scene(frame, source_lang, target_lang).await?;
            self.state = PipelineState::SceneActive;
            let output = self.compositor.composite(frame, &self.cache)?;
            if frame_index + 1 == boundary.end_frame {
                // Single-frame scene: close it out right after compositing.
                self.close_scene(boundaries);
            }
            return Ok(output);
        }

        if frame_index + 1 == boundary.end_frame {
            // Last frame before the boundary: the cache is cleared first,
            // so this frame passes through unmodified.
            self.close_scene(boundaries);
            return Ok(frame.clone());
        }

        match self.state {
            PipelineState::SceneActive => self.compositor.composite(frame, &self.cache),
            _ => Ok(frame.clone()),
        }
    }

    /// Run recognition and translation for the scene starting on `frame`,
    /// then precompute every region's layout.
    async fn start_scene(&mut self, frame: &Frame, source_lang: &str, target_lang: &str) -> Result<()> {
        self.cache.clear();

        let detections = self.recognizer.recognize(frame).await?;
        let total = detections.len();
        let kept: Vec<Detection> = detections
            .into_iter()
            .filter(|d| d.confidence >= self.conf_threshold)
            .collect();
        debug!(
            "Scene start: {} detection(s), {} above confidence {}",
            total,
            kept.len(),
            self.conf_threshold
        );
        if kept.is_empty() {
            return Ok(());
        }

        let batch: Vec<String> = kept.iter().map(|d| d.text.clone()).collect();
        let populated = match self
            .translator
            .translate_batch(&batch, source_lang, target_lang)
            .await
        {
            Ok(translations) => self.cache.populate(kept, translations),
            Err(e) => Err(e),
        };

        if let Err(e) = populated {
            self.cache.clear();
            if self.skip_failed_scenes {
                warn!("Scene translation failed, compositing untranslated: {}", e);
                return Ok(());
            }
            return Err(e);
        }

        self.precompute_layouts();
        Ok(())
    }

    /// Fit every cached region once; all later frames of the scene reuse
    /// these layouts. Overflowing regions degrade to the minimum readable
    /// size, or skip their overlay when even that cannot fit.
    fn precompute_layouts(&mut self) {
        let pending: Vec<(String, Quad, String)> = self
            .cache
            .entries()
            .map(|(key, entry)| {
                (
                    key.to_string(),
                    entry.region.quad,
                    entry.region.translated_text.clone(),
                )
            })
            .collect();

        for (key, quad, text) in pending {
            let layout = match self.layout.fit(&quad, &text) {
                Ok(layout) => Some(layout),
                Err(e) => {
                    warn!("{}; clamping {:?} to minimum size", e, key);
                    let clamped = self.layout.fit_clamped(&quad, &text);
                    if clamped.is_none() {
                        warn!("Overlay skipped for region {:?}", key);
                    }
                    clamped
                }
            };
            self.cache.set_layout(&key, layout);
        }
    }

    fn close_scene(&mut self, boundaries: &[SceneBoundary]) {
        self.cache.clear();
        self.cursor += 1;
        self.state = if self.cursor < boundaries.len() {
            PipelineState::SceneBoundary
        } else {
            PipelineState::Idle
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::error::TextdubError;
    use crate::font::{FontMetrics, FontRasterizer};
    use crate::inpaint::DiffusionInpainter;
    use crate::region::Point;
    use crate::translate::MockTranslator;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    /// In-memory source over pre-tagged frames. Frame `i` carries `i` in
    /// its red channel so stubs can identify which frame they received.
    struct MemorySource {
        frames: VecDeque<Frame>,
        count: u64,
    }

    impl MemorySource {
        fn new(count: u64) -> Self {
            Self {
                frames: (0..count).map(tagged_frame).collect(),
                count,
            }
        }
    }

    fn tagged_frame(index: u64) -> Frame {
        let mut frame = Frame::filled(64, 48, [100, 100, 100]);
        frame.put_pixel(63, 47, [index as u8, 0, 0]);
        frame
    }

    fn frame_tag(frame: &Frame) -> u64 {
        frame.pixel(63, 47)[0] as u64
    }

    #[async_trait]
    impl VideoSource for MemorySource {
        fn frame_count(&self) -> u64 {
            self.count
        }
        fn fps(&self) -> f64 {
            25.0
        }
        fn dimensions(&self) -> (u32, u32) {
            (64, 48)
        }
        async fn next_frame(&mut self) -> Result<Option<Frame>> {
            Ok(self.frames.pop_front())
        }
        async fn release(&mut self) -> Result<()> {
            Ok(())
        }
    }

    struct MemorySink {
        frames: Arc<Mutex<Vec<Frame>>>,
    }

    #[async_trait]
    impl VideoSink for MemorySink {
        async fn write_frame(&mut self, frame: &Frame) -> Result<()> {
            self.frames.lock().unwrap().push(frame.clone());
            Ok(())
        }
        async fn release(&mut self) -> Result<()> {
            Ok(())
        }
    }

    /// Returns canned detections keyed by frame tag and records every frame
    /// it was asked to recognize.
    struct StubRecognizer {
        responses: Vec<(u64, Vec<Detection>)>,
        calls: Arc<Mutex<Vec<u64>>>,
    }

    #[async_trait]
    impl TextRecognizer for StubRecognizer {
        async fn recognize(&self, frame: &Frame) -> Result<Vec<Detection>> {
            let tag = frame_tag(frame);
            self.calls.lock().unwrap().push(tag);
            Ok(self
                .responses
                .iter()
                .find(|(t, _)| *t == tag)
                .map(|(_, d)| d.clone())
                .unwrap_or_default())
        }
    }

    /// Records every drawn line together with the frame it was drawn on.
    struct RecordingRasterizer {
        calls: Arc<Mutex<Vec<(u64, String, u32, i32, i32)>>>,
    }

    impl FontRasterizer for RecordingRasterizer {
        fn draw_line(
            &self,
            frame: &mut Frame,
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
                .push((frame_tag(frame), text.to_string(), size, x, y));
        }
    }

    fn detection(text: &str, confidence: f32) -> Detection {
        Detection {
            quad: Quad::new([
                Point::new(8, 8),
                Point::new(48, 8),
                Point::new(48, 32),
                Point::new(8, 32),
            ]),
            text: text.to_string(),
            confidence,
        }
    }

    struct Harness {
        pipeline: ScenePipeline,
        recognizer_calls: Arc<Mutex<Vec<u64>>>,
        draw_calls: Arc<Mutex<Vec<(u64, String, u32, i32, i32)>>>,
    }

    fn harness(
        responses: Vec<(u64, Vec<Detection>)>,
        translator: MockTranslator,
        skip_failed_scenes: bool,
    ) -> Harness {
        let recognizer_calls = Arc::new(Mutex::new(Vec::new()));
        let draw_calls = Arc::new(Mutex::new(Vec::new()));

        let recognizer = StubRecognizer {
            responses,
            calls: recognizer_calls.clone(),
        };
        let rasterizer = RecordingRasterizer {
            calls: draw_calls.clone(),
        };
        let compositor = FrameCompositor::new(
            Box::new(DiffusionInpainter::new(1)),
            Box::new(rasterizer),
            FontMetrics::estimated(),
            Config::default().render,
        );
        let layout = TextLayoutEngine::new(FontMetrics::estimated(), 8);

        Harness {
            pipeline: ScenePipeline::new(
                Box::new(recognizer),
                Box::new(translator),
                layout,
                compositor,
                0.5,
                skip_failed_scenes,
            ),
            recognizer_calls,
            draw_calls,
        }
    }

    async fn run(
        harness: &mut Harness,
        frame_count: u64,
        boundaries: &[SceneBoundary],
    ) -> (Result<()>, Vec<Frame>) {
        let mut source = MemorySource::new(frame_count);
        let written = Arc::new(Mutex::new(Vec::new()));
        let mut sink = MemorySink {
            frames: written.clone(),
        };
        let cancel = AtomicBool::new(false);
        let result = harness
            .pipeline
            .run(&mut source, &mut sink, boundaries, "en", "es", &cancel)
            .await;
        let frames = written.lock().unwrap().clone();
        (result, frames)
    }

    #[tokio::test]
    async fn test_detection_runs_once_per_scene_on_start_frames() {
        let mut translator = MockTranslator::new();
        translator
            .expect_translate_batch()
            .withf(|batch, _, _| batch == ["STOP".to_string()])
            .times(1)
            .returning(|_, _, _| Ok(vec!["PARAR".to_string()]));
        translator
            .expect_translate_batch()
            .withf(|batch, _, _| batch == ["EXIT".to_string()])
            .times(1)
            .returning(|_, _, _| Ok(vec!["SALIDA".to_string()]));

        let mut h = harness(
            vec![
                (0, vec![detection("STOP", 0.95)]),
                (10, vec![detection("EXIT", 0.9)]),
            ],
            translator,
            false,
        );
        let boundaries = vec![SceneBoundary::new(0, 10), SceneBoundary::new(10, 25)];
        let (result, frames) = run(&mut h, 25, &boundaries).await;

        result.unwrap();
        assert_eq!(frames.len(), 25);
        assert_eq!(*h.recognizer_calls.lock().unwrap(), vec![0, 10]);
    }

    #[tokio::test]
    async fn test_interior_frames_reuse_the_scene_cache() {
        let mut translator = MockTranslator::new();
        translator
            .expect_translate_batch()
            .times(1)
            .returning(|_, _, _| Ok(vec!["PARAR".to_string()]));

        let mut h = harness(vec![(0, vec![detection("STOP", 0.95)])], translator, false);
        let boundaries = vec![SceneBoundary::new(0, 10)];
        let (result, frames) = run(&mut h, 10, &boundaries).await;
        result.unwrap();
        assert_eq!(frames.len(), 10);

        let draws = h.draw_calls.lock().unwrap();
        // Frames 0..=8 composite "PARAR"; frame 9 (end - 1) passes through.
        let drawn_on: Vec<u64> = draws.iter().map(|c| c.0).collect();
        assert_eq!(drawn_on, (0..9).collect::<Vec<u64>>());
        for call in draws.iter() {
            assert_eq!(call.1, "PARAR");
            // Same cached layout on every frame of the scene.
            assert_eq!((call.2, call.3, call.4), (draws[0].2, draws[0].3, draws[0].4));
        }
    }

    #[tokio::test]
    async fn test_last_frame_before_boundary_passes_through() {
        let mut translator = MockTranslator::new();
        translator
            .expect_translate_batch()
            .times(1)
            .returning(|_, _, _| Ok(vec!["PARAR".to_string()]));

        let mut h = harness(vec![(0, vec![detection("STOP", 0.95)])], translator, false);
        let boundaries = vec![SceneBoundary::new(0, 10)];
        let (result, frames) = run(&mut h, 10, &boundaries).await;
        result.unwrap();
        assert_eq!(frames[9], tagged_frame(9));
    }

    #[tokio::test]
    async fn test_no_detections_passes_frames_through() {
        let mut translator = MockTranslator::new();
        translator.expect_translate_batch().times(0);

        let mut h = harness(vec![(0, Vec::new())], translator, false);
        let boundaries = vec![SceneBoundary::new(0, 6)];
        let (result, frames) = run(&mut h, 6, &boundaries).await;
        result.unwrap();
        for (index, frame) in frames.iter().enumerate() {
            assert_eq!(*frame, tagged_frame(index as u64));
        }
        assert!(h.draw_calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_low_confidence_detections_are_dropped() {
        let mut translator = MockTranslator::new();
        translator.expect_translate_batch().times(0);

        let mut h = harness(vec![(0, vec![detection("NOISE", 0.2)])], translator, false);
        let boundaries = vec![SceneBoundary::new(0, 6)];
        let (result, _) = run(&mut h, 6, &boundaries).await;
        result.unwrap();
        assert!(h.draw_calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_translation_count_mismatch_aborts_the_run() {
        let mut translator = MockTranslator::new();
        translator
            .expect_translate_batch()
            .times(1)
            .returning(|_, _, _| Ok(Vec::new()));

        let mut h = harness(vec![(0, vec![detection("STOP", 0.95)])], translator, false);
        let boundaries = vec![SceneBoundary::new(0, 10)];
        let (result, frames) = run(&mut h, 10, &boundaries).await;
        assert!(matches!(result, Err(TextdubError::Translation(_))));
        // The scene's frames were never composited or written.
        assert!(frames.is_empty());
    }

    #[tokio::test]
    async fn test_skip_failed_scenes_continues_untranslated() {
        let mut translator = MockTranslator::new();
        translator
            .expect_translate_batch()
            .times(1)
            .returning(|_, _, _| Err(TextdubError::Translation("boom".to_string())));

        let mut h = harness(vec![(0, vec![detection("STOP", 0.95)])], translator, true);
        let boundaries = vec![SceneBoundary::new(0, 10)];
        let (result, frames) = run(&mut h, 10, &boundaries).await;
        result.unwrap();
        assert_eq!(frames.len(), 10);
        assert!(h.draw_calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_frames_outside_any_scene_pass_through() {
        let mut translator = MockTranslator::new();
        translator
            .expect_translate_batch()
            .times(1)
            .returning(|_, _, _| Ok(vec!["PARAR".to_string()]));

        let mut h = harness(vec![(5, vec![detection("STOP", 0.95)])], translator, false);
        let boundaries = vec![SceneBoundary::new(5, 15)];
        let (result, frames) = run(&mut h, 20, &boundaries).await;
        result.unwrap();
        assert_eq!(*h.recognizer_calls.lock().unwrap(), vec![5]);
        for index in [0u64, 1, 2, 3, 4, 15, 16, 19] {
            assert_eq!(frames[index as usize], tagged_frame(index));
        }
    }

    #[tokio::test]
    async fn test_cancellation_stops_before_reading() {
        let translator = MockTranslator::new();
        let mut h = harness(Vec::new(), translator, false);
        let mut source = MemorySource::new(10);
        let written = Arc::new(Mutex::new(Vec::new()));
        let mut sink = MemorySink {
            frames: written.clone(),
        };
        let cancel = AtomicBool::new(true);
        h.pipeline
            .run(
                &mut source,
                &mut sink,
                &[SceneBoundary::new(0, 10)],
                "en",
                "es",
                &cancel,
            )
            .await
            .unwrap();
        assert!(written.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_boundaries_are_rejected_up_front() {
        let translator = MockTranslator::new();
        let mut h = harness(Vec::new(), translator, false);
        let mut source = MemorySource::new(10);
        let written = Arc::new(Mutex::new(Vec::new()));
        let mut sink = MemorySink {
            frames: written.clone(),
        };
        let cancel = AtomicBool::new(false);
        let result = h
            .pipeline
            .run(
                &mut source,
                &mut sink,
                &[SceneBoundary::new(0, 99)],
                "en",
                "es",
                &cancel,
            )
            .await;
        assert!(matches!(result, Err(TextdubError::Scene(_))));
    }
}
