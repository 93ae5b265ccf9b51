use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tokio::fs;
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::compositor::FrameCompositor;
use crate::config::Config;
use crate::error::{Result, TextdubError};
use crate::font::{FontMetrics, FontRasterizer, FontdueRasterizer};
use crate::inpaint::InpainterFactory;
use crate::layout::TextLayoutEngine;
use crate::pipeline::ScenePipeline;
use crate::recognize::TextRecognizerFactory;
use crate::region::SceneBoundary;
use crate::scene::SceneDetectorFactory;
use crate::translate::TranslatorFactory;
use crate::video::{self, VideoIoFactory};

pub struct Workflow {
    config: Config,
    cancel: Arc<AtomicBool>,
}

impl Workflow {
    pub async fn new(config: Config, cancel: Arc<AtomicBool>) -> Result<Self> {
        // Check dependencies
        video::check_availability(&config.media).await?;

        Ok(Self { config, cancel })
    }

    /// Replace on-screen text in a single video file
    pub async fn process_single_file<P: AsRef<Path>, Q: AsRef<Path>>(
        &self,
        input_path: P,
        output_path: Q,
        source_lang: &str,
        target_lang: &str,
    ) -> Result<()> {
        let input_path = input_path.as_ref();
        let output_path = output_path.as_ref();
        info!("Processing single file: {}", input_path.display());

        // Validate input file
        if !input_path.exists() {
            return Err(TextdubError::FileNotFound(input_path.display().to_string()));
        }

        // Create the output directory if it doesn't exist
        if let Some(parent) = output_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }

        // Step 1: Probe the stream and detect scene boundaries
        let probe = video::probe(&self.config.media, input_path).await?;
        info!(
            "Input stream: {}x{}, {:.3} fps, {} frame(s)",
            probe.width, probe.height, probe.fps, probe.frame_count
        );

        let (boundaries, _) = self.detect_scenes(input_path).await?;
        info!("Detected {} scene(s)", boundaries.len());

        // Step 2: Assemble the pipeline
        let mut pipeline = self.build_pipeline()?;

        // Step 3: Stream frames through the pipeline into the encoder
        let mut source = VideoIoFactory::open_source(&self.config.media, input_path).await?;
        let mut sink = match VideoIoFactory::create_sink(
            &self.config.media,
            output_path,
            probe.width,
            probe.height,
            probe.fps,
        )
        .await
        {
            Ok(sink) => sink,
            Err(e) => {
                release_quietly(source.release().await);
                return Err(e);
            }
        };

        let run_result = pipeline
            .run(
                source.as_mut(),
                sink.as_mut(),
                &boundaries,
                source_lang,
                target_lang,
                &self.cancel,
            )
            .await;

        // Both processes are released no matter how the run ended.
        release_quietly(source.release().await);
        match run_result {
            Ok(()) => {
                sink.release().await?;
                info!("Wrote {}", output_path.display());
                Ok(())
            }
            Err(e) => {
                release_quietly(sink.release().await);
                Err(e)
            }
        }
    }

    /// Replace on-screen text in every video file under a directory
    pub async fn process_directory<P: AsRef<Path>, Q: AsRef<Path>>(
        &self,
        input_dir: P,
        output_dir: Q,
        source_lang: &str,
        target_lang: &str,
    ) -> Result<()> {
        let input_dir = input_dir.as_ref();
        let output_dir = output_dir.as_ref();
        info!("Processing directory: {}", input_dir.display());

        if !input_dir.is_dir() {
            return Err(TextdubError::Config(
                "Input path is not a directory".to_string(),
            ));
        }

        fs::create_dir_all(output_dir).await?;

        // Find video files
        let video_extensions = ["mp4", "avi", "mov", "mkv", "wmv", "flv", "webm"];
        let mut video_files = Vec::new();

        for entry in WalkDir::new(input_dir).into_iter().filter_map(|e| e.ok()) {
            if let Some(extension) = entry.path().extension() {
                if let Some(ext_str) = extension.to_str() {
                    if video_extensions.contains(&ext_str.to_lowercase().as_str()) {
                        video_files.push(entry.path().to_path_buf());
                    }
                }
            }
        }

        info!("Found {} video file(s) to process", video_files.len());

        for video_path in video_files {
            let file_name = video_path
                .file_name()
                .ok_or_else(|| TextdubError::Config("Invalid video filename".to_string()))?;
            let output_path = output_dir.join(file_name);

            match self
                .process_single_file(&video_path, &output_path, source_lang, target_lang)
                .await
            {
                Ok(_) => info!("Successfully processed: {}", video_path.display()),
                Err(e) => warn!("Failed to process {}: {}", video_path.display(), e),
            }
        }

        Ok(())
    }

    /// Detect scene boundaries without processing any frames, returning the
    /// boundaries together with the stream's frame rate
    pub async fn detect_scenes<P: AsRef<Path>>(
        &self,
        input_path: P,
    ) -> Result<(Vec<SceneBoundary>, f64)> {
        let input_path = input_path.as_ref();
        if !input_path.exists() {
            return Err(TextdubError::FileNotFound(input_path.display().to_string()));
        }

        let probe = video::probe(&self.config.media, input_path).await?;
        let detector = SceneDetectorFactory::create_detector(
            self.config.scene.clone(),
            self.config.media.clone(),
        );
        let boundaries = detector
            .detect(input_path, probe.frame_count, probe.fps)
            .await?;
        Ok((boundaries, probe.fps))
    }

    fn build_pipeline(&self) -> Result<ScenePipeline> {
        let metrics = FontMetrics::load(&self.config.render.font_path)?;
        let rasterizer: Box<dyn FontRasterizer> =
            Box::new(FontdueRasterizer::load(&self.config.render.font_path)?);

        let recognizer = TextRecognizerFactory::create_recognizer(self.config.ocr.clone());
        let translator = TranslatorFactory::create_translator(self.config.translate.clone());
        let layout = TextLayoutEngine::new(metrics.clone(), self.config.render.min_font_size);
        let compositor = FrameCompositor::new(
            InpainterFactory::create_default(),
            rasterizer,
            metrics,
            self.config.render.clone(),
        );

        Ok(ScenePipeline::new(
            recognizer,
            translator,
            layout,
            compositor,
            self.config.ocr.conf_threshold,
            self.config.pipeline.skip_failed_scenes,
        ))
    }
}

fn release_quietly(result: Result<()>) {
    if let Err(e) = result {
        warn!("Release failed: {}", e);
    }
}
