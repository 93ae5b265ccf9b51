//! Textdub - Scene-Bounded On-Screen Text Replacement
//!
//! This is the main entry point for the textdub application, which replaces
//! on-screen text in videos with its translation using tesseract, a
//! translation service, and ffmpeg.

use anyhow::Result;
use clap::Parser;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn, Level};
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use textdub::cli::{Args, Commands};
use textdub::config::Config;
use textdub::workflow::Workflow;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Setup logging to both console and file
    setup_logging(args.verbose)?;

    // Load configuration
    let config = match &args.config {
        Some(config_path) => Config::from_file(config_path)?,
        None => {
            // Try to load config.toml from current directory first
            if std::path::Path::new("config.toml").exists() {
                info!("Found config.toml in current directory, loading...");
                Config::from_file("config.toml")?
            } else {
                Config::default()
            }
        }
    };

    // InitConfig needs no workflow or external tools
    if let Commands::InitConfig { path } = &args.command {
        Config::default().save_to_file(path)?;
        info!("Wrote default configuration to {}", path.display());
        return Ok(());
    }

    // Flip the cancellation flag on Ctrl-C; the pipeline stops at the next frame
    let cancel = Arc::new(AtomicBool::new(false));
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupt received, finishing current frame...");
                cancel.store(true, Ordering::Relaxed);
            }
        });
    }

    // Create workflow instance
    let workflow = Workflow::new(config, cancel).await?;

    // Execute command
    match args.command {
        Commands::Process {
            input,
            output,
            source_lang,
            target_lang,
        } => {
            workflow
                .process_single_file(&input, &output, &source_lang, &target_lang)
                .await?;
        }

        Commands::Batch {
            input_dir,
            output_dir,
            source_lang,
            target_lang,
        } => {
            workflow
                .process_directory(&input_dir, &output_dir, &source_lang, &target_lang)
                .await?;
        }

        Commands::Scenes { input } => {
            let (boundaries, fps) = workflow.detect_scenes(&input).await?;
            println!("Detected {} scene(s)", boundaries.len());
            for (index, boundary) in boundaries.iter().enumerate() {
                let (start_s, end_s) = boundary.seconds(fps);
                println!(
                    "  scene {:>3}: frames {} .. {} ({} frames, {:.2}s .. {:.2}s)",
                    index,
                    boundary.start_frame,
                    boundary.end_frame,
                    boundary.len(),
                    start_s,
                    end_s
                );
            }
        }

        Commands::InitConfig { .. } => unreachable!("handled before workflow construction"),
    }

    info!("Textdub completed successfully");
    Ok(())
}

/// Setup logging to both console and file
fn setup_logging(verbose: bool) -> Result<()> {
    // Create log directory
    let textdub_dir = std::env::current_dir()?.join(".textdub");
    let log_dir = textdub_dir.join("log");
    std::fs::create_dir_all(&log_dir)?;

    // Set up file appender with daily rotation
    let file_appender = rolling::daily(&log_dir, "textdub.log");
    let (non_blocking_file, _guard) = non_blocking(file_appender);
    // Keep the guard alive for the duration of the program
    std::mem::forget(_guard);

    // Determine log level
    let log_level = if verbose { Level::DEBUG } else { Level::INFO };

    // Create console layer
    let console_layer = fmt::layer()
        .with_target(false)
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_file(true)
        .with_line_number(true);

    // Create file layer
    let file_layer = fmt::layer()
        .with_writer(non_blocking_file)
        .with_target(false)
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(false); // No ANSI colors in file

    // Setup layered subscriber
    let subscriber = tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with(console_layer)
        .with(file_layer);

    // Initialize the subscriber
    subscriber
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    info!(
        "Logging initialized - console: {}, file: {}",
        log_level,
        log_dir.join("textdub.log").display()
    );

    Ok(())
}
