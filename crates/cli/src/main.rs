use std::path::PathBuf;
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::error::ErrorKind;
use clap::Parser;

use watermark_core::overlay::domain::composite_style::CompositeStyle;
use watermark_core::overlay::domain::overlay_compositor::OverlayCompositor;
use watermark_core::overlay::domain::placement::Placement;
use watermark_core::overlay::infrastructure::font_resolver;
use watermark_core::overlay::infrastructure::fontdue_text_renderer::FontdueTextRenderer;
use watermark_core::pipeline::pipeline_logger::StdoutPipelineLogger;
use watermark_core::pipeline::watermark_video_use_case::{ProgressFn, WatermarkVideoUseCase};
use watermark_core::shared::constants::{DEFAULT_FONT_SIZE, MAX_FONT_SIZE};
use watermark_core::shared::error::WatermarkError;
use watermark_core::video::infrastructure::ffmpeg_reader::FfmpegReader;
use watermark_core::video::infrastructure::ffmpeg_writer::{FfmpegWriter, DEFAULT_ENCODER};

/// Stamp a translucent text watermark onto every frame of a video.
#[derive(Parser)]
#[command(name = "watermark", version)]
struct Cli {
    /// Input video file.
    input: PathBuf,

    /// Output video file.
    output: PathBuf,

    /// Text of the watermark label.
    watermark_text: String,

    /// Label position: top-left, top-right, bottom-left, bottom-right or
    /// center. Anything else means bottom-right.
    position: String,

    /// TTF/OTF font file (default: first well-known system font found).
    #[arg(long)]
    font: Option<PathBuf>,

    /// Font size in pixels (at most 1024).
    #[arg(long, default_value_t = DEFAULT_FONT_SIZE)]
    font_size: f32,

    /// Backing-box opacity (0.0-1.0).
    #[arg(long, default_value = "0.4")]
    opacity: f32,

    /// ffmpeg encoder name for the output stream.
    #[arg(long, default_value = DEFAULT_ENCODER)]
    codec: String,
}

fn main() {
    env_logger::init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => match e.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => e.exit(),
            _ => {
                let _ = e.print();
                process::exit(1);
            }
        },
    };

    if let Err(e) = run(cli) {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    validate(&cli)?;

    let placement = Placement::parse(&cli.position);
    if Placement::recognize(&cli.position).is_none() {
        log::debug!(
            "Unrecognized position '{}', using {placement}",
            cli.position
        );
    }

    let font_path = font_resolver::resolve(cli.font.as_deref())?;
    log::info!("Using font {}", font_path.display());
    let renderer = FontdueTextRenderer::from_path(&font_path)?;

    let style = CompositeStyle::default()
        .with_font_size(cli.font_size)
        .with_opacity(cli.opacity);

    let progress: ProgressFn = Box::new(|current, total| {
        if total > 0 {
            eprint!("\rProcessing frame {current}/{total}");
        } else {
            eprint!("\rProcessing frame {current}");
        }
        true
    });

    let cancelled = Arc::new(AtomicBool::new(false));
    let on_interrupt = Arc::clone(&cancelled);
    if let Err(e) = ctrlc::set_handler(move || on_interrupt.store(true, Ordering::Relaxed)) {
        log::warn!("Interrupt handler not installed: {e}");
    }

    let use_case = WatermarkVideoUseCase::new(
        Box::new(FfmpegReader::new()),
        Box::new(FfmpegWriter::new().with_encoder(&cli.codec)),
        OverlayCompositor::new(Box::new(renderer)),
        style,
        Some(progress),
        Some(cancelled),
    )
    .with_logger(Box::new(StdoutPipelineLogger::default()));

    let result = use_case.execute(&cli.input, &cli.output, &cli.watermark_text, placement);
    eprintln!();
    let frames = result?;

    log::info!(
        "Wrote {frames} frames to {}",
        cli.output.display()
    );
    Ok(())
}

fn validate(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    if !cli.input.exists() {
        return Err(WatermarkError::InputNotFound(cli.input.clone()).into());
    }
    if !(0.0..=1.0).contains(&cli.opacity) {
        return Err(format!(
            "Opacity must be between 0.0 and 1.0, got {}",
            cli.opacity
        )
        .into());
    }
    if !(cli.font_size > 0.0 && cli.font_size <= MAX_FONT_SIZE) {
        return Err(format!(
            "Font size must be between 0 and {MAX_FONT_SIZE}, got {}",
            cli.font_size
        )
        .into());
    }
    if cli.codec.trim().is_empty() {
        return Err("Codec name must not be empty".into());
    }
    Ok(())
}
