mod ui;

use std::path::{Path, PathBuf};

use clap::Parser;
use resampler_test_core::{AppConfig, CpalDevice, Harness, HarnessError, WavData};
use tracing_subscriber::EnvFilter;

use crate::ui::HarnessApp;

fn main() -> resampler_test_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let config = match cli.config.as_deref() {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::default(),
    };

    let sample = resolve_resource(&cli.sample);
    tracing::info!(path = %sample.display(), "loading sample");
    let wav = WavData::load(&sample)?;

    let device = CpalDevice::open_default()?;
    let harness = Harness::new(wav, Box::new(device), &config)?;
    run_window(harness, &config)
}

fn run_window(harness: Harness, config: &AppConfig) -> resampler_test_core::Result<()> {
    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title(config.window.title.clone())
            .with_inner_size([config.window.width, config.window.height]),
        ..Default::default()
    };
    let font_size = config.window.font_size;

    eframe::run_native(
        &config.window.title,
        native_options,
        Box::new(move |_cc| Ok(Box::new(HarnessApp::new(harness, font_size)))),
    )
    .map_err(|e| HarnessError::msg(format!("window loop failed: {e}")))
}

/// Relative paths are looked up in the working directory first, then next to
/// the executable.
fn resolve_resource(path: &Path) -> PathBuf {
    if path.is_absolute() || path.exists() {
        return path.to_path_buf();
    }
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join(path)))
        .filter(|candidate| candidate.exists())
        .unwrap_or_else(|| path.to_path_buf())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Interactive tester for a dynamically resampling audio stream", long_about = None)]
struct Cli {
    /// WAV file to play.
    #[arg(default_value = "sample.wav")]
    sample: PathBuf,
    /// Optional JSON configuration file.
    #[arg(long)]
    config: Option<PathBuf>,
}
