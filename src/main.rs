//! Photour - async thumbnail loading and caching for photo trips
#![allow(clippy::uninlined_format_args)]

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::Result;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
use walkdir::WalkDir;

use photour::{BoundsPreset, ImageLoader, LoadEvent, PipelineConfig, RequestOutcome};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging (RUST_LOG=debug for verbose output)
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match parse_args()? {
        Command::Load { dir, preset } => load_dir(&dir, preset).await,
        Command::Config => show_config(),
        Command::Help => {
            print_help();
            Ok(())
        }
        Command::Version => {
            print_version();
            Ok(())
        }
    }
}

/// CLI commands
enum Command {
    Load { dir: PathBuf, preset: BoundsPreset },
    Config,
    Help,
    Version,
}

fn parse_args() -> Result<Command> {
    let args: Vec<String> = std::env::args().collect();

    if args.len() == 1 {
        return Ok(Command::Help);
    }

    match args[1].as_str() {
        "-h" | "--help" | "help" => Ok(Command::Help),
        "-v" | "--version" | "version" => Ok(Command::Version),
        "config" => Ok(Command::Config),

        "load" => {
            let dir = args
                .get(2)
                .ok_or_else(|| anyhow::anyhow!("Missing photo directory"))?
                .into();

            // Parse --preset flag
            let preset = match args
                .iter()
                .position(|a| a == "--preset" || a == "-p")
                .and_then(|i| args.get(i + 1))
                .map(String::as_str)
            {
                None | Some("thumbnail") => BoundsPreset::Thumbnail,
                Some("marker") => BoundsPreset::Marker,
                Some("viewer") => BoundsPreset::Viewer,
                Some(other) => {
                    return Err(anyhow::anyhow!(
                        "Unknown preset: {other} (thumbnail, marker, viewer)"
                    ));
                }
            };

            Ok(Command::Load { dir, preset })
        }

        other => Err(anyhow::anyhow!(
            "Unknown command: {other}\nRun 'photour --help' for usage"
        )),
    }
}

/// Decode every image under `dir` through the pipeline and report.
async fn load_dir(dir: &Path, preset: BoundsPreset) -> Result<()> {
    let config = PipelineConfig::load()?;
    let mut loader = ImageLoader::new(&config)?;

    let photos: Vec<PathBuf> = WalkDir::new(dir)
        .into_iter()
        .filter_map(std::result::Result::ok)
        .filter(|e| e.file_type().is_file() && is_image(e.path()))
        .map(|e| e.into_path())
        .collect();

    if photos.is_empty() {
        println!("No images found under {}", dir.display());
        return Ok(());
    }
    println!(
        "Loading {} images with {} workers...",
        photos.len(),
        config.workers
    );

    let mut requested = 0usize;
    for path in &photos {
        let target = loader.create_target();
        let source_id = path.display().to_string();
        if loader.request(target, path, &source_id, preset) == RequestOutcome::Started {
            requested += 1;
        }
    }

    let started = Instant::now();
    let mut applied = 0usize;
    let mut failed = 0usize;
    let mut discarded = 0usize;
    let mut settled = 0usize;

    while settled < requested && started.elapsed() < Duration::from_secs(120) {
        for event in loader.poll_completions() {
            settled += 1;
            match event {
                LoadEvent::Applied {
                    source_id, origin, ..
                } => {
                    applied += 1;
                    tracing::debug!("applied {source_id} ({origin:?})");
                }
                LoadEvent::Failed { source_id, .. } => {
                    failed += 1;
                    println!("  failed: {source_id}");
                }
                LoadEvent::Discarded { .. } => discarded += 1,
            }
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    println!(
        "Done in {:.1}s: {applied} applied, {failed} failed, {discarded} discarded",
        started.elapsed().as_secs_f32()
    );
    println!(
        "Cache: {} bitmaps, {} KiB resident",
        loader.cache().len(),
        loader.cache().memory_bytes() / 1024
    );
    Ok(())
}

fn is_image(path: &Path) -> bool {
    matches!(
        path.extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .as_deref(),
        Some("jpg" | "jpeg" | "png" | "gif" | "webp" | "bmp" | "tiff")
    )
}

fn show_config() -> Result<()> {
    let config = PipelineConfig::load()?;
    println!("{}", toml::to_string_pretty(&config)?);
    println!("# config file: {}", PipelineConfig::default_path()?.display());
    Ok(())
}

fn print_help() {
    println!("photour {} - async thumbnail pipeline", photour::VERSION);
    println!();
    println!("USAGE:");
    println!("  photour load <dir> [--preset thumbnail|marker|viewer]");
    println!("  photour config          Show effective configuration");
    println!("  photour help            Show this help");
    println!("  photour version         Show version");
    println!();
    println!("Set RUST_LOG=debug for per-image decode logging.");
}

fn print_version() {
    println!("photour {}", photour::VERSION);
}
