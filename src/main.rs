//! # Media Normalizer - Main Entry Point
//!
//! ## Flusso di esecuzione:
//! 1. Parsa gli argomenti CLI
//! 2. Configura il logging (console + file in `logs/`)
//! 3. Carica la configurazione (file JSON o argomenti) e la valida
//! 4. Crea le directory sorgente e output se mancanti
//! 5. Risolve i tool esterni e avvia il run
//!
//! Gli errori sui singoli file non cambiano l'exit code; solo un errore
//! catastrofico (config invalida, sorgente illeggibile) termina con 1.
//!
//! ## Esempio di utilizzo:
//! ```bash
//! media-normalizer ./Input ./Output --max-size 1920 --quality 75 --progress
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};

use media_normalizer::logging::{default_log_dir, setup_logging, LogLevel};
use media_normalizer::resolution::MAX_SIZE;
use media_normalizer::{Config, FfmpegTranscoder, MediaNormalizer, PlatformCommands};

#[derive(Parser)]
#[command(name = "media-normalizer")]
#[command(about = "Resize and re-encode a media tree, preserving timestamps and EXIF")]
struct Args {
    /// Directory containing the original media
    #[arg(default_value = "Input")]
    source: PathBuf,

    /// Directory receiving the normalized copies
    #[arg(default_value = "Output")]
    output: PathBuf,

    /// JSON configuration file (replaces the values below)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Longest edge in pixels for images and videos
    #[arg(long, default_value_t = MAX_SIZE)]
    max_size: u32,

    /// JPEG quality (1-100)
    #[arg(short, long, default_value = "75")]
    quality: u8,

    /// Keep the original extension in image names (photo.arw -> photo_arw.jpg)
    #[arg(long)]
    keep_extension_suffix: bool,

    /// Maximum seconds for a single video encode
    #[arg(long, default_value = "7200")]
    encode_timeout: u64,

    /// Log level
    #[arg(long, value_enum, default_value_t = LogLevel::Debug)]
    log_level: LogLevel,

    /// Log directory (default: logs/ next to the executable)
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Gzip logs older than 7 days and delete those older than 180
    #[arg(long)]
    manage_old_logs: bool,

    /// Show a progress bar
    #[arg(long)]
    progress: bool,
}

async fn load_config(args: &Args) -> Result<Config> {
    let config = match &args.config {
        Some(path) => Config::from_file(path).await?,
        None => Config {
            source_dir: args.source.clone(),
            output_dir: args.output.clone(),
            max_size: args.max_size,
            jpeg_quality: args.quality,
            keep_original_extension_suffix: args.keep_extension_suffix,
            encode_timeout_secs: args.encode_timeout,
            show_progress: args.progress,
            ..Default::default()
        },
    };
    Ok(config)
}

async fn run(args: Args) -> Result<()> {
    let config = load_config(&args).await?;

    std::fs::create_dir_all(&config.source_dir)
        .with_context(|| format!("Cannot create source directory: {}", config.source_dir.display()))?;
    std::fs::create_dir_all(&config.output_dir)
        .with_context(|| format!("Cannot create output directory: {}", config.output_dir.display()))?;
    config.validate()?;

    let platform = PlatformCommands::detect();
    platform.check_dependencies();

    let transcoder = FfmpegTranscoder::new(&platform, &config);
    let normalizer = MediaNormalizer::new(config, platform, transcoder);
    normalizer.process_media().await?;

    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let log_dir = args.log_dir.clone().unwrap_or_else(default_log_dir);
    let (log_path, _log_guard) = match setup_logging("media_normalizer", args.log_level, &log_dir, args.manage_old_logs) {
        Ok(handle) => handle,
        Err(e) => {
            eprintln!("Failed to initialize logging: {:#}", e);
            return ExitCode::FAILURE;
        }
    };

    let result = run(args).await;

    match result {
        Ok(()) => {
            info!("✅ Done. Log written to {}", log_path.display());
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(severity = "critical", "Run aborted: {:#}", e);
            info!("Log written to {}", log_path.display());
            ExitCode::FAILURE
        }
    }
}
