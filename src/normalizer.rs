//! # Media Normalizer Orchestrator
//!
//! Orchestratore del run: walk della sorgente, classificazione, dispatch
//! all'adapter giusto e raccolta delle statistiche.
//!
//! ## Flusso per ogni file (sequenziale, ordine per path):
//! 1. Classificazione per estensione (`MediaKind`)
//! 2. Non supportato -> log info, skip
//! 3. Target in output già presente -> log info, skip (mai sovrascritto)
//! 4. Adapter (`compress_photo` / `compress_raw` / `compress_heic` /
//!    `compress_video`)
//! 5. Errore dell'adapter -> log error, rimozione dell'output parziale,
//!    si prosegue col file successivo
//!
//! Un output parziale rimosso fa sì che il run successivo ritenti il file.
//! Solo una source root mancante o illeggibile interrompe il run.

use crate::{
    config::Config,
    error::NormalizeError,
    file_manager::FileManager,
    image_processor::ImageProcessor,
    media_kind::{MediaItem, MediaKind},
    path_mapper::PathMapper,
    platform::PlatformCommands,
    progress::{ProgressManager, RunStats},
    video_processor::{Transcoder, VideoProcessor},
};
use anyhow::{Context, Result};
use std::path::Path;
use tracing::{debug, error, info, warn};

/// Esito della lavorazione di un singolo file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileOutcome {
    Converted { bytes_in: u64, bytes_out: u64 },
    AlreadyPresent,
    Unsupported,
    Failed,
}

/// Orchestratore principale
pub struct MediaNormalizer<T: Transcoder> {
    config: Config,
    mapper: PathMapper,
    images: ImageProcessor,
    videos: VideoProcessor<T>,
}

impl<T: Transcoder> MediaNormalizer<T> {
    pub fn new(config: Config, platform: PlatformCommands, transcoder: T) -> Self {
        let mapper = PathMapper::new(&config.source_dir, &config.output_dir);
        let images = ImageProcessor::new(platform, &config);
        let videos = VideoProcessor::new(transcoder, &config);

        Self {
            config,
            mapper,
            images,
            videos,
        }
    }

    pub fn transcoder(&self) -> &T {
        self.videos.transcoder()
    }

    /// Normalize every file under the source root into the output root
    pub async fn process_media(&self) -> Result<RunStats> {
        let source = &self.config.source_dir;
        info!(
            "🚀 Normalizing {} -> {} (max {}px, JPEG quality {})",
            source.display(),
            self.config.output_dir.display(),
            self.config.max_size,
            self.config.jpeg_quality
        );

        let files = FileManager::find_files(source, Some(self.mapper.output_root()))
            .with_context(|| format!("Cannot walk source directory {}", source.display()))?;

        let mut stats = RunStats::new();
        if files.is_empty() {
            warn!("No files found in {}", source.display());
            return Ok(stats);
        }
        info!("Found {} files", files.len());

        let progress = ProgressManager::new(files.len() as u64, self.config.show_progress);

        for path in &files {
            match self.process_file(path).await {
                FileOutcome::Converted { bytes_in, bytes_out } => stats.add_converted(bytes_in, bytes_out),
                FileOutcome::AlreadyPresent => stats.add_skipped_existing(),
                FileOutcome::Unsupported => stats.add_unsupported(),
                FileOutcome::Failed => stats.add_failed(),
            }
            let name = path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
            progress.update(&name);
        }

        let summary = stats.format_summary();
        progress.finish(&summary);
        info!("📊 {}", summary);

        Ok(stats)
    }

    async fn process_file(&self, input: &Path) -> FileOutcome {
        let Some(item) = MediaItem::new(input.to_path_buf(), &self.config.source_dir) else {
            warn!("Skipping file outside the source root: {}", input.display());
            return FileOutcome::Failed;
        };

        if item.kind == MediaKind::Unsupported {
            info!("Unsupported file, skipping: {}", item.relative_path.display());
            return FileOutcome::Unsupported;
        }

        let keep_suffix = item.kind.is_image() && self.config.keep_original_extension_suffix;
        let target = match self
            .mapper
            .target(&item.input_path, item.kind.output_extension(), keep_suffix)
        {
            Ok(target) => target,
            Err(e) => {
                error!("❌ Cannot prepare output for {}: {:#}", item.relative_path.display(), e);
                return FileOutcome::Failed;
            }
        };

        if target.exists {
            info!("Already processed, skipping: {}", target.output_path.display());
            return FileOutcome::AlreadyPresent;
        }

        debug!("Processing {}: {}", item.kind.label(), item.relative_path.display());

        match self.dispatch(&item, &target.output_path).await {
            Ok(()) => {
                let bytes_in = FileManager::file_size(&item.input_path).await.unwrap_or(0);
                let bytes_out = FileManager::file_size(&target.output_path).await.unwrap_or(0);
                debug!(
                    "{}: {} -> {} ({:.1}% reduction)",
                    item.relative_path.display(),
                    FileManager::format_size(bytes_in),
                    FileManager::format_size(bytes_out),
                    FileManager::calculate_reduction(bytes_in, bytes_out)
                );
                FileOutcome::Converted { bytes_in, bytes_out }
            }
            Err(e) => {
                error!("❌ Failed to process {} {}: {}", item.kind.label(), item.input_path.display(), e);
                Self::remove_partial_output(&target.output_path).await;
                FileOutcome::Failed
            }
        }
    }

    async fn dispatch(&self, item: &MediaItem, output: &Path) -> Result<(), NormalizeError> {
        let input = item.input_path.as_path();
        match item.kind {
            MediaKind::Video => self.videos.compress_video(input, output).await,
            MediaKind::Raster => self.images.compress_photo(input, output).await,
            MediaKind::Raw => self.images.compress_raw(input, output).await,
            MediaKind::Heic => self.images.compress_heic(input, output).await,
            MediaKind::Unsupported => Err(NormalizeError::Validation(format!(
                "No handler for {}",
                input.display()
            ))),
        }
    }

    async fn remove_partial_output(output: &Path) {
        if !output.exists() {
            return;
        }
        match tokio::fs::remove_file(output).await {
            Ok(()) => debug!("Removed partial output: {}", output.display()),
            Err(e) => warn!("Could not remove partial output {}: {}", output.display(), e),
        }
    }
}
