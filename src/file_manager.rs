//! # File Management Module
//!
//! Discovery dei file sorgente e utilità sulle dimensioni.
//!
//! ## Responsabilità:
//! - Walk ricorsivo della source root in ordine deterministico (per nome)
//! - Esclusione della output root quando è annidata nella sorgente
//! - Link simbolici seguiti: un link a file o directory vale come il target
//! - Dimensione di un file
//! - Formattazione human-readable delle dimensioni
//!
//! Gli errori durante il walk (permessi, link rotti o ciclici) vengono
//! loggati come warning e non interrompono la discovery; solo una source
//! root inesistente o illeggibile è un errore. Le entry speciali (FIFO,
//! socket, device) vengono saltate con un messaggio di log.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{info, warn};
use walkdir::WalkDir;

/// Manages file operations and discovery
pub struct FileManager;

impl FileManager {
    /// Size in bytes of a file
    pub async fn file_size(path: &Path) -> Result<u64> {
        let metadata = fs::metadata(path)
            .await
            .with_context(|| format!("Cannot stat {}", path.display()))?;
        Ok(metadata.len())
    }

    /// Every regular file under `root`, sorted by path.
    ///
    /// Symbolic links are followed; a linked file keeps the link's path.
    ///
    /// Entries inside `exclude` are skipped so that an output tree nested in
    /// the source is never read back as input.
    pub fn find_files(root: &Path, exclude: Option<&Path>) -> Result<Vec<PathBuf>> {
        let metadata = std::fs::metadata(root)
            .with_context(|| format!("Source directory not accessible: {}", root.display()))?;
        if !metadata.is_dir() {
            anyhow::bail!("Source is not a directory: {}", root.display());
        }
        // Surface permission problems on the root itself
        std::fs::read_dir(root)
            .with_context(|| format!("Source directory not readable: {}", root.display()))?;

        let exclude = exclude.map(|p| p.canonicalize().unwrap_or_else(|_| p.to_path_buf()));
        let mut files = Vec::new();

        let walker = WalkDir::new(root)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| match &exclude {
                Some(excluded) => !Self::is_within(entry.path(), excluded),
                None => true,
            });

        for entry in walker {
            match entry {
                Ok(entry) if entry.file_type().is_file() => files.push(entry.into_path()),
                Ok(entry) if entry.file_type().is_dir() => {}
                Ok(entry) => info!("Skipping non-regular entry: {}", entry.path().display()),
                Err(e) => warn!("Skipping unreadable entry: {}", e),
            }
        }

        Ok(files)
    }

    fn is_within(path: &Path, dir: &Path) -> bool {
        let path = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        path.starts_with(dir)
    }

    /// Get human-readable file size
    pub fn format_size(size: u64) -> String {
        const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
        let mut size = size as f64;
        let mut unit_index = 0;

        while size >= 1024.0 && unit_index < UNITS.len() - 1 {
            size /= 1024.0;
            unit_index += 1;
        }

        if unit_index == 0 {
            format!("{} {}", size as u64, UNITS[unit_index])
        } else {
            format!("{:.2} {}", size, UNITS[unit_index])
        }
    }

    /// Percentage reduction from `original_size` to `new_size`; negative when the file grew
    pub fn calculate_reduction(original_size: u64, new_size: u64) -> f64 {
        if original_size == 0 {
            0.0
        } else {
            ((original_size as f64 - new_size as f64) / original_size as f64) * 100.0
        }
    }
}
