//! # Progress Tracking and Statistics Module
//!
//! Progress bar opzionale (`--progress`) e statistiche del run.
//!
//! ## Componenti principali:
//! - `ProgressManager`: barra `indicatif`, nascosta se disabilitata
//! - `RunStats`: contatori per esito (convertiti, già presenti, non
//!   supportati, falliti) e byte in/out dei file convertiti
//!
//! ## Visual feedback:
//! ```text
//! ⠋ [00:02:15] [========================>---------------] 90/150 (60%) IMG_0042.HEIC
//! ```

use crate::file_manager::FileManager;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Manages progress reporting for a normalization run
#[derive(Clone)]
pub struct ProgressManager {
    bar: ProgressBar,
}

impl ProgressManager {
    /// Create a new progress manager; a disabled one draws nothing
    pub fn new(total_files: u64, enabled: bool) -> Self {
        if !enabled {
            return Self {
                bar: ProgressBar::hidden(),
            };
        }

        let bar = ProgressBar::new(total_files);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}")
        {
            bar.set_style(style.progress_chars("=>-"));
        }
        bar.enable_steady_tick(Duration::from_millis(100));

        Self { bar }
    }

    /// Update progress with a message
    pub fn update(&self, message: &str) {
        self.bar.inc(1);
        self.bar.set_message(message.to_string());
    }

    pub fn finish(&self, message: &str) {
        self.bar.finish_with_message(message.to_string());
    }

    pub fn position(&self) -> u64 {
        self.bar.position()
    }
}

/// Outcome counters for one run
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunStats {
    pub files_seen: usize,
    pub converted: usize,
    pub skipped_existing: usize,
    pub unsupported: usize,
    pub failed: usize,
    pub bytes_in: u64,
    pub bytes_out: u64,
}

impl RunStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_converted(&mut self, original_size: u64, new_size: u64) {
        self.files_seen += 1;
        self.converted += 1;
        self.bytes_in += original_size;
        self.bytes_out += new_size;
    }

    pub fn add_skipped_existing(&mut self) {
        self.files_seen += 1;
        self.skipped_existing += 1;
    }

    pub fn add_unsupported(&mut self) {
        self.files_seen += 1;
        self.unsupported += 1;
    }

    pub fn add_failed(&mut self) {
        self.files_seen += 1;
        self.failed += 1;
    }

    pub fn overall_reduction_percent(&self) -> f64 {
        FileManager::calculate_reduction(self.bytes_in, self.bytes_out)
    }

    pub fn format_summary(&self) -> String {
        format!(
            "Seen: {} files | Converted: {} | Already present: {} | Unsupported: {} | Failed: {} | {} -> {} ({:.2}%)",
            self.files_seen,
            self.converted,
            self.skipped_existing,
            self.unsupported,
            self.failed,
            FileManager::format_size(self.bytes_in),
            FileManager::format_size(self.bytes_out),
            self.overall_reduction_percent()
        )
    }
}
