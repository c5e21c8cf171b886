//! # Configuration Management Module
//!
//! Questo modulo gestisce tutta la configurazione dell'applicazione.
//!
//! ## Responsabilità:
//! - Definisce la struct `Config` iniettata nel `MediaNormalizer`
//! - Fornisce validazione robusta dei parametri di input
//! - Supporta caricamento configurazione da file JSON
//! - Fornisce valori di default sensati per tutti i parametri
//!
//! ## Parametri di configurazione:
//! - `source_dir` / `output_dir`: Radici dell'albero di input e di output
//! - `max_size`: Lato massimo in pixel per immagini e video (default: 1920)
//! - `jpeg_quality`: Qualità JPEG di output (1-100, default: 75)
//! - `keep_original_extension_suffix`: `photo.arw` -> `photo_arw.jpg` (default: false)
//! - `probe_timeout_secs` / `encode_timeout_secs` / `tool_timeout_secs`: Limiti per i processi esterni
//! - `show_progress`: Progress bar su stderr (default: false)
//!
//! Il profilo video (`TransformProfile`) è fisso: viaggia con la config
//! ma non viene mai letto da file né esposto sulla CLI.
//!
//! ## Esempio:
//! ```rust,ignore
//! let config = Config {
//!     source_dir: PathBuf::from("Input"),
//!     output_dir: PathBuf::from("Output"),
//!     ..Default::default()
//! };
//! config.validate()?;
//! ```

use crate::resolution::MAX_SIZE;
use crate::video_processor::TransformProfile;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Configuration for a normalization run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Root of the tree to normalize
    pub source_dir: PathBuf,
    /// Root of the mirrored output tree
    pub output_dir: PathBuf,
    /// Longest allowed edge for images and videos
    pub max_size: u32,
    /// JPEG quality for normalized images (1-100)
    pub jpeg_quality: u8,
    /// Append the original extension to the stem of image outputs
    pub keep_original_extension_suffix: bool,
    /// Upper bound for a single ffprobe call
    pub probe_timeout_secs: u64,
    /// Upper bound for a single ffmpeg encode
    pub encode_timeout_secs: u64,
    /// Upper bound for RAW/HEIC developer tools
    pub tool_timeout_secs: u64,
    /// Draw a progress bar while walking
    pub show_progress: bool,
    #[serde(skip)]
    pub video_profile: TransformProfile,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            source_dir: PathBuf::from("Input"),
            output_dir: PathBuf::from("Output"),
            max_size: MAX_SIZE,
            jpeg_quality: 75,
            keep_original_extension_suffix: false,
            probe_timeout_secs: 60,
            encode_timeout_secs: 7200,
            tool_timeout_secs: 300,
            show_progress: false,
            video_profile: TransformProfile::STANDARD,
        }
    }
}

impl Config {
    /// Validate configuration parameters
    pub fn validate(&self) -> Result<()> {
        if self.jpeg_quality == 0 || self.jpeg_quality > 100 {
            return Err(anyhow::anyhow!("JPEG quality must be between 1 and 100"));
        }

        if self.max_size == 0 {
            return Err(anyhow::anyhow!("Maximum size must be greater than 0"));
        }

        if self.probe_timeout_secs == 0 || self.encode_timeout_secs == 0 || self.tool_timeout_secs == 0 {
            return Err(anyhow::anyhow!("Timeouts must be greater than 0 seconds"));
        }

        if same_location(&self.source_dir, &self.output_dir) {
            return Err(anyhow::anyhow!(
                "Source and output directory must differ: {}",
                self.source_dir.display()
            ));
        }

        Ok(())
    }

    /// Load configuration from file
    pub async fn from_file(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Config = serde_json::from_str(&content)
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    pub fn encode_timeout(&self) -> Duration {
        Duration::from_secs(self.encode_timeout_secs)
    }

    pub fn tool_timeout(&self) -> Duration {
        Duration::from_secs(self.tool_timeout_secs)
    }
}

fn same_location(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();
        assert!(config.validate().is_ok());

        config.jpeg_quality = 0;
        assert!(config.validate().is_err());

        config.jpeg_quality = 75;
        config.max_size = 0;
        assert!(config.validate().is_err());

        config.max_size = 1920;
        config.encode_timeout_secs = 0;
        assert!(config.validate().is_err());

        config.encode_timeout_secs = 60;
        config.output_dir = config.source_dir.clone();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.max_size, 1920);
        assert_eq!(config.jpeg_quality, 75);
        assert!(!config.keep_original_extension_suffix);
        assert_eq!(config.video_profile, TransformProfile::STANDARD);
        assert_eq!(config.encode_timeout(), Duration::from_secs(7200));
    }

    #[tokio::test]
    async fn test_config_load_partial_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.json");

        std::fs::write(
            &config_path,
            r#"{ "source_dir": "/data/photos", "output_dir": "/data/out", "jpeg_quality": 85 }"#,
        )
        .unwrap();

        let loaded = Config::from_file(&config_path).await.unwrap();
        assert_eq!(loaded.source_dir, PathBuf::from("/data/photos"));
        assert_eq!(loaded.jpeg_quality, 85);
        // Missing keys fall back to defaults, the profile is never read from disk
        assert_eq!(loaded.max_size, 1920);
        assert_eq!(loaded.video_profile, TransformProfile::STANDARD);
    }

    #[tokio::test]
    async fn test_config_load_rejects_invalid() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.json");
        std::fs::write(&config_path, r#"{ "jpeg_quality": 0 }"#).unwrap();

        assert!(Config::from_file(&config_path).await.is_err());
        assert!(Config::from_file(&temp_dir.path().join("missing.json")).await.is_err());
    }
}
