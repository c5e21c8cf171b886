//! # Path Mapping Module
//!
//! Centralizza tutta la logica di calcolo dei path di output.
//! L'albero di output rispecchia la struttura relativa dell'albero di input.
//!
//! ```text
//! Input:  /src/2023/vacation/IMG_001.HEIC
//! Root:   /src
//! Output: /dest/2023/vacation/IMG_001.jpg   (o IMG_001_HEIC.jpg con suffisso)
//! ```

use crate::error::NormalizeError;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Where an input lands in the output tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputTarget {
    pub output_path: PathBuf,
    pub exists: bool,
}

/// Utility per calcolare i path di output in modo centralizzato
#[derive(Debug, Clone)]
pub struct PathMapper {
    source_root: PathBuf,
    output_root: PathBuf,
}

impl PathMapper {
    pub fn new(source_root: impl Into<PathBuf>, output_root: impl Into<PathBuf>) -> Self {
        Self {
            source_root: source_root.into(),
            output_root: output_root.into(),
        }
    }

    pub fn output_root(&self) -> &Path {
        &self.output_root
    }

    /// Calcola il path di output senza toccare il filesystem
    pub fn output_path_for(
        &self,
        input_path: &Path,
        new_extension: Option<&str>,
        keep_original_extension_suffix: bool,
    ) -> Result<PathBuf> {
        let relative = input_path.strip_prefix(&self.source_root).map_err(|_| {
            NormalizeError::Validation(format!(
                "{} is not under {}",
                input_path.display(),
                self.source_root.display()
            ))
        })?;

        let file_name = relative
            .file_name()
            .ok_or_else(|| NormalizeError::Validation(format!("Invalid file name: {}", input_path.display())))?;

        let file_name = match new_extension {
            Some(ext) => {
                let ext = ext.trim_start_matches('.');
                let stem = relative.file_stem().unwrap_or(file_name).to_string_lossy();
                match relative.extension() {
                    Some(original) if keep_original_extension_suffix => {
                        format!("{}_{}.{}", stem, original.to_string_lossy(), ext)
                    }
                    _ => format!("{}.{}", stem, ext),
                }
            }
            None => file_name.to_string_lossy().into_owned(),
        };

        let parent = relative.parent().unwrap_or(Path::new(""));
        Ok(self.output_root.join(parent).join(file_name))
    }

    /// Calcola il path di output e crea le directory parent mancanti
    pub fn map_output_path(
        &self,
        input_path: &Path,
        new_extension: Option<&str>,
        keep_original_extension_suffix: bool,
    ) -> Result<PathBuf> {
        let output_path = self.output_path_for(input_path, new_extension, keep_original_extension_suffix)?;
        Self::ensure_parent_dirs(&output_path)?;
        debug!("Resolved output path: {} -> {}", input_path.display(), output_path.display());
        Ok(output_path)
    }

    /// Resolve the target and check whether it was already produced
    pub fn target(
        &self,
        input_path: &Path,
        new_extension: Option<&str>,
        keep_original_extension_suffix: bool,
    ) -> Result<OutputTarget> {
        let output_path = self.map_output_path(input_path, new_extension, keep_original_extension_suffix)?;
        let exists = output_path.exists();
        Ok(OutputTarget { output_path, exists })
    }

    /// Crea le directory parent se necessario
    pub fn ensure_parent_dirs(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create parent directories for {}", path.display()))?;
        }
        Ok(())
    }
}
