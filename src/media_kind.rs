//! # Media Classification Module
//!
//! Classifica ogni file in base all'estensione (case-insensitive) in una
//! variante chiusa di `MediaKind`. Il dispatcher fa un `match` esaustivo
//! sulla variante invece di confronti sparsi su stringhe.
//!
//! ## Insiemi di estensioni (disgiunti):
//! - **Video**: mp4, mov, avi, mkv, wmv, mts
//! - **Raster**: jpg, jpeg, png, tiff, webp, bmp
//! - **RAW**: arw, nef
//! - **HEIC**: heic

use std::path::{Path, PathBuf};

pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov", "avi", "mkv", "wmv", "mts"];
pub const RASTER_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "tiff", "webp", "bmp"];
pub const RAW_EXTENSIONS: &[&str] = &["arw", "nef"];
pub const HEIC_EXTENSIONS: &[&str] = &["heic"];

/// Extension every image kind is normalized to
pub const IMAGE_OUTPUT_EXTENSION: &str = "jpg";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    Video,
    Raster,
    Raw,
    Heic,
    Unsupported,
}

impl MediaKind {
    /// Extension override for the output file; `None` keeps the input extension
    pub fn output_extension(self) -> Option<&'static str> {
        match self {
            Self::Raster | Self::Raw | Self::Heic => Some(IMAGE_OUTPUT_EXTENSION),
            Self::Video | Self::Unsupported => None,
        }
    }

    pub fn is_image(self) -> bool {
        matches!(self, Self::Raster | Self::Raw | Self::Heic)
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Video => "video",
            Self::Raster => "image",
            Self::Raw => "RAW image",
            Self::Heic => "HEIC image",
            Self::Unsupported => "unsupported",
        }
    }
}

/// Classify a path by its lower-cased extension
pub fn classify(path: &Path) -> MediaKind {
    let ext = match path.extension() {
        Some(ext) => ext.to_string_lossy().to_lowercase(),
        None => return MediaKind::Unsupported,
    };

    let ext = ext.as_str();
    if VIDEO_EXTENSIONS.contains(&ext) {
        MediaKind::Video
    } else if RASTER_EXTENSIONS.contains(&ext) {
        MediaKind::Raster
    } else if RAW_EXTENSIONS.contains(&ext) {
        MediaKind::Raw
    } else if HEIC_EXTENSIONS.contains(&ext) {
        MediaKind::Heic
    } else {
        MediaKind::Unsupported
    }
}

/// One file found during the walk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaItem {
    pub input_path: PathBuf,
    pub relative_path: PathBuf,
    pub kind: MediaKind,
}

impl MediaItem {
    /// Build an item for `input_path`, which must live under `source_root`.
    pub fn new(input_path: PathBuf, source_root: &Path) -> Option<Self> {
        let relative_path = input_path.strip_prefix(source_root).ok()?.to_path_buf();
        let kind = classify(&input_path);
        Some(Self {
            input_path,
            relative_path,
            kind,
        })
    }
}
