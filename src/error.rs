//! # Error Types Module
//!
//! Questo modulo definisce tutti i tipi di errore custom dell'applicazione.
//!
//! ## Responsabilità:
//! - Definisce `NormalizeError` enum per categorizzare gli errori per singolo file
//! - Fornisce messaggi di errore descrittivi e strutturati
//! - Integra con `thiserror` per automatic error conversion
//!
//! ## Categorie di errori:
//! - `Io`: Errori di I/O (file non trovati, permessi, etc.)
//! - `Image`: Errori di encoding/decoding del crate `image`
//! - `Decode`: Sorgente corrotta o illeggibile (raster, RAW, HEIC)
//! - `Probe`: Risoluzione video non leggibile (percorso degradato, non fatale)
//! - `Transcode`: Tool esterno fallito, con stderr catturato
//! - `Timeout`: Tool esterno oltre il tempo massimo consentito
//! - `Metadata`: Errori di preservazione EXIF / timestamp
//! - `MissingDependency`: Tool esterno mancante (ffmpeg, dcraw, heif-convert)
//! - `Validation`: Errori di validazione input
//!
//! ## Propagazione:
//! Gli errori per singolo file vengono isolati dal dispatcher
//! (`MediaNormalizer`): vengono loggati e il walk continua. Solo gli errori
//! di setup (source root illeggibile, config invalida) arrivano al `main`.

use std::path::PathBuf;
use std::time::Duration;

/// Custom error types for media normalization
#[derive(thiserror::Error, Debug)]
pub enum NormalizeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Cannot decode {path}: {message}")]
    Decode { path: PathBuf, message: String },

    #[error("Probe error: {0}")]
    Probe(String),

    #[error("{tool} failed: {message}")]
    Transcode { tool: String, message: String },

    #[error("{tool} timed out after {after:?}")]
    Timeout { tool: String, after: Duration },

    #[error("Metadata preservation error: {0}")]
    Metadata(String),

    #[error("Dependency missing: {0}")]
    MissingDependency(String),

    #[error("Validation error: {0}")]
    Validation(String),
}

impl NormalizeError {
    /// Shorthand for a decode failure on `path`
    pub fn decode(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        Self::Decode {
            path: path.into(),
            message: message.to_string(),
        }
    }
}
