//! # Media Normalizer Library
//!
//! Questo è il modulo principale della libreria che espone tutte le API pubbliche.
//!
//! Un run percorre una directory sorgente e produce un albero di output
//! speculare in cui ogni immagine è un JPEG con lato massimo limitato e ogni
//! video è ricodificato in H.264/AAC, preservando EXIF e timestamp. I file
//! già presenti in output vengono saltati, quindi un run interrotto si
//! riprende rilanciandolo.
//!
//! ## Architettura dei moduli:
//! - `config`: Gestione configurazione e validazione parametri
//! - `error`: Tipi di errore per singolo file
//! - `media_kind`: Classificazione per estensione
//! - `path_mapper`: Mapping sorgente -> output
//! - `resolution`: Policy di ridimensionamento
//! - `image_processor`: Raster / RAW / HEIC -> JPEG
//! - `video_processor`: Probe e transcodifica video
//! - `metadata`: EXIF e timestamp
//! - `normalizer`: Orchestratore del run
//! - `command` / `platform`: Esecuzione e risoluzione dei tool esterni
//! - `logging`: Console + file con rotazione
//! - `file_manager` / `progress`: Discovery, progress bar e statistiche
//!
//! ## Utilizzo:
//! ```rust,no_run
//! use media_normalizer::{Config, FfmpegTranscoder, MediaNormalizer, PlatformCommands};
//!
//! # async fn run() -> anyhow::Result<()> {
//! let config = Config::default();
//! let platform = PlatformCommands::detect();
//! let transcoder = FfmpegTranscoder::new(&platform, &config);
//! let normalizer = MediaNormalizer::new(config, platform, transcoder);
//! let stats = normalizer.process_media().await?;
//! println!("{}", stats.format_summary());
//! # Ok(())
//! # }
//! ```

pub mod command;
pub mod config;
pub mod error;
pub mod file_manager;
pub mod image_processor;
pub mod logging;
pub mod media_kind;
pub mod metadata;
pub mod normalizer;
pub mod path_mapper;
pub mod platform;
pub mod progress;
pub mod resolution;
pub mod utils;
pub mod video_processor;

#[cfg(test)]
mod test_support;

pub use config::Config;
pub use error::NormalizeError;
pub use media_kind::{classify, MediaItem, MediaKind};
pub use normalizer::MediaNormalizer;
pub use path_mapper::PathMapper;
pub use platform::PlatformCommands;
pub use progress::RunStats;
pub use video_processor::{FfmpegTranscoder, Transcoder, TransformProfile, VideoProcessor};
