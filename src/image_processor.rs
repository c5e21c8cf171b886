//! # Image Processing Module
//!
//! Questo modulo normalizza tutte le immagini supportate in JPEG con lato
//! massimo limitato, preservando EXIF e timestamp.
//!
//! ## Pipeline unica
//!
//! Tutte le varianti convergono sulla stessa routine:
//!
//! ```text
//! decode (variante) -> resize (se serve) -> encode JPEG -> preserve (EXIF + timestamp)
//! ```
//!
//! Solo lo step di decode cambia:
//!
//! | Variante | Estensioni | Decoder |
//! |----------|------------|---------|
//! | Raster   | jpg, jpeg, png, tiff, webp, bmp | crate `image` (formato rilevato dal contenuto) |
//! | RAW      | arw, nef | dcraw (demosaicing) -> TIFF su stdout, fallback magick |
//! | HEIC     | heic | heif-convert -> PNG temporaneo, fallback magick / sips |
//!
//! ## Strategia Tool Selection (RAW / HEIC)
//! I tool vengono provati in ordine di priorità; se uno fallisce si passa
//! al successivo. Se nessun tool è installato l'errore è `MissingDependency`,
//! se tutti falliscono è un errore di decode del file.
//!
//! ## Qualità e ridimensionamento
//! - Resize Lanczos3 solo se un lato supera `max_size`
//! - JPEG baseline, qualità `jpeg_quality` (default 75), RGB8 (alpha scartato)
//!
//! ## Metadata
//! - Raster e HEIC: blocco EXIF del contenitore sorgente reinserito identico
//! - RAW: l'output del developer non porta EXIF, viene copiato solo il timestamp
//!
//! ## Concorrenza
//! Decode, resize ed encode sono CPU-bound e girano in `spawn_blocking`;
//! il dispatcher li attende comunque uno alla volta.

use crate::command::ToolCommand;
use crate::config::Config;
use crate::error::NormalizeError;
use crate::metadata::{extract_exif, preserve};
use crate::platform::PlatformCommands;
use crate::resolution::ResolutionSpec;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{ColorType, DynamicImage};
use std::ffi::OsString;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Pixels plus the EXIF block found in the source container
pub struct DecodedImage {
    pub image: DynamicImage,
    pub exif: Option<Vec<u8>>,
}

/// Where a developer tool leaves the decoded picture
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DevelopOutput {
    Stdout,
    TempFile,
}

/// External tool able to turn a RAW/HEIC file into a standard raster image
struct Developer {
    tool: &'static str,
    output: DevelopOutput,
    args: fn(&Path, &Path) -> Vec<OsString>,
}

fn dcraw_args(input: &Path, _temp: &Path) -> Vec<OsString> {
    // -c: stdout, -w: camera white balance, -T: TIFF
    vec!["-c".into(), "-w".into(), "-T".into(), input.into()]
}

fn magick_args(input: &Path, _temp: &Path) -> Vec<OsString> {
    vec![input.into(), "png:-".into()]
}

fn heif_convert_args(input: &Path, temp: &Path) -> Vec<OsString> {
    vec![input.into(), temp.into()]
}

fn sips_args(input: &Path, temp: &Path) -> Vec<OsString> {
    vec!["-s".into(), "format".into(), "png".into(), input.into(), "--out".into(), temp.into()]
}

const RAW_DEVELOPERS: &[Developer] = &[
    Developer { tool: "dcraw", output: DevelopOutput::Stdout, args: dcraw_args },
    Developer { tool: "magick", output: DevelopOutput::Stdout, args: magick_args },
];

const HEIC_DEVELOPERS: &[Developer] = &[
    Developer { tool: "heif-convert", output: DevelopOutput::TempFile, args: heif_convert_args },
    Developer { tool: "magick", output: DevelopOutput::Stdout, args: magick_args },
    Developer { tool: "sips", output: DevelopOutput::TempFile, args: sips_args },
];

/// Handles image normalization
pub struct ImageProcessor {
    platform: PlatformCommands,
    max_size: u32,
    jpeg_quality: u8,
    tool_timeout: Duration,
}

impl ImageProcessor {
    pub fn new(platform: PlatformCommands, config: &Config) -> Self {
        Self {
            platform,
            max_size: config.max_size,
            jpeg_quality: config.jpeg_quality,
            tool_timeout: config.tool_timeout(),
        }
    }

    /// Standard raster sources (JPEG/PNG/TIFF/WebP/BMP)
    pub async fn compress_photo(&self, input: &Path, output: &Path) -> Result<(), NormalizeError> {
        let decoded = self.decode_raster(input).await?;
        self.resize_and_save(decoded, input, output).await
    }

    /// RAW sensor files (.arw, .nef)
    pub async fn compress_raw(&self, input: &Path, output: &Path) -> Result<(), NormalizeError> {
        let decoded = self.decode_raw(input).await?;
        self.resize_and_save(decoded, input, output).await
    }

    /// HEIC container images
    pub async fn compress_heic(&self, input: &Path, output: &Path) -> Result<(), NormalizeError> {
        let decoded = self.decode_heic(input).await?;
        self.resize_and_save(decoded, input, output).await
    }

    async fn decode_raster(&self, input: &Path) -> Result<DecodedImage, NormalizeError> {
        let path = input.to_path_buf();
        run_blocking(move || {
            let image = open_image(&path)?;
            let exif = extract_exif(&path);
            Ok(DecodedImage { image, exif })
        })
        .await
    }

    async fn decode_raw(&self, input: &Path) -> Result<DecodedImage, NormalizeError> {
        let bytes = self.develop(input, RAW_DEVELOPERS, "RAW").await?;
        let path = input.to_path_buf();
        let image = run_blocking(move || load_developed(&path, &bytes)).await?;
        Ok(DecodedImage { image, exif: None })
    }

    async fn decode_heic(&self, input: &Path) -> Result<DecodedImage, NormalizeError> {
        let bytes = self.develop(input, HEIC_DEVELOPERS, "HEIC").await?;
        let path = input.to_path_buf();
        run_blocking(move || {
            let image = load_developed(&path, &bytes)?;
            let exif = extract_exif(&path);
            Ok(DecodedImage { image, exif })
        })
        .await
    }

    /// Run the first working developer and return the encoded intermediate image
    async fn develop(
        &self,
        input: &Path,
        developers: &[Developer],
        format_name: &str,
    ) -> Result<Vec<u8>, NormalizeError> {
        let mut any_tool_available = false;
        let mut last_error: Option<NormalizeError> = None;

        for developer in developers {
            let Some(tool_path) = self.platform.resolve(developer.tool) else {
                continue;
            };
            any_tool_available = true;

            let temp = tempfile::Builder::new().suffix(".png").tempfile()?;
            let args = (developer.args)(input, temp.path());
            debug!("Attempting {} decode with {}", format_name, developer.tool);

            let result = ToolCommand::new(tool_path)
                .args(args)
                .timeout(self.tool_timeout)
                .execute()
                .await;

            match result {
                Ok(out) => {
                    let bytes = match developer.output {
                        DevelopOutput::Stdout => out.stdout,
                        DevelopOutput::TempFile => tokio::fs::read(temp.path()).await?,
                    };
                    if !bytes.is_empty() {
                        return Ok(bytes);
                    }
                    warn!("{} produced no image for {}, trying next tool", developer.tool, input.display());
                }
                Err(e) => {
                    warn!("{} decode failed with {}, trying next tool: {}", format_name, developer.tool, e);
                    last_error = Some(e);
                }
            }
        }

        if !any_tool_available {
            let tool_names: Vec<&str> = developers.iter().map(|d| d.tool).collect();
            return Err(NormalizeError::MissingDependency(format!(
                "No {} decoder available. Please install one of: {}",
                format_name,
                tool_names.join(", ")
            )));
        }

        Err(NormalizeError::decode(
            input,
            last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| format!("all {} decoders failed", format_name)),
        ))
    }

    /// Shared tail of every variant: resize, encode, write, preserve
    async fn resize_and_save(&self, decoded: DecodedImage, input: &Path, output: &Path) -> Result<(), NormalizeError> {
        let input = input.to_path_buf();
        let output = output.to_path_buf();
        let max_size = self.max_size;
        let quality = self.jpeg_quality;

        let (resolution, output) = run_blocking(move || {
            let DecodedImage { image, exif } = decoded;
            let resolution = ResolutionSpec::new(image.width(), image.height(), max_size);

            let image = if resolution.needs_resize() {
                image.resize_exact(resolution.target_width, resolution.target_height, FilterType::Lanczos3)
            } else {
                image
            };

            let jpeg = encode_jpeg(&image, quality)?;
            std::fs::write(&output, jpeg)?;
            preserve(&input, &output, exif.as_deref())?;
            Ok((resolution, output))
        })
        .await?;

        if resolution.needs_resize() {
            info!(
                "Image resized {}x{} -> {}x{}",
                resolution.width, resolution.height, resolution.target_width, resolution.target_height
            );
        }
        info!("✅ Image saved: {}", output.display());
        Ok(())
    }
}

/// Decode a raster file, trusting its content over its extension
pub fn open_image(path: &Path) -> Result<DynamicImage, NormalizeError> {
    image::io::Reader::open(path)?
        .with_guessed_format()?
        .decode()
        .map_err(|e| NormalizeError::decode(path, e))
}

fn load_developed(source: &Path, bytes: &[u8]) -> Result<DynamicImage, NormalizeError> {
    image::load_from_memory(bytes).map_err(|e| NormalizeError::decode(source, e))
}

/// Baseline JPEG from the RGB8 view of `image`
pub fn encode_jpeg(image: &DynamicImage, quality: u8) -> Result<Vec<u8>, NormalizeError> {
    let rgb = image.to_rgb8();
    let mut buf = Vec::new();
    JpegEncoder::new_with_quality(&mut buf, quality).encode(rgb.as_raw(), rgb.width(), rgb.height(), ColorType::Rgb8)?;
    Ok(buf)
}

async fn run_blocking<T, F>(work: F) -> Result<T, NormalizeError>
where
    F: FnOnce() -> Result<T, NormalizeError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| NormalizeError::Io(std::io::Error::other(e)))?
}
