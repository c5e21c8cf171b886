//! # Video Processing Module
//!
//! Questo modulo gestisce la normalizzazione di tutti i formati video supportati.
//!
//! ## Responsabilità:
//! - Analisi della risoluzione del primo stream video con ffprobe
//!   (dimensioni di visualizzazione: una rotazione di 90/270 gradi da
//!   display matrix o tag `rotate` scambia larghezza e altezza)
//! - Ricodifica con FFmpeg usando un profilo fisso (`TransformProfile`)
//! - Filtro `scale` solo se la sorgente supera il lato massimo
//! - Preservazione metadata tramite `-map_metadata 0` e `movflags`
//! - Copia dei timestamp del filesystem dopo un encoding riuscito
//!
//! ## Profilo di encoding (fisso):
//! - Codec video: libx264, CRF 23, preset medium
//! - Codec audio: AAC
//! - `-movflags use_metadata_tags`
//!
//! ## Percorso degradato:
//! Se ffprobe fallisce il video viene comunque ricodificato alla
//! risoluzione nativa (warning, non errore).
//!
//! ## Capability `Transcoder`:
//! Il processore dipende dal trait `Transcoder`, non da ffmpeg direttamente:
//! i test usano un transcoder finto, la CLI usa `FfmpegTranscoder`.
//!
//! ## Esempio:
//! ```rust,ignore
//! let transcoder = FfmpegTranscoder::new(&platform, &config);
//! let processor = VideoProcessor::new(transcoder, &config);
//! processor.compress_video(&input, &output).await?;
//! ```

use crate::args;
use crate::command::ToolCommand;
use crate::config::Config;
use crate::error::NormalizeError;
use crate::metadata::copy_timestamps;
use crate::platform::PlatformCommands;
use crate::resolution::ScaleFilter;
use serde::Deserialize;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Fixed encode settings shared by every video of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransformProfile {
    pub video_codec: &'static str,
    pub crf: u8,
    pub preset: &'static str,
    pub audio_codec: &'static str,
    pub movflags: &'static str,
}

impl TransformProfile {
    pub const STANDARD: Self = Self {
        video_codec: "libx264",
        crf: 23,
        preset: "medium",
        audio_codec: "aac",
        movflags: "use_metadata_tags",
    };

    /// Encoder arguments, everything between the input and the output path
    pub fn ffmpeg_args(&self) -> Vec<String> {
        args![
            "-c:v", self.video_codec,
            "-crf", self.crf,
            "-preset", self.preset,
            "-c:a", self.audio_codec,
            "-map_metadata", "0",
            "-movflags", self.movflags,
        ]
    }
}

impl Default for TransformProfile {
    fn default() -> Self {
        Self::STANDARD
    }
}

/// External transcoding capability
#[allow(async_fn_in_trait)]
pub trait Transcoder {
    /// Width and height of the primary video stream
    async fn probe_resolution(&self, input: &Path) -> Result<(u32, u32), NormalizeError>;

    async fn encode(
        &self,
        input: &Path,
        output: &Path,
        profile: &TransformProfile,
        scale: Option<&ScaleFilter>,
    ) -> Result<(), NormalizeError>;
}

/// `Transcoder` backed by the ffprobe / ffmpeg CLIs
#[derive(Debug, Clone)]
pub struct FfmpegTranscoder {
    ffmpeg: Option<PathBuf>,
    ffprobe: Option<PathBuf>,
    probe_timeout: Duration,
    encode_timeout: Duration,
}

impl FfmpegTranscoder {
    pub fn new(platform: &PlatformCommands, config: &Config) -> Self {
        Self {
            ffmpeg: platform.resolve("ffmpeg").map(Path::to_path_buf),
            ffprobe: platform.resolve("ffprobe").map(Path::to_path_buf),
            probe_timeout: config.probe_timeout(),
            encode_timeout: config.encode_timeout(),
        }
    }

    fn tool(path: &Option<PathBuf>, name: &str) -> Result<PathBuf, NormalizeError> {
        path.clone()
            .ok_or_else(|| NormalizeError::MissingDependency(format!("{} is required for video processing", name)))
    }

    /// Full ffmpeg argument list for one encode
    pub fn encode_args(
        input: &Path,
        output: &Path,
        profile: &TransformProfile,
        scale: Option<&ScaleFilter>,
    ) -> Vec<OsString> {
        let mut argv: Vec<OsString> = args!["-y", "-hide_banner", "-loglevel", "error", "-i"]
            .into_iter()
            .map(OsString::from)
            .collect();
        argv.push(input.as_os_str().to_os_string());

        if let Some(scale) = scale {
            argv.push("-vf".into());
            argv.push(scale.to_string().into());
        }

        argv.extend(profile.ffmpeg_args().into_iter().map(OsString::from));
        argv.push(output.as_os_str().to_os_string());
        argv
    }
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    width: Option<u32>,
    height: Option<u32>,
    #[serde(default)]
    side_data_list: Vec<ProbeSideData>,
    #[serde(default)]
    tags: Option<ProbeTags>,
}

#[derive(Debug, Deserialize)]
struct ProbeSideData {
    rotation: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct ProbeTags {
    rotate: Option<String>,
}

impl ProbeStream {
    /// Rotation in degrees; the display matrix wins over the legacy `rotate` tag
    fn rotation(&self) -> f64 {
        self.side_data_list
            .iter()
            .find_map(|side| side.rotation)
            .or_else(|| {
                self.tags
                    .as_ref()
                    .and_then(|tags| tags.rotate.as_deref())
                    .and_then(|r| r.trim().parse().ok())
            })
            .unwrap_or(0.0)
    }
}

const PROBE_ENTRIES: &str = "stream=width,height:stream_side_data=rotation:stream_tags=rotate";

/// Parse `ffprobe -of json -show_entries` output into display dimensions
pub fn parse_probe_output(json: &str) -> Result<(u32, u32), NormalizeError> {
    let probe: ProbeOutput =
        serde_json::from_str(json).map_err(|e| NormalizeError::Probe(format!("ffprobe JSON parse error: {}", e)))?;

    let stream = probe
        .streams
        .first()
        .ok_or_else(|| NormalizeError::Probe("no video stream".to_string()))?;

    let (width, height) = match (stream.width, stream.height) {
        (Some(w), Some(h)) if w > 0 && h > 0 => (w, h),
        _ => return Err(NormalizeError::Probe("video stream has no dimensions".to_string())),
    };

    let quarter_turns = (stream.rotation() / 90.0).round() as i64;
    if quarter_turns.rem_euclid(2) == 1 {
        debug!("Rotated stream ({} quarter turns): {}x{} displayed as {}x{}", quarter_turns, width, height, height, width);
        Ok((height, width))
    } else {
        Ok((width, height))
    }
}

impl Transcoder for FfmpegTranscoder {
    async fn probe_resolution(&self, input: &Path) -> Result<(u32, u32), NormalizeError> {
        let ffprobe = Self::tool(&self.ffprobe, "ffprobe")?;

        let output = ToolCommand::new(ffprobe)
            .args(args![
                "-v", "error",
                "-select_streams", "v:0",
                "-show_entries", PROBE_ENTRIES,
                "-of", "json",
            ])
            .arg(input)
            .timeout(self.probe_timeout)
            .execute()
            .await?;

        parse_probe_output(&output.stdout_str())
    }

    async fn encode(
        &self,
        input: &Path,
        output: &Path,
        profile: &TransformProfile,
        scale: Option<&ScaleFilter>,
    ) -> Result<(), NormalizeError> {
        let ffmpeg = Self::tool(&self.ffmpeg, "ffmpeg")?;

        debug!(
            "🎬 Encoding {} (CRF: {}, preset: {}, scale: {})",
            input.display(),
            profile.crf,
            profile.preset,
            scale.map(|s| s.to_string()).unwrap_or_else(|| "native".to_string())
        );

        ToolCommand::new(ffmpeg)
            .args(Self::encode_args(input, output, profile, scale))
            .timeout(self.encode_timeout)
            .execute()
            .await?;

        Ok(())
    }
}

/// Handles video normalization
pub struct VideoProcessor<T: Transcoder> {
    transcoder: T,
    profile: TransformProfile,
    max_size: u32,
}

impl<T: Transcoder> VideoProcessor<T> {
    pub fn new(transcoder: T, config: &Config) -> Self {
        Self {
            transcoder,
            profile: config.video_profile,
            max_size: config.max_size,
        }
    }

    pub fn transcoder(&self) -> &T {
        &self.transcoder
    }

    /// Re-encode `input` into `output`, downscaling only when it exceeds the cap
    pub async fn compress_video(&self, input: &Path, output: &Path) -> Result<(), NormalizeError> {
        let start_time = std::time::Instant::now();

        let scale = match self.transcoder.probe_resolution(input).await {
            Ok((width, height)) => {
                debug!("Source resolution {}x{}: {}", width, height, input.display());
                ScaleFilter::for_video(width, height, self.max_size)
            }
            Err(e) => {
                warn!(
                    "Resolution unavailable, encoding at native resolution: {} ({})",
                    input.display(),
                    e
                );
                None
            }
        };

        self.transcoder
            .encode(input, output, &self.profile, scale.as_ref())
            .await?;

        copy_timestamps(input, output)?;

        match scale {
            Some(filter) => info!(
                "✅ Video downscaled ({}) and compressed in {:.1}s: {}",
                filter,
                start_time.elapsed().as_secs_f64(),
                output.display()
            ),
            None => info!(
                "✅ Video compressed in {:.1}s: {}",
                start_time.elapsed().as_secs_f64(),
                output.display()
            ),
        }

        Ok(())
    }
}
