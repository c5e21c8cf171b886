//! # Metadata & Timestamp Preservation Module
//!
//! Questo modulo preserva la provenienza di ogni file elaborato.
//!
//! ## Responsabilità:
//! - Estrae il blocco EXIF grezzo dal contenitore sorgente (JPEG, PNG, WebP, HEIF)
//!   tramite `kamadak-exif`
//! - Per i TIFF, dove il "blocco EXIF" è l'intero file, ricostruisce un TIFF
//!   minimo con i soli campi di metadata (niente strip, niente tag di layout)
//! - Reinserisce il blocco EXIF nel JPEG di output come segmento APP1,
//!   byte per byte identico al blocco sorgente
//! - Copia sempre i timestamp del filesystem (accesso, modifica e, dove
//!   supportato, creazione) dall'input all'output
//!
//! ## Ordine delle operazioni:
//! 1. Reinserimento EXIF (riscrive il file)
//! 2. Copia timestamp (deve essere l'ultima scrittura sul file)
//!
//! Per i video i metadata viaggiano nel flag `movflags` del profilo di
//! encoding, qui vengono copiati solo i timestamp.

use crate::error::NormalizeError;
use std::fs::{File, FileTimes, OpenOptions};
use std::io::{BufRead, BufReader, Cursor};
use std::path::Path;
use std::time::SystemTime;
use tracing::{debug, warn};

const EXIF_HEADER: &[u8] = b"Exif\0\0";

const TIFF_MAGIC: [&[u8]; 2] = [b"II*\0", b"MM\0*"];

/// Tags describing the pixel layout of a TIFF source, not its capture
const TIFF_LAYOUT_TAGS: &[exif::Tag] = &[
    exif::Tag::ImageWidth,
    exif::Tag::ImageLength,
    exif::Tag::BitsPerSample,
    exif::Tag::Compression,
    exif::Tag::PhotometricInterpretation,
    exif::Tag::SamplesPerPixel,
    exif::Tag::RowsPerStrip,
    exif::Tag::PlanarConfiguration,
];

/// Largest TIFF payload that fits a single APP1 segment
pub const MAX_EXIF_PAYLOAD: usize = u16::MAX as usize - 2 - EXIF_HEADER.len();

/// Provenance captured from a source before it is transformed
#[derive(Debug, Clone)]
pub struct ProvenanceBundle {
    pub exif: Option<Vec<u8>>,
    pub accessed: Option<SystemTime>,
    pub modified: SystemTime,
    pub created: Option<SystemTime>,
}

impl ProvenanceBundle {
    pub fn capture(input: &Path, exif: Option<Vec<u8>>) -> Result<Self, NormalizeError> {
        let metadata = std::fs::metadata(input)?;
        Ok(Self {
            exif,
            accessed: metadata.accessed().ok(),
            modified: metadata.modified()?,
            created: metadata.created().ok(),
        })
    }

    /// Stamp the captured filesystem times onto `output`
    pub fn apply_timestamps(&self, output: &Path) -> Result<(), NormalizeError> {
        let mut times = FileTimes::new().set_modified(self.modified);
        if let Some(accessed) = self.accessed {
            times = times.set_accessed(accessed);
        }

        #[cfg(windows)]
        {
            use std::os::windows::fs::FileTimesExt;
            if let Some(created) = self.created {
                times = times.set_created(created);
            }
        }

        #[cfg(target_os = "macos")]
        {
            use std::os::macos::fs::FileTimesExt;
            if let Some(created) = self.created {
                times = times.set_created(created);
            }
        }

        let file = OpenOptions::new().write(true).open(output)?;
        file.set_times(times)?;
        Ok(())
    }
}

/// Raw TIFF block of the source's EXIF, if the container carries one.
pub fn extract_exif(path: &Path) -> Option<Vec<u8>> {
    let file = File::open(path).ok()?;
    let mut reader = BufReader::new(file);
    let is_tiff = reader
        .fill_buf()
        .map(|head| TIFF_MAGIC.iter().any(|magic| head.starts_with(magic)))
        .unwrap_or(false);

    let exif = match exif::Reader::new().read_from_container(&mut reader) {
        Ok(exif) => exif,
        Err(exif::Error::NotFound(_)) => return None,
        Err(e) => {
            debug!("No usable EXIF in {}: {}", path.display(), e);
            return None;
        }
    };

    if is_tiff {
        return tiff_metadata_block(&exif, path);
    }

    debug!("Found {} bytes of EXIF in {}", exif.buf().len(), path.display());
    Some(exif.buf().to_vec())
}

/// For a TIFF source `Exif::buf()` is the whole file; rebuild a block with
/// the IFD0 metadata plus the Exif and GPS directories only.
fn tiff_metadata_block(exif: &exif::Exif, path: &Path) -> Option<Vec<u8>> {
    let has_metadata = [exif::Tag::ExifIFDPointer, exif::Tag::GPSInfoIFDPointer]
        .into_iter()
        .any(|tag| exif.get_field(tag, exif::In::PRIMARY).is_some());
    if !has_metadata {
        debug!("TIFF without EXIF or GPS directory: {}", path.display());
        return None;
    }

    let mut writer = exif::experimental::Writer::new();
    for field in exif
        .fields()
        .filter(|f| f.ifd_num == exif::In::PRIMARY && !TIFF_LAYOUT_TAGS.contains(&f.tag))
    {
        writer.push_field(field);
    }

    let mut block = Cursor::new(Vec::new());
    match writer.write(&mut block, exif.little_endian()) {
        Ok(()) => {
            let block = block.into_inner();
            debug!("Rebuilt {} bytes of EXIF from TIFF {}", block.len(), path.display());
            Some(block)
        }
        Err(e) => {
            warn!("Cannot rebuild EXIF of {}: {}", path.display(), e);
            None
        }
    }
}

/// Insert `tiff` as an APP1 segment right after SOI (and JFIF APP0, if present).
pub fn embed_exif_in_jpeg(jpeg: &[u8], tiff: &[u8]) -> Result<Vec<u8>, NormalizeError> {
    if jpeg.len() < 4 || jpeg[0] != 0xFF || jpeg[1] != 0xD8 {
        return Err(NormalizeError::Metadata("output is not a JPEG stream".to_string()));
    }
    if tiff.len() > MAX_EXIF_PAYLOAD {
        return Err(NormalizeError::Metadata(format!(
            "EXIF block of {} bytes does not fit an APP1 segment",
            tiff.len()
        )));
    }

    let mut insert_at = 2;
    if jpeg[2] == 0xFF && jpeg[3] == 0xE0 && jpeg.len() >= 6 {
        let app0_len = u16::from_be_bytes([jpeg[4], jpeg[5]]) as usize;
        if 4 + app0_len <= jpeg.len() {
            insert_at = 4 + app0_len;
        }
    }

    let segment_len = (2 + EXIF_HEADER.len() + tiff.len()) as u16;
    let mut out = Vec::with_capacity(jpeg.len() + 4 + EXIF_HEADER.len() + tiff.len());
    out.extend_from_slice(&jpeg[..insert_at]);
    out.extend_from_slice(&[0xFF, 0xE1]);
    out.extend_from_slice(&segment_len.to_be_bytes());
    out.extend_from_slice(EXIF_HEADER);
    out.extend_from_slice(tiff);
    out.extend_from_slice(&jpeg[insert_at..]);
    Ok(out)
}

/// Copy accessed/modified (and creation, where the platform allows) times.
pub fn copy_timestamps(input: &Path, output: &Path) -> Result<(), NormalizeError> {
    ProvenanceBundle::capture(input, None)?.apply_timestamps(output)
}

/// Reattach `exif` to the JPEG at `output` when present, then copy timestamps.
pub fn preserve(input: &Path, output: &Path, exif: Option<&[u8]>) -> Result<(), NormalizeError> {
    let provenance = ProvenanceBundle::capture(input, exif.map(<[u8]>::to_vec))?;

    if let Some(tiff) = provenance.exif.as_deref() {
        let jpeg = std::fs::read(output)?;
        match embed_exif_in_jpeg(&jpeg, tiff) {
            Ok(with_exif) => {
                std::fs::write(output, with_exif)?;
                debug!("EXIF reattached: {}", output.display());
            }
            Err(e) => warn!("Keeping {} without EXIF: {}", output.display(), e),
        }
    }

    provenance.apply_timestamps(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{gradient, heif_with_exif, sample_exif_blob, set_mtime, tiff_with_capture_date, write_jpeg};
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn test_embed_then_extract_is_byte_identical() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tagged.jpg");
        write_jpeg(&path, 32, 24, None);

        let blob = sample_exif_blob();
        let jpeg = std::fs::read(&path).unwrap();
        std::fs::write(&path, embed_exif_in_jpeg(&jpeg, &blob).unwrap()).unwrap();

        assert_eq!(extract_exif(&path).unwrap(), blob);
        // Still a decodable JPEG
        assert!(image::open(&path).is_ok());
    }

    #[test]
    fn test_extract_missing_exif() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("plain.jpg");
        write_jpeg(&path, 8, 8, None);
        assert!(extract_exif(&path).is_none());
        assert!(extract_exif(&dir.path().join("nope.jpg")).is_none());
    }

    #[test]
    fn test_embed_rejects_non_jpeg_and_oversized() {
        assert!(embed_exif_in_jpeg(b"\x89PNG\r\n\x1a\n", &sample_exif_blob()).is_err());

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.jpg");
        write_jpeg(&path, 8, 8, None);
        let jpeg = std::fs::read(&path).unwrap();
        assert!(embed_exif_in_jpeg(&jpeg, &vec![0u8; MAX_EXIF_PAYLOAD + 1]).is_err());
        assert!(embed_exif_in_jpeg(&jpeg, &vec![0u8; MAX_EXIF_PAYLOAD]).is_ok());
    }

    #[test]
    fn test_preserve_copies_mtime_without_exif() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("in.bin");
        let output = dir.path().join("out.bin");
        std::fs::write(&input, b"source").unwrap();
        std::fs::write(&output, b"result").unwrap();

        let when = SystemTime::UNIX_EPOCH + Duration::from_secs(1_500_000_000);
        set_mtime(&input, when);

        preserve(&input, &output, None).unwrap();
        assert_eq!(std::fs::metadata(&output).unwrap().modified().unwrap(), when);
    }

    #[test]
    fn test_preserve_with_exif_keeps_mtime() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("in.jpg");
        let output = dir.path().join("out.jpg");
        write_jpeg(&input, 16, 16, None);
        write_jpeg(&output, 16, 16, None);

        let when = SystemTime::UNIX_EPOCH + Duration::from_secs(1_234_567_890);
        set_mtime(&input, when);

        let blob = sample_exif_blob();
        preserve(&input, &output, Some(&blob)).unwrap();

        assert_eq!(extract_exif(&output).unwrap(), blob);
        assert_eq!(std::fs::metadata(&output).unwrap().modified().unwrap(), when);
    }

    #[test]
    fn test_plain_tiff_has_no_exif() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("scan.tiff");
        gradient(40, 30).save(&path).unwrap();

        assert!(extract_exif(&path).is_none());
    }

    #[test]
    fn test_tiff_exif_is_rebuilt_without_pixel_layout() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("camera.tif");
        let file = tiff_with_capture_date("2021:07:04 10:20:30");
        std::fs::write(&path, &file).unwrap();

        let block = extract_exif(&path).unwrap();
        assert!(block.len() < file.len());

        let parsed = exif::Reader::new().read_raw(block.clone()).unwrap();
        let date = parsed
            .get_field(exif::Tag::DateTimeOriginal, exif::In::PRIMARY)
            .unwrap();
        match &date.value {
            exif::Value::Ascii(parts) => assert_eq!(parts[0], b"2021:07:04 10:20:30".to_vec()),
            other => panic!("unexpected value {:?}", other),
        }
        assert!(parsed.get_field(exif::Tag::ImageWidth, exif::In::PRIMARY).is_none());
        assert!(parsed.get_field(exif::Tag::StripOffsets, exif::In::PRIMARY).is_none());

        // The rebuilt block survives a JPEG round trip unchanged
        let jpeg_path = dir.path().join("out.jpg");
        write_jpeg(&jpeg_path, 8, 8, Some(&block));
        assert_eq!(extract_exif(&jpeg_path).unwrap(), block);
    }

    #[test]
    fn test_heif_exif_item_is_extracted_verbatim() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("iphone.heic");
        let blob = sample_exif_blob();
        std::fs::write(&path, heif_with_exif(&blob)).unwrap();

        assert_eq!(extract_exif(&path).unwrap(), blob);
    }
}
