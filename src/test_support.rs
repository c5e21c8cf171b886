//! Fixtures shared by the unit test suites.

use crate::error::NormalizeError;
use crate::metadata::embed_exif_in_jpeg;
use crate::resolution::ScaleFilter;
use crate::video_processor::{TransformProfile, Transcoder};
use image::codecs::jpeg::JpegEncoder;
use image::{ColorType, RgbImage};
use std::fs::{FileTimes, OpenOptions};
use std::path::Path;
use std::sync::Mutex;
use std::time::SystemTime;

/// Big-endian TIFF with a single IFD0 entry: Make = "ABC"
pub fn sample_exif_blob() -> Vec<u8> {
    vec![
        0x4D, 0x4D, 0x00, 0x2A, 0x00, 0x00, 0x00, 0x08, // header, IFD0 at 8
        0x00, 0x01, // one entry
        0x01, 0x0F, 0x00, 0x02, 0x00, 0x00, 0x00, 0x04, b'A', b'B', b'C', 0x00, // Make
        0x00, 0x00, 0x00, 0x00, // no IFD1
    ]
}

pub fn gradient(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
    })
}

pub fn write_jpeg(path: &Path, width: u32, height: u32, exif: Option<&[u8]>) {
    let img = gradient(width, height);
    let mut buf = Vec::new();
    JpegEncoder::new_with_quality(&mut buf, 90)
        .encode(img.as_raw(), width, height, ColorType::Rgb8)
        .unwrap();

    let bytes = match exif {
        Some(tiff) => embed_exif_in_jpeg(&buf, tiff).unwrap(),
        None => buf,
    };
    std::fs::write(path, bytes).unwrap();
}

pub fn write_png(path: &Path, width: u32, height: u32) {
    gradient(width, height).save(path).unwrap();
}

pub fn set_mtime(path: &Path, when: SystemTime) {
    let file = OpenOptions::new().write(true).open(path).unwrap();
    file.set_times(FileTimes::new().set_modified(when).set_accessed(when)).unwrap();
}

/// One recorded `Transcoder::encode` call
#[derive(Debug, Clone)]
pub struct EncodeCall {
    pub input: std::path::PathBuf,
    pub output: std::path::PathBuf,
    pub profile: TransformProfile,
    pub scale: Option<ScaleFilter>,
}

/// In-memory `Transcoder`: fixed probe answer, writes a stub output file
#[derive(Debug, Default)]
pub struct FakeTranscoder {
    resolution: Option<(u32, u32)>,
    fail_encode: bool,
    calls: Mutex<Vec<EncodeCall>>,
}

impl FakeTranscoder {
    pub fn with_resolution(width: u32, height: u32) -> Self {
        Self {
            resolution: Some((width, height)),
            ..Default::default()
        }
    }

    pub fn unprobeable() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            resolution: Some((1280, 720)),
            fail_encode: true,
            ..Default::default()
        }
    }

    pub fn calls(&self) -> Vec<EncodeCall> {
        self.calls.lock().unwrap().clone()
    }
}

impl Transcoder for FakeTranscoder {
    async fn probe_resolution(&self, _input: &Path) -> Result<(u32, u32), NormalizeError> {
        self.resolution
            .ok_or_else(|| NormalizeError::Probe("moov atom not found".to_string()))
    }

    async fn encode(
        &self,
        input: &Path,
        output: &Path,
        profile: &TransformProfile,
        scale: Option<&ScaleFilter>,
    ) -> Result<(), NormalizeError> {
        self.calls.lock().unwrap().push(EncodeCall {
            input: input.to_path_buf(),
            output: output.to_path_buf(),
            profile: *profile,
            scale: scale.copied(),
        });

        if self.fail_encode {
            // Leave a truncated file behind like a crashed encoder would
            std::fs::write(output, b"partial")?;
            return Err(NormalizeError::Transcode {
                tool: "ffmpeg".to_string(),
                message: "Invalid data found when processing input".to_string(),
            });
        }

        std::fs::write(output, b"encoded")?;
        Ok(())
    }
}

fn ifd_entry(out: &mut Vec<u8>, tag: u16, kind: u16, count: u32, value: u32) {
    out.extend_from_slice(&tag.to_le_bytes());
    out.extend_from_slice(&kind.to_le_bytes());
    out.extend_from_slice(&count.to_le_bytes());
    out.extend_from_slice(&value.to_le_bytes());
}

/// 1x1 grayscale little-endian TIFF whose Exif directory holds DateTimeOriginal
pub fn tiff_with_capture_date(date: &str) -> Vec<u8> {
    const SHORT: u16 = 3;
    const LONG: u16 = 4;
    const ASCII: u16 = 2;

    let ifd0_at = 8u32;
    let ifd0_entries = 10u32;
    let exif_ifd_at = ifd0_at + 2 + ifd0_entries * 12 + 4;
    let date_at = exif_ifd_at + 2 + 12 + 4;
    let date_len = date.len() as u32 + 1;
    let pixel_at = date_at + date_len;

    let mut out = b"II*\0".to_vec();
    out.extend_from_slice(&ifd0_at.to_le_bytes());

    out.extend_from_slice(&(ifd0_entries as u16).to_le_bytes());
    ifd_entry(&mut out, 0x0100, SHORT, 1, 1); // ImageWidth
    ifd_entry(&mut out, 0x0101, SHORT, 1, 1); // ImageLength
    ifd_entry(&mut out, 0x0102, SHORT, 1, 8); // BitsPerSample
    ifd_entry(&mut out, 0x0103, SHORT, 1, 1); // Compression: none
    ifd_entry(&mut out, 0x0106, SHORT, 1, 1); // BlackIsZero
    ifd_entry(&mut out, 0x0111, LONG, 1, pixel_at); // StripOffsets
    ifd_entry(&mut out, 0x0115, SHORT, 1, 1); // SamplesPerPixel
    ifd_entry(&mut out, 0x0116, SHORT, 1, 1); // RowsPerStrip
    ifd_entry(&mut out, 0x0117, LONG, 1, 1); // StripByteCounts
    ifd_entry(&mut out, 0x8769, LONG, 1, exif_ifd_at); // ExifIFDPointer
    out.extend_from_slice(&0u32.to_le_bytes());

    out.extend_from_slice(&1u16.to_le_bytes());
    ifd_entry(&mut out, 0x9003, ASCII, date_len, date_at); // DateTimeOriginal
    out.extend_from_slice(&0u32.to_le_bytes());

    out.extend_from_slice(date.as_bytes());
    out.push(0);
    out.push(0x80);
    out
}

fn iso_box(kind: &[u8; 4], body: &[u8]) -> Vec<u8> {
    let mut out = ((body.len() + 8) as u32).to_be_bytes().to_vec();
    out.extend_from_slice(kind);
    out.extend_from_slice(body);
    out
}

/// HEIF container (no image items) whose only item is an Exif block stored in `idat`
pub fn heif_with_exif(tiff: &[u8]) -> Vec<u8> {
    let ftyp = iso_box(b"ftyp", b"heic\0\0\0\0mif1heic");

    // infe v2: item 1, no protection, type Exif, empty name
    let infe = iso_box(b"infe", &[2, 0, 0, 0, 0, 1, 0, 0, b'E', b'x', b'i', b'f', 0]);
    let mut iinf_body = vec![0, 0, 0, 0, 0, 1];
    iinf_body.extend_from_slice(&infe);
    let iinf = iso_box(b"iinf", &iinf_body);

    // Exif item payload: 4-byte offset to the TIFF header, then the TIFF block
    let mut item = vec![0, 0, 0, 0];
    item.extend_from_slice(tiff);
    let idat = iso_box(b"idat", &item);

    // iloc v1: 4-byte offsets and lengths, item 1 stored in idat (construction method 1)
    let mut iloc_body = vec![1, 0, 0, 0, 0x44, 0x00, 0, 1, 0, 1, 0, 1, 0, 0, 0, 1];
    iloc_body.extend_from_slice(&0u32.to_be_bytes());
    iloc_body.extend_from_slice(&(item.len() as u32).to_be_bytes());
    let iloc = iso_box(b"iloc", &iloc_body);

    let mut meta_body = vec![0, 0, 0, 0];
    meta_body.extend_from_slice(&iinf);
    meta_body.extend_from_slice(&iloc);
    meta_body.extend_from_slice(&idat);

    let mut out = ftyp;
    out.extend_from_slice(&iso_box(b"meta", &meta_body));
    out
}

/// Executable shell script at `path`
#[cfg(unix)]
pub fn write_script(path: &Path, body: &str) {
    use std::os::unix::fs::PermissionsExt;

    std::fs::write(path, format!("#!/bin/sh\n{}\n", body)).unwrap();
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).unwrap();
}
