//! # Resolution Policy Module
//!
//! Calcola le dimensioni di destinazione sotto il vincolo del lato massimo.
//!
//! ## Regole:
//! - Se entrambi i lati sono <= `max_edge` la dimensione resta invariata (nessun upscaling)
//! - Altrimenti il lato lungo diventa `max_edge` e il lato corto viene scalato
//!   in proporzione con arrotondamento all'intero più vicino
//! - Per i video il lato corto è delegato all'encoder (`-2`), che lo mantiene pari
//!
//! ## Esempio:
//! ```rust
//! # use media_normalizer::resolution::compute_target_size;
//! assert_eq!(compute_target_size(4000, 3000, 1920), (1920, 1440));
//! ```

use std::fmt;

/// Full HD cap applied to both images and videos
pub const MAX_SIZE: u32 = 1920;

/// Source dimensions together with the computed target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolutionSpec {
    pub width: u32,
    pub height: u32,
    pub target_width: u32,
    pub target_height: u32,
}

impl ResolutionSpec {
    pub fn new(width: u32, height: u32, max_edge: u32) -> Self {
        let (target_width, target_height) = compute_target_size(width, height, max_edge);
        Self {
            width,
            height,
            target_width,
            target_height,
        }
    }

    pub fn needs_resize(&self) -> bool {
        self.width != self.target_width || self.height != self.target_height
    }
}

/// Fit `(width, height)` inside a `max_edge` square, preserving aspect ratio.
pub fn compute_target_size(width: u32, height: u32, max_edge: u32) -> (u32, u32) {
    let longer = width.max(height);
    if longer <= max_edge {
        return (width, height);
    }

    let shorter = width.min(height);
    let scaled = ((shorter as f64 * max_edge as f64) / longer as f64).round() as u32;
    let scaled = scaled.max(1);

    if width >= height {
        (max_edge, scaled)
    } else {
        (scaled, max_edge)
    }
}

/// ffmpeg `scale` filter; `-2` lets the encoder pick an even size for that edge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScaleFilter {
    pub width: i32,
    pub height: i32,
}

impl ScaleFilter {
    /// Returns a filter only when the source exceeds `max_edge` on either side.
    pub fn for_video(width: u32, height: u32, max_edge: u32) -> Option<Self> {
        if width <= max_edge && height <= max_edge {
            return None;
        }

        let edge = max_edge as i32;
        if width >= height {
            Some(Self { width: edge, height: -2 })
        } else {
            Some(Self { width: -2, height: edge })
        }
    }
}

impl fmt::Display for ScaleFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "scale={}:{}", self.width, self.height)
    }
}
