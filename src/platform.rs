//! # Platform-specific utilities
//!
//! Questo modulo centralizza la risoluzione dei tool esterni.
//! I path vengono risolti una sola volta all'avvio e la struttura viene
//! iniettata nei processori (nessun singleton globale).
//!
//! ## Strategia di risoluzione:
//! 1. Directory indicata da `MEDIA_NORMALIZER_TOOLS_DIR` (tool bundled)
//! 2. `PATH` di sistema tramite `which`

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub const TOOLS_DIR_ENV: &str = "MEDIA_NORMALIZER_TOOLS_DIR";

/// Tools the pipeline knows how to drive
pub const KNOWN_TOOLS: &[&str] = &["ffmpeg", "ffprobe", "dcraw", "heif-convert", "magick", "sips"];

/// Resolved locations of external tools
#[derive(Debug, Clone, Default)]
pub struct PlatformCommands {
    tools: HashMap<String, PathBuf>,
}

impl PlatformCommands {
    /// Resolve every known tool once
    pub fn detect() -> Self {
        let tools_dir = std::env::var_os(TOOLS_DIR_ENV).map(PathBuf::from);
        let mut tools = HashMap::new();

        for &name in KNOWN_TOOLS {
            let bundled = tools_dir
                .as_deref()
                .map(|dir| dir.join(Self::executable_name(name)))
                .filter(|p| p.is_file());

            match bundled.or_else(|| which::which(name).ok()) {
                Some(path) => {
                    debug!("Resolved tool {} -> {}", name, path.display());
                    tools.insert(name.to_string(), path);
                }
                None => debug!("Tool not found: {}", name),
            }
        }

        Self { tools }
    }

    /// Build from explicit locations
    pub fn with_tools<I, S, P>(tools: I) -> Self
    where
        I: IntoIterator<Item = (S, P)>,
        S: Into<String>,
        P: Into<PathBuf>,
    {
        Self {
            tools: tools.into_iter().map(|(n, p)| (n.into(), p.into())).collect(),
        }
    }

    /// Get the platform-specific executable file name
    pub fn executable_name(base_name: &str) -> String {
        if cfg!(windows) {
            format!("{}.exe", base_name)
        } else {
            base_name.to_string()
        }
    }

    pub fn resolve(&self, base_name: &str) -> Option<&Path> {
        self.tools.get(base_name).map(PathBuf::as_path)
    }

    pub fn is_available(&self, base_name: &str) -> bool {
        self.tools.contains_key(base_name)
    }

    /// Log which tools were found; missing ones only disable their media kind
    pub fn check_dependencies(&self) {
        info!("Platform: {}", Self::system_info());

        for (tool, purpose) in [("ffmpeg", "video encoding"), ("ffprobe", "video probing")] {
            if !self.is_available(tool) {
                warn!("{} not found, {} will fail", tool, purpose);
            }
        }

        if !self.is_available("dcraw") && !self.is_available("magick") {
            warn!("Neither dcraw nor magick found, RAW images (.arw, .nef) will fail");
        }
        if !self.is_available("heif-convert") && !self.is_available("magick") && !self.is_available("sips") {
            warn!("No HEIF reader found (heif-convert, magick, sips), HEIC images will fail");
        }
    }

    pub fn system_info() -> SystemInfo {
        SystemInfo {
            os: std::env::consts::OS,
            arch: std::env::consts::ARCH,
            family: std::env::consts::FAMILY,
        }
    }
}

/// System information structure
#[derive(Debug, Clone)]
pub struct SystemInfo {
    pub os: &'static str,
    pub arch: &'static str,
    pub family: &'static str,
}

impl std::fmt::Display for SystemInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} ({})", self.os, self.arch, self.family)
    }
}
