//! # External Command Module
//!
//! Builder per l'esecuzione di tool esterni (ffmpeg, ffprobe, dcraw,
//! heif-convert, magick) con output catturato e tempo massimo di attesa.
//!
//! ## Responsabilità:
//! - Cattura stdout (binario, per i tool che scrivono immagini su pipe) e stderr
//! - Timeout esplicito: alla scadenza il processo figlio viene terminato
//! - Mappa i fallimenti su `NormalizeError` (tool mancante, exit code, timeout)
//!
//! ## Esempio:
//! ```rust,ignore
//! let output = ToolCommand::new("ffprobe")
//!     .args(args!["-v", "error", "-show_streams"])
//!     .arg(&path)
//!     .timeout(Duration::from_secs(60))
//!     .execute()
//!     .await?;
//! ```

use crate::error::NormalizeError;
use std::ffi::{OsStr, OsString};
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};
use tokio::process::Command;
use tracing::debug;

/// Default command timeout: 5 minutes.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Output captured from a tool execution.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub status: ExitStatus,
    pub stdout: Vec<u8>,
    /// Lossy UTF-8 diagnostic text
    pub stderr: String,
}

impl ToolOutput {
    pub fn stdout_str(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }
}

#[derive(Debug, Clone)]
pub struct ToolCommand {
    program: PathBuf,
    args: Vec<OsString>,
    timeout: Duration,
}

impl ToolCommand {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn arg(&mut self, arg: impl AsRef<OsStr>) -> &mut Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    pub fn args<I, S>(&mut self, args: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args.extend(args.into_iter().map(|a| a.as_ref().to_os_string()));
        self
    }

    /// Set the maximum execution time.
    pub fn timeout(&mut self, timeout: Duration) -> &mut Self {
        self.timeout = timeout;
        self
    }

    pub fn tool_name(&self) -> String {
        self.program
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.program.to_string_lossy().into_owned())
    }

    /// Run to completion, failing on spawn error, non-zero exit or timeout.
    pub async fn execute(&self) -> Result<ToolOutput, NormalizeError> {
        let tool = self.tool_name();
        debug!("Running {} {:?}", self.program.display(), self.args);

        let child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    NormalizeError::MissingDependency(format!("{} is not installed", tool))
                } else {
                    NormalizeError::Transcode {
                        tool: tool.clone(),
                        message: format!("failed to spawn: {}", e),
                    }
                }
            })?;

        let start_time = Instant::now();
        // Dropping the wait future on timeout drops the child, which kills it
        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(result) => result.map_err(|e| NormalizeError::Transcode {
                tool: tool.clone(),
                message: format!("I/O error waiting for process: {}", e),
            })?,
            Err(_) => {
                return Err(NormalizeError::Timeout {
                    tool,
                    after: self.timeout,
                })
            }
        };

        let tool_output = ToolOutput {
            status: output.status,
            stdout: output.stdout,
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };

        if !tool_output.status.success() {
            return Err(NormalizeError::Transcode {
                tool,
                message: format!("exited with {}: {}", tool_output.status, tool_output.stderr.trim()),
            });
        }

        debug!("{} completed in {:.1}s", tool, start_time.elapsed().as_secs_f64());
        Ok(tool_output)
    }
}
