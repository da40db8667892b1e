//! Tesseract CLI engine.
//!
//! The engine is invoked as a subprocess: the prepared bitmap goes to a
//! temporary PNG, text comes back on stdout. The child is polled so the
//! per-request timeout and cooperative cancellation can kill it mid-run.

use std::io::Read;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};

use image::GrayImage;
use tracing::{debug, warn};

use crate::error::OcrError;
use crate::models::OcrConfig;

use super::{CancelToken, OcrEngine};

/// Poll interval while waiting on the child process.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// OCR engine backed by the `tesseract` binary.
pub struct TesseractOcr {
    binary: PathBuf,
}

impl TesseractOcr {
    /// Engine using `tesseract` from the PATH.
    pub fn new() -> Self {
        Self {
            binary: PathBuf::from("tesseract"),
        }
    }

    /// Engine using an explicit binary path.
    pub fn with_binary(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// First line of `tesseract --version`, when the binary runs.
    pub fn version(&self) -> Option<String> {
        let output = Command::new(&self.binary)
            .arg("--version")
            .stdin(Stdio::null())
            .output()
            .ok()?;
        if !output.status.success() {
            return None;
        }
        // tesseract prints the version banner on stderr
        let banner = if output.stderr.is_empty() {
            output.stdout
        } else {
            output.stderr
        };
        String::from_utf8_lossy(&banner)
            .lines()
            .next()
            .map(|line| line.trim().to_string())
    }

    fn wait_with_deadline(
        &self,
        child: &mut Child,
        timeout: Duration,
        cancel: &CancelToken,
    ) -> Result<std::process::ExitStatus, OcrError> {
        let deadline = Instant::now() + timeout;
        loop {
            if cancel.is_cancelled() {
                kill_quietly(child);
                return Err(OcrError::Cancelled);
            }
            if Instant::now() >= deadline {
                kill_quietly(child);
                return Err(OcrError::Timeout(timeout.as_secs()));
            }
            match child.try_wait() {
                Ok(Some(status)) => return Ok(status),
                Ok(None) => std::thread::sleep(POLL_INTERVAL),
                Err(e) => {
                    kill_quietly(child);
                    return Err(OcrError::Runtime(e.to_string()));
                }
            }
        }
    }
}

impl Default for TesseractOcr {
    fn default() -> Self {
        Self::new()
    }
}

fn kill_quietly(child: &mut Child) {
    if let Err(e) = child.kill() {
        warn!(error = %e, "no se pudo terminar el proceso OCR");
    }
    let _ = child.wait();
}

impl OcrEngine for TesseractOcr {
    fn recognize(
        &self,
        image: &GrayImage,
        config: &OcrConfig,
        cancel: &CancelToken,
    ) -> Result<String, OcrError> {
        // Aborted before the engine starts: do not spawn at all.
        if cancel.is_cancelled() {
            return Err(OcrError::Cancelled);
        }

        let input = tempfile::Builder::new()
            .prefix("recibo-ocr-")
            .suffix(".png")
            .tempfile()
            .map_err(|e| OcrError::Runtime(e.to_string()))?;
        image
            .save_with_format(input.path(), image::ImageFormat::Png)
            .map_err(|e| OcrError::Runtime(e.to_string()))?;

        debug!(
            languages = %config.languages,
            psm = config.page_seg_mode,
            oem = config.engine_mode,
            "invocando tesseract"
        );

        let mut child = Command::new(&self.binary)
            .arg(input.path())
            .arg("-")
            .args(["-l", &config.languages])
            .args(["--oem", &config.engine_mode.to_string()])
            .args(["--psm", &config.page_seg_mode.to_string()])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound | std::io::ErrorKind::PermissionDenied => {
                    OcrError::Unavailable(self.binary.display().to_string())
                }
                _ => OcrError::Runtime(e.to_string()),
            })?;

        let status =
            self.wait_with_deadline(&mut child, Duration::from_secs(config.timeout_seconds), cancel)?;

        let mut stdout = String::new();
        if let Some(mut pipe) = child.stdout.take() {
            let _ = pipe.read_to_string(&mut stdout);
        }

        if !status.success() {
            let mut stderr = String::new();
            if let Some(mut pipe) = child.stderr.take() {
                let _ = pipe.read_to_string(&mut stderr);
            }
            return Err(OcrError::Runtime(stderr.trim().to_string()));
        }

        Ok(stdout.trim().to_string())
    }

    fn is_available(&self) -> bool {
        self.version().is_some()
    }
}
