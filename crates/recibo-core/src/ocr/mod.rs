//! OCR pipeline: image preprocessing and the external engine seam.

pub mod preprocessing;
mod tesseract;

pub use preprocessing::{PreparedImage, prepare_image, prepare_image_bytes};
pub use tesseract::TesseractOcr;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use image::GrayImage;

use crate::error::OcrError;
use crate::models::OcrConfig;

/// Cooperative cancellation signal shared between the caller and a parse.
///
/// Cloning is cheap; all clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// External OCR engine.
///
/// The engine is a process-global collaborator: implementations must be
/// re-entrant, and tests substitute a deterministic stub.
pub trait OcrEngine: Send + Sync {
    /// Recognize the text in a prepared image. The returned text is trimmed.
    fn recognize(
        &self,
        image: &GrayImage,
        config: &OcrConfig,
        cancel: &CancelToken,
    ) -> Result<String, OcrError>;

    /// Whether the engine can run on this host.
    fn is_available(&self) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_token_propagates_to_clones() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
        token.cancel();
        assert!(token.is_cancelled());
    }
}
