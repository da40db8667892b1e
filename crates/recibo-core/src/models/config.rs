//! Configuration structures for the parsing pipeline.

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Main configuration for the recibo pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReciboConfig {
    /// OCR engine configuration.
    pub ocr: OcrConfig,

    /// Minimum non-whitespace characters for extracted text to count as a
    /// detected ticket, whichever strategy produced it.
    pub min_text_chars: usize,
}

impl Default for ReciboConfig {
    fn default() -> Self {
        Self {
            ocr: OcrConfig::default(),
            min_text_chars: 30,
        }
    }
}

/// OCR engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    /// Tesseract language stack.
    pub languages: String,

    /// Hard limit for one engine invocation, in seconds.
    pub timeout_seconds: u64,

    /// Maximum image dimension (longer side); larger inputs are downscaled.
    pub max_image_side: u32,

    /// Tesseract page segmentation mode. 6 = single uniform block of text.
    pub page_seg_mode: u8,

    /// Tesseract OCR engine mode. 3 = default (legacy + LSTM).
    pub engine_mode: u8,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            languages: "spa+eng".to_string(),
            timeout_seconds: 30,
            max_image_side: 2000,
            page_seg_mode: 6,
            engine_mode: 3,
        }
    }
}

impl ReciboConfig {
    /// Build a configuration from the process environment.
    ///
    /// Recognized variables: `OCR_LANGUAGES`, `OCR_TIMEOUT_SECONDS`,
    /// `OCR_MAX_IMAGE_SIDE`. Malformed values fall back to the default.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(languages) = std::env::var("OCR_LANGUAGES") {
            if !languages.trim().is_empty() {
                config.ocr.languages = languages;
            }
        }
        if let Ok(raw) = std::env::var("OCR_TIMEOUT_SECONDS") {
            match raw.parse() {
                Ok(secs) => config.ocr.timeout_seconds = secs,
                Err(_) => warn!("OCR_TIMEOUT_SECONDS no numérico: {raw}"),
            }
        }
        if let Ok(raw) = std::env::var("OCR_MAX_IMAGE_SIDE") {
            match raw.parse() {
                Ok(side) => config.ocr.max_image_side = side,
                Err(_) => warn!("OCR_MAX_IMAGE_SIDE no numérico: {raw}"),
            }
        }

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_values() {
        let config = ReciboConfig::default();
        assert_eq!(config.ocr.languages, "spa+eng");
        assert_eq!(config.ocr.timeout_seconds, 30);
        assert_eq!(config.ocr.max_image_side, 2000);
        assert_eq!(config.ocr.page_seg_mode, 6);
        assert_eq!(config.ocr.engine_mode, 3);
        assert_eq!(config.min_text_chars, 30);
    }

    #[test]
    fn config_roundtrips_through_json() {
        let config = ReciboConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let back: ReciboConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.ocr.languages, config.ocr.languages);
        assert_eq!(back.min_text_chars, config.min_text_chars);
    }
}
