//! Error types for the recibo-core library.
//!
//! User-facing messages are Spanish: the transport surfaces `Display` output
//! verbatim in its `detail` field.

use thiserror::Error;

/// Main error type for the recibo library.
#[derive(Error, Debug)]
pub enum ReciboError {
    /// Source decoding/classification error.
    #[error(transparent)]
    Source(#[from] SourceError),

    /// PDF processing error.
    #[error(transparent)]
    Pdf(#[from] PdfError),

    /// OCR processing error.
    #[error(transparent)]
    Ocr(#[from] OcrError),

    /// Extracted text stayed below the minimum threshold after every strategy.
    #[error("No se ha detectado un ticket legible en el documento")]
    TicketNotDetected,

    /// The request was aborted before the parse finished.
    #[error("Procesamiento cancelado")]
    Cancelled,

    /// Unexpected failure (a bug, not an input problem).
    #[error("Error interno del servidor")]
    Internal(String),
}

/// Errors from payload decoding and source classification.
#[derive(Error, Debug)]
pub enum SourceError {
    /// The base64 payload could not be decoded.
    #[error("El contenido base64 no es válido: {0}")]
    InvalidEncoding(String),

    /// Neither the MIME hint nor the magic bytes identify a supported format.
    #[error("Formato de archivo no soportado (se admiten PDF, JPEG, PNG, WEBP y HEIC)")]
    UnsupportedFormat,
}

/// Errors related to PDF processing.
#[derive(Error, Debug)]
pub enum PdfError {
    /// The PDF is structurally invalid.
    #[error("No se ha podido leer el PDF: {0}")]
    Corrupt(String),

    /// Pages parsed but none yielded text. Triggers the pdf-ocr fallback.
    #[error("El PDF no contiene texto extraíble")]
    NoText,

    /// The document has no pages at all.
    #[error("El PDF no contiene páginas")]
    NoPages,
}

/// Errors related to OCR processing.
#[derive(Error, Debug)]
pub enum OcrError {
    /// The OCR binary is missing or not executable.
    #[error("El motor OCR no está disponible: {0}")]
    Unavailable(String),

    /// The OCR engine ran but reported failure.
    #[error("El motor OCR ha fallado: {0}")]
    Runtime(String),

    /// The engine did not finish within the configured timeout.
    #[error("El OCR ha superado el tiempo máximo de {0} segundos")]
    Timeout(u64),

    /// The image bytes could not be decoded or preprocessed.
    #[error("La imagen no se ha podido procesar: {0}")]
    InvalidImage(String),

    /// The request was cancelled before or during the engine run.
    #[error("Procesamiento cancelado durante el OCR")]
    Cancelled,
}

impl PdfError {
    /// Whether the pdf-text failure is one the fallback ladder recovers from
    /// by retrying the document as pdf-ocr.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, PdfError::Corrupt(_) | PdfError::NoText)
    }
}

/// Result type for the recibo library.
pub type Result<T> = std::result::Result<T, ReciboError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_messages_are_spanish() {
        let err = ReciboError::TicketNotDetected;
        assert!(err.to_string().contains("ticket"));

        let err = ReciboError::from(SourceError::UnsupportedFormat);
        assert!(err.to_string().contains("no soportado"));
    }

    #[test]
    fn recoverable_pdf_errors_feed_the_ladder() {
        assert!(PdfError::NoText.is_recoverable());
        assert!(PdfError::Corrupt("xref".into()).is_recoverable());
        assert!(!PdfError::NoPages.is_recoverable());
    }
}
