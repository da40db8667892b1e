//! End-to-end parsing pipeline.
//!
//! One request flows through: payload decode, source classification, text
//! extraction (with the pdf-text to pdf-ocr fallback ladder), field parsing
//! and VAT allocation. Every stage is synchronous; concurrency is the
//! transport's business.

use tracing::{info, warn};

use crate::error::{OcrError, ReciboError, Result, SourceError};
use crate::models::{
    ParsedTicket, ProcessTicketRequest, ProcessTicketResponse, ProcessingProfile, ReciboConfig,
};
use crate::ocr::{CancelToken, OcrEngine, prepare_image, prepare_image_bytes};
use crate::pdf::PdfDocument;
use crate::source::{self, SourceKind};
use crate::ticket::TicketParser;

/// Warning inserted when the native PDF text path gives up and the document
/// is retried page by page through OCR.
const AVISO_FALLBACK_OCR: &str = "Texto PDF insuficiente; se aplica OCR sobre imagen";

/// Warning inserted when the binarized image OCRs to nothing and the engine
/// is retried over the plain grayscale.
const AVISO_REINTENTO_OCR: &str =
    "OCR sobre imagen preprocesada vacío; se reintenta con la imagen original";

/// Raw text plus the strategy that produced it.
#[derive(Debug, Clone)]
pub struct TextExtraction {
    pub text: String,
    pub profile: ProcessingProfile,
    pub warnings: Vec<String>,
}

/// Process a full request: decode the payload, parse, echo the ticket id.
pub fn process_request(
    request: &ProcessTicketRequest,
    engine: &dyn OcrEngine,
    config: &ReciboConfig,
    cancel: &CancelToken,
) -> Result<ProcessTicketResponse> {
    info!(ticket_id = %request.ticket_id, file = %request.file_name, "procesando ticket");

    let bytes = source::decode_payload(&request.file_content_b64)?;
    let ticket = parse_ticket(&bytes, request.mime_type.as_deref(), engine, config, cancel)?;

    Ok(ProcessTicketResponse {
        ticket_id: request.ticket_id.clone(),
        ticket,
    })
}

/// Parse raw document bytes into a structured ticket.
pub fn parse_ticket(
    bytes: &[u8],
    mime_hint: Option<&str>,
    engine: &dyn OcrEngine,
    config: &ReciboConfig,
    cancel: &CancelToken,
) -> Result<ParsedTicket> {
    if cancel.is_cancelled() {
        return Err(ReciboError::Cancelled);
    }

    let mut warnings = Vec::new();
    let kind = source::classify(bytes, mime_hint, &mut warnings);

    let extraction = match kind {
        SourceKind::Pdf => extract_from_pdf(bytes, engine, config, cancel, warnings)?,
        SourceKind::Image => extract_from_image(bytes, engine, config, cancel, warnings)?,
        SourceKind::Unknown => return Err(SourceError::UnsupportedFormat.into()),
    };

    Ok(TicketParser::new().parse(&extraction.text, extraction.profile, extraction.warnings))
}

/// The pdf-text strategy with its pdf-ocr fallback.
fn extract_from_pdf(
    bytes: &[u8],
    engine: &dyn OcrEngine,
    config: &ReciboConfig,
    cancel: &CancelToken,
    warnings: Vec<String>,
) -> Result<TextExtraction> {
    match extract_pdf_text(bytes, config, &warnings) {
        Ok(extraction) => Ok(extraction),
        Err(error) if is_pdf_recoverable(&error) => {
            warn!(%error, "texto nativo insuficiente, reintentando como pdf-ocr");
            let mut warnings = warnings;
            warnings.push(AVISO_FALLBACK_OCR.to_string());
            extract_pdf_ocr(bytes, engine, config, cancel, warnings)
        }
        Err(error) => Err(error),
    }
}

fn is_pdf_recoverable(error: &ReciboError) -> bool {
    match error {
        ReciboError::Pdf(pdf) => pdf.is_recoverable(),
        ReciboError::TicketNotDetected => true,
        _ => false,
    }
}

fn extract_pdf_text(
    bytes: &[u8],
    config: &ReciboConfig,
    warnings: &[String],
) -> Result<TextExtraction> {
    let document = PdfDocument::load(bytes)?;
    let text = document.extract_text()?;
    ensure_min_text(&text, config)?;

    Ok(TextExtraction {
        text,
        profile: ProcessingProfile::PdfText,
        warnings: warnings.to_vec(),
    })
}

fn extract_pdf_ocr(
    bytes: &[u8],
    engine: &dyn OcrEngine,
    config: &ReciboConfig,
    cancel: &CancelToken,
    mut warnings: Vec<String>,
) -> Result<TextExtraction> {
    let document = PdfDocument::load(bytes)?;

    let mut page_texts = Vec::new();
    for page in 1..=document.page_count() {
        if cancel.is_cancelled() {
            return Err(ReciboError::Cancelled);
        }

        let bitmap = document.render_page(page)?;
        let prepared = prepare_image(&bitmap, &config.ocr);
        warnings.extend(prepared.warnings);

        let text = engine
            .recognize(&prepared.binarized, &config.ocr, cancel)
            .map_err(map_ocr_error)?;
        if !text.is_empty() {
            page_texts.push(text);
        }
        // page bitmaps are dropped here, before the next page is rendered
    }

    let text = page_texts.join("\n\n");
    ensure_min_text(&text, config)?;

    Ok(TextExtraction {
        text,
        profile: ProcessingProfile::PdfOcr,
        warnings,
    })
}

/// The image-ocr strategy: preprocess, recognize, retry once on the plain
/// grayscale when the binarized pass reads nothing.
fn extract_from_image(
    bytes: &[u8],
    engine: &dyn OcrEngine,
    config: &ReciboConfig,
    cancel: &CancelToken,
    mut warnings: Vec<String>,
) -> Result<TextExtraction> {
    let prepared = prepare_image_bytes(bytes, &config.ocr).map_err(map_ocr_error)?;
    warnings.extend(prepared.warnings);

    let mut text = engine
        .recognize(&prepared.binarized, &config.ocr, cancel)
        .map_err(map_ocr_error)?;

    if text.is_empty() {
        warn!("OCR vacío sobre la imagen binarizada, reintentando en escala de grises");
        warnings.push(AVISO_REINTENTO_OCR.to_string());
        text = engine
            .recognize(&prepared.grayscale, &config.ocr, cancel)
            .map_err(map_ocr_error)?;
    }

    ensure_min_text(&text, config)?;

    Ok(TextExtraction {
        text,
        profile: ProcessingProfile::ImageOcr,
        warnings,
    })
}

/// Cancellation travels as its own terminal error, never as an OCR failure.
fn map_ocr_error(error: OcrError) -> ReciboError {
    match error {
        OcrError::Cancelled => ReciboError::Cancelled,
        other => other.into(),
    }
}

/// Reject text under the minimum non-whitespace threshold.
fn ensure_min_text(text: &str, config: &ReciboConfig) -> Result<()> {
    let visible = text.chars().filter(|c| !c.is_whitespace()).count();
    if visible < config.min_text_chars {
        return Err(ReciboError::TicketNotDetected);
    }
    Ok(())
}
