//! Core library for Spanish grocery receipt OCR processing.
//!
//! This crate provides:
//! - Payload decoding and source classification (PDF vs image, magic bytes)
//! - Text extraction with a deterministic fallback ladder
//!   (pdf-text, pdf-ocr, image-ocr)
//! - Rule-based field extraction for Mercadona tickets
//! - VAT breakdown allocation onto the product list

pub mod error;
pub mod models;
pub mod ocr;
pub mod pdf;
pub mod pipeline;
pub mod source;
pub mod ticket;

pub use error::{OcrError, PdfError, ReciboError, Result, SourceError};
pub use models::{
    IvaBreakdown, OcrConfig, ParsedProduct, ParsedTicket, ProcessTicketRequest,
    ProcessTicketResponse, ProcessingProfile, ReciboConfig,
};
pub use ocr::{CancelToken, OcrEngine, TesseractOcr};
pub use pdf::PdfDocument;
pub use pipeline::{TextExtraction, parse_ticket, process_request};
pub use source::{SourceKind, classify, decode_payload, detect_magic};
pub use ticket::TicketParser;
