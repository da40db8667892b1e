//! PDF processing: native text extraction and page bitmaps for the OCR path.

mod extractor;

pub use extractor::PdfDocument;
