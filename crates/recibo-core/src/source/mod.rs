//! Payload decoding and source classification.
//!
//! The content kind is resolved once per request by combining the declared
//! MIME type with magic-byte detection. Magic bytes don't lie, but the MIME
//! hint is the caller's contract: when both are present and disagree, the
//! MIME decision wins and the mismatch is surfaced as a warning.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use tracing::debug;

use crate::error::SourceError;

/// Resolved kind of the input bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Pdf,
    Image,
    Unknown,
}

/// ISO-BMFF brands that identify HEIC/HEIF stills.
const HEIF_BRANDS: [&[u8; 4]; 4] = [b"heic", b"heif", b"mif1", b"msf1"];

/// Decode the base64 payload into raw bytes.
pub fn decode_payload(content_b64: &str) -> Result<Vec<u8>, SourceError> {
    BASE64
        .decode(content_b64.trim())
        .map_err(|e| SourceError::InvalidEncoding(e.to_string()))
}

/// Classify raw bytes by magic numbers alone.
pub fn detect_magic(bytes: &[u8]) -> SourceKind {
    if bytes.len() < 4 {
        return SourceKind::Unknown;
    }

    match bytes {
        // PDF: starts with %PDF
        [0x25, 0x50, 0x44, 0x46, ..] => SourceKind::Pdf,
        // JPEG: starts with FF D8
        [0xFF, 0xD8, ..] => SourceKind::Image,
        // PNG: full 8-byte signature
        [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, ..] => SourceKind::Image,
        // WEBP: RIFF container with WEBP fourcc
        [0x52, 0x49, 0x46, 0x46, ..] if bytes.len() >= 12 && &bytes[8..12] == b"WEBP" => {
            SourceKind::Image
        }
        // HEIC/HEIF: "ftyp" box at offset 4 with a still-image brand
        _ if bytes.len() >= 12
            && &bytes[4..8] == b"ftyp"
            && HEIF_BRANDS.iter().any(|brand| &bytes[8..12] == *brand) =>
        {
            SourceKind::Image
        }
        _ => SourceKind::Unknown,
    }
}

/// Map a declared MIME type to a source kind, if it is one we recognize.
fn kind_from_mime(mime: &str) -> Option<SourceKind> {
    let mime = mime.trim().to_ascii_lowercase();
    if mime == "application/pdf" {
        Some(SourceKind::Pdf)
    } else if mime.starts_with("image/") {
        Some(SourceKind::Image)
    } else {
        None
    }
}

/// Resolve the content kind from bytes plus an optional MIME hint.
///
/// An explicit `application/pdf` or `image/*` hint is authoritative; a magic
/// byte disagreement only adds a warning. Without a usable hint the magic
/// bytes decide. Classification is pure and idempotent.
pub fn classify(bytes: &[u8], mime_hint: Option<&str>, warnings: &mut Vec<String>) -> SourceKind {
    let magic = detect_magic(bytes);

    let Some(declared) = mime_hint.and_then(kind_from_mime) else {
        return magic;
    };

    if magic != SourceKind::Unknown && magic != declared {
        warnings.push(format!(
            "El tipo MIME declarado ({}) no coincide con el contenido detectado; se respeta el MIME",
            mime_hint.unwrap_or_default().trim()
        ));
    }
    debug!(?declared, ?magic, "clasificación de origen");
    declared
}
