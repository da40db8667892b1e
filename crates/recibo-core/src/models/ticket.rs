//! Ticket data models: the structured purchase record and its
//! request/response envelope.

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Which extraction strategy produced the raw text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProcessingProfile {
    /// Native text extraction from the PDF content streams.
    #[serde(rename = "pdf-text")]
    PdfText,
    /// Per-page image OCR after the native text path came up empty.
    #[serde(rename = "pdf-ocr")]
    PdfOcr,
    /// Direct OCR over a single bitmap image.
    #[serde(rename = "image-ocr")]
    ImageOcr,
}

impl ProcessingProfile {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PdfText => "pdf-text",
            Self::PdfOcr => "pdf-ocr",
            Self::ImageOcr => "image-ocr",
        }
    }
}

/// A product detected on the ticket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedProduct {
    /// Product name exactly as printed on the ticket.
    pub nombre: String,

    /// Quantity bought: unit count, or normalized weight/volume (3 decimals).
    pub cantidad: Decimal,

    /// Normalized unit of measure: `unidad`, `kg` or `l`.
    pub unidad: String,

    /// Price per unit, kilo or litre.
    pub precio_unitario: Decimal,

    /// Total amount paid for the line.
    pub precio_total: Decimal,

    /// Discount applied to the line (0 when the ticket shows none).
    pub descuento: Decimal,

    /// VAT rate assigned by the allocator.
    pub iva_porcentaje: Decimal,

    /// Estimated VAT amount for the line.
    pub iva_importe: Decimal,
}

impl ParsedProduct {
    /// New product with no discount and VAT fields zeroed; the allocator
    /// fills the VAT fields afterwards.
    pub fn new(
        nombre: impl Into<String>,
        cantidad: Decimal,
        unidad: impl Into<String>,
        precio_unitario: Decimal,
        precio_total: Decimal,
    ) -> Self {
        Self {
            nombre: nombre.into(),
            cantidad,
            unidad: unidad.into(),
            precio_unitario,
            precio_total,
            descuento: Decimal::ZERO,
            iva_porcentaje: Decimal::ZERO,
            iva_importe: Decimal::ZERO,
        }
    }
}

/// One row of the VAT summary table at the foot of the ticket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IvaBreakdown {
    /// VAT rate in percent.
    pub porcentaje: Decimal,

    /// Taxable base declared for this rate.
    pub base_imponible: Decimal,

    /// VAT amount declared for this rate.
    pub cuota: Decimal,
}

/// Fully structured result of parsing one ticket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedTicket {
    /// Complete extracted text, untouched.
    pub raw_text: String,

    /// Simplified invoice number (XXXX-XXX-XXXXXX).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub numero_factura: Option<String>,

    /// Ticket date as printed (`dd/mm/yyyy`), kept for compatibility.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fecha: Option<String>,

    /// Ticket date and time at minute precision.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fecha_hora: Option<NaiveDateTime>,

    /// Total in euros.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<Decimal>,

    /// Store name or trade name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tienda: Option<String>,

    /// Full store address.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ubicacion: Option<String>,

    /// Detected payment method.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metodo_pago: Option<String>,

    /// Operation or terminal reference. Low confidence when it came from the
    /// `N.C:` fallback on noisy OCR output.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub numero_operacion: Option<String>,

    /// Products in the order they appear on the ticket.
    pub productos: Vec<ParsedProduct>,

    /// VAT breakdown rows in document order.
    pub iva_desglose: Vec<IvaBreakdown>,

    /// Extraction strategy that produced the text.
    pub processing_profile: ProcessingProfile,

    /// Non-fatal notices accumulated across the pipeline.
    pub warnings: Vec<String>,
}

/// Request to process a ticket, as received from the backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessTicketRequest {
    /// Provisional ticket id (UUID) for correlation.
    pub ticket_id: String,

    /// Original file name.
    pub file_name: String,

    /// File content encoded in base64.
    pub file_content_b64: String,

    /// Declared MIME type, if the caller knows it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

/// Response after processing a ticket: the parsed fields plus the echoed id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessTicketResponse {
    /// Id of the processed ticket.
    pub ticket_id: String,

    #[serde(flatten)]
    pub ticket: ParsedTicket,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn profile_serializes_with_dashes() {
        let json = serde_json::to_string(&ProcessingProfile::PdfOcr).unwrap();
        assert_eq!(json, "\"pdf-ocr\"");
        assert_eq!(ProcessingProfile::ImageOcr.as_str(), "image-ocr");
    }

    #[test]
    fn response_flattens_ticket_fields() {
        let ticket = ParsedTicket {
            raw_text: "MERCADONA".to_string(),
            numero_factura: Some("2831-021-575287".to_string()),
            fecha: None,
            fecha_hora: None,
            total: Some(Decimal::from_str("52.11").unwrap()),
            tienda: None,
            ubicacion: None,
            metodo_pago: None,
            numero_operacion: None,
            productos: vec![],
            iva_desglose: vec![],
            processing_profile: ProcessingProfile::PdfText,
            warnings: vec![],
        };
        let response = ProcessTicketResponse {
            ticket_id: "test-1".to_string(),
            ticket,
        };

        let value: serde_json::Value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["ticket_id"], "test-1");
        assert_eq!(value["numero_factura"], "2831-021-575287");
        assert_eq!(value["processing_profile"], "pdf-text");
        assert!(value.get("fecha").is_none());
    }
}
