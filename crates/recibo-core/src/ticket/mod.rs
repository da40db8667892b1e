//! Ticket field extraction: raw text in, structured ticket out.

pub mod rules;

use tracing::{debug, info};

use crate::models::{ParsedTicket, ProcessingProfile};

use rules::{
    assign_iva_to_products, extract_fecha_y_hora, extract_iva_breakdown, extract_metodo_pago,
    extract_numero_factura, extract_numero_operacion, extract_products, extract_store_details,
    extract_total,
};

/// Rule-based ticket parser.
///
/// Parsing is a pure function of the input text: two invocations over the
/// same text produce identical tickets.
pub struct TicketParser;

impl TicketParser {
    pub fn new() -> Self {
        Self
    }

    /// Parse the extracted text into a structured ticket.
    ///
    /// `warnings` carries the notices accumulated during text extraction;
    /// the parser appends its own and ships them all in the result.
    pub fn parse(
        &self,
        text: &str,
        profile: ProcessingProfile,
        mut warnings: Vec<String>,
    ) -> ParsedTicket {
        info!(
            chars = text.len(),
            profile = profile.as_str(),
            "analizando texto del ticket"
        );

        let numero_factura = extract_numero_factura(text);
        let (fecha, fecha_hora) = extract_fecha_y_hora(text);
        let total = extract_total(text);
        let (tienda, ubicacion) = extract_store_details(text);
        let metodo_pago = extract_metodo_pago(text);
        let numero_operacion = extract_numero_operacion(text);

        let iva_desglose = extract_iva_breakdown(text);
        let mut productos = extract_products(text);
        assign_iva_to_products(&mut productos, &iva_desglose, &mut warnings);

        debug!(
            factura = ?numero_factura,
            fecha = ?fecha,
            total = ?total,
            productos = productos.len(),
            desglose = iva_desglose.len(),
            "extracción completada"
        );

        ParsedTicket {
            raw_text: text.to_string(),
            numero_factura,
            fecha,
            fecha_hora,
            total,
            tienda,
            ubicacion,
            metodo_pago,
            numero_operacion,
            productos,
            iva_desglose,
            processing_profile: profile,
            warnings,
        }
    }
}

impl Default for TicketParser {
    fn default() -> Self {
        Self::new()
    }
}
