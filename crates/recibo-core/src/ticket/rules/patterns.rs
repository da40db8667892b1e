//! Regex catalogue for Mercadona ticket extraction.
//!
//! Every pattern lives here as a named constant, compiled once per process
//! and reused across parses.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    // Simplified invoice number: 2831-021-575287
    pub static ref NUMERO_FACTURA: Regex = Regex::new(
        r"(?i)FACTURA\s+SIMPLIFICADA:\s*(\d{4}-\d{3}-\d{6})"
    ).unwrap();

    // Date with time, minute precision: 10/08/2023 19:46
    pub static ref FECHA_HORA: Regex = Regex::new(
        r"(\d{2}/\d{2}/\d{4})\s+(\d{2}:\d{2})"
    ).unwrap();

    // Date alone: 10/08/2023
    pub static ref FECHA: Regex = Regex::new(
        r"(\d{2}/\d{2}/\d{4})"
    ).unwrap();

    // Labeled total. The euro sign survives some extractors as a replacement
    // char, so the parenthesised currency accepts the mojibake forms too.
    pub static ref TOTAL: Regex = Regex::new(
        r"(?i)TOTAL\s*\((?:€|�|\?)\)\s*([0-9]+,[0-9]{2})"
    ).unwrap();

    pub static ref TOTAL_ALT: Regex = Regex::new(
        r"(?i)TOTAL\s+([0-9]+,[0-9]{2})"
    ).unwrap();

    // Street line followed by postal code + city on the next line.
    pub static ref DIRECCION: Regex = Regex::new(
        r"C/\s+(.+?)\n(\d{5}\s+\w+)"
    ).unwrap();

    // Payment methods as printed on the ticket foot.
    pub static ref METODO_PAGO: Regex = Regex::new(
        r"(?i)(TARJ(?:ETA|\.)\s+BANCARIA|EFECTIVO|BIZUM|MASTERCARD|VISA|AMEX)"
    ).unwrap();

    // Operation reference: OP: 367328
    pub static ref NUMERO_OPERACION: Regex = Regex::new(
        r"(?i)OP:\s*(\d+)"
    ).unwrap();

    // Opportunistic fallback for the operation reference on noisy OCR.
    pub static ref NUMERO_OPERACION_ALT: Regex = Regex::new(
        r"(?i)N\.C:\s*(\d+)"
    ).unwrap();

    // VAT summary row: rate%  base  cuota
    pub static ref IVA_DESGLOSE: Regex = Regex::new(
        r"(\d+)%\s+([0-9]+,[0-9]{2})\s+([0-9]+,[0-9]{2})"
    ).unwrap();

    // Unit-priced product line: qty, description, price [, total]
    pub static ref PRODUCTO_UNITARIO: Regex = Regex::new(
        r"^(\d+)\s+(.+?)\s+(\d+,\d{2})(?:\s+(\d+,\d{2}))?$"
    ).unwrap();

    // First line of a weighed entry: qty + description, no amount
    pub static ref PRODUCTO_PESADO_CABECERA: Regex = Regex::new(
        r"^(\d+)\s+(.+)$"
    ).unwrap();

    // Second line of a weighed entry: weight, unit, unit price ... total
    pub static ref PRODUCTO_PESADO_DETALLE: Regex = Regex::new(
        r"(?i)^(\d+,\d{2,3})\s*(kg|g|l|ml)\s+(\d+,\d{2}).*?(\d+,\d{2})$"
    ).unwrap();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numero_factura_matches_case_insensitive() {
        let caps = NUMERO_FACTURA
            .captures("factura simplificada: 2831-021-575287")
            .unwrap();
        assert_eq!(&caps[1], "2831-021-575287");
    }

    #[test]
    fn total_accepts_mojibake_euro() {
        for line in ["TOTAL (€) 52,11", "TOTAL (�) 52,11", "TOTAL (?) 52,11"] {
            let caps = TOTAL.captures(line).unwrap();
            assert_eq!(&caps[1], "52,11");
        }
    }

    #[test]
    fn producto_unitario_with_and_without_second_price() {
        let caps = PRODUCTO_UNITARIO
            .captures("2 LECHE ENTERA 0,93 1,86")
            .unwrap();
        assert_eq!(&caps[1], "2");
        assert_eq!(&caps[2], "LECHE ENTERA");
        assert_eq!(&caps[3], "0,93");
        assert_eq!(caps.get(4).unwrap().as_str(), "1,86");

        let caps = PRODUCTO_UNITARIO
            .captures("1 12 HUEVOS GRANDES-L 2,20")
            .unwrap();
        assert_eq!(&caps[2], "12 HUEVOS GRANDES-L");
        assert_eq!(&caps[3], "2,20");
        assert!(caps.get(4).is_none());
    }

    #[test]
    fn producto_pesado_detalle_captures_all_fields() {
        let caps = PRODUCTO_PESADO_DETALLE
            .captures("0,228 kg 2,49 €/kg 0,57")
            .unwrap();
        assert_eq!(&caps[1], "0,228");
        assert_eq!(&caps[2], "kg");
        assert_eq!(&caps[3], "2,49");
        assert_eq!(&caps[4], "0,57");
    }

    #[test]
    fn producto_pesado_detalle_never_matches_unit_lines() {
        assert!(PRODUCTO_PESADO_DETALLE.captures("1 PIMIENTO VERDE").is_none());
        assert!(PRODUCTO_UNITARIO.captures("0,228 kg 2,49 €/kg 0,57").is_none());
    }

    #[test]
    fn iva_desglose_matches_rows_in_order() {
        let text = "10% 22,70 2,27\n21% 11,94 2,51";
        let rates: Vec<&str> = IVA_DESGLOSE
            .captures_iter(text)
            .map(|c| c.get(1).unwrap().as_str())
            .collect();
        assert_eq!(rates, vec!["10", "21"]);
    }
}
