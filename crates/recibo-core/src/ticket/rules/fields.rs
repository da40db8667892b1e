//! Header and footer field extractors.
//!
//! Each extractor is a pure function over the full extracted text and returns
//! `None` when the field is absent; a missing field is never an error.

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;

use super::amounts::{parse_decimal, round2};
use super::patterns::*;

/// Extract the simplified invoice number (XXXX-XXX-XXXXXX).
pub fn extract_numero_factura(text: &str) -> Option<String> {
    NUMERO_FACTURA
        .captures(text)
        .map(|caps| caps[1].to_string())
}

/// Extract the ticket date and, when printed, the time.
///
/// Returns the raw `dd/mm/yyyy` string together with the parsed date-time.
/// When only a date is found the second element is `None`; when neither
/// matches, both are `None`. The string always equals the date portion of the
/// returned date-time.
pub fn extract_fecha_y_hora(text: &str) -> (Option<String>, Option<NaiveDateTime>) {
    for caps in FECHA_HORA.captures_iter(text) {
        let raw = format!("{} {}", &caps[1], &caps[2]);
        if let Ok(fecha_hora) = NaiveDateTime::parse_from_str(&raw, "%d/%m/%Y %H:%M") {
            return (Some(caps[1].to_string()), Some(fecha_hora));
        }
    }

    for caps in FECHA.captures_iter(text) {
        if NaiveDate::parse_from_str(&caps[1], "%d/%m/%Y").is_ok() {
            return (Some(caps[1].to_string()), None);
        }
    }

    (None, None)
}

/// Extract the ticket total in euros.
pub fn extract_total(text: &str) -> Option<Decimal> {
    let caps = TOTAL
        .captures(text)
        .or_else(|| TOTAL_ALT.captures(text))?;
    parse_decimal(&caps[1]).map(round2)
}

/// Extract the store name and full address.
///
/// The name is the first of the opening ten non-empty lines that mentions the
/// chain; the CIF suffix (` A-...`) is cut off when present. The address is
/// assembled from the street line and the postal-code line below it.
pub fn extract_store_details(text: &str) -> (Option<String>, Option<String>) {
    let tienda = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .take(10)
        .find(|line| line.to_uppercase().contains("MERCADONA"))
        .map(|line| match line.find(" A-") {
            Some(pos) => line[..pos].trim().to_string(),
            None => line.to_string(),
        });

    let ubicacion = DIRECCION.captures(text).map(|caps| {
        format!("C/ {}, {}", caps[1].trim(), caps[2].trim())
    });

    (tienda, ubicacion)
}

/// Extract and normalize the payment method.
///
/// Any `TARJ*` spelling collapses to `Tarjeta bancaria`; card brands stay
/// uppercase; the rest are title-cased.
pub fn extract_metodo_pago(text: &str) -> Option<String> {
    let matched = METODO_PAGO.captures(text)?[1].to_uppercase();

    if matched.starts_with("TARJ") {
        return Some("Tarjeta bancaria".to_string());
    }
    if matches!(matched.as_str(), "MASTERCARD" | "VISA" | "AMEX") {
        return Some(matched);
    }

    let mut chars = matched.chars();
    let titled = match chars.next() {
        Some(first) => first.to_string() + &chars.as_str().to_lowercase(),
        None => return None,
    };
    Some(titled)
}

/// Extract the operation reference: `OP:` first, `N.C:` as a fallback.
///
/// The fallback is opportunistic and may latch onto unrelated digits on noisy
/// OCR output; downstream consumers treat it as low confidence.
pub fn extract_numero_operacion(text: &str) -> Option<String> {
    NUMERO_OPERACION
        .captures(text)
        .or_else(|| NUMERO_OPERACION_ALT.captures(text))
        .map(|caps| caps[1].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::str::FromStr;

    const TICKET: &str = "\
MERCADONA, S.A. A-46103834
C/ PORTUGAL 37
28943 FUENLABRADA
TELÉFONO: 916 064 447
FACTURA SIMPLIFICADA: 2831-021-575287
10/08/2023 19:46  OP: 367328
TOTAL (€) 52,11
TARJ. BANCARIA";

    #[test]
    fn numero_factura_extracted() {
        assert_eq!(
            extract_numero_factura(TICKET),
            Some("2831-021-575287".to_string())
        );
        assert_eq!(extract_numero_factura("sin factura"), None);
    }

    #[test]
    fn fecha_y_hora_both_present() {
        let (fecha, fecha_hora) = extract_fecha_y_hora(TICKET);
        assert_eq!(fecha.as_deref(), Some("10/08/2023"));
        let fecha_hora = fecha_hora.unwrap();
        assert_eq!(
            fecha_hora,
            NaiveDate::from_ymd_opt(2023, 8, 10)
                .unwrap()
                .and_hms_opt(19, 46, 0)
                .unwrap()
        );
        // compatibility field matches the date portion
        assert_eq!(fecha.unwrap(), fecha_hora.format("%d/%m/%Y").to_string());
    }

    #[test]
    fn fecha_without_hora_falls_back() {
        let (fecha, fecha_hora) = extract_fecha_y_hora("emitido el 10/08/2023 en tienda");
        assert_eq!(fecha.as_deref(), Some("10/08/2023"));
        assert!(fecha_hora.is_none());
    }

    #[test]
    fn fecha_invalid_calendar_dates_skipped() {
        let (fecha, fecha_hora) = extract_fecha_y_hora("fecha 99/99/2023 y 10/08/2023");
        assert_eq!(fecha.as_deref(), Some("10/08/2023"));
        assert!(fecha_hora.is_none());
    }

    #[test]
    fn fecha_absent() {
        assert_eq!(extract_fecha_y_hora("sin fechas"), (None, None));
    }

    #[test]
    fn total_primary_and_fallback() {
        assert_eq!(
            extract_total(TICKET),
            Some(Decimal::from_str("52.11").unwrap())
        );
        assert_eq!(
            extract_total("TOTAL 13,37"),
            Some(Decimal::from_str("13.37").unwrap())
        );
        assert_eq!(extract_total("no hay importe"), None);
    }

    #[test]
    fn store_name_cut_at_cif() {
        let (tienda, _) = extract_store_details(TICKET);
        assert_eq!(tienda.as_deref(), Some("MERCADONA, S.A."));
    }

    #[test]
    fn store_name_only_in_opening_lines() {
        let mut text = String::new();
        for i in 0..12 {
            text.push_str(&format!("linea {i}\n"));
        }
        text.push_str("MERCADONA, S.A.\n");
        let (tienda, _) = extract_store_details(&text);
        assert_eq!(tienda, None);
    }

    #[test]
    fn address_assembled_from_two_lines() {
        let (_, ubicacion) = extract_store_details(TICKET);
        assert_eq!(
            ubicacion.as_deref(),
            Some("C/ PORTUGAL 37, 28943 FUENLABRADA")
        );
    }

    #[test]
    fn payment_method_normalization() {
        assert_eq!(
            extract_metodo_pago("TARJ. BANCARIA").as_deref(),
            Some("Tarjeta bancaria")
        );
        assert_eq!(
            extract_metodo_pago("pago con TARJETA BANCARIA").as_deref(),
            Some("Tarjeta bancaria")
        );
        assert_eq!(extract_metodo_pago("VISA ****1234").as_deref(), Some("VISA"));
        assert_eq!(extract_metodo_pago("EFECTIVO").as_deref(), Some("Efectivo"));
        assert_eq!(extract_metodo_pago("pagado por Bizum").as_deref(), Some("Bizum"));
        assert_eq!(extract_metodo_pago("cheque regalo"), None);
    }

    #[test]
    fn operacion_primary_and_fallback() {
        assert_eq!(
            extract_numero_operacion(TICKET).as_deref(),
            Some("367328")
        );
        assert_eq!(
            extract_numero_operacion("N.C: 112233").as_deref(),
            Some("112233")
        );
        assert_eq!(extract_numero_operacion("sin referencia"), None);
    }
}
