//! Line-oriented walker over the product table.
//!
//! The walker scans the text between the table header (`Descripción ...
//! Importe`) and the first footer line (`TOTAL`/`IVA`/`TARJ`), recognizing
//! two grammars: a unit-priced single line and a weighed two-line entry.
//! The single-line grammar always takes precedence; the weighed lookahead is
//! only attempted when it did not match.

use rust_decimal::Decimal;
use tracing::trace;

use crate::models::ParsedProduct;

use super::amounts::{parse_decimal, round2, round3};
use super::patterns::{PRODUCTO_PESADO_CABECERA, PRODUCTO_PESADO_DETALLE, PRODUCTO_UNITARIO};

/// Replace the mojibake and diacritic forms that OCR and broken PDF
/// extractors produce in the section headers.
fn normalize_mojibake(line: &str) -> String {
    line.chars()
        .filter_map(|c| match c {
            '?' | '�' => None,
            'á' => Some('a'),
            'ó' => Some('o'),
            'ñ' => Some('n'),
            'í' => Some('i'),
            other => Some(other),
        })
        .collect()
}

/// Whether this line opens the product table.
fn is_table_header(line: &str) -> bool {
    let normalized = normalize_mojibake(&line.to_lowercase());
    normalized.contains("descrip") && normalized.contains("importe")
}

/// Whether this line closes the product table.
fn is_table_end(line: &str) -> bool {
    let upper = line.to_uppercase();
    upper.starts_with("TOTAL") || upper.starts_with("IVA") || upper.starts_with("TARJ")
}

/// Parse a unit-priced single-line product.
fn parse_unit_line(line: &str) -> Option<ParsedProduct> {
    let caps = PRODUCTO_UNITARIO.captures(line)?;

    let cantidad: Decimal = caps[1].parse::<u32>().ok()?.into();
    let nombre = caps[2].trim().to_string();
    let precio1 = parse_decimal(&caps[3])?;

    let (precio_unitario, precio_total) = match caps.get(4) {
        Some(segundo) => (round2(precio1), round2(parse_decimal(segundo.as_str())?)),
        None => {
            let total = round2(cantidad * precio1);
            let unitario = if cantidad.is_zero() {
                round2(precio1)
            } else {
                round2(total / cantidad)
            };
            (unitario, total)
        }
    };

    Some(ParsedProduct::new(
        nombre,
        round3(cantidad),
        "unidad",
        precio_unitario,
        precio_total,
    ))
}

/// Parse a weighed two-line product from a header line and its detail line.
fn parse_weighed_lines(header: &str, detail: &str) -> Option<ParsedProduct> {
    let cabecera = PRODUCTO_PESADO_CABECERA.captures(header)?;
    let detalle = PRODUCTO_PESADO_DETALLE.captures(detail)?;

    // The leading integer is the declared count of weighed items; the
    // quantity that matters is the normalized weight below.
    let nombre = cabecera[2].trim().to_string();

    let peso = parse_decimal(&detalle[1])?;
    let precio_unitario = parse_decimal(&detalle[3])?;
    let precio_total = parse_decimal(&detalle[4])?;

    let (peso, unidad) = match detalle[2].to_lowercase().as_str() {
        "g" => (peso / Decimal::from(1000), "kg"),
        "ml" => (peso / Decimal::from(1000), "l"),
        "kg" => (peso, "kg"),
        "l" => (peso, "l"),
        _ => return None,
    };

    Some(ParsedProduct::new(
        nombre,
        round3(peso),
        unidad,
        round2(precio_unitario),
        round2(precio_total),
    ))
}

/// Walk the ticket lines and collect products in textual order.
pub fn extract_products(text: &str) -> Vec<ParsedProduct> {
    let lines: Vec<&str> = text.lines().map(str::trim).collect();
    let mut products = Vec::new();

    let mut index = 0;
    let mut in_products = false;

    while index < lines.len() {
        let line = lines[index];

        if !in_products {
            if is_table_header(line) {
                in_products = true;
            }
            index += 1;
            continue;
        }

        if line.is_empty() {
            index += 1;
            continue;
        }

        if is_table_end(line) {
            break;
        }

        if let Some(product) = parse_unit_line(line) {
            products.push(product);
            index += 1;
            continue;
        }

        if index + 1 < lines.len() && !is_table_end(lines[index + 1]) {
            if let Some(product) = parse_weighed_lines(line, lines[index + 1]) {
                products.push(product);
                index += 2;
                continue;
            }
        }

        trace!(line, "línea ignorada en la tabla de productos");
        index += 1;
    }

    products
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    const TABLE: &str = "\
MERCADONA, S.A.
Descripción              Importe
1 12 HUEVOS GRANDES-L     2,20
2 LECHE ENTERA 0,93 1,86
1 PIMIENTO VERDE
0,228 kg 2,49 €/kg        0,57
TOTAL (€) 4,63
10% 4,21 0,42";

    #[test]
    fn walks_header_to_terminator() {
        let products = extract_products(TABLE);
        assert_eq!(products.len(), 3);
        assert_eq!(products[0].nombre, "12 HUEVOS GRANDES-L");
        assert_eq!(products[1].nombre, "LECHE ENTERA");
        assert_eq!(products[2].nombre, "PIMIENTO VERDE");
    }

    #[test]
    fn nothing_before_header_is_parsed() {
        let text = "1 FUERA DE TABLA 9,99\nDescripción Importe\n1 DENTRO 1,00\nTOTAL 1,00";
        let products = extract_products(text);
        assert_eq!(products.len(), 1);
        assert_eq!(products[0].nombre, "DENTRO");
    }

    #[test]
    fn header_tolerates_mojibake() {
        for header in ["Descripci?n Importe", "Descripci�n Importe", "DESCRIPCIÓN IMPORTE"] {
            let text = format!("{header}\n1 AGUA 0,60\nTOTAL 0,60");
            assert_eq!(extract_products(&text).len(), 1, "header: {header}");
        }
    }

    #[test]
    fn unit_line_without_second_price_multiplies() {
        let text = "Descripción Importe\n3 YOGUR NATURAL 0,45\nTOTAL 1,35";
        let products = extract_products(text);
        assert_eq!(products[0].cantidad, dec("3"));
        assert_eq!(products[0].unidad, "unidad");
        assert_eq!(products[0].precio_total, dec("1.35"));
        assert_eq!(products[0].precio_unitario, dec("0.45"));
    }

    #[test]
    fn unit_line_with_second_price_uses_it() {
        let text = "Descripción Importe\n2 LECHE ENTERA 0,93 1,86\nTOTAL 1,86";
        let products = extract_products(text);
        assert_eq!(products[0].precio_unitario, dec("0.93"));
        assert_eq!(products[0].precio_total, dec("1.86"));
    }

    #[test]
    fn weighed_entry_consumes_two_lines() {
        let products = extract_products(TABLE);
        let pimiento = &products[2];
        assert_eq!(pimiento.cantidad, dec("0.228"));
        assert_eq!(pimiento.unidad, "kg");
        assert_eq!(pimiento.precio_unitario, dec("2.49"));
        assert_eq!(pimiento.precio_total, dec("0.57"));
    }

    #[test]
    fn grams_and_millilitres_normalize() {
        let text = "\
Descripción Importe
1 QUESO CURADO
350,05 g 15,95 €/kg 5,58
1 CALDO DE POLLO
500,00 ml 2,50 €/l 1,25
TOTAL 6,83";
        let products = extract_products(text);
        assert_eq!(products.len(), 2);
        assert_eq!(products[0].cantidad, dec("0.350"));
        assert_eq!(products[0].unidad, "kg");
        assert_eq!(products[1].cantidad, dec("0.500"));
        assert_eq!(products[1].unidad, "l");
    }

    #[test]
    fn unit_grammar_beats_weighed_lookahead() {
        // The first line matches the unit grammar, so the second line must
        // not be swallowed as a weighed detail.
        let text = "\
Descripción Importe
1 ACEITE OLIVA 4,35
0,750 l 5,80 €/l 4,35
TOTAL 4,35";
        let products = extract_products(text);
        assert_eq!(products.len(), 1);
        assert_eq!(products[0].nombre, "ACEITE OLIVA");
        assert_eq!(products[0].unidad, "unidad");
    }

    #[test]
    fn unmatched_lines_are_skipped() {
        let text = "\
Descripción Importe
xxxx ruido de ocr xxxx
1 PAN 0,85
TOTAL 0,85";
        let products = extract_products(text);
        assert_eq!(products.len(), 1);
        assert_eq!(products[0].nombre, "PAN");
    }

    #[test]
    fn iva_and_tarj_lines_terminate_the_walk() {
        for terminator in ["IVA DESGLOSE", "TARJ. BANCARIA", "TOTAL (€) 1,00"] {
            let text = format!("Descripción Importe\n1 PAN 0,85\n{terminator}\n1 FANTASMA 9,99");
            let products = extract_products(&text);
            assert_eq!(products.len(), 1, "terminator: {terminator}");
        }
    }

    #[test]
    fn empty_table_yields_no_products() {
        assert!(extract_products("sin tabla").is_empty());
        assert!(extract_products("Descripción Importe\nTOTAL 0,00").is_empty());
    }
}
