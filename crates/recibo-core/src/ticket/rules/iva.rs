//! VAT breakdown extraction and allocation to products.

use rust_decimal::Decimal;
use std::str::FromStr;
use tracing::debug;

use crate::models::{IvaBreakdown, ParsedProduct};

use super::amounts::{parse_decimal, round2};
use super::patterns::IVA_DESGLOSE;

/// Monetary tolerance when matching a product against a bucket's remaining
/// capacity, in euros.
const TOLERANCIA: Decimal = Decimal::from_parts(5, 0, 0, false, 2); // 0.05

/// Extract the VAT summary rows in document order.
pub fn extract_iva_breakdown(text: &str) -> Vec<IvaBreakdown> {
    IVA_DESGLOSE
        .captures_iter(text)
        .filter_map(|caps| {
            let porcentaje = Decimal::from_str(&caps[1]).ok()?;
            let base_imponible = parse_decimal(&caps[2])?;
            let cuota = parse_decimal(&caps[3])?;
            Some(IvaBreakdown {
                porcentaje,
                base_imponible,
                cuota,
            })
        })
        .collect()
}

/// Remaining capacity of one breakdown row during allocation.
struct Bucket {
    porcentaje: Decimal,
    base: Decimal,
    cuota: Decimal,
}

/// Estimated taxable base and VAT amount for a gross total at a given rate.
fn estimate(total: Decimal, porcentaje: Decimal) -> (Decimal, Decimal) {
    if porcentaje.is_zero() {
        return (total, Decimal::ZERO);
    }
    let base = round2(total / (Decimal::ONE + porcentaje / Decimal::from(100)));
    let cuota = round2(total - base);
    (base, cuota)
}

/// Assign each product to a VAT bucket, consuming capacity as it proceeds.
///
/// Buckets are visited from the highest rate down; products from the most
/// expensive down. Only the VAT fields of the products are mutated and the
/// product order is untouched. A product no bucket can absorb falls back to
/// the highest rate without consuming capacity, which is reported as a
/// warning since it can over-allocate VAT.
pub fn assign_iva_to_products(
    productos: &mut [ParsedProduct],
    desglose: &[IvaBreakdown],
    warnings: &mut Vec<String>,
) {
    if productos.is_empty() || desglose.is_empty() {
        return;
    }

    let mut buckets: Vec<Bucket> = desglose
        .iter()
        .map(|row| Bucket {
            porcentaje: row.porcentaje,
            base: row.base_imponible,
            cuota: row.cuota,
        })
        .collect();
    buckets.sort_by(|a, b| b.porcentaje.cmp(&a.porcentaje));

    // Visit products by descending total; the slice order stays as printed.
    let mut order: Vec<usize> = (0..productos.len()).collect();
    order.sort_by(|&a, &b| productos[b].precio_total.cmp(&productos[a].precio_total));

    for idx in order {
        let producto = &mut productos[idx];
        let total = producto.precio_total;

        let mut assigned = false;
        for bucket in buckets.iter_mut() {
            let (base, cuota) = estimate(total, bucket.porcentaje);
            if base <= bucket.base + TOLERANCIA && cuota <= bucket.cuota + TOLERANCIA {
                producto.iva_porcentaje = bucket.porcentaje;
                producto.iva_importe = cuota;
                bucket.base = (bucket.base - base).max(Decimal::ZERO);
                bucket.cuota = (bucket.cuota - cuota).max(Decimal::ZERO);
                assigned = true;
                break;
            }
        }

        if !assigned {
            let fallback = &buckets[0];
            let (_, cuota) = estimate(total, fallback.porcentaje);
            producto.iva_porcentaje = fallback.porcentaje;
            producto.iva_importe = cuota;
            debug!(
                nombre = %producto.nombre,
                porcentaje = %fallback.porcentaje,
                "producto sin hueco en el desglose, asignado al tipo más alto"
            );
            warnings.push(format!(
                "IVA asignado sin capacidad restante en el desglose para \"{}\"",
                producto.nombre
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn producto(nombre: &str, total: &str) -> ParsedProduct {
        ParsedProduct::new(nombre, Decimal::ONE, "unidad", dec(total), dec(total))
    }

    fn fila(porcentaje: &str, base: &str, cuota: &str) -> IvaBreakdown {
        IvaBreakdown {
            porcentaje: dec(porcentaje),
            base_imponible: dec(base),
            cuota: dec(cuota),
        }
    }

    #[test]
    fn tolerance_constant_is_five_cents() {
        assert_eq!(TOLERANCIA, dec("0.05"));
    }

    #[test]
    fn breakdown_rows_extracted_in_document_order() {
        let rows = extract_iva_breakdown("10% 22,70 2,27\n21% 11,94 2,51");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].porcentaje, dec("10"));
        assert_eq!(rows[0].base_imponible, dec("22.70"));
        assert_eq!(rows[0].cuota, dec("2.27"));
        assert_eq!(rows[1].porcentaje, dec("21"));
    }

    #[test]
    fn estimate_splits_gross_into_base_and_cuota() {
        let (base, cuota) = estimate(dec("2.20"), dec("10"));
        assert_eq!(base, dec("2.00"));
        assert_eq!(cuota, dec("0.20"));

        let (base, cuota) = estimate(dec("5.00"), dec("0"));
        assert_eq!(base, dec("5.00"));
        assert_eq!(cuota, dec("0.00"));
    }

    #[test]
    fn products_spill_to_lower_rate_when_high_bucket_is_tight() {
        let mut productos = vec![producto("HUEVOS", "2.20"), producto("PIMIENTO", "0.57")];
        let desglose = vec![fila("10", "22.70", "2.27"), fila("21", "0.40", "0.09")];
        let mut warnings = Vec::new();

        assign_iva_to_products(&mut productos, &desglose, &mut warnings);

        assert_eq!(productos[0].iva_porcentaje, dec("10"));
        assert_eq!(productos[0].iva_importe, dec("0.20"));
        assert_eq!(productos[1].iva_porcentaje, dec("10"));
        assert_eq!(productos[1].iva_importe, dec("0.05"));
        assert!(warnings.is_empty());
    }

    #[test]
    fn highest_rate_bucket_is_tried_first() {
        let mut productos = vec![producto("DETERGENTE", "1.21")];
        let desglose = vec![fila("10", "22.70", "2.27"), fila("21", "11.94", "2.51")];
        let mut warnings = Vec::new();

        assign_iva_to_products(&mut productos, &desglose, &mut warnings);

        assert_eq!(productos[0].iva_porcentaje, dec("21"));
        assert_eq!(productos[0].iva_importe, dec("0.21"));
        assert!(warnings.is_empty());
    }

    #[test]
    fn bucket_capacity_is_consumed() {
        // The 21% bucket only fits one of the two identical products; the
        // second exhausts it and must fall back with a warning.
        let mut productos = vec![producto("UNO", "1.21"), producto("DOS", "1.21")];
        let desglose = vec![fila("21", "1.00", "0.21")];
        let mut warnings = Vec::new();

        assign_iva_to_products(&mut productos, &desglose, &mut warnings);

        assert_eq!(productos[0].iva_porcentaje, dec("21"));
        assert_eq!(productos[1].iva_porcentaje, dec("21"));
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("sin capacidad"));
    }

    #[test]
    fn fallback_to_highest_rate_without_consumption() {
        let mut productos = vec![producto("GRANDE", "100.00")];
        let desglose = vec![fila("21", "1.00", "0.21"), fila("10", "1.00", "0.10")];
        let mut warnings = Vec::new();

        assign_iva_to_products(&mut productos, &desglose, &mut warnings);

        assert_eq!(productos[0].iva_porcentaje, dec("21"));
        assert_eq!(productos[0].iva_importe, dec("17.36"));
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn zero_rate_bucket_takes_whole_total_as_base() {
        let mut productos = vec![producto("PAN SIN IVA", "1.50")];
        let desglose = vec![fila("0", "1.50", "0.00")];
        let mut warnings = Vec::new();

        assign_iva_to_products(&mut productos, &desglose, &mut warnings);

        assert_eq!(productos[0].iva_porcentaje, dec("0"));
        assert_eq!(productos[0].iva_importe, dec("0"));
        assert!(warnings.is_empty());
    }

    #[test]
    fn empty_inputs_are_a_no_op() {
        let mut productos = vec![producto("PAN", "0.85")];
        let mut warnings = Vec::new();
        assign_iva_to_products(&mut productos, &[], &mut warnings);
        assert_eq!(productos[0].iva_porcentaje, Decimal::ZERO);
        assert_eq!(productos[0].iva_importe, Decimal::ZERO);

        let mut vacio: Vec<ParsedProduct> = Vec::new();
        assign_iva_to_products(&mut vacio, &[fila("10", "1.00", "0.10")], &mut warnings);
        assert!(warnings.is_empty());
    }

    #[test]
    fn allocation_never_exceeds_total_and_is_deterministic() {
        let make = || {
            vec![
                producto("A", "2.20"),
                producto("B", "3.30"),
                producto("C", "0.57"),
            ]
        };
        let desglose = vec![fila("10", "5.52", "0.55"), fila("21", "0.47", "0.10")];

        let mut first = make();
        let mut second = make();
        let mut warnings = Vec::new();
        assign_iva_to_products(&mut first, &desglose, &mut warnings);
        assign_iva_to_products(&mut second, &desglose, &mut Vec::new());

        assert_eq!(first, second);
        for p in &first {
            assert!(p.iva_importe <= p.precio_total);
            assert!(p.iva_importe >= Decimal::ZERO);
        }
        // output order is untouched by the internal visiting order
        assert_eq!(first[0].nombre, "A");
        assert_eq!(first[1].nombre, "B");
        assert_eq!(first[2].nombre, "C");
    }
}
