//! Rule-based extractors over the raw ticket text.

pub mod amounts;
pub mod fields;
pub mod iva;
pub mod patterns;
pub mod products;

pub use amounts::{parse_decimal, round2, round3};
pub use fields::{
    extract_fecha_y_hora, extract_metodo_pago, extract_numero_factura, extract_numero_operacion,
    extract_store_details, extract_total,
};
pub use iva::{assign_iva_to_products, extract_iva_breakdown};
pub use products::extract_products;
