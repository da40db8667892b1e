//! Doctor command - check the OCR engine installation.

use clap::Args;
use console::style;

use recibo_core::{ReciboConfig, TesseractOcr};

/// Arguments for the doctor command.
#[derive(Args)]
pub struct DoctorArgs {
    /// Path to the tesseract binary (default: found on PATH)
    #[arg(long)]
    binary: Option<String>,
}

pub async fn run(args: DoctorArgs) -> anyhow::Result<()> {
    let engine = match &args.binary {
        Some(path) => TesseractOcr::with_binary(path),
        None => TesseractOcr::new(),
    };
    let config = ReciboConfig::from_env();

    match engine.version() {
        Some(version) => {
            println!("{} Motor OCR disponible: {}", style("✓").green(), version);
            println!("  Idiomas:        {}", config.ocr.languages);
            println!("  Timeout:        {} s", config.ocr.timeout_seconds);
            println!("  Lado máximo:    {} px", config.ocr.max_image_side);
            Ok(())
        }
        None => {
            println!(
                "{} El motor OCR no está disponible. Instala tesseract con los datos de idioma spa+eng.",
                style("✗").red()
            );
            anyhow::bail!("tesseract no encontrado")
        }
    }
}
