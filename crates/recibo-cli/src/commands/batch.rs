//! Batch processing command for multiple ticket files.

use std::fs;
use std::path::PathBuf;
use std::time::Instant;

use clap::Args;
use console::style;
use glob::glob;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, error, warn};

use recibo_core::ProcessTicketResponse;

use super::process::{OutputFormat, build_request_for, format_response, run_parse};

/// Arguments for the batch command.
#[derive(Args)]
pub struct BatchArgs {
    /// Input files or glob pattern
    #[arg(required = true)]
    input: String,

    /// Output directory (default: next to each input file)
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Output format for each file
    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,

    /// Also generate a summary CSV
    #[arg(long)]
    summary: bool,

    /// Continue on error
    #[arg(long)]
    continue_on_error: bool,
}

/// Result of processing a single file.
struct BatchResult {
    path: PathBuf,
    response: Option<ProcessTicketResponse>,
    error: Option<String>,
}

pub async fn run(args: BatchArgs) -> anyhow::Result<()> {
    let start = Instant::now();

    let files: Vec<PathBuf> = glob(&args.input)?
        .filter_map(|entry| entry.ok())
        .filter(|path| {
            let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
            matches!(
                ext.to_lowercase().as_str(),
                "pdf" | "png" | "jpg" | "jpeg" | "webp" | "heic" | "heif"
            )
        })
        .collect();

    if files.is_empty() {
        anyhow::bail!("Ningún fichero coincide con el patrón: {}", args.input);
    }

    println!(
        "{} {} ficheros encontrados",
        style("ℹ").blue(),
        files.len()
    );

    if let Some(ref output_dir) = args.output_dir {
        fs::create_dir_all(output_dir)?;
    }

    let pb = ProgressBar::new(files.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ficheros")
            .unwrap()
            .progress_chars("=>-"),
    );

    let mut results = Vec::with_capacity(files.len());
    for path in files {
        let outcome = process_one(&path).await;

        match outcome {
            Ok(response) => results.push(BatchResult {
                path: path.clone(),
                response: Some(response),
                error: None,
            }),
            Err(e) => {
                let message = e.to_string();
                if args.continue_on_error {
                    warn!("Fallo al procesar {}: {}", path.display(), message);
                    results.push(BatchResult {
                        path: path.clone(),
                        response: None,
                        error: Some(message),
                    });
                } else {
                    error!("Fallo al procesar {}: {}", path.display(), message);
                    anyhow::bail!("Procesamiento fallido: {message}");
                }
            }
        }

        pb.inc(1);
    }

    pb.finish_with_message("Completado");

    // Write one output per successful file
    for result in results.iter().filter(|r| r.response.is_some()) {
        let response = result.response.as_ref().unwrap();
        let content = format_response(response, args.format)?;
        let output_path = output_path_for(&result.path, args.output_dir.as_deref(), args.format);
        fs::write(&output_path, content)?;
        debug!("Resultado escrito en {}", output_path.display());
    }

    if args.summary {
        let summary_path = args
            .output_dir
            .as_ref()
            .map(|d| d.join("resumen.csv"))
            .unwrap_or_else(|| PathBuf::from("resumen.csv"));
        write_summary(&summary_path, &results)?;
        println!(
            "{} Resumen escrito en {}",
            style("✓").green(),
            summary_path.display()
        );
    }

    let successful = results.iter().filter(|r| r.response.is_some()).count();
    let failed = results.len() - successful;
    println!();
    println!(
        "{} {} ficheros procesados en {:?}",
        style("✓").green(),
        results.len(),
        start.elapsed()
    );
    println!(
        "   {} correctos, {} fallidos",
        style(successful).green(),
        style(failed).red()
    );

    if failed > 0 {
        println!();
        println!("{}", style("Ficheros fallidos:").red());
        for result in results.iter().filter(|r| r.error.is_some()) {
            println!(
                "  - {}: {}",
                result.path.display(),
                result.error.as_deref().unwrap_or("error desconocido")
            );
        }
    }

    Ok(())
}

async fn process_one(path: &PathBuf) -> anyhow::Result<ProcessTicketResponse> {
    let request = build_request_for(path, None, None)?;
    run_parse(request, recibo_core::ReciboConfig::from_env()).await
}

fn output_path_for(
    input: &PathBuf,
    output_dir: Option<&std::path::Path>,
    format: OutputFormat,
) -> PathBuf {
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("ticket");
    let extension = match format {
        OutputFormat::Json => "json",
        OutputFormat::Csv => "csv",
        OutputFormat::Text => "txt",
    };
    let file_name = format!("{stem}.{extension}");

    match output_dir {
        Some(dir) => dir.join(file_name),
        None => input.with_file_name(file_name),
    }
}

fn write_summary(path: &PathBuf, results: &[BatchResult]) -> anyhow::Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;
    wtr.write_record([
        "fichero",
        "ticket_id",
        "numero_factura",
        "fecha",
        "total",
        "productos",
        "perfil",
        "error",
    ])?;

    for result in results {
        match &result.response {
            Some(response) => {
                let ticket = &response.ticket;
                wtr.write_record([
                    result.path.display().to_string(),
                    response.ticket_id.clone(),
                    ticket.numero_factura.clone().unwrap_or_default(),
                    ticket.fecha.clone().unwrap_or_default(),
                    ticket.total.map(|t| t.to_string()).unwrap_or_default(),
                    ticket.productos.len().to_string(),
                    ticket.processing_profile.as_str().to_string(),
                    String::new(),
                ])?;
            }
            None => {
                wtr.write_record([
                    result.path.display().to_string(),
                    String::new(),
                    String::new(),
                    String::new(),
                    String::new(),
                    String::new(),
                    String::new(),
                    result.error.clone().unwrap_or_else(|| "error desconocido".to_string()),
                ])?;
            }
        }
    }

    wtr.flush()?;
    Ok(())
}
