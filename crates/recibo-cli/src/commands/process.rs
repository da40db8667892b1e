//! Process command - extract data from a single ticket file.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::Args;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::debug;

use recibo_core::{
    CancelToken, ParsedTicket, ProcessTicketRequest, ProcessTicketResponse, ReciboConfig,
    TesseractOcr, process_request,
};

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;

/// Arguments for the process command.
#[derive(Args)]
pub struct ProcessArgs {
    /// Input file (PDF or image)
    #[arg(required = true)]
    input: PathBuf,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,

    /// Ticket id echoed in the response (default: derived from the file name)
    #[arg(long)]
    ticket_id: Option<String>,

    /// Declared MIME type (default: resolved from the file bytes)
    #[arg(long)]
    mime_type: Option<String>,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON response
    Json,
    /// One CSV row per product
    Csv,
    /// Plain text summary
    Text,
}

pub async fn run(args: ProcessArgs) -> anyhow::Result<()> {
    let start = Instant::now();
    let config = ReciboConfig::from_env();

    if !args.input.exists() {
        anyhow::bail!("Fichero de entrada no encontrado: {}", args.input.display());
    }

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .unwrap(),
    );
    pb.set_message(format!("Procesando {}", args.input.display()));

    let request = build_request_for(&args.input, args.ticket_id.clone(), args.mime_type.clone())?;
    let response = run_parse(request, config).await?;

    pb.finish_and_clear();

    let output = format_response(&response, args.format)?;
    if let Some(output_path) = &args.output {
        fs::write(output_path, &output)?;
        println!(
            "{} Resultado escrito en {}",
            style("✓").green(),
            output_path.display()
        );
    } else {
        println!("{output}");
    }

    if !response.ticket.warnings.is_empty() {
        eprintln!("{}", style("Avisos:").yellow());
        for warning in &response.ticket.warnings {
            eprintln!("  - {warning}");
        }
    }

    debug!("Tiempo total de procesamiento: {:?}", start.elapsed());
    Ok(())
}

/// Run the parse on a blocking thread while Ctrl-C cancels it cooperatively.
pub async fn run_parse(
    request: ProcessTicketRequest,
    config: ReciboConfig,
) -> anyhow::Result<ProcessTicketResponse> {
    let cancel = CancelToken::new();
    let watcher = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        })
    };

    let result = tokio::task::spawn_blocking(move || {
        let engine = TesseractOcr::new();
        process_request(&request, &engine, &config, &cancel)
    })
    .await?;

    watcher.abort();
    Ok(result?)
}

/// Build a processing request from a file on disk.
pub fn build_request_for(
    input: &Path,
    ticket_id: Option<String>,
    mime_type: Option<String>,
) -> anyhow::Result<ProcessTicketRequest> {
    let data = fs::read(input)?;
    let file_name = input
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("ticket")
        .to_string();

    Ok(ProcessTicketRequest {
        ticket_id: ticket_id.unwrap_or_else(|| derive_ticket_id(input)),
        file_name,
        file_content_b64: BASE64.encode(data),
        mime_type,
    })
}

/// Ticket id derived from the file stem, like `cli-ticket-agosto`.
pub fn derive_ticket_id(path: &Path) -> String {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("ticket");
    format!("cli-{}", stem.replace(' ', "-").to_lowercase())
}

pub fn format_response(
    response: &ProcessTicketResponse,
    format: OutputFormat,
) -> anyhow::Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(response)?),
        OutputFormat::Csv => format_csv(&response.ticket),
        OutputFormat::Text => Ok(format_text(response)),
    }
}

fn format_csv(ticket: &ParsedTicket) -> anyhow::Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    wtr.write_record([
        "nombre",
        "cantidad",
        "unidad",
        "precio_unitario",
        "precio_total",
        "descuento",
        "iva_porcentaje",
        "iva_importe",
    ])?;

    for producto in &ticket.productos {
        wtr.write_record([
            producto.nombre.clone(),
            producto.cantidad.to_string(),
            producto.unidad.clone(),
            producto.precio_unitario.to_string(),
            producto.precio_total.to_string(),
            producto.descuento.to_string(),
            producto.iva_porcentaje.to_string(),
            producto.iva_importe.to_string(),
        ])?;
    }

    Ok(String::from_utf8(wtr.into_inner()?)?)
}

fn format_text(response: &ProcessTicketResponse) -> String {
    let ticket = &response.ticket;
    let mut output = String::new();
    let na = || "-".to_string();

    output.push_str(&format!("Ticket ID:        {}\n", response.ticket_id));
    output.push_str(&format!(
        "Número factura:   {}\n",
        ticket.numero_factura.clone().unwrap_or_else(na)
    ));
    output.push_str(&format!(
        "Fecha/Hora:       {}\n",
        ticket
            .fecha_hora
            .map(|dt| dt.format("%d/%m/%Y %H:%M").to_string())
            .or_else(|| ticket.fecha.clone())
            .unwrap_or_else(na)
    ));
    output.push_str(&format!(
        "Tienda:           {}\n",
        ticket.tienda.clone().unwrap_or_else(na)
    ));
    output.push_str(&format!(
        "Ubicación:        {}\n",
        ticket.ubicacion.clone().unwrap_or_else(na)
    ));
    output.push_str(&format!(
        "Método de pago:   {}\n",
        ticket.metodo_pago.clone().unwrap_or_else(na)
    ));
    output.push_str(&format!(
        "Nº operación:     {}\n",
        ticket.numero_operacion.clone().unwrap_or_else(na)
    ));
    output.push_str(&format!(
        "Total:            {}\n",
        ticket
            .total
            .map(|t| format!("{t} €"))
            .unwrap_or_else(na)
    ));
    output.push_str(&format!(
        "Perfil:           {}\n",
        ticket.processing_profile.as_str()
    ));

    if ticket.iva_desglose.is_empty() {
        output.push_str("\nDesglose IVA:     no detectado\n");
    } else {
        output.push_str("\nDesglose IVA:\n");
        for fila in &ticket.iva_desglose {
            output.push_str(&format!(
                "  - {}% | Base: {} | Cuota: {}\n",
                fila.porcentaje, fila.base_imponible, fila.cuota
            ));
        }
    }

    if ticket.productos.is_empty() {
        output.push_str("\nProductos:        ninguno\n");
    } else {
        output.push_str("\nProductos:\n");
        for producto in &ticket.productos {
            output.push_str(&format!(
                "  - {} | {} {} | unit {} | total {} | IVA {}% ({})\n",
                producto.nombre,
                producto.cantidad,
                producto.unidad,
                producto.precio_unitario,
                producto.precio_total,
                producto.iva_porcentaje,
                producto.iva_importe,
            ));
        }
    }

    output
}
