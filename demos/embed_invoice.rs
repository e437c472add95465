//! Embed invoice data into a PDF.
//!
//! ```text
//! RUST_LOG=facturx=debug cargo run --example embed_invoice -- in.pdf out.pdf [attachment...]
//! ```

use std::process::ExitCode;

use chrono::Local;
use facturx::{Attachment, ComposeOptions, FacturXError, Invoice, OpenOptions, SnapshotFormat};
use tracing_subscriber::EnvFilter;

fn run(input: &str, output: &str, attachments: &[String]) -> Result<(), FacturXError> {
    let options = OpenOptions::new().flavor("factur-x").level("en16931");
    let mut invoice = Invoice::open_with(input, &options)?;
    println!("Opened {input} as {}", invoice.flavor());

    if invoice.get_text("invoice_number")?.unwrap_or_default().is_empty() {
        invoice.set("seller", "ACME GmbH")?;
        invoice.set("buyer", "Kunde AG")?;
        invoice.set("invoice_number", "RE-2024-001")?;
        invoice.set("issue_date", Local::now().date_naive())?;
        invoice.set("seller_vat_id", "DE123456789")?;
    }

    if !invoice.is_valid() {
        for field in invoice.missing_required_fields()? {
            eprintln!("missing required field: {field}");
        }
    }

    let mut compose = ComposeOptions::new();
    for path in attachments {
        compose = compose.attachment(Attachment::from_path(path)?);
    }
    let written = invoice.write_pdf(output, &compose)?;
    println!("Wrote {written} bytes to {output}");
    println!("{}", invoice.snapshot_string(SnapshotFormat::Yaml)?);
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let [input, output, attachments @ ..] = args.as_slice() else {
        eprintln!("usage: embed_invoice <in.pdf> <out.pdf> [attachment...]");
        return ExitCode::FAILURE;
    };
    match run(input, output, attachments) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
