use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use ryoshu_core::Span;
use ryoshu_extract::{extract_structured, AmountExtraction, AmountExtractor, StructuredFields};
use ryoshu_ocr::{default_backends, DocumentKind, DocumentPipeline, DocumentRequest, Rotation, RyoshuConfig};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ryoshu")]
#[command(about = "Extract totals, tax and line items from scanned Japanese receipts and invoices")]
#[command(version)]
struct Cli {
    /// TOML settings file; defaults apply to anything it leaves out
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the full image pipeline on one document
    Scan {
        image: PathBuf,

        /// Upscale, equalize and gamma-correct before binarizing
        #[arg(long)]
        enhance: bool,

        /// Rotations to try, e.g. 0,180 (default: all four)
        #[arg(long, value_delimiter = ',')]
        rotations: Vec<Rotation>,

        #[arg(long, default_value = "other")]
        kind: DocumentKind,
    },
    /// Amount extraction over plain text, one line per row
    Amounts { file: PathBuf },
    /// Amount and field extraction over previously recognized spans (JSON)
    Fields { file: PathBuf },
}

#[derive(Debug, Serialize)]
struct SpanReport {
    amounts: AmountExtraction,
    fields: StructuredFields,
    needs_review: bool,
}

fn load_config(path: Option<&Path>) -> Result<RyoshuConfig> {
    match path {
        Some(path) => RyoshuConfig::from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display())),
        None => Ok(RyoshuConfig::default()),
    }
}

fn amounts_from_text(config: &RyoshuConfig, path: &Path) -> Result<AmountExtraction> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(AmountExtractor::new(config.amounts.clone()).extract_from_text(&text))
}

fn report_from_spans(config: &RyoshuConfig, path: &Path) -> Result<SpanReport> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let spans: Vec<Span> = serde_json::from_str(&json)
        .with_context(|| format!("{} is not a JSON array of spans", path.display()))?;
    let extractor = AmountExtractor::new(config.amounts.clone());
    let amounts = extractor.extract(&spans);
    let needs_review = amounts.needs_review(config.amounts.review_threshold);
    Ok(SpanReport { amounts, fields: extract_structured(&spans), needs_review })
}

fn print_json(value: &impl Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Command::Scan { image, enhance, rotations, kind } => {
            let backends = default_backends(&config.tesseract);
            info!(backends = backends.len(), "Recognition backends registered");
            let pipeline = DocumentPipeline::new(&config, backends);
            let request = DocumentRequest { enhance, rotations, kind };
            let result = pipeline
                .process_file(&image, request)
                .await
                .with_context(|| format!("Failed to process {}", image.display()))?;
            print_json(&result)
        }
        Command::Amounts { file } => print_json(&amounts_from_text(&config, &file)?),
        Command::Fields { file } => print_json(&report_from_spans(&config, &file)?),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ryoshu_core::{Quad, Yen};

    #[test]
    fn parses_scan_flags() {
        let cli = Cli::try_parse_from([
            "ryoshu", "scan", "invoice.jpg", "--enhance", "--rotations", "0,180", "--kind", "invoice",
        ])
        .unwrap();
        match cli.command {
            Command::Scan { image, enhance, rotations, kind } => {
                assert_eq!(image, PathBuf::from("invoice.jpg"));
                assert!(enhance);
                assert_eq!(rotations, vec![Rotation::Deg0, Rotation::Deg180]);
                assert_eq!(kind, DocumentKind::Invoice);
            }
            _ => panic!("expected scan"),
        }
    }

    #[test]
    fn scan_defaults() {
        let cli = Cli::try_parse_from(["ryoshu", "scan", "r.png"]).unwrap();
        match cli.command {
            Command::Scan { enhance, rotations, kind, .. } => {
                assert!(!enhance);
                assert!(rotations.is_empty());
                assert_eq!(kind, DocumentKind::Other);
            }
            _ => panic!("expected scan"),
        }
        assert!(cli.config.is_none());
    }

    #[test]
    fn rejects_odd_rotation() {
        assert!(Cli::try_parse_from(["ryoshu", "scan", "r.png", "--rotations", "45"]).is_err());
    }

    #[test]
    fn amounts_command_reads_text() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("receipt.txt");
        std::fs::write(&path, "小計\n99,800\n税額\n9,980\n").unwrap();
        let result = amounts_from_text(&RyoshuConfig::default(), &path).unwrap();
        assert_eq!(result.total, Some(Yen::new(109_780)));
    }

    #[test]
    fn fields_command_reads_spans() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("spans.json");
        let spans = vec![
            Span::new("カフェ ミモザ", 0.9, Quad::from_rect(10, 10, 200, 20)),
            Span::new("合計 980", 0.9, Quad::from_rect(10, 60, 200, 20)),
        ];
        std::fs::write(&path, serde_json::to_string(&spans).unwrap()).unwrap();

        let report = report_from_spans(&RyoshuConfig::default(), &path).unwrap();
        assert_eq!(report.fields.vendor.as_deref(), Some("カフェ ミモザ"));
        assert_eq!(report.amounts.total, Some(Yen::new(980)));
    }

    #[test]
    fn bad_spans_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("spans.json");
        std::fs::write(&path, "{\"not\": \"spans\"}").unwrap();
        let err = report_from_spans(&RyoshuConfig::default(), &path).unwrap_err();
        assert!(err.to_string().contains("not a JSON array of spans"));
    }

    #[test]
    fn missing_config_is_an_error() {
        assert!(load_config(Some(Path::new("/nonexistent/ryoshu.toml"))).is_err());
        assert_eq!(load_config(None).unwrap(), RyoshuConfig::default());
    }
}
