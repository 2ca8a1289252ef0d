// MRZ scanner command line front end
// Reads a document photo, runs the scan pipeline and prints the OCR text
// and the parsed fields as JSON.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use mrzscan::config::{BackendConfig, CloudVisionConfig, HttpConfig, HttpResponseFormat, TesseractConfig};
use mrzscan::processing::BackgroundMode;
use mrzscan::{MrzScanner, ParsedData, ScanError, ScannerConfig};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum BackendKind {
    Tesseract,
    Http,
    CloudVision,
}

#[derive(Debug, Parser)]
#[command(name = "mrz_scan", about = "Extract MRZ identity fields from a document photo")]
struct Args {
    /// JPEG or PNG photo of the document
    image: PathBuf,

    /// JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the configured recognition backend
    #[arg(short, long, value_enum)]
    backend: Option<BackendKind>,

    /// Endpoint for the http or cloud-vision backend
    #[arg(long)]
    url: Option<String>,

    /// API key for remote backends (falls back to MRZSCAN_API_KEY)
    #[arg(long)]
    api_key: Option<String>,

    /// Parse the http backend response as OCR.space JSON
    #[arg(long)]
    ocr_space: bool,

    /// Tesseract language
    #[arg(long)]
    language: Option<String>,

    /// Skip background removal
    #[arg(long)]
    keep_background: bool,

    /// Write the normalized image here
    #[arg(long)]
    save_normalized: Option<PathBuf>,

    /// Pretty-print the parsed JSON
    #[arg(long)]
    pretty: bool,
}

fn build_config(args: &Args) -> Result<ScannerConfig, ScanError> {
    let mut config = match &args.config {
        Some(path) => ScannerConfig::load(path)?,
        None => ScannerConfig::default(),
    };

    if let Some(kind) = args.backend {
        let same_kind = matches!(
            (kind, &config.backend),
            (BackendKind::Tesseract, BackendConfig::Tesseract(_))
                | (BackendKind::Http, BackendConfig::Http(_))
                | (BackendKind::CloudVision, BackendConfig::CloudVision(_))
        );
        if !same_kind {
            config.backend = match kind {
                BackendKind::Tesseract => BackendConfig::Tesseract(TesseractConfig::default()),
                BackendKind::Http => BackendConfig::Http(HttpConfig::default()),
                BackendKind::CloudVision => BackendConfig::CloudVision(CloudVisionConfig::default()),
            };
        }
    }

    match &mut config.backend {
        BackendConfig::Tesseract(tess) => {
            if let Some(language) = &args.language {
                tess.language = language.clone();
            }
        }
        BackendConfig::Http(http) => {
            if let Some(url) = &args.url {
                http.url = url.clone();
            }
            if args.api_key.is_some() {
                http.api_key = args.api_key.clone();
            }
            if args.ocr_space {
                http.response_format = HttpResponseFormat::OcrSpace;
            }
        }
        BackendConfig::CloudVision(vision) => {
            if let Some(url) = &args.url {
                vision.endpoint = url.clone();
            }
            if args.api_key.is_some() {
                vision.api_key = args.api_key.clone();
            }
        }
    }

    if args.keep_background {
        config.normalize.background = BackgroundMode::Keep;
    }

    config.validate()?;
    Ok(config)
}

fn run(args: &Args) -> Result<(), ScanError> {
    let config = build_config(args)?;
    let scanner = MrzScanner::from_config(&config)?;
    log::info!("Scanning {:?} with the {} backend", args.image, scanner.backend_name());

    let report = scanner.scan_path(&args.image)?;

    if let Some(path) = &args.save_normalized {
        report.normalized.save(path)?;
        log::info!("Normalized image written to {:?}", path);
    }

    println!("Extracted MRZ Text:");
    println!("{}", report.text);
    println!("Parsed Data:");
    println!("{}", render_parsed(&report.parsed, args.pretty));
    Ok(())
}

fn render_parsed(parsed: &ParsedData, pretty: bool) -> String {
    let json = parsed.to_json();
    if pretty {
        format!("{:#}", json)
    } else {
        json.to_string()
    }
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error scanning document: {}", err);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_parsed_compact_and_pretty() {
        let parsed = ParsedData::error("Valid MRZ block not found");
        assert_eq!(render_parsed(&parsed, false), r#"{"error":"Valid MRZ block not found"}"#);
        assert_eq!(
            render_parsed(&parsed, true),
            "{\n  \"error\": \"Valid MRZ block not found\"\n}"
        );
    }
}
