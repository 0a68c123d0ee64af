//! CLI binary for pagecount.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ServiceConfig` and either serves HTTP or counts one local file.

use anyhow::{Context, Result};
use clap::Parser;
use pagecount::{serve, PageCountService, ServiceConfig, UnreadablePolicy, UploadRequest};
use std::io;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

const AFTER_HELP: &str = r#"EXAMPLES:
  # Serve on 0.0.0.0:5000, uploads under ./uploads
  pagecount

  # Custom port and working directory
  pagecount --port 8080 --work-dir /var/tmp/pagecount

  # Count one local file and print the JSON result
  pagecount --count report.docx

  # Query a running server
  curl -F printer=HP-1 -F file=@report.docx http://localhost:5000/upload

SUPPORTED UPLOADS:
  .pdf            counted as-is
  .doc, .docx     converted with a headless office suite (soffice)
  .jpg, .jpeg, .png
                  wrapped into a one-page PDF

ENVIRONMENT VARIABLES:
  RUST_LOG        Override the log filter (e.g. pagecount=debug)
"#;

/// Convert uploads to PDF and report their page count over HTTP.
#[derive(Parser, Debug)]
#[command(
    name = "pagecount",
    version,
    about = "Convert uploads to PDF and report their page count over HTTP",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Address to listen on.
    #[arg(long, env = "PAGECOUNT_HOST", default_value = "0.0.0.0")]
    host: IpAddr,

    /// Port to listen on.
    #[arg(short, long, env = "PAGECOUNT_PORT", default_value_t = 5000)]
    port: u16,

    /// Working directory for transient uploads (created if absent).
    #[arg(long, env = "PAGECOUNT_WORK_DIR", default_value = "uploads")]
    work_dir: PathBuf,

    /// Headless office converter executable.
    #[arg(long, env = "PAGECOUNT_SOFFICE", default_value = "soffice")]
    soffice: String,

    /// Seconds before an office conversion is killed.
    #[arg(long, env = "PAGECOUNT_CONVERSION_TIMEOUT", default_value_t = 120)]
    conversion_timeout: u64,

    /// Office conversions allowed to run at once.
    #[arg(long, env = "PAGECOUNT_MAX_CONVERSIONS", default_value_t = 2,
          value_parser = clap::value_parser!(u64).range(1..))]
    max_conversions: u64,

    /// Share the default office user profile instead of one per conversion.
    #[arg(long, env = "PAGECOUNT_SHARED_PROFILE")]
    shared_profile: bool,

    /// Maximum upload size in MiB.
    #[arg(long, env = "PAGECOUNT_MAX_UPLOAD_MB", default_value_t = 50)]
    max_upload_mb: usize,

    /// JPEG quality (1 to 100) for image uploads.
    #[arg(long, env = "PAGECOUNT_JPEG_QUALITY", default_value_t = 90,
          value_parser = clap::value_parser!(u8).range(1..=100))]
    jpeg_quality: u8,

    /// Answer 422 for unreadable PDFs instead of reporting 0 pages.
    #[arg(long, env = "PAGECOUNT_STRICT")]
    strict: bool,

    /// Count this local file, print the JSON result and exit.
    #[arg(long, value_name = "FILE")]
    count: Option<PathBuf>,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PAGECOUNT_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "PAGECOUNT_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let config = build_config(&cli)?;

    // ── One-shot mode ────────────────────────────────────────────────────
    if let Some(ref path) = cli.count {
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read {:?}", path))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let request = UploadRequest::from_file(name, bytes.into())
            .with_context(|| format!("Cannot count {:?}", path))?;
        let service = PageCountService::new(&config).context("Failed to set up working directory")?;
        let result = service
            .count_upload(request)
            .await
            .with_context(|| format!("Cannot count {:?}", path))?;

        println!(
            "{}",
            serde_json::to_string_pretty(&result).context("Failed to serialise result")?
        );
        return Ok(());
    }

    // ── Serve ────────────────────────────────────────────────────────────
    let addr = SocketAddr::new(cli.host, cli.port);
    serve(config, addr).await.context("Server failed")?;
    Ok(())
}

/// Map CLI args to `ServiceConfig`.
fn build_config(cli: &Cli) -> Result<ServiceConfig> {
    let policy = if cli.strict {
        UnreadablePolicy::Reject
    } else {
        UnreadablePolicy::ReportZero
    };

    ServiceConfig::builder()
        .work_dir(&cli.work_dir)
        .office_program(&cli.soffice)
        .office_timeout_secs(cli.conversion_timeout)
        .max_concurrent_conversions(cli.max_conversions as usize)
        .isolate_office_profile(!cli.shared_profile)
        .max_upload_bytes(cli.max_upload_mb.saturating_mul(1024 * 1024))
        .jpeg_quality(cli.jpeg_quality)
        .unreadable_policy(policy)
        .build()
        .context("Invalid configuration")
}
