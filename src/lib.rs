//! # pagecount
//!
//! Count the pages of an uploaded document before it is sent to a printer.
//!
//! Print front ends need a page count up front (quotas, pricing, tray
//! selection) but users upload Word documents and phone photos as often as
//! PDFs. This crate runs a small HTTP service that normalises each upload to
//! PDF and reports how many pages it has.
//!
//! ## Pipeline Overview
//!
//! ```text
//! POST /upload (file + printer)
//!  │
//!  ├─ 1. Validate  required fields, allowed extension, sanitised name
//!  ├─ 2. Store     per-request scratch directory in the working dir
//!  ├─ 3. Convert   .doc/.docx via headless soffice, .jpg/.png via image → PDF,
//!  │               .pdf as-is
//!  ├─ 4. Count     parse the PDF (spawn_blocking)
//!  ├─ 5. Clean up  delete upload + produced PDF, remove scratch dir
//!  └─ 6. Respond   {"pages": N, "pdf_filename": "…"}
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pagecount::{serve, ServiceConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServiceConfig::builder()
//!         .work_dir("/var/tmp/pagecount")
//!         .build()?;
//!     serve(config, "0.0.0.0:5000".parse()?).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pagecount` binary (clap + anyhow + tracing-subscriber) |
//!
//! Disable `cli` when embedding the router in another server:
//! ```toml
//! pagecount = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod server;
pub mod workspace;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ServiceConfig, ServiceConfigBuilder, UnreadablePolicy};
pub use convert::{ConvertedDocument, Converter, PageCountService};
pub use error::{ConversionError, ServiceError, UploadError};
pub use output::{ErrorBody, PageCount, UploadResult};
pub use pipeline::input::{UploadRequest, ALLOWED_EXTENSIONS};
pub use server::{router, serve};
