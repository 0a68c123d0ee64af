//! Upload processing: store → convert → count → clean up.
//!
//! [`PageCountService`] runs one upload through the whole pipeline in a
//! single linear pass. It knows nothing about HTTP; [`crate::server`] only
//! parses the form and renders the result, and the CLI's one-shot mode
//! calls the same entry point.
//!
//! ## Cleanup guarantee
//!
//! All files of a request live in its [`Scratch`](crate::workspace::Scratch)
//! directory. The success path releases them explicitly and failed stores or
//! conversions discard the directory before answering. A dropped request
//! future or a panic drops the guard, which removes the directory on the
//! blocking pool.

use crate::config::{ServiceConfig, UnreadablePolicy};
use crate::error::{ConversionError, ServiceError, UploadError};
use crate::output::{PageCount, UploadResult};
use crate::pipeline::input::{DocumentKind, UploadRequest};
use crate::pipeline::office::OfficeConverter;
use crate::pipeline::{pdf, raster};
use crate::workspace::{StoredUpload, Workspace};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};

/// The PDF a conversion yielded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConvertedDocument {
    /// A new file was written next to the upload.
    NewlyProduced(PathBuf),
    /// The upload already was a PDF; no new file exists.
    SameAsInput,
}

impl ConvertedDocument {
    /// Path of the PDF to count.
    pub fn path<'a>(&'a self, upload: &'a StoredUpload) -> &'a Path {
        match self {
            ConvertedDocument::NewlyProduced(path) => path,
            ConvertedDocument::SameAsInput => &upload.path,
        }
    }
}

/// Dispatches an upload to the conversion route of its [`DocumentKind`].
#[derive(Debug, Clone)]
pub struct Converter {
    office: OfficeConverter,
    jpeg_quality: u8,
}

impl Converter {
    pub fn new(config: &ServiceConfig) -> Self {
        Self {
            office: OfficeConverter::new(config),
            jpeg_quality: config.jpeg_quality,
        }
    }

    pub fn office(&self) -> &OfficeConverter {
        &self.office
    }

    /// Produce a PDF for `upload` along the route chosen at validation.
    ///
    /// Office output lands in `out_dir`; image output lands next to the
    /// upload. The input file is never deleted here.
    pub async fn to_pdf(
        &self,
        upload: &StoredUpload,
        kind: DocumentKind,
        out_dir: &Path,
    ) -> Result<ConvertedDocument, ConversionError> {
        debug!("Converting {} as {}", upload.path.display(), kind);

        let converted = match kind {
            DocumentKind::Pdf => ConvertedDocument::SameAsInput,
            DocumentKind::Office => {
                ConvertedDocument::NewlyProduced(self.office.convert(&upload.path, out_dir).await?)
            }
            DocumentKind::Raster => ConvertedDocument::NewlyProduced(
                raster::image_to_pdf(&upload.path, self.jpeg_quality).await?,
            ),
        };

        let path = converted.path(upload);
        if !tokio::fs::try_exists(path).await.unwrap_or(false) {
            return Err(ConversionError::OutputMissing {
                path: path.to_path_buf(),
            });
        }
        Ok(converted)
    }
}

/// Runs uploads through the pipeline.
#[derive(Debug)]
pub struct PageCountService {
    workspace: Workspace,
    converter: Converter,
    unreadable_policy: UnreadablePolicy,
}

impl PageCountService {
    /// Open the working directory and set up the converters.
    pub fn new(config: &ServiceConfig) -> Result<Self, ServiceError> {
        Ok(Self {
            workspace: Workspace::open(&config.work_dir)?,
            converter: Converter::new(config),
            unreadable_policy: config.unreadable_policy,
        })
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    pub fn converter(&self) -> &Converter {
        &self.converter
    }

    /// Count the pages of one validated upload.
    ///
    /// # Errors
    /// - [`UploadError::Storage`] if the upload cannot be written
    /// - [`UploadError::Conversion`] if no PDF could be produced
    /// - [`UploadError::Unreadable`] if the PDF cannot be read and the
    ///   policy is [`UnreadablePolicy::Reject`]
    pub async fn count_upload(&self, request: UploadRequest) -> Result<UploadResult, UploadError> {
        let start = Instant::now();

        // ── Store ────────────────────────────────────────────────────────
        let scratch = self.workspace.scratch().map_err(|e| {
            warn!("Cannot create scratch directory: {}", e);
            UploadError::Storage(e)
        })?;
        let upload = match scratch.store(&request.storage_name, &request.bytes).await {
            Ok(upload) => upload,
            Err(e) => {
                warn!("Cannot store '{}': {}", request.storage_name, e);
                scratch.discard().await;
                return Err(UploadError::Storage(e));
            }
        };

        // ── Convert ──────────────────────────────────────────────────────
        let converted = match self
            .converter
            .to_pdf(&upload, request.kind, scratch.path())
            .await
        {
            Ok(converted) => converted,
            Err(e) => {
                warn!("Conversion of '{}' failed: {}", request.original_name, e);
                scratch.discard().await;
                return Err(e.into());
            }
        };

        // ── Count ────────────────────────────────────────────────────────
        let pdf_path = converted.path(&upload).to_path_buf();
        let count = pdf::count_pages(&pdf_path).await;
        let pdf_filename = pdf_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        // ── Clean up ─────────────────────────────────────────────────────
        scratch.release(&upload, &converted).await;

        if let PageCount::Unreadable { detail } = &count {
            warn!("'{}' is unreadable: {}", pdf_filename, detail);
            if self.unreadable_policy == UnreadablePolicy::Reject {
                return Err(UploadError::Unreadable);
            }
        }
        let pages = count.pages_or_zero();

        info!(
            "'{}' → {} ({} pages, printer {}) in {}ms",
            request.original_name,
            pdf_filename,
            pages,
            request.printer.as_deref().unwrap_or("-"),
            start.elapsed().as_millis()
        );

        Ok(UploadResult {
            pages,
            pdf_filename,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Bytes;

    fn service(dir: &Path, policy: UnreadablePolicy) -> PageCountService {
        let config = ServiceConfig::builder()
            .work_dir(dir)
            .office_program("definitely-not-an-office-suite-4b1e")
            .unreadable_policy(policy)
            .build()
            .unwrap();
        PageCountService::new(&config).unwrap()
    }

    fn entries(dir: &Path) -> usize {
        std::fs::read_dir(dir).unwrap().count()
    }

    #[test]
    fn converted_path_aliases_input() {
        let upload = StoredUpload {
            path: PathBuf::from("/w/req-1/a.pdf"),
        };
        assert_eq!(ConvertedDocument::SameAsInput.path(&upload), upload.path.as_path());
        let produced = ConvertedDocument::NewlyProduced(PathBuf::from("/w/req-1/a2.pdf"));
        assert_eq!(produced.path(&upload), Path::new("/w/req-1/a2.pdf"));
    }

    #[tokio::test]
    async fn pdf_route_is_identity() {
        let tmp = tempfile::tempdir().unwrap();
        let svc = service(tmp.path(), UnreadablePolicy::ReportZero);
        let upload = StoredUpload {
            path: tmp.path().join("a.pdf"),
        };
        std::fs::write(&upload.path, b"%PDF-1.4").unwrap();

        let converted = svc
            .converter()
            .to_pdf(&upload, DocumentKind::Pdf, tmp.path())
            .await
            .unwrap();
        assert_eq!(converted, ConvertedDocument::SameAsInput);
    }

    #[tokio::test]
    async fn missing_identity_input_is_output_missing() {
        let tmp = tempfile::tempdir().unwrap();
        let svc = service(tmp.path(), UnreadablePolicy::ReportZero);
        let upload = StoredUpload {
            path: tmp.path().join("gone.pdf"),
        };

        let err = svc
            .converter()
            .to_pdf(&upload, DocumentKind::Pdf, tmp.path())
            .await
            .unwrap_err();
        assert!(matches!(err, ConversionError::OutputMissing { .. }), "got: {err:?}");
    }

    #[tokio::test]
    async fn unreadable_pdf_reports_zero_by_default() {
        let tmp = tempfile::tempdir().unwrap();
        let svc = service(tmp.path(), UnreadablePolicy::ReportZero);
        let req = UploadRequest::from_file("broken.pdf", Bytes::from_static(b"nope")).unwrap();

        let result = svc.count_upload(req).await.unwrap();
        assert_eq!(result.pages, 0);
        assert_eq!(result.pdf_filename, "broken.pdf");
        assert_eq!(entries(tmp.path()), 0);
    }

    #[tokio::test]
    async fn unreadable_pdf_rejected_under_strict_policy() {
        let tmp = tempfile::tempdir().unwrap();
        let svc = service(tmp.path(), UnreadablePolicy::Reject);
        let req = UploadRequest::from_file("broken.pdf", Bytes::from_static(b"nope")).unwrap();

        let err = svc.count_upload(req).await.unwrap_err();
        assert!(matches!(err, UploadError::Unreadable));
        assert_eq!(entries(tmp.path()), 0);
    }

    #[tokio::test]
    async fn failed_conversion_leaves_nothing_behind() {
        let tmp = tempfile::tempdir().unwrap();
        let svc = service(tmp.path(), UnreadablePolicy::ReportZero);
        let req = UploadRequest::from_file("letter.docx", Bytes::from_static(b"PK")).unwrap();

        let err = svc.count_upload(req).await.unwrap_err();
        assert!(matches!(err, UploadError::Conversion(_)));
        assert_eq!(entries(tmp.path()), 0);
    }
}
