//! Error types for the pagecount service.
//!
//! Three error types reflect three audiences:
//!
//! * [`ServiceError`] (**Fatal**): the service cannot start or keep serving
//!   (bad configuration, unusable working directory, listener failure).
//!
//! * [`UploadError`] (**Per request**): one variant per fixed response shape.
//!   Its `Display` text is exactly what the client sees in `{"error": …}`,
//!   and a failed request never affects the ones that follow it.
//!
//! * [`ConversionError`] (**Diagnostic**): why turning an upload into a PDF
//!   failed. Logged for operators and folded into
//!   [`UploadError::Conversion`], whose message stays generic.

use crate::output::ErrorBody;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use std::net::SocketAddr;
use std::path::PathBuf;
use thiserror::Error;

/// Fatal errors that stop the service from starting or serving.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The shared working directory could not be created or resolved.
    #[error("Working directory '{path}' is unusable: {source}")]
    WorkDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TCP listener could not be bound.
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// The HTTP server stopped with an I/O error.
    #[error("Server error: {0}")]
    Server(#[source] std::io::Error),
}

/// A request-level failure, rendered as `{"error": "<message>"}`.
#[derive(Debug, Error)]
pub enum UploadError {
    /// No `file` part or no non-blank `printer` field.
    #[error("Missing file or printer name")]
    MissingField,

    /// The `file` part carried an empty filename.
    #[error("No file selected")]
    NoFileSelected,

    /// The filename's extension is outside the allow-set.
    #[error("Unsupported file type")]
    UnsupportedType,

    /// The request body exceeded the configured upload limit.
    #[error("File too large")]
    TooLarge,

    /// The upload could not be written to the working directory.
    #[error("Failed to store upload")]
    Storage(#[source] std::io::Error),

    /// The upload could not be turned into a PDF.
    #[error("Failed to convert to PDF")]
    Conversion(#[from] ConversionError),

    /// The converted document could not be read and the service is
    /// configured to reject such documents instead of reporting zero pages.
    #[error("Failed to read PDF")]
    Unreadable,
}

impl UploadError {
    /// HTTP status for this failure.
    pub fn status(&self) -> StatusCode {
        match self {
            UploadError::MissingField | UploadError::NoFileSelected | UploadError::UnsupportedType => {
                StatusCode::BAD_REQUEST
            }
            UploadError::TooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            UploadError::Unreadable => StatusCode::UNPROCESSABLE_ENTITY,
            UploadError::Storage(_) | UploadError::Conversion(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for UploadError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}

/// Why an upload could not be converted to PDF.
#[derive(Debug, Error)]
pub enum ConversionError {
    /// The office converter executable could not be launched.
    #[error("Failed to start office converter '{program}': {source}")]
    OfficeSpawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The office converter ran past its deadline and was killed.
    #[error("Office converter timed out after {secs}s on '{path}'")]
    OfficeTimeout { path: PathBuf, secs: u64 },

    /// The office converter exited without writing the expected PDF.
    #[error("Office converter produced no PDF at '{expected}' (exit status: {status})")]
    OfficeNoOutput { expected: PathBuf, status: String },

    /// A raster upload could not be decoded as an image.
    #[error("Image '{path}' could not be decoded: {detail}")]
    ImageDecode { path: PathBuf, detail: String },

    /// The PDF built from an image could not be written.
    #[error("Failed to write PDF '{path}': {detail}")]
    PdfWrite { path: PathBuf, detail: String },

    /// The converter reported success but the document is not on disk.
    #[error("Converted document missing at '{path}'")]
    OutputMissing { path: PathBuf },

    /// A blocking conversion task panicked or was cancelled.
    #[error("Internal error: {0}")]
    Internal(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_messages_are_fixed() {
        assert_eq!(
            UploadError::MissingField.to_string(),
            "Missing file or printer name"
        );
        assert_eq!(UploadError::NoFileSelected.to_string(), "No file selected");
        assert_eq!(UploadError::UnsupportedType.to_string(), "Unsupported file type");
    }

    #[test]
    fn conversion_detail_is_not_shown_to_client() {
        let e: UploadError = ConversionError::OfficeTimeout {
            path: PathBuf::from("/srv/uploads/req-x/report.docx"),
            secs: 120,
        }
        .into();
        assert_eq!(e.to_string(), "Failed to convert to PDF");
        assert_eq!(e.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn status_codes() {
        assert_eq!(UploadError::MissingField.status(), StatusCode::BAD_REQUEST);
        assert_eq!(UploadError::UnsupportedType.status(), StatusCode::BAD_REQUEST);
        assert_eq!(UploadError::TooLarge.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(
            UploadError::Unreadable.status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(UploadError::NoFileSelected.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn office_no_output_display() {
        let e = ConversionError::OfficeNoOutput {
            expected: PathBuf::from("/tmp/a.pdf"),
            status: "exit status: 1".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("/tmp/a.pdf"), "got: {msg}");
        assert!(msg.contains("exit status: 1"), "got: {msg}");
    }
}
