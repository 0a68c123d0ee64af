//! Input validation: turn a submitted form into an [`UploadRequest`].
//!
//! The client-supplied filename is used for two things only: its extension
//! decides the conversion route, and its sanitised form becomes the display
//! name reported back as `pdf_filename`. Storage identity comes from the
//! per-request scratch directory (see [`crate::workspace`]), never from the
//! client.

use crate::error::UploadError;
use axum::body::Bytes;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;

/// Extensions accepted for upload (compared case-insensitively).
pub const ALLOWED_EXTENSIONS: &[&str] = &["pdf", "docx", "doc", "jpg", "jpeg", "png"];

/// Stem used when sanitising leaves nothing of the client's filename.
const FALLBACK_STEM: &str = "upload";

/// Conversion route for an accepted upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    /// Already a PDF; counted as-is.
    Pdf,
    /// Word-processor document converted by the headless office suite.
    Office,
    /// Raster image wrapped into a one-page PDF.
    Raster,
}

impl DocumentKind {
    /// Classify a lower-case extension. `None` outside the allow-set.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "pdf" => Some(DocumentKind::Pdf),
            "docx" | "doc" => Some(DocumentKind::Office),
            "jpg" | "jpeg" | "png" => Some(DocumentKind::Raster),
            _ => None,
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentKind::Pdf => f.write_str("pdf"),
            DocumentKind::Office => f.write_str("office"),
            DocumentKind::Raster => f.write_str("image"),
        }
    }
}

/// The `file` part of the form. Only parts that carry a filename count.
#[derive(Debug, Clone)]
pub struct FilePart {
    pub file_name: String,
    pub bytes: Bytes,
}

/// Raw form fields as collected from the request body.
#[derive(Debug, Clone, Default)]
pub struct UploadForm {
    pub file: Option<FilePart>,
    pub printer: Option<String>,
}

/// A validated upload, ready to be stored.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    /// Filename as sent by the client.
    pub original_name: String,
    /// Sanitised filename the upload is stored under.
    pub storage_name: String,
    /// Conversion route, decided from the declared extension.
    pub kind: DocumentKind,
    pub bytes: Bytes,
    /// Destination printer. Only gates validation.
    pub printer: Option<String>,
}

impl UploadRequest {
    /// Validate a filename and content, without the printer requirement.
    ///
    /// Used directly by the one-shot CLI mode.
    pub fn from_file(file_name: impl Into<String>, bytes: Bytes) -> Result<Self, UploadError> {
        let original_name = file_name.into();
        if original_name.is_empty() {
            return Err(UploadError::NoFileSelected);
        }

        let extension = declared_extension(&original_name).ok_or(UploadError::UnsupportedType)?;
        let kind = DocumentKind::from_extension(&extension).ok_or(UploadError::UnsupportedType)?;
        let storage_name = storage_name(&original_name, &extension);

        Ok(Self {
            original_name,
            storage_name,
            kind,
            bytes,
            printer: None,
        })
    }
}

/// Validate a submitted form.
///
/// Checks run in a fixed order: both fields present, then a non-empty
/// filename, then an allowed extension.
pub fn validate(form: UploadForm) -> Result<UploadRequest, UploadError> {
    let (file, printer) = match (form.file, form.printer) {
        (Some(file), Some(printer)) if !printer.trim().is_empty() => (file, printer),
        _ => return Err(UploadError::MissingField),
    };

    let mut request = UploadRequest::from_file(file.file_name, file.bytes)?;
    request.printer = Some(printer);
    Ok(request)
}

/// Lower-case extension after the last `.`, if it is in the allow-set.
pub fn declared_extension(file_name: &str) -> Option<String> {
    let (_, ext) = file_name.rsplit_once('.')?;
    let ext = ext.to_ascii_lowercase();
    ALLOWED_EXTENSIONS.contains(&ext.as_str()).then_some(ext)
}

static RE_UNSAFE_CHARS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^A-Za-z0-9_.\-]").unwrap());

const WINDOWS_DEVICE_NAMES: &[&str] = &[
    "CON", "AUX", "COM1", "COM2", "COM3", "COM4", "LPT1", "LPT2", "LPT3", "PRN", "NUL",
];

/// Reduce a client filename to a safe, flat, ASCII name.
///
/// Path separators become word breaks, whitespace runs become `_`, anything
/// outside `[A-Za-z0-9_.-]` is dropped and leading/trailing `.`/`_` are
/// trimmed, so the result can never climb out of the directory it is joined
/// to. May return an empty string.
pub fn sanitize_filename(name: &str) -> String {
    let flat = name.replace(['/', '\\'], " ");
    let joined = flat.split_whitespace().collect::<Vec<_>>().join("_");
    let cleaned = RE_UNSAFE_CHARS.replace_all(&joined, "");
    let trimmed = cleaned.trim_matches(|c| c == '.' || c == '_').to_string();

    let head = trimmed.split('.').next().unwrap_or("").to_ascii_uppercase();
    if !trimmed.is_empty() && WINDOWS_DEVICE_NAMES.contains(&head.as_str()) {
        format!("_{trimmed}")
    } else {
        trimmed
    }
}

/// Sanitised name that still ends in the declared extension.
fn storage_name(original: &str, extension: &str) -> String {
    let sanitized = sanitize_filename(original);
    if let Some((stem, ext)) = sanitized.rsplit_once('.') {
        if !stem.is_empty() && ext.eq_ignore_ascii_case(extension) {
            return sanitized;
        }
    }

    let raw_stem = original
        .rsplit_once('.')
        .map(|(stem, _)| stem)
        .unwrap_or(original);
    let stem = sanitize_filename(raw_stem);
    let stem = if stem.is_empty() {
        FALLBACK_STEM
    } else {
        stem.as_str()
    };
    format!("{stem}.{extension}")
}
