//! Response and result types.

use serde::{Deserialize, Serialize};

/// Body of a successful `POST /upload`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadResult {
    /// Number of pages in the converted document.
    pub pages: usize,
    /// Base name of the converted document, e.g. `report.pdf`.
    pub pdf_filename: String,
}

/// Body of every error response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

/// Outcome of reading a converted document.
///
/// Keeps "this PDF has zero pages" apart from "this PDF could not be read",
/// so the service can decide per [`crate::config::UnreadablePolicy`] what
/// the client gets to see.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageCount {
    /// The document was parsed and has this many pages.
    Counted(usize),
    /// The document could not be opened or parsed.
    Unreadable { detail: String },
}

impl PageCount {
    /// Page count with unreadable documents reported as zero.
    pub fn pages_or_zero(&self) -> usize {
        match self {
            PageCount::Counted(n) => *n,
            PageCount::Unreadable { .. } => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unreadable_reports_zero() {
        let c = PageCount::Unreadable {
            detail: "bad xref".into(),
        };
        assert_eq!(c.pages_or_zero(), 0);
        assert_eq!(PageCount::Counted(7).pages_or_zero(), 7);
    }

    #[test]
    fn result_serialises_with_wire_names() {
        let r = UploadResult {
            pages: 3,
            pdf_filename: "report.pdf".into(),
        };
        let json = serde_json::to_value(&r).expect("serialise");
        assert_eq!(json["pages"], 3);
        assert_eq!(json["pdf_filename"], "report.pdf");
    }
}
