//! Report rendering
//!
//! JSON and HTML are produced in memory. PDF and DOCX are built in memory
//! and then written to a fresh scratch file, which the caller streams back
//! and releases.

mod docx;
mod html;
mod pdf;

use crate::error::ReportError;
use crate::format::ReportFormat;
use crate::report::NormalizedReport;
use crate::scratch::{ScratchDir, ScratchFile};

pub use docx::docx_bytes;
pub use html::html_document;
pub use pdf::pdf_bytes;

/// Trailer line closing every DOCX report
pub const GENERATED_BY: &str = "Generated by S&C Ltd";

/// A rendered report, ready for dispatch
#[derive(Debug)]
pub enum RenderedArtifact {
    Inline { format: ReportFormat, body: String },
    File { format: ReportFormat, file: ScratchFile },
}

impl RenderedArtifact {
    pub fn format(&self) -> ReportFormat {
        match self {
            RenderedArtifact::Inline { format, .. } | RenderedArtifact::File { format, .. } => {
                *format
            }
        }
    }

    pub fn content_type(&self) -> &'static str {
        self.format().mime_type()
    }
}

/// Render `report` in the format named by `format`
///
/// Fails with [`ReportError::UnsupportedFormat`] for any token other than
/// `json`, `html`, `pdf` or `docx`.
pub async fn render(
    report: &NormalizedReport,
    format: &str,
    context_name: &str,
    scratch: &ScratchDir,
) -> Result<RenderedArtifact, ReportError> {
    let format: ReportFormat = format.parse()?;
    render_as(report, format, context_name, scratch).await
}

pub async fn render_as(
    report: &NormalizedReport,
    format: ReportFormat,
    context_name: &str,
    scratch: &ScratchDir,
) -> Result<RenderedArtifact, ReportError> {
    match format {
        ReportFormat::Json => Ok(RenderedArtifact::Inline {
            format,
            body: serde_json::to_string(report)?,
        }),
        ReportFormat::Html => Ok(RenderedArtifact::Inline {
            format,
            body: html_document(report, context_name)?,
        }),
        ReportFormat::Pdf => {
            let bytes = pdf_bytes(report)?;
            write_scratch(scratch, format, &bytes).await
        }
        ReportFormat::Docx => {
            let bytes = docx_bytes(report)?;
            write_scratch(scratch, format, &bytes).await
        }
    }
}

async fn write_scratch(
    scratch: &ScratchDir,
    format: ReportFormat,
    bytes: &[u8],
) -> Result<RenderedArtifact, ReportError> {
    let file = scratch.allocate(format.extension())?;
    // tokio::fs::write flushes and closes before returning
    tokio::fs::write(file.path(), bytes).await?;
    Ok(RenderedArtifact::File { format, file })
}

/// Pretty-printed report text, 2-space indented
pub(crate) fn pretty(report: &NormalizedReport) -> Result<String, ReportError> {
    Ok(serde_json::to_string_pretty(report)?)
}

/// Top-level report keys with their pretty-printed values, in report order
pub(crate) fn pretty_fields(
    report: &NormalizedReport,
) -> Result<Vec<(&'static str, String)>, ReportError> {
    let issue_date = report.issue_date.format("%Y-%m-%d").to_string();
    Ok(vec![
        ("issueDate", serde_json::to_string_pretty(&issue_date)?),
        ("successful", serde_json::to_string_pretty(&report.successful)?),
        ("summary", serde_json::to_string_pretty(&report.summary)?),
        (
            "totalErrorCount",
            serde_json::to_string_pretty(&report.total_error_count)?,
        ),
        ("results", serde_json::to_string_pretty(&report.results)?),
    ])
}
