//! Output format handling (JSON, HTML, PDF, DOCX)

use serde::{Deserialize, Serialize};

use crate::error::ReportError;

/// Output format for rendered reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    #[default]
    Json,
    Html,
    Pdf,
    Docx,
}

impl ReportFormat {
    pub const ALL: [ReportFormat; 4] = [
        ReportFormat::Json,
        ReportFormat::Html,
        ReportFormat::Pdf,
        ReportFormat::Docx,
    ];

    /// Get the MIME type for this format
    pub fn mime_type(&self) -> &'static str {
        match self {
            ReportFormat::Json => "application/json",
            ReportFormat::Html => "text/html",
            ReportFormat::Pdf => "application/pdf",
            ReportFormat::Docx => {
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            }
        }
    }

    /// Get the file extension for this format
    pub fn extension(&self) -> &'static str {
        match self {
            ReportFormat::Json => "json",
            ReportFormat::Html => "html",
            ReportFormat::Pdf => "pdf",
            ReportFormat::Docx => "docx",
        }
    }

    /// Formats materialized on scratch storage and sent as a file transfer
    pub fn is_file_backed(&self) -> bool {
        matches!(self, ReportFormat::Pdf | ReportFormat::Docx)
    }

    /// `report.<ext>`, used for Content-Disposition
    pub fn download_name(&self) -> String {
        format!("report.{}", self.extension())
    }
}

impl std::fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

impl std::str::FromStr for ReportFormat {
    type Err = ReportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "json" => Ok(ReportFormat::Json),
            "html" => Ok(ReportFormat::Html),
            "pdf" => Ok(ReportFormat::Pdf),
            "docx" => Ok(ReportFormat::Docx),
            other => Err(ReportError::UnsupportedFormat(other.to_string())),
        }
    }
}
