use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("The provided file is empty")]
    EmptyInput,

    #[error("Please check syntax of the xml file: {0}")]
    MalformedMarkup(String),

    #[error("Validator returned no results for ruleset '{0}'")]
    UnknownRuleset(String),

    #[error("Invalid output type: '{0}'")]
    UnsupportedFormat(String),

    #[error("Failed to write report: {0}")]
    RenderIo(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl ReportError {
    /// Stable machine-readable code, one per failure kind
    pub fn code(&self) -> &'static str {
        match self {
            ReportError::EmptyInput => "EMPTY_INPUT",
            ReportError::MalformedMarkup(_) => "MALFORMED_MARKUP",
            ReportError::UnknownRuleset(_) => "UNKNOWN_RULESET",
            ReportError::UnsupportedFormat(_) => "UNSUPPORTED_FORMAT",
            ReportError::RenderIo(_) => "RENDER_IO_ERROR",
            ReportError::Serialization(_) => "INTERNAL_ERROR",
        }
    }
}

impl From<serde_json::Error> for ReportError {
    fn from(err: serde_json::Error) -> Self {
        ReportError::Serialization(err.to_string())
    }
}
