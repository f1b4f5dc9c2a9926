use thiserror::Error;

#[derive(Error, Debug)]
pub enum PdfInkError {
    #[error("Failed to parse PDF: {0}")]
    MalformedInput(String),

    #[error("Invalid annotation #{index}: {reason}")]
    InvalidRecord { index: usize, reason: String },

    #[error("No PDF file supplied")]
    EmptyInput,

    #[error("Page {page} does not exist (document has {page_count} pages)")]
    InvalidPage { page: u32, page_count: u32 },

    #[error("PDF operation failed: {0}")]
    OperationError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl PdfInkError {
    pub(crate) fn invalid_record(index: usize, reason: impl Into<String>) -> Self {
        PdfInkError::InvalidRecord {
            index,
            reason: reason.into(),
        }
    }
}

impl From<serde_json::Error> for PdfInkError {
    fn from(err: serde_json::Error) -> Self {
        PdfInkError::SerializationError(err.to_string())
    }
}
