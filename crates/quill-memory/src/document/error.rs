#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("unknown text encoding: {0}")]
    UnknownEncoding(String),

    #[error("file too large: {0} bytes")]
    FileTooLarge(u64),

    #[error("could not decode {path} with any of: {tried}")]
    Decode { path: String, tried: String },

    #[error("PDF error: {0}")]
    Pdf(String),

    #[error("DOCX error: {0}")]
    Docx(String),

    #[error("embedding failed: {0}")]
    Embedding(#[from] quill_llm::LlmError),

    #[error("storage error: {0}")]
    Storage(#[from] crate::error::MemoryError),
}

impl DocumentError {
    /// Whether the file should be skipped rather than aborting the run.
    #[must_use]
    pub fn is_skippable(&self) -> bool {
        !matches!(self, Self::Embedding(_) | Self::Storage(_))
    }
}
