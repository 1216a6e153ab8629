use quill_llm::LlmError;
use quill_memory::document::DocumentError;
use quill_memory::{MemoryError, VectorStoreError};

/// Failure of a call to something outside the process.
#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    #[error("LLM provider: {0}")]
    Llm(#[from] LlmError),

    #[error("vector store: {0}")]
    Store(#[from] VectorStoreError),

    #[error("vector store: {0}")]
    Memory(#[from] MemoryError),

    #[error("SMTP: {0}")]
    Smtp(String),
}

#[derive(Debug, thiserror::Error)]
pub enum QuillError {
    /// Bad or missing settings. Fatal at setup.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A source file could not be read or decoded. Callers skip the file.
    #[error("decode error: {0}")]
    Decode(#[source] DocumentError),

    /// An LLM, vector store or SMTP call failed. Aborts the run.
    #[error("remote service error: {0}")]
    Remote(#[from] RemoteError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl QuillError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }

    #[must_use]
    pub fn is_remote(&self) -> bool {
        matches!(self, Self::Remote(_))
    }
}

impl From<LlmError> for QuillError {
    fn from(e: LlmError) -> Self {
        Self::Remote(RemoteError::Llm(e))
    }
}

impl From<VectorStoreError> for QuillError {
    fn from(e: VectorStoreError) -> Self {
        Self::Remote(RemoteError::Store(e))
    }
}

impl From<MemoryError> for QuillError {
    fn from(e: MemoryError) -> Self {
        match e {
            MemoryError::VectorStore(inner) => Self::Remote(RemoteError::Store(inner)),
            other => Self::Remote(RemoteError::Memory(other)),
        }
    }
}

impl From<DocumentError> for QuillError {
    fn from(e: DocumentError) -> Self {
        match e {
            DocumentError::Embedding(inner) => inner.into(),
            DocumentError::Storage(inner) => inner.into(),
            DocumentError::UnknownEncoding(label) => {
                Self::Configuration(format!("unknown text encoding: {label}"))
            }
            other => Self::Decode(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedding_failure_is_remote() {
        let err = QuillError::from(DocumentError::Embedding(LlmError::Other("down".into())));
        assert!(err.is_remote());
        assert!(err.to_string().contains("down"));
    }

    #[test]
    fn storage_failure_is_remote() {
        let err = QuillError::from(DocumentError::Storage(MemoryError::VectorStore(
            VectorStoreError::Upsert("full".into()),
        )));
        assert!(matches!(
            err,
            QuillError::Remote(RemoteError::Store(VectorStoreError::Upsert(_)))
        ));
    }

    #[test]
    fn unreadable_file_is_decode() {
        let err = QuillError::from(DocumentError::Pdf("broken xref".into()));
        assert!(matches!(err, QuillError::Decode(_)));
    }

    #[test]
    fn unknown_encoding_is_configuration() {
        let err = QuillError::from(DocumentError::UnknownEncoding("klingon".into()));
        assert!(err.is_configuration());
    }
}
