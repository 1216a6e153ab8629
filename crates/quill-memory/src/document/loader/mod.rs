mod docx;
mod pdf;
mod text;

use std::path::{Path, PathBuf};

pub use docx::DocxLoader;
pub use pdf::PdfLoader;
pub use text::{DEFAULT_ENCODINGS, TextLoader, decode_bytes, looks_binary};

use super::{DocumentError, DocumentLoader, DocumentMetadata, Granularity};

/// Canonicalize, enforce the size limit and read the whole file.
pub(crate) async fn read_limited(
    path: &Path,
    max_size: u64,
) -> Result<(PathBuf, Vec<u8>), DocumentError> {
    let path = tokio::fs::canonicalize(path).await?;
    let meta = tokio::fs::metadata(&path).await?;
    if meta.len() > max_size {
        return Err(DocumentError::FileTooLarge(meta.len()));
    }
    let bytes = tokio::fs::read(&path).await?;
    Ok((path, bytes))
}

pub(crate) fn metadata_for(path: &Path, content_type: &str, page: Option<u32>) -> DocumentMetadata {
    DocumentMetadata {
        source: path.display().to_string(),
        filename: path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default(),
        content_type: content_type.to_owned(),
        page,
    }
}

pub(crate) fn strip_nulls(mut text: String) -> String {
    text.retain(|c| c != '\0');
    text
}

/// Picks a loader by file extension. Anything that is neither PDF nor DOCX is
/// treated as text and goes through encoding detection.
#[derive(Debug)]
pub struct LoaderSet {
    pdf: PdfLoader,
    docx: DocxLoader,
    text: TextLoader,
}

impl LoaderSet {
    /// # Errors
    ///
    /// Returns [`DocumentError::UnknownEncoding`] if an encoding label is not recognised.
    pub fn new(
        granularity: Granularity,
        encodings: &[String],
        max_file_size: u64,
    ) -> Result<Self, DocumentError> {
        Ok(Self {
            pdf: PdfLoader {
                max_file_size,
                per_page: granularity != Granularity::File,
            },
            docx: DocxLoader { max_file_size },
            text: TextLoader::with_encodings(encodings, max_file_size)?,
        })
    }

    #[must_use]
    pub fn for_path(&self, path: &Path) -> &dyn DocumentLoader {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        if self.pdf.supported_extensions().contains(&ext.as_str()) {
            &self.pdf
        } else if self.docx.supported_extensions().contains(&ext.as_str()) {
            &self.docx
        } else {
            &self.text
        }
    }
}
