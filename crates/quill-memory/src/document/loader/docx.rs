use std::path::Path;
use std::pin::Pin;

use super::super::{DEFAULT_MAX_FILE_SIZE, Document, DocumentError, DocumentLoader};
use super::{metadata_for, read_limited, strip_nulls};

const CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

#[derive(Debug, Clone)]
pub struct DocxLoader {
    pub max_file_size: u64,
}

impl Default for DocxLoader {
    fn default() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
        }
    }
}

/// Body paragraphs joined with `\n`. Tables and other block types are ignored.
fn paragraph_text(bytes: &[u8]) -> Result<String, DocumentError> {
    let docx = docx_rs::read_docx(bytes).map_err(|e| DocumentError::Docx(e.to_string()))?;

    let paragraphs: Vec<String> = docx
        .document
        .children
        .into_iter()
        .filter_map(|child| match child {
            docx_rs::DocumentChild::Paragraph(p) => Some(p),
            _ => None,
        })
        .map(|p| {
            let mut text = String::new();
            for child in p.children {
                if let docx_rs::ParagraphChild::Run(run) = child {
                    for piece in run.children {
                        if let docx_rs::RunChild::Text(t) = piece {
                            text.push_str(&t.text);
                        }
                    }
                }
            }
            text
        })
        .collect();

    Ok(paragraphs.join("\n"))
}

impl DocumentLoader for DocxLoader {
    fn load(
        &self,
        path: &Path,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<Vec<Document>, DocumentError>> + Send + '_>>
    {
        let path = path.to_path_buf();
        Box::pin(async move {
            let (path, bytes) = read_limited(&path, self.max_file_size).await?;
            let content = tokio::task::spawn_blocking(move || paragraph_text(&bytes))
                .await
                .map_err(|e| DocumentError::Io(std::io::Error::other(e)))??;

            Ok(vec![Document {
                content: strip_nulls(content),
                metadata: metadata_for(&path, CONTENT_TYPE, None),
            }])
        })
    }

    fn supported_extensions(&self) -> &[&str] {
        &["docx"]
    }
}

#[cfg(test)]
mod tests {
    use docx_rs::{Docx, Paragraph, Run};

    use super::*;

    fn sample_docx(paragraphs: &[&str]) -> Vec<u8> {
        let mut docx = Docx::new();
        for p in paragraphs {
            docx = docx.add_paragraph(Paragraph::new().add_run(Run::new().add_text(*p)));
        }
        let mut buf = std::io::Cursor::new(Vec::new());
        docx.build().pack(&mut buf).unwrap();
        buf.into_inner()
    }

    #[tokio::test]
    async fn paragraphs_joined_with_newline() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("staff.docx");
        std::fs::write(&file, sample_docx(&["Jane Doe", "Lead engineer"])).unwrap();

        let docs = DocxLoader::default().load(&file).await.unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].content, "Jane Doe\nLead engineer");
        assert_eq!(docs[0].metadata.filename, "staff.docx");
    }

    #[tokio::test]
    async fn non_zip_is_docx_error() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("fake.docx");
        std::fs::write(&file, b"plain text pretending").unwrap();

        let err = DocxLoader::default().load(&file).await.unwrap_err();
        assert!(matches!(err, DocumentError::Docx(_)));
    }
}
