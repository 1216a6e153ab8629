use std::path::Path;
use std::pin::Pin;

use super::super::{DEFAULT_MAX_FILE_SIZE, Document, DocumentError, DocumentLoader};
use super::{metadata_for, read_limited, strip_nulls};

const CONTENT_TYPE: &str = "application/pdf";

#[derive(Debug, Clone)]
pub struct PdfLoader {
    pub max_file_size: u64,
    /// Emit one document per page instead of one per file.
    pub per_page: bool,
}

impl Default for PdfLoader {
    fn default() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            per_page: true,
        }
    }
}

fn extract_pages(bytes: &[u8]) -> Result<Vec<(u32, String)>, DocumentError> {
    let doc = lopdf::Document::load_mem(bytes).map_err(|e| DocumentError::Pdf(e.to_string()))?;
    doc.get_pages()
        .keys()
        .map(|&number| {
            doc.extract_text(&[number])
                .map(|text| (number, text))
                .map_err(|e| DocumentError::Pdf(format!("page {number}: {e}")))
        })
        .collect()
}

fn extract_whole(bytes: &[u8]) -> Result<String, DocumentError> {
    pdf_extract::extract_text_from_mem(bytes).map_err(|e| DocumentError::Pdf(e.to_string()))
}

impl DocumentLoader for PdfLoader {
    fn load(
        &self,
        path: &Path,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<Vec<Document>, DocumentError>> + Send + '_>>
    {
        let path = path.to_path_buf();
        let per_page = self.per_page;
        Box::pin(async move {
            let (path, bytes) = read_limited(&path, self.max_file_size).await?;

            let pages = tokio::task::spawn_blocking(move || {
                if per_page {
                    extract_pages(&bytes)
                } else {
                    extract_whole(&bytes).map(|text| vec![(0, text)])
                }
            })
            .await
            .map_err(|e| DocumentError::Io(std::io::Error::other(e)))??;

            Ok(pages
                .into_iter()
                .map(|(number, text)| Document {
                    content: strip_nulls(text),
                    metadata: metadata_for(&path, CONTENT_TYPE, per_page.then_some(number)),
                })
                .collect())
        })
    }

    fn supported_extensions(&self) -> &[&str] {
        &["pdf"]
    }
}

#[cfg(test)]
mod tests {
    use lopdf::content::{Content, Operation};
    use lopdf::{Object, Stream, dictionary};

    use super::*;

    /// Minimal PDF with one Helvetica text line per page.
    fn sample_pdf(pages: &[&str]) -> Vec<u8> {
        let mut doc = lopdf::Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });
        let mut kids = Vec::new();
        for text in pages {
            let content = Content {
                operations: vec![
                    Operation::new("BT", vec![]),
                    Operation::new("Tf", vec!["F1".into(), 12.into()]),
                    Operation::new("Td", vec![50.into(), 800.into()]),
                    Operation::new("Tj", vec![Object::string_literal(*text)]),
                    Operation::new("ET", vec![]),
                ],
            };
            let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            });
            kids.push(page_id.into());
        }
        let count = i64::try_from(kids.len()).unwrap();
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
                "Resources" => resources_id,
                "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        let mut out = Vec::new();
        doc.save_to(&mut out).unwrap();
        out
    }

    #[tokio::test]
    async fn per_page_extraction_numbers_pages_from_one() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("brochure.pdf");
        std::fs::write(&file, sample_pdf(&["Corporate mission", "Staff expertise"])).unwrap();

        let docs = PdfLoader::default().load(&file).await.unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].metadata.page, Some(1));
        assert_eq!(docs[1].metadata.page, Some(2));
        assert!(docs[0].content.contains("Corporate mission"));
        assert!(docs[1].content.contains("Staff expertise"));
        assert_eq!(docs[0].metadata.content_type, "application/pdf");
    }

    #[tokio::test]
    async fn whole_file_extraction_is_one_document() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("brochure.pdf");
        std::fs::write(&file, sample_pdf(&["Alpha", "Beta"])).unwrap();

        let loader = PdfLoader {
            per_page: false,
            ..PdfLoader::default()
        };
        let docs = loader.load(&file).await.unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].metadata.page, None);
        assert!(docs[0].content.contains("Alpha"));
        assert!(docs[0].content.contains("Beta"));
    }

    #[tokio::test]
    async fn corrupt_pdf_is_pdf_error() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("broken.pdf");
        std::fs::write(&file, b"%PDF-1.5 not really").unwrap();

        let err = PdfLoader::default().load(&file).await.unwrap_err();
        assert!(matches!(err, DocumentError::Pdf(_)));
        assert!(err.is_skippable());
    }
}
