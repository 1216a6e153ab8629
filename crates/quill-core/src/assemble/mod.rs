//! Greedy text layout and PDF output for drafted proposal sections.

mod layout;
mod pdf;

pub use layout::{Page, PageGeometry, PlacedLine, layout, wrap_words};
pub use pdf::render_pdf;

use std::path::PathBuf;

use crate::error::QuillError;
use crate::generate::ProposalSection;

#[derive(Debug, Clone)]
pub struct AssembledDocument {
    pub path: PathBuf,
    pub pages: usize,
    pub bytes: usize,
}

#[derive(Debug, Clone)]
pub struct DocumentAssembler {
    geometry: PageGeometry,
    output_path: PathBuf,
}

impl DocumentAssembler {
    #[must_use]
    pub fn new(geometry: PageGeometry, output_path: impl Into<PathBuf>) -> Self {
        Self {
            geometry,
            output_path: output_path.into(),
        }
    }

    /// Lay out the sections in order and write the PDF, replacing any file
    /// already at the output path.
    ///
    /// # Errors
    ///
    /// Returns [`QuillError::Io`] if the PDF cannot be encoded or written.
    pub async fn assemble(
        &self,
        sections: &[ProposalSection],
    ) -> Result<AssembledDocument, QuillError> {
        let entries: Vec<(&str, &str)> = sections
            .iter()
            .map(|s| (s.title.as_str(), s.text.as_str()))
            .collect();
        let pages = layout(&entries, &self.geometry);
        let bytes = render_pdf(&pages, &self.geometry).map_err(std::io::Error::other)?;

        if let Some(parent) = self.output_path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&self.output_path, &bytes).await?;
        tracing::info!(
            path = %self.output_path.display(),
            pages = pages.len(),
            bytes = bytes.len(),
            "proposal PDF written"
        );

        Ok(AssembledDocument {
            path: self.output_path.clone(),
            pages: pages.len(),
            bytes: bytes.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn section(name: &str, text: &str) -> ProposalSection {
        ProposalSection {
            name: name.into(),
            title: crate::sections::display_title(name),
            text: text.into(),
        }
    }

    #[tokio::test]
    async fn writes_pdf_to_output_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("proposal_response.pdf");
        let assembler = DocumentAssembler::new(PageGeometry::default(), &path);

        let doc = assembler
            .assemble(&[
                section("corporate_overview", "Founded in 1999."),
                section("responses", "We meet every requirement."),
            ])
            .await
            .unwrap();

        assert_eq!(doc.path, path);
        assert_eq!(doc.pages, 1);
        let bytes = std::fs::read(&path).unwrap();
        assert!(bytes.starts_with(b"%PDF-1.5"));
        let parsed = lopdf::Document::load_mem(&bytes).unwrap();
        let text = parsed.extract_text(&[1]).unwrap();
        assert!(text.contains("CORPORATE OVERVIEW"));
        assert!(text.contains("We meet every requirement."));
    }

    #[tokio::test]
    async fn same_sections_give_identical_files() {
        let dir = tempfile::tempdir().unwrap();
        let a = DocumentAssembler::new(PageGeometry::default(), dir.path().join("a.pdf"));
        let b = DocumentAssembler::new(PageGeometry::default(), dir.path().join("b.pdf"));
        let sections = [section("experience", "Bridges, tunnels and rail.")];
        a.assemble(&sections).await.unwrap();
        b.assemble(&sections).await.unwrap();
        assert_eq!(
            std::fs::read(dir.path().join("a.pdf")).unwrap(),
            std::fs::read(dir.path().join("b.pdf")).unwrap()
        );
    }
}
