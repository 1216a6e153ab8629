use std::collections::HashMap;

use serde::{Deserialize, Serialize};

pub const CONTENT_KEY: &str = "content";
pub const SOURCE_KEY: &str = "source";
pub const FILENAME_KEY: &str = "filename";
pub const CONTENT_TYPE_KEY: &str = "content_type";
pub const PAGE_KEY: &str = "page";
pub const CHUNK_INDEX_KEY: &str = "chunk_index";

/// How much of a file becomes one indexed record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    /// One record per file.
    File,
    /// One record per PDF page; other formats behave like `File`.
    #[default]
    Page,
    /// Pages (or files) further split into overlapping chunks.
    Chunk,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentMetadata {
    pub source: String,
    pub filename: String,
    pub content_type: String,
    /// 1-based page number for per-page PDF extraction.
    pub page: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct Document {
    pub content: String,
    pub metadata: DocumentMetadata,
}

#[derive(Debug, Clone)]
pub struct Chunk {
    pub content: String,
    pub metadata: DocumentMetadata,
    pub chunk_index: Option<usize>,
}

impl Chunk {
    /// Flat payload stored next to the vector.
    #[must_use]
    pub fn payload(&self) -> HashMap<String, serde_json::Value> {
        let mut payload = HashMap::from([
            (CONTENT_KEY.to_owned(), self.content.clone().into()),
            (SOURCE_KEY.to_owned(), self.metadata.source.clone().into()),
            (FILENAME_KEY.to_owned(), self.metadata.filename.clone().into()),
            (
                CONTENT_TYPE_KEY.to_owned(),
                self.metadata.content_type.clone().into(),
            ),
        ]);
        if let Some(page) = self.metadata.page {
            payload.insert(PAGE_KEY.to_owned(), page.into());
        }
        if let Some(index) = self.chunk_index {
            payload.insert(CHUNK_INDEX_KEY.to_owned(), index.into());
        }
        payload
    }
}

impl From<Document> for Chunk {
    fn from(doc: Document) -> Self {
        Self {
            content: doc.content,
            metadata: doc.metadata,
            chunk_index: None,
        }
    }
}
