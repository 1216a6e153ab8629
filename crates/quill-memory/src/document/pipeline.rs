use std::sync::Arc;

use quill_llm::EmbedFuture;
use uuid::Uuid;

use super::{Chunk, Document, DocumentError, DocumentLoader, TextSplitter};
use crate::error::MemoryError;
use crate::vector_store::{VectorPoint, VectorStore};

pub type EmbedFn = Box<dyn Fn(&str) -> EmbedFuture + Send + Sync>;

/// Embeds documents and writes them to one collection of a vector store.
pub struct IngestionPipeline {
    splitter: Option<TextSplitter>,
    store: Arc<dyn VectorStore>,
    collection: String,
    embed_fn: EmbedFn,
}

impl IngestionPipeline {
    /// `splitter` is `None` when each document should become exactly one record.
    pub fn new(
        splitter: Option<TextSplitter>,
        store: Arc<dyn VectorStore>,
        collection: impl Into<String>,
        embed_fn: EmbedFn,
    ) -> Self {
        Self {
            splitter,
            store,
            collection: collection.into(),
            embed_fn,
        }
    }

    #[must_use]
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Create the collection if needed, sized to the embedder's output.
    /// Returns the vector size.
    ///
    /// # Errors
    ///
    /// Returns an error if the sample embedding fails or is empty, or if the
    /// store cannot create the collection.
    pub async fn prepare_collection(&self) -> Result<u64, DocumentError> {
        let sample = (self.embed_fn)("vector size").await?;
        if sample.is_empty() {
            return Err(DocumentError::Embedding(quill_llm::LlmError::Other(
                "embedder returned an empty vector".into(),
            )));
        }
        let vector_size = u64::try_from(sample.len()).unwrap_or(u64::MAX);
        self.store
            .ensure_collection(&self.collection, vector_size)
            .await
            .map_err(|e| DocumentError::Storage(MemoryError::VectorStore(e)))?;
        Ok(vector_size)
    }

    fn chunks(&self, document: Document) -> Vec<Chunk> {
        if document.content.trim().is_empty() {
            return Vec::new();
        }
        match &self.splitter {
            Some(splitter) => splitter.split(&document),
            None => vec![Chunk::from(document)],
        }
    }

    /// Embed and store one document. Returns the number of records written;
    /// blank documents write nothing.
    ///
    /// # Errors
    ///
    /// Returns an error if embedding or the store upsert fails.
    pub async fn ingest(&self, document: Document) -> Result<usize, DocumentError> {
        let chunks = self.chunks(document);
        if chunks.is_empty() {
            return Ok(0);
        }

        let mut points = Vec::with_capacity(chunks.len());
        for chunk in &chunks {
            let vector = (self.embed_fn)(&chunk.content).await?;
            points.push(VectorPoint {
                id: Uuid::new_v4().to_string(),
                vector,
                payload: chunk.payload(),
            });
        }

        let count = points.len();
        self.store
            .upsert(&self.collection, points)
            .await
            .map_err(|e| DocumentError::Storage(MemoryError::VectorStore(e)))?;

        Ok(count)
    }

    /// # Errors
    ///
    /// Returns an error if loading, embedding, or storage fails.
    pub async fn load_and_ingest(
        &self,
        loader: &(dyn DocumentLoader + '_),
        path: &std::path::Path,
    ) -> Result<usize, DocumentError> {
        let documents = loader.load(path).await?;
        let mut total = 0;
        for doc in documents {
            total += self.ingest(doc).await?;
        }
        Ok(total)
    }
}
