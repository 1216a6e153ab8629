use std::collections::BTreeMap;
use std::sync::Arc;

use quill_llm::LlmProvider;
use quill_memory::document::types::CONTENT_KEY;
use quill_memory::{ScoredVectorPoint, VectorStore};
use serde::{Deserialize, Serialize};

use crate::error::QuillError;

/// One search hit: the stored text and the rest of its payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedRecord {
    pub id: String,
    pub score: f32,
    pub text: String,
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl From<ScoredVectorPoint> for RetrievedRecord {
    fn from(point: ScoredVectorPoint) -> Self {
        let mut metadata: BTreeMap<String, serde_json::Value> = point.payload.into_iter().collect();
        let text = match metadata.remove(CONTENT_KEY) {
            Some(serde_json::Value::String(s)) => s,
            Some(other) => other.to_string(),
            None => String::new(),
        };
        Self {
            id: point.id,
            score: point.score,
            text,
            metadata,
        }
    }
}

/// Texts of a result set joined with `\n`, in rank order.
#[must_use]
pub fn joined_text(records: &[RetrievedRecord]) -> String {
    records
        .iter()
        .map(|r| r.text.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Embeds a query and returns the nearest records from one collection.
pub struct Retriever<P> {
    provider: Arc<P>,
    store: Arc<dyn VectorStore>,
    collection: String,
    top_k: u64,
}

impl<P: LlmProvider> Retriever<P> {
    pub fn new(
        provider: Arc<P>,
        store: Arc<dyn VectorStore>,
        collection: impl Into<String>,
        top_k: u64,
    ) -> Self {
        Self {
            provider,
            store,
            collection: collection.into(),
            top_k,
        }
    }

    /// Up to `top_k` records by descending score. Ties keep store order.
    ///
    /// # Errors
    ///
    /// Returns [`QuillError::Remote`] if embedding or the search fails.
    pub async fn retrieve(&self, query: &str) -> Result<Vec<RetrievedRecord>, QuillError> {
        let vector = self.provider.embed(query).await?;
        let hits = self
            .store
            .search(&self.collection, vector, self.top_k)
            .await?;
        tracing::debug!(
            collection = %self.collection,
            hits = hits.len(),
            "retrieved records"
        );
        Ok(hits.into_iter().map(RetrievedRecord::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use quill_llm::mock::MockProvider;
    use quill_memory::{InMemoryVectorStore, VectorPoint};

    use super::*;

    /// Wide enough that distinct words in these fixtures do not share a bucket.
    fn provider() -> MockProvider {
        MockProvider::default().with_dimensions(4096)
    }

    async fn seeded_store(provider: &MockProvider, texts: &[&str]) -> Arc<InMemoryVectorStore> {
        let store = Arc::new(InMemoryVectorStore::new());
        store.ensure_collection("docs", 4096).await.unwrap();
        let mut points = Vec::new();
        for (i, text) in texts.iter().enumerate() {
            points.push(VectorPoint {
                id: format!("p{i}"),
                vector: provider.embed(text).await.unwrap(),
                payload: HashMap::from([
                    (CONTENT_KEY.to_owned(), serde_json::json!(text)),
                    ("filename".to_owned(), serde_json::json!(format!("doc{i}.txt"))),
                ]),
            });
        }
        store.upsert("docs", points).await.unwrap();
        store
    }

    #[tokio::test]
    async fn best_match_comes_first() {
        let provider = provider();
        let store = seeded_store(
            &provider,
            &[
                "staff resumes and certifications",
                "our mission and values since 1999",
                "bridge inspection requirements",
            ],
        )
        .await;
        let retriever = Retriever::new(Arc::new(provider), store, "docs", 2);

        let records = retriever
            .retrieve("company overview history mission values")
            .await
            .unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].text, "our mission and values since 1999");
        assert_eq!(records[0].metadata["filename"], "doc1.txt");
        assert!(!records[0].metadata.contains_key(CONTENT_KEY));
        assert!(records[0].score >= records[1].score);
    }

    #[tokio::test]
    async fn retrieval_is_repeatable() {
        let provider = provider();
        let store = seeded_store(&provider, &["alpha beta", "alpha beta", "gamma"]).await;
        let retriever = Retriever::new(Arc::new(provider), store, "docs", 3);
        let first = retriever.retrieve("alpha").await.unwrap();
        let second = retriever.retrieve("alpha").await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first[0].id, "p0");
        assert_eq!(first[1].id, "p1");
    }

    #[tokio::test]
    async fn embed_failure_is_remote_error() {
        let provider = MockProvider::default().with_embed_failure();
        let store = Arc::new(InMemoryVectorStore::new());
        let retriever = Retriever::new(Arc::new(provider), store, "docs", 1);
        assert!(retriever.retrieve("anything").await.unwrap_err().is_remote());
    }

    #[test]
    fn joined_text_uses_newlines() {
        let record = |t: &str| RetrievedRecord {
            id: "x".into(),
            score: 1.0,
            text: t.into(),
            metadata: BTreeMap::new(),
        };
        assert_eq!(joined_text(&[record("a"), record("b")]), "a\nb");
        assert_eq!(joined_text(&[]), "");
    }
}
