use std::collections::HashMap;
use std::sync::RwLock;

use crate::vector_store::{
    BoxFuture, ScoredVectorPoint, VectorPoint, VectorStore, VectorStoreError,
};

struct StoredPoint {
    id: String,
    vector: Vec<f32>,
    payload: HashMap<String, serde_json::Value>,
}

struct Collection {
    vector_size: usize,
    points: Vec<StoredPoint>,
}

/// Brute-force cosine store. Points keep insertion order, and ranking uses a
/// stable sort, so equal scores come back in the order they were written.
///
/// Like Qdrant, a collection keeps the vector size it was created with and
/// rejects points of any other length.
pub struct InMemoryVectorStore {
    collections: RwLock<HashMap<String, Collection>>,
}

impl InMemoryVectorStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
        }
    }

    /// Number of points in a collection, `None` if it does not exist.
    #[must_use]
    pub fn point_count(&self, collection: &str) -> Option<usize> {
        self.collections
            .read()
            .ok()
            .and_then(|cols| cols.get(collection).map(|c| c.points.len()))
    }
}

impl Default for InMemoryVectorStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for InMemoryVectorStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryVectorStore")
            .finish_non_exhaustive()
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

impl VectorStore for InMemoryVectorStore {
    fn ensure_collection(
        &self,
        collection: &str,
        vector_size: u64,
    ) -> BoxFuture<'_, Result<(), VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            let vector_size = usize::try_from(vector_size)
                .map_err(|e| VectorStoreError::Collection(e.to_string()))?;
            let mut cols = self
                .collections
                .write()
                .map_err(|e| VectorStoreError::Collection(e.to_string()))?;
            cols.entry(collection).or_insert_with(|| Collection {
                vector_size,
                points: Vec::new(),
            });
            Ok(())
        })
    }

    fn collection_exists(&self, collection: &str) -> BoxFuture<'_, Result<bool, VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            let cols = self
                .collections
                .read()
                .map_err(|e| VectorStoreError::Collection(e.to_string()))?;
            Ok(cols.contains_key(&collection))
        })
    }

    fn upsert(
        &self,
        collection: &str,
        points: Vec<VectorPoint>,
    ) -> BoxFuture<'_, Result<(), VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            let mut cols = self
                .collections
                .write()
                .map_err(|e| VectorStoreError::Upsert(e.to_string()))?;
            let col = cols.get_mut(&collection).ok_or_else(|| {
                VectorStoreError::Upsert(format!("collection {collection} not found"))
            })?;
            if let Some(bad) = points.iter().find(|p| p.vector.len() != col.vector_size) {
                return Err(VectorStoreError::Upsert(format!(
                    "point {} has {} dimensions, collection {collection} expects {}",
                    bad.id,
                    bad.vector.len(),
                    col.vector_size
                )));
            }
            for p in points {
                let stored = StoredPoint {
                    id: p.id,
                    vector: p.vector,
                    payload: p.payload,
                };
                match col.points.iter_mut().find(|s| s.id == stored.id) {
                    Some(existing) => *existing = stored,
                    None => col.points.push(stored),
                }
            }
            Ok(())
        })
    }

    fn search(
        &self,
        collection: &str,
        vector: Vec<f32>,
        limit: u64,
    ) -> BoxFuture<'_, Result<Vec<ScoredVectorPoint>, VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            let cols = self
                .collections
                .read()
                .map_err(|e| VectorStoreError::Search(e.to_string()))?;
            let col = cols.get(&collection).ok_or_else(|| {
                VectorStoreError::Search(format!("collection {collection} not found"))
            })?;

            let mut scored: Vec<ScoredVectorPoint> = col
                .points
                .iter()
                .map(|p| ScoredVectorPoint {
                    id: p.id.clone(),
                    score: cosine_similarity(&vector, &p.vector),
                    payload: p.payload.clone(),
                })
                .collect();

            scored.sort_by(|a, b| b.score.total_cmp(&a.score));
            scored.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
            Ok(scored)
        })
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(id: &str, vector: Vec<f32>, content: &str) -> VectorPoint {
        let mut payload = HashMap::new();
        payload.insert("content".into(), serde_json::json!(content));
        VectorPoint {
            id: id.into(),
            vector,
            payload,
        }
    }

    #[test]
    fn cosine_identical_and_orthogonal() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]).abs() < f32::EPSILON);
    }

    #[tokio::test]
    async fn ensure_collection_is_idempotent() {
        let store = InMemoryVectorStore::new();
        assert!(!store.collection_exists("docs").await.unwrap());
        store.ensure_collection("docs", 4).await.unwrap();
        store.ensure_collection("docs", 4).await.unwrap();
        assert!(store.collection_exists("docs").await.unwrap());
        assert_eq!(store.point_count("docs"), Some(0));
    }

    #[tokio::test]
    async fn upsert_into_missing_collection_fails() {
        let store = InMemoryVectorStore::new();
        let err = store
            .upsert("nope", vec![point("a", vec![1.0], "x")])
            .await
            .unwrap_err();
        assert!(matches!(err, VectorStoreError::Upsert(_)));
    }

    #[tokio::test]
    async fn upsert_rejects_wrong_dimension() {
        let store = InMemoryVectorStore::new();
        store.ensure_collection("docs", 2).await.unwrap();
        let err = store
            .upsert("docs", vec![point("a", vec![1.0, 0.0, 0.0], "x")])
            .await
            .unwrap_err();
        assert!(matches!(err, VectorStoreError::Upsert(msg) if msg.contains("expects 2")));
        assert_eq!(store.point_count("docs"), Some(0));
    }

    #[tokio::test]
    async fn upsert_same_id_replaces_in_place() {
        let store = InMemoryVectorStore::new();
        store.ensure_collection("docs", 2).await.unwrap();
        store
            .upsert(
                "docs",
                vec![point("a", vec![1.0, 0.0], "old"), point("b", vec![0.0, 1.0], "b")],
            )
            .await
            .unwrap();
        store
            .upsert("docs", vec![point("a", vec![1.0, 0.0], "new")])
            .await
            .unwrap();
        assert_eq!(store.point_count("docs"), Some(2));

        let hits = store.search("docs", vec![1.0, 0.0], 1).await.unwrap();
        assert_eq!(hits[0].id, "a");
        assert_eq!(hits[0].payload["content"], "new");
    }

    #[tokio::test]
    async fn search_orders_by_descending_score_and_limits() {
        let store = InMemoryVectorStore::new();
        store.ensure_collection("docs", 2).await.unwrap();
        store
            .upsert(
                "docs",
                vec![
                    point("far", vec![0.0, 1.0], "far"),
                    point("near", vec![1.0, 0.1], "near"),
                    point("mid", vec![1.0, 1.0], "mid"),
                ],
            )
            .await
            .unwrap();

        let hits = store.search("docs", vec![1.0, 0.0], 2).await.unwrap();
        let ids: Vec<_> = hits.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, ["near", "mid"]);
        assert!(hits[0].score >= hits[1].score);
    }

    #[tokio::test]
    async fn ties_keep_insertion_order() {
        let store = InMemoryVectorStore::new();
        store.ensure_collection("docs", 2).await.unwrap();
        store
            .upsert(
                "docs",
                vec![
                    point("first", vec![1.0, 0.0], "1"),
                    point("second", vec![2.0, 0.0], "2"),
                    point("third", vec![3.0, 0.0], "3"),
                ],
            )
            .await
            .unwrap();

        for _ in 0..5 {
            let hits = store.search("docs", vec![1.0, 0.0], 3).await.unwrap();
            let ids: Vec<_> = hits.iter().map(|h| h.id.as_str()).collect();
            assert_eq!(ids, ["first", "second", "third"]);
        }
    }

    #[tokio::test]
    async fn search_missing_collection_fails() {
        let store = InMemoryVectorStore::new();
        assert!(matches!(
            store.search("nope", vec![1.0], 1).await.unwrap_err(),
            VectorStoreError::Search(_)
        ));
    }
}
