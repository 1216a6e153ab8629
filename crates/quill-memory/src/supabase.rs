//! Supabase (PostgREST + pgvector) backend.
//!
//! The collection name is the table name. Rows are `{id, content, metadata, embedding}`
//! keyed by `id`, so writing a point again replaces the row. Search goes
//! through a SQL function exposed as an RPC, by default
//! `match_documents(query_embedding, match_count)`.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::MemoryError;
use crate::vector_store::{
    BoxFuture, ScoredVectorPoint, VectorPoint, VectorStore, VectorStoreError,
};

pub const DEFAULT_MATCH_FUNCTION: &str = "match_documents";

#[derive(Clone)]
pub struct SupabaseStore {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    match_function: String,
}

impl fmt::Debug for SupabaseStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SupabaseStore")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .field("match_function", &self.match_function)
            .finish_non_exhaustive()
    }
}

#[derive(Serialize)]
struct InsertRow<'a> {
    id: &'a str,
    content: &'a str,
    metadata: serde_json::Map<String, serde_json::Value>,
    embedding: &'a [f32],
}

#[derive(Serialize)]
struct MatchRequest<'a> {
    query_embedding: &'a [f32],
    match_count: u64,
}

#[derive(Deserialize)]
struct MatchRow {
    id: serde_json::Value,
    #[serde(default)]
    content: String,
    #[serde(default)]
    metadata: serde_json::Map<String, serde_json::Value>,
    similarity: f32,
}

impl SupabaseStore {
    /// # Errors
    ///
    /// Returns an error if the URL is not http(s).
    pub fn new(
        mut base_url: String,
        api_key: String,
        match_function: Option<String>,
    ) -> Result<Self, MemoryError> {
        while base_url.ends_with('/') {
            base_url.pop();
        }
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(MemoryError::Other(format!(
                "invalid Supabase URL: {base_url}"
            )));
        }
        Ok(Self {
            client: quill_llm::http::client_with_timeout(std::time::Duration::from_secs(60)),
            base_url,
            api_key,
            match_function: match_function.unwrap_or_else(|| DEFAULT_MATCH_FUNCTION.into()),
        })
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, format!("{}/rest/v1/{path}", self.base_url))
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
    }

    async fn check(
        response: reqwest::Response,
        wrap: fn(String) -> VectorStoreError,
    ) -> Result<reqwest::Response, VectorStoreError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        tracing::error!("Supabase error {status}: {body}");
        Err(wrap(format!("Supabase request failed (status {status})")))
    }
}

fn split_payload(
    payload: HashMap<String, serde_json::Value>,
) -> (String, serde_json::Map<String, serde_json::Value>) {
    let mut metadata: serde_json::Map<String, serde_json::Value> = payload.into_iter().collect();
    let content = match metadata.remove("content") {
        Some(serde_json::Value::String(s)) => s,
        Some(other) => other.to_string(),
        None => String::new(),
    };
    (content, metadata)
}

impl VectorStore for SupabaseStore {
    /// Tables cannot be created over PostgREST, so this only verifies the table is reachable.
    fn ensure_collection(
        &self,
        collection: &str,
        _vector_size: u64,
    ) -> BoxFuture<'_, Result<(), VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            if self.collection_exists(&collection).await? {
                Ok(())
            } else {
                Err(VectorStoreError::Collection(format!(
                    "table {collection} not found; apply the pgvector schema first"
                )))
            }
        })
    }

    fn collection_exists(&self, collection: &str) -> BoxFuture<'_, Result<bool, VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            let response = self
                .request(reqwest::Method::GET, &format!("{collection}?select=id&limit=1"))
                .send()
                .await
                .map_err(|e| VectorStoreError::Connection(e.to_string()))?;
            match response.status() {
                s if s.is_success() => Ok(true),
                reqwest::StatusCode::NOT_FOUND => Ok(false),
                _ => Self::check(response, VectorStoreError::Collection)
                    .await
                    .map(|_| true),
            }
        })
    }

    fn upsert(
        &self,
        collection: &str,
        points: Vec<VectorPoint>,
    ) -> BoxFuture<'_, Result<(), VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            if points.is_empty() {
                return Ok(());
            }
            let split: Vec<_> = points
                .into_iter()
                .map(|p| {
                    let (content, metadata) = split_payload(p.payload);
                    (p.id, content, metadata, p.vector)
                })
                .collect();
            let rows: Vec<InsertRow<'_>> = split
                .iter()
                .map(|(id, content, metadata, vector)| InsertRow {
                    id,
                    content,
                    metadata: metadata.clone(),
                    embedding: vector,
                })
                .collect();

            let response = self
                .request(reqwest::Method::POST, &format!("{collection}?on_conflict=id"))
                .header("Prefer", "resolution=merge-duplicates,return=minimal")
                .json(&rows)
                .send()
                .await
                .map_err(|e| VectorStoreError::Connection(e.to_string()))?;
            Self::check(response, VectorStoreError::Upsert).await?;
            Ok(())
        })
    }

    fn search(
        &self,
        _collection: &str,
        vector: Vec<f32>,
        limit: u64,
    ) -> BoxFuture<'_, Result<Vec<ScoredVectorPoint>, VectorStoreError>> {
        Box::pin(async move {
            let body = MatchRequest {
                query_embedding: &vector,
                match_count: limit,
            };
            let response = self
                .request(
                    reqwest::Method::POST,
                    &format!("rpc/{}", self.match_function),
                )
                .json(&body)
                .send()
                .await
                .map_err(|e| VectorStoreError::Connection(e.to_string()))?;
            let response = Self::check(response, VectorStoreError::Search).await?;
            let rows: Vec<MatchRow> = response
                .json()
                .await
                .map_err(|e| VectorStoreError::Serialization(e.to_string()))?;

            let mut hits: Vec<ScoredVectorPoint> = rows
                .into_iter()
                .map(|row| {
                    let mut payload: HashMap<String, serde_json::Value> =
                        row.metadata.into_iter().collect();
                    payload.insert("content".into(), serde_json::Value::String(row.content));
                    ScoredVectorPoint {
                        id: match row.id {
                            serde_json::Value::String(s) => s,
                            other => other.to_string(),
                        },
                        score: row.similarity,
                        payload,
                    }
                })
                .collect();
            hits.sort_by(|a, b| b.score.total_cmp(&a.score));
            hits.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
            Ok(hits)
        })
    }

    fn name(&self) -> &'static str {
        "supabase"
    }
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{body_partial_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn store(url: &str) -> SupabaseStore {
        SupabaseStore::new(url.into(), "anon-key".into(), None).unwrap()
    }

    fn point(content: &str) -> VectorPoint {
        let mut payload = HashMap::new();
        payload.insert("content".into(), serde_json::json!(content));
        payload.insert("filename".into(), serde_json::json!("about.txt"));
        VectorPoint {
            id: "0b9f6c1e-4a51-4c1d-9d7e-3f2a8e6b1c00".into(),
            vector: vec![0.1, 0.2],
            payload,
        }
    }

    #[test]
    fn rejects_non_http_url() {
        assert!(SupabaseStore::new("ftp://x".into(), "k".into(), None).is_err());
    }

    #[test]
    fn debug_redacts_key() {
        let s = store("https://proj.supabase.co/");
        let dbg = format!("{s:?}");
        assert!(!dbg.contains("anon-key"));
        assert!(dbg.contains("https://proj.supabase.co\""));
    }

    #[test]
    fn split_payload_moves_content_out_of_metadata() {
        let (content, metadata) = split_payload(point("hello").payload);
        assert_eq!(content, "hello");
        assert_eq!(metadata["filename"], "about.txt");
        assert!(!metadata.contains_key("content"));
    }

    #[tokio::test]
    async fn upsert_sends_point_id_as_row_key() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/documents"))
            .and(header("apikey", "anon-key"))
            .and(header("Authorization", "Bearer anon-key"))
            .and(query_param("on_conflict", "id"))
            .and(body_partial_json(serde_json::json!([{
                "id": "0b9f6c1e-4a51-4c1d-9d7e-3f2a8e6b1c00",
                "content": "hello",
                "metadata": {"filename": "about.txt"}
            }])))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;

        store(&server.uri())
            .upsert("documents", vec![point("hello")])
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn upsert_failure_is_upsert_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/documents"))
            .respond_with(ResponseTemplate::new(400).set_body_string("bad"))
            .mount(&server)
            .await;

        let err = store(&server.uri())
            .upsert("documents", vec![point("hello")])
            .await
            .unwrap_err();
        assert!(matches!(err, VectorStoreError::Upsert(_)));
    }

    #[tokio::test]
    async fn search_calls_match_function() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/rpc/match_documents"))
            .and(body_partial_json(serde_json::json!({"match_count": 2})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"id": 7, "content": "second", "metadata": {"filename": "b.txt"}, "similarity": 0.4},
                {"id": 3, "content": "first", "metadata": {"filename": "a.txt"}, "similarity": 0.9}
            ])))
            .mount(&server)
            .await;

        let hits = store(&server.uri())
            .search("documents", vec![0.1, 0.2], 2)
            .await
            .unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].id, "3");
        assert_eq!(hits[0].payload["content"], "first");
        assert_eq!(hits[0].payload["filename"], "a.txt");
    }

    #[tokio::test]
    async fn collection_exists_probes_table() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/documents"))
            .and(query_param("select", "id"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let s = store(&server.uri());
        assert!(s.collection_exists("documents").await.unwrap());
        assert!(!s.collection_exists("missing").await.unwrap());
        assert!(s.ensure_collection("documents", 1536).await.is_ok());
        assert!(matches!(
            s.ensure_collection("missing", 1536).await.unwrap_err(),
            VectorStoreError::Collection(_)
        ));
    }
}
