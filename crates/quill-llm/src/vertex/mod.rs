//! Google Vertex AI backend: Gemini `generateContent` for drafting and the
//! text-embedding `predict` endpoint for vectors.

pub mod auth;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use auth::{ServiceAccountAuth, VertexAuth};

use crate::error::LlmError;
use crate::provider::{CompletionParams, LlmProvider, Message, Role};

pub const DEFAULT_LOCATION: &str = "us-central1";
pub const DEFAULT_CHAT_MODEL: &str = "gemini-1.5-flash";
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-004";

#[derive(Clone)]
pub struct VertexProvider {
    client: reqwest::Client,
    auth: VertexAuth,
    project: String,
    location: String,
    model: String,
    params: CompletionParams,
    embedding_model: Option<String>,
    endpoint_base: String,
}

impl fmt::Debug for VertexProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VertexProvider")
            .field("auth", &self.auth)
            .field("project", &self.project)
            .field("location", &self.location)
            .field("model", &self.model)
            .field("params", &self.params)
            .field("embedding_model", &self.embedding_model)
            .finish_non_exhaustive()
    }
}

impl VertexProvider {
    #[must_use]
    pub fn new(
        auth: VertexAuth,
        project: String,
        location: String,
        model: String,
        params: CompletionParams,
        embedding_model: Option<String>,
    ) -> Self {
        let endpoint_base = format!("https://{location}-aiplatform.googleapis.com");
        Self {
            client: crate::http::default_client(),
            auth,
            project,
            location,
            model,
            params,
            embedding_model,
            endpoint_base,
        }
    }

    /// Point requests at a different host, e.g. a regional proxy or a test server.
    #[must_use]
    pub fn with_endpoint_base(mut self, mut base: String) -> Self {
        while base.ends_with('/') {
            base.pop();
        }
        self.endpoint_base = base;
        self
    }

    fn model_url(&self, model: &str, verb: &str) -> String {
        format!(
            "{}/v1/projects/{}/locations/{}/publishers/google/models/{model}:{verb}",
            self.endpoint_base, self.project, self.location
        )
    }

    async fn post<B: Serialize + Sync>(&self, url: &str, body: &B) -> Result<String, LlmError> {
        let token = self.auth.token().await?;
        let response = self
            .client
            .post(url)
            .bearer_auth(token)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await.map_err(LlmError::Http)?;

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(LlmError::RateLimited { provider: "vertex" });
        }
        if !status.is_success() {
            tracing::error!("Vertex AI error {status}: {text}");
            return Err(LlmError::Status {
                provider: "vertex",
                status,
            });
        }
        Ok(text)
    }
}

impl LlmProvider for VertexProvider {
    async fn chat(&self, messages: &[Message]) -> Result<String, LlmError> {
        let request = build_generate_request(messages, self.params);
        let url = self.model_url(&self.model, "generateContent");
        let text = self.post(&url, &request).await?;

        let resp: GenerateResponse = serde_json::from_str(&text)?;
        let joined: String = resp
            .candidates
            .into_iter()
            .next()
            .map(|c| c.content.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        if joined.is_empty() {
            return Err(LlmError::EmptyResponse { provider: "vertex" });
        }
        Ok(joined)
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        let model = self
            .embedding_model
            .as_deref()
            .ok_or(LlmError::EmbedUnsupported { provider: "vertex" })?;

        let request = EmbedRequest {
            instances: vec![EmbedInstance { content: text }],
        };
        let url = self.model_url(model, "predict");
        let body = self.post(&url, &request).await?;

        let resp: EmbedResponse = serde_json::from_str(&body)?;
        resp.predictions
            .into_iter()
            .next()
            .map(|p| p.embeddings.values)
            .ok_or(LlmError::EmptyResponse { provider: "vertex" })
    }

    fn supports_embeddings(&self) -> bool {
        self.embedding_model.is_some()
    }

    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "vertex"
    }
}

fn build_generate_request(messages: &[Message], params: CompletionParams) -> GenerateRequest<'_> {
    let system: Vec<Part<'_>> = messages
        .iter()
        .filter(|m| m.role == Role::System)
        .map(|m| Part { text: &m.content })
        .collect();

    let contents = messages
        .iter()
        .filter(|m| m.role != Role::System)
        .map(|m| Content {
            role: if m.role == Role::Assistant {
                "model"
            } else {
                "user"
            },
            parts: vec![Part { text: &m.content }],
        })
        .collect();

    GenerateRequest {
        contents,
        system_instruction: (!system.is_empty()).then_some(SystemInstruction { parts: system }),
        generation_config: GenerationConfig {
            temperature: params.temperature,
            max_output_tokens: params.max_tokens,
        },
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<SystemInstruction<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct SystemInstruction<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    instances: Vec<EmbedInstance<'a>>,
}

#[derive(Serialize)]
struct EmbedInstance<'a> {
    content: &'a str,
}

#[derive(Deserialize)]
struct EmbedResponse {
    predictions: Vec<EmbedPrediction>,
}

#[derive(Deserialize)]
struct EmbedPrediction {
    embeddings: EmbeddingValues,
}

#[derive(Deserialize)]
struct EmbeddingValues {
    values: Vec<f32>,
}
