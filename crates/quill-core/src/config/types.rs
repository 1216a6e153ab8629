use std::collections::HashMap;
use std::path::PathBuf;

use quill_memory::document::{DEFAULT_MAX_FILE_SIZE, Granularity};
use serde::{Deserialize, Serialize};

use crate::assemble::PageGeometry;
use crate::vault::Secret;

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub llm: LlmConfig,
    pub store: StoreConfig,
    pub ingest: IngestConfig,
    pub retrieval: RetrievalConfig,
    pub proposal: ProposalConfig,
    pub output: OutputConfig,
    pub pipeline: PipelineConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<EmailConfig>,
    #[serde(skip)]
    pub secrets: ResolvedSecrets,
}

/// Completion and embedding backend selector.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    OpenAi,
    Vertex,
}

impl ProviderKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Vertex => "vertex",
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

fn default_max_tokens() -> u32 {
    2048
}

fn default_temperature() -> f32 {
    0.2
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LlmConfig {
    #[serde(default)]
    pub provider: ProviderKind,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default)]
    pub openai: OpenAiConfig,
    #[serde(default)]
    pub vertex: VertexConfig,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::default(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            openai: OpenAiConfig::default(),
            vertex: VertexConfig::default(),
        }
    }
}

impl LlmConfig {
    /// Chat model of the selected provider.
    #[must_use]
    pub fn model(&self) -> &str {
        match self.provider {
            ProviderKind::OpenAi => &self.openai.model,
            ProviderKind::Vertex => &self.vertex.model,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OpenAiConfig {
    pub base_url: String,
    pub model: String,
    pub embedding_model: String,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            base_url: quill_llm::openai::DEFAULT_BASE_URL.into(),
            model: quill_llm::openai::DEFAULT_CHAT_MODEL.into(),
            embedding_model: quill_llm::openai::DEFAULT_EMBEDDING_MODEL.into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct VertexConfig {
    pub project: Option<String>,
    pub location: String,
    pub model: String,
    pub embedding_model: String,
    /// Service-account JSON key. When unset, `QUILL_VERTEX_ACCESS_TOKEN` is used.
    pub credentials_path: Option<PathBuf>,
    /// Override for the regional endpoint host.
    pub endpoint: Option<String>,
}

impl Default for VertexConfig {
    fn default() -> Self {
        Self {
            project: None,
            location: quill_llm::vertex::DEFAULT_LOCATION.into(),
            model: quill_llm::vertex::DEFAULT_CHAT_MODEL.into(),
            embedding_model: quill_llm::vertex::DEFAULT_EMBEDDING_MODEL.into(),
            credentials_path: None,
            endpoint: None,
        }
    }
}

/// Vector store backend selector.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Qdrant,
    Supabase,
    Memory,
}

impl StoreBackend {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Qdrant => "qdrant",
            Self::Supabase => "supabase",
            Self::Memory => "memory",
        }
    }
}

impl std::fmt::Display for StoreBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    /// Qdrant gRPC URL or Supabase project URL.
    pub url: String,
    /// Qdrant collection or Supabase table.
    pub collection: String,
    /// Supabase RPC used for similarity search.
    pub match_function: Option<String>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            url: "http://localhost:6334".into(),
            collection: "documents".into(),
            match_function: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct IngestConfig {
    pub granularity: Granularity,
    /// WHATWG labels tried in order. Empty means utf-8, utf-16le, windows-1252.
    pub encodings: Vec<String>,
    pub max_file_size: u64,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            granularity: Granularity::default(),
            encodings: Vec::new(),
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            chunk_size: 1000,
            chunk_overlap: 200,
        }
    }
}

fn default_top_k() -> u64 {
    1
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: u64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProposalConfig {
    /// Section names in document order.
    pub sections: Vec<String>,
    /// Template overrides and additions keyed by section name.
    pub templates: HashMap<String, String>,
    /// Retrieval query overrides keyed by evidence key. A section that is not
    /// built in retrieves under its own name and needs an entry here.
    pub queries: HashMap<String, String>,
}

impl Default for ProposalConfig {
    fn default() -> Self {
        Self {
            sections: crate::sections::BUILTIN_SECTIONS
                .iter()
                .map(|s| s.name.to_owned())
                .collect(),
            templates: HashMap::new(),
            queries: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OutputConfig {
    pub path: PathBuf,
    pub geometry: PageGeometry,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("proposal_response.pdf"),
            geometry: PageGeometry::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Pause before every remote-bound stage except the first.
    pub stage_delay_ms: u64,
    /// Write each retrieval result set here as `<key>.json`.
    pub debug_dir: Option<PathBuf>,
    pub send_email: bool,
}

fn default_smtp_port() -> u16 {
    587
}

fn default_subject() -> String {
    "Proposal Response".into()
}

fn default_body() -> String {
    "Please find attached the proposal response.".into()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EmailConfig {
    pub from: String,
    pub to: String,
    pub smtp_server: String,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    pub username: String,
    #[serde(default = "default_subject")]
    pub subject: String,
    #[serde(default = "default_body")]
    pub body: String,
}

impl EmailConfig {
    #[must_use]
    pub fn new(from: String, to: String, smtp_server: String, username: String) -> Self {
        Self {
            from,
            to,
            smtp_server,
            smtp_port: default_smtp_port(),
            username,
            subject: default_subject(),
            body: default_body(),
        }
    }
}

#[derive(Debug, Default)]
pub struct ResolvedSecrets {
    pub openai_api_key: Option<Secret>,
    pub vertex_access_token: Option<Secret>,
    pub qdrant_api_key: Option<Secret>,
    pub supabase_key: Option<Secret>,
    pub smtp_password: Option<Secret>,
}
