use std::path::PathBuf;

use super::{Config, EmailConfig};

/// Parse a lowercase enum value the same way the TOML deserializer would.
fn parse_kind<T: serde::de::DeserializeOwned>(var: &str, value: &str) -> Option<T> {
    let parsed = serde_json::from_value(serde_json::Value::String(value.to_owned())).ok();
    if parsed.is_none() {
        tracing::warn!("ignoring invalid {var} value: {value}");
    }
    parsed
}

impl Config {
    pub(crate) fn apply_env_overrides(&mut self) {
        self.apply_env_overrides_llm();
        self.apply_env_overrides_run();
        self.apply_env_overrides_email();
    }

    fn apply_env_overrides_llm(&mut self) {
        if let Ok(v) = std::env::var("QUILL_LLM_PROVIDER")
            && let Some(kind) = parse_kind("QUILL_LLM_PROVIDER", &v)
        {
            self.llm.provider = kind;
        }
        if let Ok(v) = std::env::var("QUILL_LLM_MODEL") {
            match self.llm.provider {
                super::ProviderKind::OpenAi => self.llm.openai.model = v,
                super::ProviderKind::Vertex => self.llm.vertex.model = v,
            }
        }
        if let Ok(v) = std::env::var("QUILL_LLM_EMBEDDING_MODEL") {
            match self.llm.provider {
                super::ProviderKind::OpenAi => self.llm.openai.embedding_model = v,
                super::ProviderKind::Vertex => self.llm.vertex.embedding_model = v,
            }
        }
        if let Ok(v) = std::env::var("QUILL_LLM_MAX_TOKENS")
            && let Ok(n) = v.parse::<u32>()
        {
            self.llm.max_tokens = n;
        }
        if let Ok(v) = std::env::var("QUILL_LLM_TEMPERATURE")
            && let Ok(t) = v.parse::<f32>()
        {
            self.llm.temperature = t;
        }
        if let Ok(v) = std::env::var("QUILL_OPENAI_BASE_URL") {
            self.llm.openai.base_url = v;
        }
        if let Ok(v) = std::env::var("QUILL_VERTEX_PROJECT") {
            self.llm.vertex.project = Some(v);
        }
        if let Ok(v) = std::env::var("QUILL_VERTEX_LOCATION") {
            self.llm.vertex.location = v;
        }
        if let Ok(v) = std::env::var("QUILL_VERTEX_CREDENTIALS") {
            self.llm.vertex.credentials_path = Some(PathBuf::from(v));
        }
    }

    fn apply_env_overrides_run(&mut self) {
        if let Ok(v) = std::env::var("QUILL_STORE_BACKEND")
            && let Some(backend) = parse_kind("QUILL_STORE_BACKEND", &v)
        {
            self.store.backend = backend;
        }
        if let Ok(v) = std::env::var("QUILL_STORE_URL") {
            self.store.url = v;
        }
        if let Ok(v) = std::env::var("QUILL_STORE_COLLECTION") {
            self.store.collection = v;
        }
        if let Ok(v) = std::env::var("QUILL_INGEST_GRANULARITY")
            && let Some(granularity) = parse_kind("QUILL_INGEST_GRANULARITY", &v)
        {
            self.ingest.granularity = granularity;
        }
        if let Ok(v) = std::env::var("QUILL_RETRIEVAL_TOP_K")
            && let Ok(k) = v.parse::<u64>()
        {
            self.retrieval.top_k = k;
        }
        if let Ok(v) = std::env::var("QUILL_PROPOSAL_SECTIONS") {
            self.proposal.sections = v
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
        }
        if let Ok(v) = std::env::var("QUILL_OUTPUT_PATH") {
            self.output.path = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("QUILL_STAGE_DELAY_MS")
            && let Ok(ms) = v.parse::<u64>()
        {
            self.pipeline.stage_delay_ms = ms;
        }
        if let Ok(v) = std::env::var("QUILL_DEBUG_DIR") {
            self.pipeline.debug_dir = Some(PathBuf::from(v));
        }
        if let Ok(v) = std::env::var("QUILL_SEND_EMAIL")
            && let Ok(enabled) = v.parse::<bool>()
        {
            self.pipeline.send_email = enabled;
        }
    }

    fn apply_env_overrides_email(&mut self) {
        if let (Ok(from), Ok(to), Ok(server), Ok(username)) = (
            std::env::var("QUILL_EMAIL_FROM"),
            std::env::var("QUILL_EMAIL_TO"),
            std::env::var("QUILL_SMTP_SERVER"),
            std::env::var("QUILL_SMTP_USERNAME"),
        ) && self.email.is_none()
        {
            self.email = Some(EmailConfig::new(from, to, server, username));
        }
        let Some(email) = self.email.as_mut() else {
            return;
        };
        if let Ok(v) = std::env::var("QUILL_EMAIL_FROM") {
            email.from = v;
        }
        if let Ok(v) = std::env::var("QUILL_EMAIL_TO") {
            email.to = v;
        }
        if let Ok(v) = std::env::var("QUILL_SMTP_SERVER") {
            email.smtp_server = v;
        }
        if let Ok(v) = std::env::var("QUILL_SMTP_PORT")
            && let Ok(port) = v.parse::<u16>()
        {
            email.smtp_port = port;
        }
        if let Ok(v) = std::env::var("QUILL_SMTP_USERNAME") {
            email.username = v;
        }
    }
}
