mod env;
mod types;

#[cfg(test)]
mod tests;

pub use types::*;

use std::path::Path;

use anyhow::Context;
use quill_memory::document::Granularity;

use crate::error::QuillError;
use crate::notify::parse_mailbox;
use crate::sections::SectionCatalog;
use crate::vault::{Secret, VaultProvider};

pub const OPENAI_API_KEY_VAR: &str = "QUILL_OPENAI_API_KEY";
pub const VERTEX_ACCESS_TOKEN_VAR: &str = "QUILL_VERTEX_ACCESS_TOKEN";
pub const QDRANT_API_KEY_VAR: &str = "QUILL_QDRANT_API_KEY";
pub const SUPABASE_KEY_VAR: &str = "QUILL_SUPABASE_KEY";
pub const SMTP_PASSWORD_VAR: &str = "QUILL_SMTP_PASSWORD";

impl Config {
    /// Load configuration from a TOML file with env var overrides.
    ///
    /// Falls back to defaults when the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str::<Self>(&content).context("failed to parse config file")?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Pull credentials from the vault. Secrets never come from the TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the vault backend fails.
    pub async fn resolve_secrets(&mut self, vault: &dyn VaultProvider) -> anyhow::Result<()> {
        if let Some(val) = vault.get_secret(OPENAI_API_KEY_VAR).await? {
            self.secrets.openai_api_key = Some(Secret::new(val));
        }
        if let Some(val) = vault.get_secret(VERTEX_ACCESS_TOKEN_VAR).await? {
            self.secrets.vertex_access_token = Some(Secret::new(val));
        }
        if let Some(val) = vault.get_secret(QDRANT_API_KEY_VAR).await? {
            self.secrets.qdrant_api_key = Some(Secret::new(val));
        }
        if let Some(val) = vault.get_secret(SUPABASE_KEY_VAR).await? {
            self.secrets.supabase_key = Some(Secret::new(val));
        }
        if let Some(val) = vault.get_secret(SMTP_PASSWORD_VAR).await? {
            self.secrets.smtp_password = Some(Secret::new(val));
        }
        Ok(())
    }

    /// Check that the settings can drive a run. Call after [`Self::resolve_secrets`].
    ///
    /// # Errors
    ///
    /// Returns [`QuillError::Configuration`] naming the first problem found.
    pub fn validate(&self) -> Result<(), QuillError> {
        self.validate_provider()?;
        self.validate_store()?;

        if self.retrieval.top_k == 0 {
            return Err(QuillError::config("retrieval.top_k must be at least 1"));
        }
        if self.ingest.granularity == Granularity::Chunk
            && (self.ingest.chunk_size == 0 || self.ingest.chunk_overlap >= self.ingest.chunk_size)
        {
            return Err(QuillError::config(
                "ingest.chunk_overlap must be smaller than a non-zero ingest.chunk_size",
            ));
        }
        self.output
            .geometry
            .check()
            .map_err(|e| QuillError::config(format!("output.geometry: {e}")))?;

        SectionCatalog::from_config(&self.proposal)?;

        if let Some(email) = &self.email {
            parse_mailbox("email.from", &email.from)?;
            parse_mailbox("email.to", &email.to)?;
        }
        Ok(())
    }

    fn validate_provider(&self) -> Result<(), QuillError> {
        match self.llm.provider {
            ProviderKind::OpenAi => {
                if self.secrets.openai_api_key.is_none() {
                    return Err(QuillError::config(format!(
                        "provider openai requires {OPENAI_API_KEY_VAR}"
                    )));
                }
            }
            ProviderKind::Vertex => {
                if self.llm.vertex.project.as_deref().is_none_or(str::is_empty) {
                    return Err(QuillError::config("provider vertex requires llm.vertex.project"));
                }
                if self.llm.vertex.credentials_path.is_none()
                    && self.secrets.vertex_access_token.is_none()
                {
                    return Err(QuillError::config(format!(
                        "provider vertex requires llm.vertex.credentials_path or {VERTEX_ACCESS_TOKEN_VAR}"
                    )));
                }
            }
        }
        if self.llm.max_tokens == 0 {
            return Err(QuillError::config("llm.max_tokens must be at least 1"));
        }
        Ok(())
    }

    fn validate_store(&self) -> Result<(), QuillError> {
        if self.store.collection.trim().is_empty() {
            return Err(QuillError::config("store.collection must not be empty"));
        }
        if self.store.backend == StoreBackend::Supabase && self.secrets.supabase_key.is_none() {
            return Err(QuillError::config(format!(
                "store backend supabase requires {SUPABASE_KEY_VAR}"
            )));
        }
        Ok(())
    }
}
