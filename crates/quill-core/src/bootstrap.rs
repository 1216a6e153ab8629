//! Turning a validated [`Config`] into live providers, stores and notifiers.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use quill_llm::openai::OpenAiProvider;
use quill_llm::vertex::{ServiceAccountAuth, VertexAuth, VertexProvider};
use quill_llm::{AnyProvider, CompletionParams};
use quill_memory::{InMemoryVectorStore, QdrantOps, SupabaseStore, VectorStore};

use crate::config::{
    Config, OPENAI_API_KEY_VAR, ProviderKind, SMTP_PASSWORD_VAR, StoreBackend,
    SUPABASE_KEY_VAR, VERTEX_ACCESS_TOKEN_VAR,
};
use crate::error::QuillError;
use crate::notify::{Notifier, SmtpMailer};
use crate::observe::Observer;
use crate::vault::{EnvVaultProvider, VaultProvider};

pub const CONFIG_ENV_VAR: &str = "QUILL_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Priority: explicit `--config` > `QUILL_CONFIG` > `config/default.toml`.
#[must_use]
pub fn resolve_config_path(cli: Option<&Path>) -> PathBuf {
    if let Some(path) = cli {
        return path.to_path_buf();
    }
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        return PathBuf::from(path);
    }
    PathBuf::from(DEFAULT_CONFIG_PATH)
}

/// Load the file, apply env overrides, resolve secrets and validate.
///
/// # Errors
///
/// Returns an error if the file cannot be parsed, the vault fails, or
/// validation rejects the result.
pub async fn load_config(path: &Path, vault: &dyn VaultProvider) -> anyhow::Result<Config> {
    let mut config = Config::load(path)?;
    config
        .resolve_secrets(vault)
        .await
        .context("failed to resolve secrets")?;
    config.validate()?;
    tracing::debug!(
        path = %path.display(),
        provider = %config.llm.provider,
        store = %config.store.backend,
        "configuration loaded"
    );
    Ok(config)
}

/// [`load_config`] with secrets read from the environment.
///
/// # Errors
///
/// See [`load_config`].
pub async fn load_config_from_env(path: &Path) -> anyhow::Result<Config> {
    load_config(path, &EnvVaultProvider).await
}

fn completion_params(config: &Config) -> CompletionParams {
    CompletionParams {
        max_tokens: config.llm.max_tokens,
        temperature: config.llm.temperature,
    }
}

/// # Errors
///
/// Returns [`QuillError::Configuration`] when credentials for the selected
/// provider are missing or the service-account key cannot be found.
pub fn create_provider(config: &Config) -> Result<AnyProvider, QuillError> {
    match config.llm.provider {
        ProviderKind::OpenAi => {
            let key = config.secrets.openai_api_key.as_ref().ok_or_else(|| {
                QuillError::config(format!("provider openai requires {OPENAI_API_KEY_VAR}"))
            })?;
            let openai = &config.llm.openai;
            Ok(AnyProvider::OpenAi(OpenAiProvider::new(
                key.expose().to_owned(),
                openai.base_url.clone(),
                openai.model.clone(),
                completion_params(config),
                Some(openai.embedding_model.clone()),
            )))
        }
        ProviderKind::Vertex => {
            let vertex = &config.llm.vertex;
            let project = vertex
                .project
                .clone()
                .ok_or_else(|| QuillError::config("provider vertex requires llm.vertex.project"))?;
            let auth = if let Some(token) = &config.secrets.vertex_access_token {
                VertexAuth::Static(token.expose().to_owned())
            } else if let Some(path) = &vertex.credentials_path {
                VertexAuth::ServiceAccount(
                    ServiceAccountAuth::new(path).map_err(|e| QuillError::config(e.to_string()))?,
                )
            } else {
                return Err(QuillError::config(format!(
                    "provider vertex requires llm.vertex.credentials_path or {VERTEX_ACCESS_TOKEN_VAR}"
                )));
            };
            let mut provider = VertexProvider::new(
                auth,
                project,
                vertex.location.clone(),
                vertex.model.clone(),
                completion_params(config),
                Some(vertex.embedding_model.clone()),
            );
            if let Some(endpoint) = &vertex.endpoint {
                provider = provider.with_endpoint_base(endpoint.clone());
            }
            Ok(AnyProvider::Vertex(provider))
        }
    }
}

/// # Errors
///
/// Returns [`QuillError::Configuration`] for a missing Supabase key or an
/// unusable store URL.
pub fn create_store(config: &Config) -> Result<Arc<dyn VectorStore>, QuillError> {
    let store: Arc<dyn VectorStore> = match config.store.backend {
        StoreBackend::Qdrant => {
            let api_key = config
                .secrets
                .qdrant_api_key
                .as_ref()
                .map(|s| s.expose().to_owned());
            Arc::new(
                QdrantOps::new(&config.store.url, api_key)
                    .map_err(|e| QuillError::config(format!("invalid Qdrant settings: {e}")))?,
            )
        }
        StoreBackend::Supabase => {
            let key = config.secrets.supabase_key.as_ref().ok_or_else(|| {
                QuillError::config(format!("store backend supabase requires {SUPABASE_KEY_VAR}"))
            })?;
            Arc::new(
                SupabaseStore::new(
                    config.store.url.clone(),
                    key.expose().to_owned(),
                    config.store.match_function.clone(),
                )
                .map_err(|e| QuillError::config(format!("invalid Supabase settings: {e}")))?,
            )
        }
        StoreBackend::Memory => {
            tracing::warn!("in-memory store selected; indexed records are lost on exit");
            Arc::new(InMemoryVectorStore::new())
        }
    };
    Ok(store)
}

/// A notifier backed by SMTP when `[email]` is configured, otherwise a no-op.
///
/// # Errors
///
/// Returns [`QuillError::Configuration`] if email is configured without a
/// password or with an invalid relay host.
pub fn create_notifier(
    config: &Config,
    observer: Arc<dyn Observer>,
) -> Result<Notifier, QuillError> {
    let Some(email) = &config.email else {
        return Ok(Notifier::disabled(observer));
    };
    let Some(password) = &config.secrets.smtp_password else {
        if config.pipeline.send_email {
            return Err(QuillError::config(format!(
                "email delivery requires {SMTP_PASSWORD_VAR}"
            )));
        }
        return Ok(Notifier::disabled(observer));
    };
    let mailer = SmtpMailer::new(email, password)?;
    Ok(Notifier::new(email.clone(), Arc::new(mailer), observer))
}
