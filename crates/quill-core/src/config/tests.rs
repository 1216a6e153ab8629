use std::io::Write;
use std::path::PathBuf;

use quill_memory::document::Granularity;
use serial_test::serial;

use super::*;
use crate::vault::MockVaultProvider;

const ENV_KEYS: [&str; 25] = [
    "QUILL_LLM_PROVIDER",
    "QUILL_LLM_MODEL",
    "QUILL_LLM_EMBEDDING_MODEL",
    "QUILL_LLM_MAX_TOKENS",
    "QUILL_LLM_TEMPERATURE",
    "QUILL_OPENAI_BASE_URL",
    "QUILL_VERTEX_PROJECT",
    "QUILL_VERTEX_LOCATION",
    "QUILL_VERTEX_CREDENTIALS",
    "QUILL_STORE_BACKEND",
    "QUILL_STORE_URL",
    "QUILL_STORE_COLLECTION",
    "QUILL_INGEST_GRANULARITY",
    "QUILL_RETRIEVAL_TOP_K",
    "QUILL_PROPOSAL_SECTIONS",
    "QUILL_OUTPUT_PATH",
    "QUILL_STAGE_DELAY_MS",
    "QUILL_DEBUG_DIR",
    "QUILL_SEND_EMAIL",
    "QUILL_EMAIL_FROM",
    "QUILL_EMAIL_TO",
    "QUILL_SMTP_SERVER",
    "QUILL_SMTP_PORT",
    "QUILL_SMTP_USERNAME",
    "QUILL_OPENAI_API_KEY",
];

fn clear_env() {
    for key in ENV_KEYS {
        unsafe { std::env::remove_var(key) };
    }
}

fn with_openai_key(mut config: Config) -> Config {
    config.secrets.openai_api_key = Some(crate::vault::Secret::new("sk-test"));
    config
}

#[test]
fn defaults_match_original_behaviour() {
    let config = Config::default();
    assert_eq!(config.llm.provider, ProviderKind::OpenAi);
    assert_eq!(config.llm.model(), "gpt-4-turbo-preview");
    assert_eq!(config.llm.max_tokens, 2048);
    assert!((config.llm.temperature - 0.2).abs() < f32::EPSILON);
    assert_eq!(config.llm.vertex.model, "gemini-1.5-flash");
    assert_eq!(config.llm.vertex.embedding_model, "text-embedding-004");
    assert_eq!(config.store.backend, StoreBackend::Qdrant);
    assert_eq!(config.retrieval.top_k, 1);
    assert_eq!(config.ingest.granularity, Granularity::Page);
    assert_eq!(config.proposal.sections.len(), 5);
    assert_eq!(config.output.path, PathBuf::from("proposal_response.pdf"));
    assert_eq!(config.output.geometry.max_chars, 80);
    assert_eq!(config.pipeline.stage_delay_ms, 0);
    assert!(!config.pipeline.send_email);
    assert!(config.email.is_none());
}

#[test]
#[serial]
fn missing_file_gives_defaults() {
    clear_env();
    let config = Config::load(std::path::Path::new("/nonexistent/quill.toml")).unwrap();
    assert_eq!(config.store.collection, "documents");
}

#[test]
#[serial]
fn parses_toml_sections() {
    clear_env();
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"
[llm]
provider = "vertex"
max_tokens = 1024

[llm.vertex]
project = "acme-proposals"
location = "europe-west4"

[store]
backend = "supabase"
url = "https://acme.supabase.co"
collection = "proposal_docs"

[ingest]
granularity = "chunk"
encodings = ["utf-8", "latin1"]
chunk_size = 500
chunk_overlap = 50

[retrieval]
top_k = 4

[proposal]
sections = ["responses", "corporate_overview"]

[proposal.templates]
responses = "Answer each requirement: {{documents}}"

[output]
path = "out/bid.pdf"

[output.geometry]
max_chars = 90
top = 780

[pipeline]
stage_delay_ms = 250
debug_dir = "debug"
send_email = true

[email]
from = "proposals@acme.test"
to = "bids@agency.test"
smtp_server = "smtp.acme.test"
username = "proposals"
"#
    )
    .unwrap();

    let config = Config::load(file.path()).unwrap();
    assert_eq!(config.llm.provider, ProviderKind::Vertex);
    assert_eq!(config.llm.max_tokens, 1024);
    assert!((config.llm.temperature - 0.2).abs() < f32::EPSILON);
    assert_eq!(config.llm.vertex.project.as_deref(), Some("acme-proposals"));
    assert_eq!(config.llm.vertex.location, "europe-west4");
    assert_eq!(config.llm.model(), "gemini-1.5-flash");
    assert_eq!(config.store.backend, StoreBackend::Supabase);
    assert_eq!(config.ingest.granularity, Granularity::Chunk);
    assert_eq!(config.ingest.encodings, ["utf-8", "latin1"]);
    assert_eq!(config.retrieval.top_k, 4);
    assert_eq!(config.proposal.sections, ["responses", "corporate_overview"]);
    assert_eq!(
        config.proposal.templates["responses"],
        "Answer each requirement: {documents}"
    );
    assert_eq!(config.output.path, PathBuf::from("out/bid.pdf"));
    assert_eq!(config.output.geometry.max_chars, 90);
    assert!((config.output.geometry.top - 780.0).abs() < f32::EPSILON);
    assert!((config.output.geometry.left_margin - 50.0).abs() < f32::EPSILON);
    assert_eq!(config.pipeline.stage_delay_ms, 250);
    assert_eq!(config.pipeline.debug_dir, Some(PathBuf::from("debug")));

    let email = config.email.unwrap();
    assert_eq!(email.smtp_port, 587);
    assert_eq!(email.subject, "Proposal Response");
}

#[test]
#[serial]
fn invalid_toml_is_an_error() {
    clear_env();
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "[retrieval]\ntop_k = \"many\"\n").unwrap();
    let err = Config::load(file.path()).unwrap_err();
    assert!(err.to_string().contains("failed to parse config file"));
}

#[test]
#[serial]
fn env_overrides_apply_after_file() {
    clear_env();
    unsafe {
        std::env::set_var("QUILL_LLM_PROVIDER", "vertex");
        std::env::set_var("QUILL_LLM_MODEL", "gemini-1.5-pro");
        std::env::set_var("QUILL_VERTEX_PROJECT", "env-project");
        std::env::set_var("QUILL_STORE_BACKEND", "memory");
        std::env::set_var("QUILL_RETRIEVAL_TOP_K", "5");
        std::env::set_var("QUILL_PROPOSAL_SECTIONS", "staff_profile, responses");
        std::env::set_var("QUILL_INGEST_GRANULARITY", "file");
        std::env::set_var("QUILL_SEND_EMAIL", "true");
        std::env::set_var("QUILL_STAGE_DELAY_MS", "100");
    }
    let config = Config::load(std::path::Path::new("/nonexistent/quill.toml")).unwrap();
    clear_env();

    assert_eq!(config.llm.provider, ProviderKind::Vertex);
    assert_eq!(config.llm.vertex.model, "gemini-1.5-pro");
    assert_eq!(config.llm.openai.model, "gpt-4-turbo-preview");
    assert_eq!(config.llm.vertex.project.as_deref(), Some("env-project"));
    assert_eq!(config.store.backend, StoreBackend::Memory);
    assert_eq!(config.retrieval.top_k, 5);
    assert_eq!(config.proposal.sections, ["staff_profile", "responses"]);
    assert_eq!(config.ingest.granularity, Granularity::File);
    assert!(config.pipeline.send_email);
    assert_eq!(config.pipeline.stage_delay_ms, 100);
}

#[test]
#[serial]
fn invalid_env_values_are_ignored() {
    clear_env();
    unsafe {
        std::env::set_var("QUILL_LLM_PROVIDER", "ollama");
        std::env::set_var("QUILL_RETRIEVAL_TOP_K", "lots");
    }
    let config = Config::load(std::path::Path::new("/nonexistent/quill.toml")).unwrap();
    clear_env();
    assert_eq!(config.llm.provider, ProviderKind::OpenAi);
    assert_eq!(config.retrieval.top_k, 1);
}

#[test]
#[serial]
fn email_section_created_from_env() {
    clear_env();
    unsafe {
        std::env::set_var("QUILL_EMAIL_FROM", "a@acme.test");
        std::env::set_var("QUILL_EMAIL_TO", "b@agency.test");
        std::env::set_var("QUILL_SMTP_SERVER", "smtp.acme.test");
        std::env::set_var("QUILL_SMTP_USERNAME", "a");
        std::env::set_var("QUILL_SMTP_PORT", "2525");
    }
    let config = Config::load(std::path::Path::new("/nonexistent/quill.toml")).unwrap();
    clear_env();
    let email = config.email.unwrap();
    assert_eq!(email.smtp_server, "smtp.acme.test");
    assert_eq!(email.smtp_port, 2525);
}

#[test]
#[serial]
fn partial_email_env_does_not_create_section() {
    clear_env();
    unsafe { std::env::set_var("QUILL_SMTP_SERVER", "smtp.acme.test") };
    let config = Config::load(std::path::Path::new("/nonexistent/quill.toml")).unwrap();
    clear_env();
    assert!(config.email.is_none());
}

#[tokio::test]
async fn secrets_resolve_from_vault() {
    let vault = MockVaultProvider::new()
        .with_secret(OPENAI_API_KEY_VAR, "sk-test")
        .with_secret(SMTP_PASSWORD_VAR, "hunter2");
    let mut config = Config::default();
    config.resolve_secrets(&vault).await.unwrap();
    assert_eq!(
        config.secrets.openai_api_key.as_ref().map(crate::vault::Secret::expose),
        Some("sk-test")
    );
    assert_eq!(format!("{:?}", config.secrets.smtp_password), "Some([REDACTED])");
    assert!(config.secrets.supabase_key.is_none());
}

#[test]
fn validate_accepts_defaults_with_key() {
    assert!(with_openai_key(Config::default()).validate().is_ok());
}

#[test]
fn validate_rejects_missing_credentials() {
    let err = Config::default().validate().unwrap_err();
    assert!(err.is_configuration());

    let mut config = with_openai_key(Config::default());
    config.llm.provider = ProviderKind::Vertex;
    config.llm.vertex.project = Some("p".into());
    assert!(config.validate().is_err());
    config.llm.vertex.credentials_path = Some("/keys/sa.json".into());
    assert!(config.validate().is_ok());

    let mut config = with_openai_key(Config::default());
    config.store.backend = StoreBackend::Supabase;
    assert!(config.validate().is_err());
}

#[test]
fn validate_rejects_zero_top_k() {
    let mut config = with_openai_key(Config::default());
    config.retrieval.top_k = 0;
    assert!(config.validate().unwrap_err().to_string().contains("top_k"));
}

#[test]
fn validate_rejects_unknown_section() {
    let mut config = with_openai_key(Config::default());
    config.proposal.sections.push("pricing".into());
    assert!(config.validate().unwrap_err().to_string().contains("pricing"));
}

#[test]
fn validate_rejects_impossible_geometry() {
    let mut config = with_openai_key(Config::default());
    config.output.geometry.bottom_margin = 900.0;
    assert!(config.validate().unwrap_err().to_string().contains("geometry"));
}

#[test]
fn validate_rejects_bad_chunking() {
    let mut config = with_openai_key(Config::default());
    config.ingest.granularity = Granularity::Chunk;
    config.ingest.chunk_overlap = config.ingest.chunk_size;
    assert!(config.validate().is_err());
}

#[test]
fn validate_leaves_smtp_password_to_the_notifier() {
    let mut config = with_openai_key(Config::default());
    config.pipeline.send_email = true;
    config.email = Some(EmailConfig::new(
        "a@acme.test".into(),
        "b@agency.test".into(),
        "smtp.acme.test".into(),
        "a".into(),
    ));
    assert!(config.secrets.smtp_password.is_none());
    assert!(config.validate().is_ok());
}

#[test]
fn validate_rejects_malformed_email_addresses() {
    let email = |from: &str, to: &str| {
        Some(EmailConfig::new(
            from.into(),
            to.into(),
            "smtp.acme.test".into(),
            "a".into(),
        ))
    };
    let mut config = with_openai_key(Config::default());

    config.email = email("Acme Bids <bids@acme.test>", "rfp@agency.test");
    assert!(config.validate().is_ok());

    config.email = email("not an address", "rfp@agency.test");
    let err = config.validate().unwrap_err();
    assert!(err.is_configuration());
    assert!(err.to_string().contains("email.from"));

    config.email = email("bids@acme.test", "rfp@agency.test, cc@agency.test");
    assert!(config.validate().unwrap_err().to_string().contains("email.to"));
}

#[test]
#[serial]
fn shipped_default_file_matches_builtin_defaults() {
    clear_env();
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../config/default.toml");
    let config = Config::load(&path).unwrap();
    let builtin = Config::default();

    assert_eq!(config.llm.provider, builtin.llm.provider);
    assert_eq!(config.llm.openai.model, builtin.llm.openai.model);
    assert_eq!(config.llm.vertex.model, builtin.llm.vertex.model);
    assert_eq!(config.store.url, builtin.store.url);
    assert_eq!(config.store.collection, builtin.store.collection);
    assert_eq!(config.ingest.granularity, builtin.ingest.granularity);
    assert_eq!(config.proposal.sections, builtin.proposal.sections);
    assert_eq!(config.output.geometry, builtin.output.geometry);
    assert!(config.email.is_none());
}
