//! Typed, strictly sequential proposal pipeline:
//! `RunRequest -> Evidence -> Drafted -> Assembled -> Delivered`.

pub mod builder;
pub mod record;
pub mod stages;
pub mod step;

pub use builder::{Chain, Pipeline, Start};
pub use record::{Assembled, Delivered, Drafted, Evidence, RunRequest};
pub use stages::{AssembleStep, DraftStep, NotifyStep, RetrievalPlan, RetrieveStep};
pub use step::Step;

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use quill_llm::LlmProvider;
use quill_memory::VectorStore;

use crate::assemble::DocumentAssembler;
use crate::config::Config;
use crate::error::QuillError;
use crate::generate::SectionGenerator;
use crate::notify::Notifier;
use crate::observe::{Observer, RunEvent};
use crate::retrieval::{RetrievedRecord, Retriever};
use crate::sections::SectionCatalog;

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("{stage} stage failed: {source}")]
    Stage {
        stage: &'static str,
        #[source]
        source: QuillError,
    },

    #[error("evidence for {0} was already recorded")]
    DuplicateEvidence(String),

    #[error("no evidence recorded for {0}")]
    MissingEvidence(String),
}

impl PipelineError {
    pub fn in_stage(stage: &'static str) -> impl FnOnce(QuillError) -> Self {
        move |source| Self::Stage { stage, source }
    }

    /// The underlying error when a stage failed on an external call or setting.
    #[must_use]
    pub fn quill_error(&self) -> Option<&QuillError> {
        match self {
            Self::Stage { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Sleeps before every call after the first.
#[derive(Debug)]
pub struct Throttle {
    delay: Duration,
    armed: AtomicBool,
}

impl Throttle {
    #[must_use]
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            armed: AtomicBool::new(false),
        }
    }

    pub async fn wait(&self) {
        let already_called = self.armed.swap(true, Ordering::SeqCst);
        if already_called && !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
    }
}

/// State shared by the stages of one run.
pub struct StageContext {
    pub observer: Arc<dyn Observer>,
    pub throttle: Throttle,
    pub debug_dir: Option<PathBuf>,
}

impl StageContext {
    #[must_use]
    pub fn new(observer: Arc<dyn Observer>, stage_delay: Duration, debug_dir: Option<PathBuf>) -> Self {
        Self {
            observer,
            throttle: Throttle::new(stage_delay),
            debug_dir,
        }
    }

    fn started(&self, stage: &'static str) -> Instant {
        self.observer.on_event(&RunEvent::StageStarted { stage });
        Instant::now()
    }

    fn finished(&self, stage: &'static str, started: Instant) {
        self.observer.on_event(&RunEvent::StageFinished {
            stage,
            elapsed: started.elapsed(),
        });
    }

    /// Write a result set to `<debug_dir>/<key>.json`. Failures are logged only.
    async fn dump(&self, key: &str, records: &[RetrievedRecord]) {
        let Some(dir) = &self.debug_dir else {
            return;
        };
        let json = match serde_json::to_vec_pretty(records) {
            Ok(json) => json,
            Err(e) => {
                tracing::warn!(key, "failed to serialize evidence dump: {e}");
                return;
            }
        };
        if let Err(e) = tokio::fs::create_dir_all(dir).await {
            tracing::warn!(dir = %dir.display(), "failed to create debug dir: {e}");
            return;
        }
        let path = dir.join(format!("{key}.json"));
        if let Err(e) = tokio::fs::write(&path, json).await {
            tracing::warn!(path = %path.display(), "failed to write evidence dump: {e}");
        }
    }
}

pub type ProposalPipeline<P> = Pipeline<
    Chain<Chain<Chain<Start<RetrievalPlan<P>>, DraftStep<P>>, AssembleStep>, NotifyStep>,
>;

/// Wire the full proposal run from configuration.
///
/// # Errors
///
/// Returns [`QuillError::Configuration`] if the section list is invalid.
pub fn proposal_pipeline<P: LlmProvider>(
    config: &Config,
    provider: Arc<P>,
    store: Arc<dyn VectorStore>,
    notifier: Notifier,
    observer: Arc<dyn Observer>,
) -> Result<ProposalPipeline<P>, QuillError> {
    let catalog = SectionCatalog::from_config(&config.proposal)?;
    let ctx = Arc::new(StageContext::new(
        observer,
        Duration::from_millis(config.pipeline.stage_delay_ms),
        config.pipeline.debug_dir.clone(),
    ));

    let retriever = Arc::new(Retriever::new(
        Arc::clone(&provider),
        store,
        config.store.collection.clone(),
        config.retrieval.top_k,
    ));
    let retrievals = catalog
        .evidence_plan()
        .into_iter()
        .map(|query| RetrieveStep::new(query, Arc::clone(&retriever), Arc::clone(&ctx)))
        .collect();

    let generator = SectionGenerator::new(provider, catalog.templates().clone());
    let assembler =
        DocumentAssembler::new(config.output.geometry.clone(), config.output.path.clone());

    Ok(Pipeline::start(RetrievalPlan::new(retrievals, Arc::clone(&ctx)))
        .step(DraftStep::new(
            catalog.sections().to_vec(),
            generator,
            Arc::clone(&ctx),
        ))
        .step(AssembleStep::new(assembler, Arc::clone(&ctx)))
        .step(NotifyStep::new(notifier, ctx)))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use quill_llm::mock::MockProvider;
    use quill_memory::document::types::CONTENT_KEY;
    use quill_memory::{InMemoryVectorStore, VectorPoint};

    use super::*;
    use crate::notify::RecordingTransport;
    use crate::observe::{MetricsCollector, TracingObserver};

    struct AddSuffix {
        suffix: String,
    }

    impl Step for AddSuffix {
        type Input = String;
        type Output = String;

        fn name(&self) -> &'static str {
            "suffix"
        }

        async fn run(&self, input: Self::Input) -> Result<Self::Output, PipelineError> {
            Ok(format!("{input}{}", self.suffix))
        }
    }

    struct ParseLen;

    impl Step for ParseLen {
        type Input = String;
        type Output = usize;

        fn name(&self) -> &'static str {
            "len"
        }

        async fn run(&self, input: Self::Input) -> Result<Self::Output, PipelineError> {
            Ok(input.len())
        }
    }

    struct FailStep;

    impl Step for FailStep {
        type Input = String;
        type Output = String;

        fn name(&self) -> &'static str {
            "fail"
        }

        async fn run(&self, _input: Self::Input) -> Result<Self::Output, PipelineError> {
            Err(PipelineError::MissingEvidence("boom".into()))
        }
    }

    #[tokio::test]
    async fn heterogeneous_chain_runs_in_order() {
        let pipeline = Pipeline::start(AddSuffix {
            suffix: "abc".into(),
        })
        .step(AddSuffix { suffix: "d".into() })
        .step(ParseLen);
        assert_eq!(pipeline.stages(), ["suffix", "suffix", "len"]);
        assert_eq!(pipeline.run(String::new()).await.unwrap(), 4);
    }

    #[tokio::test]
    async fn error_stops_later_steps() {
        let result = Pipeline::start(FailStep)
            .step(ParseLen)
            .run("hi".into())
            .await;
        assert!(result.unwrap_err().to_string().contains("boom"));
    }

    #[tokio::test]
    async fn throttle_skips_first_call_only() {
        let throttle = Throttle::new(Duration::from_millis(20));
        let start = Instant::now();
        throttle.wait().await;
        assert!(start.elapsed() < Duration::from_millis(20));
        throttle.wait().await;
        throttle.wait().await;
        assert!(start.elapsed() >= Duration::from_millis(40));
    }

    async fn corpus(provider: &MockProvider) -> Arc<InMemoryVectorStore> {
        let store = Arc::new(InMemoryVectorStore::new());
        store.ensure_collection("documents", 64).await.unwrap();
        let texts = [
            "opportunity requirements scope objectives criteria for bridge inspection",
            "company overview history mission values",
            "staff profiles expertise qualifications experience",
        ];
        let mut points = Vec::new();
        for (i, text) in texts.iter().enumerate() {
            points.push(VectorPoint {
                id: format!("doc{i}"),
                vector: provider.embed(text).await.unwrap(),
                payload: HashMap::from([(CONTENT_KEY.to_owned(), serde_json::json!(text))]),
            });
        }
        store.upsert("documents", points).await.unwrap();
        store
    }

    fn test_config(dir: &std::path::Path, sections: &[&str]) -> Config {
        let mut config = Config::default();
        config.proposal.sections = sections.iter().map(|s| (*s).to_owned()).collect();
        config.output.path = dir.join("proposal_response.pdf");
        config.pipeline.debug_dir = Some(dir.join("debug"));
        config
    }

    #[tokio::test]
    async fn full_run_writes_pdf_and_debug_dumps() {
        let dir = tempfile::tempdir().unwrap();
        let provider = Arc::new(MockProvider::default());
        let store = corpus(&provider).await;
        let config = test_config(dir.path(), &["corporate_overview", "capabilities"]);
        let (metrics, rx) = MetricsCollector::new();
        let observer: Arc<dyn Observer> = Arc::new(metrics);

        let pipeline = proposal_pipeline(
            &config,
            Arc::clone(&provider),
            store,
            Notifier::disabled(Arc::clone(&observer)),
            observer,
        )
        .unwrap();
        assert_eq!(pipeline.stages(), ["retrieve", "draft", "assemble", "notify"]);

        let delivered = pipeline
            .run(RunRequest { send_email: false })
            .await
            .unwrap();

        assert!(!delivered.emailed);
        assert_eq!(delivered.sections().len(), 2);
        assert!(delivered.document().path.exists());
        assert_eq!(
            delivered.evidence().keys().collect::<Vec<_>>(),
            ["capabilities", "corporate", "opportunity"]
        );
        assert!(dir.path().join("debug").join("opportunity.json").exists());

        let prompts = provider.prompts();
        assert_eq!(prompts.len(), 2);
        assert!(prompts[0].contains("company overview history mission values"));

        let m = rx.borrow().clone();
        assert_eq!(m.sections_drafted, 2);
        assert_eq!(m.evidence_sets, 3);
        assert_eq!(m.stages_completed, ["retrieve", "draft", "assemble", "notify"]);
    }

    #[tokio::test]
    async fn send_flag_emails_the_pdf() {
        let dir = tempfile::tempdir().unwrap();
        let provider = Arc::new(MockProvider::default());
        let store = corpus(&provider).await;
        let config = test_config(dir.path(), &["responses"]);
        let transport = Arc::new(RecordingTransport::new());
        let observer: Arc<dyn Observer> = Arc::new(TracingObserver);
        let email = crate::config::EmailConfig::new(
            "proposals@acme.test".into(),
            "bids@agency.test".into(),
            "smtp.acme.test".into(),
            "proposals".into(),
        );

        let pipeline = proposal_pipeline(
            &config,
            provider,
            store,
            Notifier::new(email, transport.clone(), Arc::clone(&observer)),
            observer,
        )
        .unwrap();
        let delivered = pipeline.run(RunRequest { send_email: true }).await.unwrap();

        assert!(delivered.emailed);
        assert_eq!(transport.sent().len(), 1);
        assert_eq!(transport.sent()[0].attachment_name, "proposal_response.pdf");
    }

    #[tokio::test]
    async fn llm_failure_aborts_before_assembly() {
        let dir = tempfile::tempdir().unwrap();
        let seed = MockProvider::default();
        let store = corpus(&seed).await;
        let config = test_config(dir.path(), &["staff_profile"]);
        let observer: Arc<dyn Observer> = Arc::new(TracingObserver);

        let pipeline = proposal_pipeline(
            &config,
            Arc::new(MockProvider::failing()),
            store,
            Notifier::disabled(Arc::clone(&observer)),
            observer,
        )
        .unwrap();
        let err = pipeline.run(RunRequest::default()).await.unwrap_err();

        assert!(matches!(err, PipelineError::Stage { stage: "draft", .. }));
        assert!(err.quill_error().is_some_and(QuillError::is_remote));
        assert!(!config.output.path.exists());
    }
}
