use std::sync::Arc;

use quill_llm::LlmProvider;

use super::record::{Assembled, Delivered, Drafted, Evidence, RunRequest};
use super::step::Step;
use super::{PipelineError, StageContext};
use crate::assemble::DocumentAssembler;
use crate::generate::SectionGenerator;
use crate::notify::Notifier;
use crate::observe::RunEvent;
use crate::retrieval::Retriever;
use crate::sections::{EvidenceQuery, OPPORTUNITY_KEY, Section};

/// Runs one evidence query and records its result set.
pub struct RetrieveStep<P> {
    query: EvidenceQuery,
    retriever: Arc<Retriever<P>>,
    ctx: Arc<StageContext>,
}

impl<P: LlmProvider> RetrieveStep<P> {
    pub fn new(query: EvidenceQuery, retriever: Arc<Retriever<P>>, ctx: Arc<StageContext>) -> Self {
        Self {
            query,
            retriever,
            ctx,
        }
    }
}

impl<P: LlmProvider> Step for RetrieveStep<P> {
    type Input = Evidence;
    type Output = Evidence;

    fn name(&self) -> &'static str {
        "retrieve"
    }

    async fn run(&self, evidence: Evidence) -> Result<Evidence, PipelineError> {
        let query = if self.query.is_derived() {
            self.query.render(&evidence.text(OPPORTUNITY_KEY)?)
        } else {
            self.query.query.clone()
        };

        self.ctx.throttle.wait().await;
        let records = self
            .retriever
            .retrieve(&query)
            .await
            .map_err(PipelineError::in_stage(self.name()))?;

        self.ctx.dump(&self.query.key, &records).await;
        self.ctx.observer.on_event(&RunEvent::EvidenceRetrieved {
            key: self.query.key.clone(),
            records: records.len(),
        });
        evidence.with(&self.query.key, records)
    }
}

/// Every retrieval the enabled sections need, in dependency order.
pub struct RetrievalPlan<P> {
    steps: Vec<RetrieveStep<P>>,
    ctx: Arc<StageContext>,
}

impl<P: LlmProvider> RetrievalPlan<P> {
    pub fn new(steps: Vec<RetrieveStep<P>>, ctx: Arc<StageContext>) -> Self {
        Self { steps, ctx }
    }
}

impl<P: LlmProvider> Step for RetrievalPlan<P> {
    type Input = RunRequest;
    type Output = Evidence;

    fn name(&self) -> &'static str {
        "retrieve"
    }

    async fn run(&self, request: RunRequest) -> Result<Evidence, PipelineError> {
        let started = self.ctx.started(self.name());
        let mut evidence = Evidence::new(request);
        for step in &self.steps {
            evidence = step.run(evidence).await?;
        }
        self.ctx.finished(self.name(), started);
        Ok(evidence)
    }
}

/// Drafts each enabled section from its evidence.
pub struct DraftStep<P> {
    sections: Vec<Section>,
    generator: SectionGenerator<P>,
    ctx: Arc<StageContext>,
}

impl<P: LlmProvider> DraftStep<P> {
    pub fn new(sections: Vec<Section>, generator: SectionGenerator<P>, ctx: Arc<StageContext>) -> Self {
        Self {
            sections,
            generator,
            ctx,
        }
    }
}

impl<P: LlmProvider> Step for DraftStep<P> {
    type Input = Evidence;
    type Output = Drafted;

    fn name(&self) -> &'static str {
        "draft"
    }

    async fn run(&self, evidence: Evidence) -> Result<Drafted, PipelineError> {
        let started = self.ctx.started(self.name());
        let mut sections = Vec::with_capacity(self.sections.len());
        for section in &self.sections {
            let documents = evidence.text(&section.evidence_key)?;
            self.ctx.throttle.wait().await;
            let drafted = self
                .generator
                .generate(section, &documents)
                .await
                .map_err(PipelineError::in_stage(self.name()))?;
            self.ctx.observer.on_event(&RunEvent::SectionDrafted {
                section: drafted.name.clone(),
                chars: drafted.text.chars().count(),
            });
            sections.push(drafted);
        }
        self.ctx.finished(self.name(), started);
        Ok(Drafted { evidence, sections })
    }
}

pub struct AssembleStep {
    assembler: DocumentAssembler,
    ctx: Arc<StageContext>,
}

impl AssembleStep {
    #[must_use]
    pub fn new(assembler: DocumentAssembler, ctx: Arc<StageContext>) -> Self {
        Self { assembler, ctx }
    }
}

impl Step for AssembleStep {
    type Input = Drafted;
    type Output = Assembled;

    fn name(&self) -> &'static str {
        "assemble"
    }

    async fn run(&self, drafted: Drafted) -> Result<Assembled, PipelineError> {
        let started = self.ctx.started(self.name());
        let document = self
            .assembler
            .assemble(&drafted.sections)
            .await
            .map_err(PipelineError::in_stage(self.name()))?;
        self.ctx.observer.on_event(&RunEvent::DocumentAssembled {
            path: document.path.display().to_string(),
            pages: document.pages,
        });
        self.ctx.finished(self.name(), started);
        Ok(Assembled { drafted, document })
    }
}

pub struct NotifyStep {
    notifier: Notifier,
    ctx: Arc<StageContext>,
}

impl NotifyStep {
    #[must_use]
    pub fn new(notifier: Notifier, ctx: Arc<StageContext>) -> Self {
        Self { notifier, ctx }
    }
}

impl Step for NotifyStep {
    type Input = Assembled;
    type Output = Delivered;

    fn name(&self) -> &'static str {
        "notify"
    }

    async fn run(&self, assembled: Assembled) -> Result<Delivered, PipelineError> {
        let started = self.ctx.started(self.name());
        let send = assembled.drafted.evidence.request().send_email;
        if send {
            self.ctx.throttle.wait().await;
        }
        let emailed = self
            .notifier
            .notify(&assembled.document.path, send)
            .await
            .map_err(PipelineError::in_stage(self.name()))?;
        self.ctx.finished(self.name(), started);
        Ok(Delivered { assembled, emailed })
    }
}
