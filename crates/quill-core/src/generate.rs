use std::collections::HashMap;
use std::sync::Arc;

use quill_llm::{LlmProvider, Message};
use serde::{Deserialize, Serialize};

use crate::error::QuillError;
use crate::sections::{DOCUMENTS_PLACEHOLDER, Section};

/// A drafted section ready for layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalSection {
    pub name: String,
    pub title: String,
    pub text: String,
}

/// Fill a section template with the retrieved text.
#[must_use]
pub fn render_prompt(template: &str, documents: &str) -> String {
    template.replace(DOCUMENTS_PLACEHOLDER, documents)
}

/// Drafts one section per call from a template and retrieved evidence.
pub struct SectionGenerator<P> {
    provider: Arc<P>,
    templates: HashMap<String, String>,
}

impl<P: LlmProvider> SectionGenerator<P> {
    pub fn new(provider: Arc<P>, templates: HashMap<String, String>) -> Self {
        Self {
            provider,
            templates,
        }
    }

    /// # Errors
    ///
    /// Returns [`QuillError::Configuration`] when no template exists for the
    /// section and [`QuillError::Remote`] when the completion call fails.
    pub async fn generate(
        &self,
        section: &Section,
        documents: &str,
    ) -> Result<ProposalSection, QuillError> {
        let template = self.templates.get(&section.name).ok_or_else(|| {
            QuillError::config(format!("no template for section {}", section.name))
        })?;
        let prompt = render_prompt(template, documents);

        let text = self.provider.chat(&[Message::user(prompt)]).await?;
        tracing::debug!(
            section = %section.name,
            provider = self.provider.name(),
            chars = text.len(),
            "section drafted"
        );

        Ok(ProposalSection {
            name: section.name.clone(),
            title: section.title.clone(),
            text,
        })
    }
}
