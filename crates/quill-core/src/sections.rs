//! Built-in proposal sections, the retrieval query behind each one, and the
//! catalog that merges them with configured overrides.

use std::collections::HashMap;

use serde::Serialize;

use crate::config::ProposalConfig;
use crate::error::QuillError;

pub const DOCUMENTS_PLACEHOLDER: &str = "{documents}";
pub const OPPORTUNITY_PLACEHOLDER: &str = "{opportunity}";
pub const OPPORTUNITY_KEY: &str = "opportunity";

#[derive(Debug, Clone, Copy)]
pub struct BuiltinSection {
    pub name: &'static str,
    pub evidence_key: &'static str,
    pub template: &'static str,
}

pub const BUILTIN_SECTIONS: &[BuiltinSection] = &[
    BuiltinSection {
        name: "corporate_overview",
        evidence_key: "corporate",
        template: "Write a comprehensive corporate overview based on: {documents}",
    },
    BuiltinSection {
        name: "staff_profile",
        evidence_key: "staff",
        template: "Create detailed staff profiles highlighting relevant expertise based on: {documents}",
    },
    BuiltinSection {
        name: "capabilities",
        evidence_key: "capabilities",
        template: "Describe capabilities relevant to the opportunity requirements based on: {documents}",
    },
    BuiltinSection {
        name: "experience",
        evidence_key: "experience",
        template: "Detail relevant corporate experience and past projects based on: {documents}",
    },
    BuiltinSection {
        name: "responses",
        evidence_key: OPPORTUNITY_KEY,
        template: "Provide specific responses to opportunity questions and requirements based on: {documents}",
    },
];

/// Evidence key and query text. `{opportunity}` in the query is replaced by
/// the retrieved opportunity text at run time.
pub const BUILTIN_QUERIES: &[(&str, &str)] = &[
    (
        OPPORTUNITY_KEY,
        "opportunity requirements scope objectives criteria",
    ),
    ("corporate", "company overview history mission values"),
    ("staff", "staff profiles expertise qualifications experience"),
    (
        "capabilities",
        "capabilities and competencies relevant to: {opportunity}",
    ),
    (
        "experience",
        "past projects and experience relevant to: {opportunity}",
    ),
];

/// Display title used as the section heading: `staff_profile` -> `STAFF PROFILE`.
#[must_use]
pub fn display_title(name: &str) -> String {
    name.replace('_', " ").to_uppercase()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Section {
    pub name: String,
    pub title: String,
    pub evidence_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EvidenceQuery {
    pub key: String,
    pub query: String,
}

impl EvidenceQuery {
    /// Whether the query text depends on the opportunity result set.
    #[must_use]
    pub fn is_derived(&self) -> bool {
        self.query.contains(OPPORTUNITY_PLACEHOLDER)
    }

    #[must_use]
    pub fn render(&self, opportunity: &str) -> String {
        self.query.replace(OPPORTUNITY_PLACEHOLDER, opportunity)
    }
}

/// Enabled sections in document order plus the templates and queries they need.
#[derive(Debug, Clone)]
pub struct SectionCatalog {
    sections: Vec<Section>,
    templates: HashMap<String, String>,
    queries: HashMap<String, String>,
}

impl SectionCatalog {
    /// # Errors
    ///
    /// Returns [`QuillError::Configuration`] for an empty or duplicated section
    /// list, a section with no template, an evidence key with no query, or an
    /// opportunity query that refers to its own result.
    pub fn from_config(config: &ProposalConfig) -> Result<Self, QuillError> {
        let mut templates: HashMap<String, String> = BUILTIN_SECTIONS
            .iter()
            .map(|s| (s.name.to_owned(), s.template.to_owned()))
            .collect();
        templates.extend(config.templates.clone());

        let mut queries: HashMap<String, String> = BUILTIN_QUERIES
            .iter()
            .map(|(k, q)| ((*k).to_owned(), (*q).to_owned()))
            .collect();
        queries.extend(config.queries.clone());
        if queries
            .get(OPPORTUNITY_KEY)
            .is_some_and(|q| q.contains(OPPORTUNITY_PLACEHOLDER))
        {
            return Err(QuillError::config(format!(
                "proposal.queries.{OPPORTUNITY_KEY} cannot contain {OPPORTUNITY_PLACEHOLDER}"
            )));
        }

        if config.sections.is_empty() {
            return Err(QuillError::config("proposal.sections must not be empty"));
        }

        let mut sections: Vec<Section> = Vec::with_capacity(config.sections.len());
        for name in &config.sections {
            if sections.iter().any(|s| &s.name == name) {
                return Err(QuillError::config(format!("section listed twice: {name}")));
            }
            if !templates.contains_key(name) {
                return Err(QuillError::config(format!(
                    "unknown section {name}: no built-in or configured template"
                )));
            }
            let evidence_key = BUILTIN_SECTIONS
                .iter()
                .find(|s| s.name == name)
                .map_or_else(|| name.clone(), |s| s.evidence_key.to_owned());
            if !queries.contains_key(&evidence_key) {
                return Err(QuillError::config(format!(
                    "section {name} needs a query for evidence key {evidence_key} in proposal.queries"
                )));
            }
            sections.push(Section {
                title: display_title(name),
                name: name.clone(),
                evidence_key,
            });
        }

        Ok(Self {
            sections,
            templates,
            queries,
        })
    }

    #[must_use]
    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    #[must_use]
    pub fn templates(&self) -> &HashMap<String, String> {
        &self.templates
    }

    #[must_use]
    pub fn query(&self, key: &str) -> Option<EvidenceQuery> {
        self.queries.get(key).map(|q| EvidenceQuery {
            key: key.to_owned(),
            query: q.clone(),
        })
    }

    /// Queries to run, each key once, in an order where every derived query
    /// comes after the opportunity query it depends on.
    #[must_use]
    pub fn evidence_plan(&self) -> Vec<EvidenceQuery> {
        let mut plan: Vec<EvidenceQuery> = Vec::new();
        for section in &self.sections {
            if plan.iter().any(|q| q.key == section.evidence_key) {
                continue;
            }
            if let Some(query) = self.query(&section.evidence_key) {
                plan.push(query);
            }
        }

        let needs_opportunity =
            plan.iter().any(|q| q.key == OPPORTUNITY_KEY || q.is_derived());
        plan.retain(|q| q.key != OPPORTUNITY_KEY);
        if needs_opportunity && let Some(opportunity) = self.query(OPPORTUNITY_KEY) {
            plan.insert(0, opportunity);
        }
        plan
    }
}
