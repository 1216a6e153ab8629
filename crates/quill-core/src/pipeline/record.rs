//! Immutable stage records. Each stage consumes one and returns the next.

use std::collections::BTreeMap;

use serde::Serialize;

use super::PipelineError;
use crate::assemble::AssembledDocument;
use crate::generate::ProposalSection;
use crate::retrieval::{RetrievedRecord, joined_text};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunRequest {
    pub send_email: bool,
}

/// Retrieval result sets keyed by evidence key. Each key is written once.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Evidence {
    request: RunRequest,
    sets: BTreeMap<String, Vec<RetrievedRecord>>,
}

impl Evidence {
    #[must_use]
    pub fn new(request: RunRequest) -> Self {
        Self {
            request,
            sets: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn request(&self) -> RunRequest {
        self.request
    }

    /// Add a result set under a new key.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::DuplicateEvidence`] if `key` is already present.
    pub fn with(mut self, key: &str, records: Vec<RetrievedRecord>) -> Result<Self, PipelineError> {
        if self.sets.contains_key(key) {
            return Err(PipelineError::DuplicateEvidence(key.to_owned()));
        }
        self.sets.insert(key.to_owned(), records);
        Ok(self)
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&[RetrievedRecord]> {
        self.sets.get(key).map(Vec::as_slice)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.sets.keys().map(String::as_str)
    }

    /// Texts of one result set joined with `\n`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::MissingEvidence`] if no earlier stage wrote `key`.
    pub fn text(&self, key: &str) -> Result<String, PipelineError> {
        self.get(key)
            .map(joined_text)
            .ok_or_else(|| PipelineError::MissingEvidence(key.to_owned()))
    }
}

#[derive(Debug, Clone)]
pub struct Drafted {
    pub evidence: Evidence,
    pub sections: Vec<ProposalSection>,
}

#[derive(Debug, Clone)]
pub struct Assembled {
    pub drafted: Drafted,
    pub document: AssembledDocument,
}

#[derive(Debug, Clone)]
pub struct Delivered {
    pub assembled: Assembled,
    pub emailed: bool,
}

impl Delivered {
    #[must_use]
    pub fn sections(&self) -> &[ProposalSection] {
        &self.assembled.drafted.sections
    }

    #[must_use]
    pub fn document(&self) -> &AssembledDocument {
        &self.assembled.document
    }

    #[must_use]
    pub fn evidence(&self) -> &Evidence {
        &self.assembled.drafted.evidence
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(text: &str) -> RetrievedRecord {
        RetrievedRecord {
            id: text.into(),
            score: 0.5,
            text: text.into(),
            metadata: BTreeMap::new(),
        }
    }

    #[test]
    fn evidence_is_write_once() {
        let evidence = Evidence::new(RunRequest::default())
            .with("corporate", vec![record("a")])
            .unwrap();
        let err = evidence
            .with("corporate", vec![record("b")])
            .unwrap_err();
        assert!(matches!(err, PipelineError::DuplicateEvidence(k) if k == "corporate"));
    }

    #[test]
    fn text_joins_and_reports_missing_keys() {
        let evidence = Evidence::new(RunRequest::default())
            .with("staff", vec![record("Ann"), record("Bo")])
            .unwrap();
        assert_eq!(evidence.text("staff").unwrap(), "Ann\nBo");
        assert!(matches!(
            evidence.text("opportunity"),
            Err(PipelineError::MissingEvidence(_))
        ));
        assert_eq!(evidence.keys().collect::<Vec<_>>(), ["staff"]);
    }

    #[test]
    fn empty_result_set_is_present_but_blank() {
        let evidence = Evidence::new(RunRequest::default())
            .with("staff", Vec::new())
            .unwrap();
        assert_eq!(evidence.text("staff").unwrap(), "");
    }
}
