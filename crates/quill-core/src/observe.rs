//! Run events and the observers that receive them.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

#[derive(Debug, Clone, PartialEq)]
pub enum RunEvent {
    StageStarted {
        stage: &'static str,
    },
    StageFinished {
        stage: &'static str,
        elapsed: Duration,
    },
    FileIngested {
        path: String,
        records: usize,
    },
    FileSkipped {
        path: String,
        reason: String,
    },
    EvidenceRetrieved {
        key: String,
        records: usize,
    },
    SectionDrafted {
        section: String,
        chars: usize,
    },
    DocumentAssembled {
        path: String,
        pages: usize,
    },
    EmailSent {
        to: String,
    },
    EmailSkipped {
        reason: &'static str,
    },
}

/// Receives progress events. Implementations must not block.
pub trait Observer: Send + Sync {
    fn on_event(&self, event: &RunEvent);
}

/// Logs every event through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl Observer for TracingObserver {
    fn on_event(&self, event: &RunEvent) {
        match event {
            RunEvent::StageStarted { stage } => tracing::info!(stage, "stage started"),
            RunEvent::StageFinished { stage, elapsed } => {
                let elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
                tracing::info!(stage, elapsed_ms, "stage finished");
            }
            RunEvent::FileIngested { path, records } => {
                tracing::info!(path, records, "file ingested");
            }
            RunEvent::FileSkipped { path, reason } => {
                tracing::warn!(path, reason, "file skipped");
            }
            RunEvent::EvidenceRetrieved { key, records } => {
                tracing::info!(key, records, "evidence retrieved");
            }
            RunEvent::SectionDrafted { section, chars } => {
                tracing::info!(section, chars, "section drafted");
            }
            RunEvent::DocumentAssembled { path, pages } => {
                tracing::info!(path, pages, "document assembled");
            }
            RunEvent::EmailSent { to } => tracing::info!(to, "email sent"),
            RunEvent::EmailSkipped { reason } => tracing::info!(reason, "email skipped"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricsSnapshot {
    pub files_ingested: u64,
    pub files_skipped: u64,
    pub records_ingested: u64,
    pub evidence_sets: u64,
    pub records_retrieved: u64,
    pub sections_drafted: u64,
    pub pages_written: u64,
    pub emails_sent: u64,
    pub stages_completed: Vec<&'static str>,
    pub last_stage_ms: u64,
}

/// Folds events into a [`MetricsSnapshot`] published over a watch channel.
pub struct MetricsCollector {
    tx: watch::Sender<MetricsSnapshot>,
}

impl MetricsCollector {
    #[must_use]
    pub fn new() -> (Self, watch::Receiver<MetricsSnapshot>) {
        let (tx, rx) = watch::channel(MetricsSnapshot::default());
        (Self { tx }, rx)
    }

    pub fn update(&self, f: impl FnOnce(&mut MetricsSnapshot)) {
        self.tx.send_modify(f);
    }
}

impl Observer for MetricsCollector {
    fn on_event(&self, event: &RunEvent) {
        self.update(|m| match event {
            RunEvent::StageStarted { .. } | RunEvent::EmailSkipped { .. } => {}
            RunEvent::StageFinished { stage, elapsed } => {
                m.stages_completed.push(*stage);
                m.last_stage_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
            }
            RunEvent::FileIngested { records, .. } => {
                m.files_ingested += 1;
                m.records_ingested += *records as u64;
            }
            RunEvent::FileSkipped { .. } => m.files_skipped += 1,
            RunEvent::EvidenceRetrieved { records, .. } => {
                m.evidence_sets += 1;
                m.records_retrieved += *records as u64;
            }
            RunEvent::SectionDrafted { .. } => m.sections_drafted += 1,
            RunEvent::DocumentAssembled { pages, .. } => m.pages_written += *pages as u64,
            RunEvent::EmailSent { .. } => m.emails_sent += 1,
        });
    }
}

/// Forwards each event to several observers in order.
#[derive(Default)]
pub struct Fanout {
    observers: Vec<Arc<dyn Observer>>,
}

impl Fanout {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, observer: Arc<dyn Observer>) -> Self {
        self.observers.push(observer);
        self
    }
}

impl Observer for Fanout {
    fn on_event(&self, event: &RunEvent) {
        for observer in &self.observers {
            observer.on_event(event);
        }
    }
}
