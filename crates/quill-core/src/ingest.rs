//! Directory walk feeding the per-document ingestion pipeline.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use quill_llm::AnyProvider;
use quill_memory::VectorStore;
use quill_memory::document::pipeline::EmbedFn;
use quill_memory::document::{
    Granularity, IngestionPipeline, LoaderSet, SplitterConfig, TextSplitter,
};
use walkdir::WalkDir;

use crate::config::IngestConfig;
use crate::error::QuillError;
use crate::observe::{Observer, RunEvent};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub files_seen: usize,
    pub files_ingested: usize,
    pub records: usize,
    pub skipped: Vec<SkippedFile>,
}

pub struct DirectoryIngestor {
    loaders: LoaderSet,
    pipeline: IngestionPipeline,
    observer: Arc<dyn Observer>,
}

impl DirectoryIngestor {
    /// # Errors
    ///
    /// Returns [`QuillError::Configuration`] for an unknown encoding label.
    pub fn new(
        config: &IngestConfig,
        embed_fn: EmbedFn,
        store: Arc<dyn VectorStore>,
        collection: &str,
        observer: Arc<dyn Observer>,
    ) -> Result<Self, QuillError> {
        let loaders = LoaderSet::new(config.granularity, &config.encodings, config.max_file_size)?;
        let splitter = (config.granularity == Granularity::Chunk).then(|| {
            TextSplitter::new(SplitterConfig {
                chunk_size: config.chunk_size,
                chunk_overlap: config.chunk_overlap,
                sentence_aware: true,
            })
        });
        let pipeline = IngestionPipeline::new(splitter, store, collection, embed_fn);
        Ok(Self {
            loaders,
            pipeline,
            observer,
        })
    }

    /// Build an ingestor that embeds with `provider`.
    ///
    /// # Errors
    ///
    /// See [`Self::new`].
    pub fn with_provider(
        config: &IngestConfig,
        provider: &AnyProvider,
        store: Arc<dyn VectorStore>,
        collection: &str,
        observer: Arc<dyn Observer>,
    ) -> Result<Self, QuillError> {
        Self::new(
            config,
            Box::new(provider.embed_fn()),
            store,
            collection,
            observer,
        )
    }

    /// Ingest every regular file under `dir`, in path order.
    ///
    /// Files that cannot be read or decoded are skipped and listed in the
    /// report. Embedding or store failures abort the walk.
    ///
    /// # Errors
    ///
    /// Returns [`QuillError::Configuration`] if `dir` is not a directory and
    /// [`QuillError::Remote`] if embedding or the store fails.
    pub async fn run(&self, dir: &Path) -> Result<IngestReport, QuillError> {
        if !dir.is_dir() {
            return Err(QuillError::config(format!(
                "input path is not a directory: {}",
                dir.display()
            )));
        }

        let started = Instant::now();
        self.observer.on_event(&RunEvent::StageStarted { stage: "ingest" });
        let vector_size = self.pipeline.prepare_collection().await?;
        tracing::debug!(
            collection = self.pipeline.collection(),
            vector_size,
            "collection ready"
        );

        let mut report = IngestReport::default();
        for entry in WalkDir::new(dir).sort_by_file_name() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    let path = e.path().map(Path::to_path_buf).unwrap_or_default();
                    self.skip(&mut report, path, e.to_string());
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            report.files_seen += 1;

            let path = entry.path();
            let loader = self.loaders.for_path(path);
            match self.pipeline.load_and_ingest(loader, path).await {
                Ok(records) => {
                    report.files_ingested += 1;
                    report.records += records;
                    self.observer.on_event(&RunEvent::FileIngested {
                        path: path.display().to_string(),
                        records,
                    });
                }
                Err(e) if e.is_skippable() => {
                    self.skip(&mut report, path.to_path_buf(), e.to_string());
                }
                Err(e) => return Err(e.into()),
            }
        }

        self.observer.on_event(&RunEvent::StageFinished {
            stage: "ingest",
            elapsed: started.elapsed(),
        });
        Ok(report)
    }

    fn skip(&self, report: &mut IngestReport, path: PathBuf, reason: String) {
        self.observer.on_event(&RunEvent::FileSkipped {
            path: path.display().to_string(),
            reason: reason.clone(),
        });
        report.skipped.push(SkippedFile { path, reason });
    }
}
