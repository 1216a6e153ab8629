use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use quill_core::Config;
use quill_core::bootstrap::{
    create_notifier, create_provider, create_store, load_config_from_env, resolve_config_path,
};
use quill_core::ingest::{DirectoryIngestor, IngestReport};
use quill_core::observe::{Fanout, MetricsCollector, MetricsSnapshot, Observer, TracingObserver};
use quill_core::pipeline::{RunRequest, proposal_pipeline};
use quill_core::sections::SectionCatalog;

/// Retrieval-augmented proposal generator
#[derive(Parser, Debug)]
#[command(name = "quill", version, about, long_about = None)]
struct Cli {
    /// Configuration file (falls back to QUILL_CONFIG, then config/default.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Index every supported document under a directory
    Ingest {
        /// Directory to walk
        #[arg(value_name = "DIR")]
        dir: PathBuf,
    },
    /// Draft every enabled section and write the proposal PDF
    Generate(GenerateArgs),
    /// List enabled sections and the queries that feed them
    Sections,
}

#[derive(Args, Debug, Default)]
struct GenerateArgs {
    /// Email the PDF after writing it
    #[arg(long, conflicts_with = "no_email")]
    send_email: bool,

    /// Never email, even if the configuration asks for it
    #[arg(long)]
    no_email: bool,

    /// Output PDF path
    #[arg(short, long, value_name = "PATH")]
    output: Option<PathBuf>,
}

impl GenerateArgs {
    fn apply(&self, config: &mut Config) {
        if self.send_email {
            config.pipeline.send_email = true;
        } else if self.no_email {
            config.pipeline.send_email = false;
        }
        if let Some(path) = &self.output {
            config.output.path.clone_from(path);
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    init_subscriber();

    let cli = Cli::parse();
    let config_path = resolve_config_path(cli.config.as_deref());

    match cli.command {
        Command::Ingest { dir } => ingest(&config_path, &dir).await,
        Command::Generate(args) => generate(&config_path, &args).await,
        Command::Sections => sections(&config_path),
    }
}

fn init_subscriber() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn observers() -> (Arc<dyn Observer>, tokio::sync::watch::Receiver<MetricsSnapshot>) {
    let (metrics, rx) = MetricsCollector::new();
    let fanout = Fanout::new()
        .with(Arc::new(TracingObserver))
        .with(Arc::new(metrics));
    (Arc::new(fanout), rx)
}

async fn ingest(config_path: &Path, dir: &Path) -> anyhow::Result<()> {
    let config = load_config_from_env(config_path).await?;
    let provider = create_provider(&config)?;
    let store = create_store(&config)?;
    let (observer, _metrics) = observers();

    let ingestor = DirectoryIngestor::with_provider(
        &config.ingest,
        &provider,
        store,
        &config.store.collection,
        observer,
    )?;
    let report = ingestor
        .run(dir)
        .await
        .with_context(|| format!("ingestion of {} failed", dir.display()))?;

    print!("{}", format_report(&report, &config.store.collection));
    Ok(())
}

fn format_report(report: &IngestReport, collection: &str) -> String {
    let mut out = format!(
        "ingested {} of {} file(s) into '{collection}' ({} record(s))\n",
        report.files_ingested, report.files_seen, report.records
    );
    for skipped in &report.skipped {
        out.push_str(&format!(
            "  skipped {}: {}\n",
            skipped.path.display(),
            skipped.reason
        ));
    }
    out
}

async fn generate(config_path: &Path, args: &GenerateArgs) -> anyhow::Result<()> {
    let mut config = load_config_from_env(config_path).await?;
    args.apply(&mut config);

    let provider = Arc::new(create_provider(&config)?);
    let store = create_store(&config)?;
    let (observer, metrics) = observers();
    let notifier = create_notifier(&config, Arc::clone(&observer))?;

    let pipeline = proposal_pipeline(&config, provider, store, notifier, observer)?;
    tracing::info!(stages = ?pipeline.stages(), "starting proposal run");

    let delivered = pipeline
        .run(RunRequest {
            send_email: config.pipeline.send_email,
        })
        .await?;

    let document = delivered.document();
    println!(
        "wrote {} ({} page(s), {} section(s))",
        document.path.display(),
        document.pages,
        delivered.sections().len()
    );
    if delivered.emailed {
        println!("emailed proposal");
    }
    let snapshot = metrics.borrow().clone();
    tracing::debug!(?snapshot, "run finished");
    Ok(())
}

fn sections(config_path: &Path) -> anyhow::Result<()> {
    let config = Config::load(config_path)?;
    let catalog = SectionCatalog::from_config(&config.proposal)?;
    print!("{}", format_sections(&catalog));
    Ok(())
}

fn format_sections(catalog: &SectionCatalog) -> String {
    let mut out = String::new();
    for section in catalog.sections() {
        let query = catalog
            .query(&section.evidence_key)
            .map(|q| q.query)
            .unwrap_or_default();
        out.push_str(&format!(
            "{:<20} {:<28} {query}\n",
            section.name, section.title
        ));
    }
    out
}
