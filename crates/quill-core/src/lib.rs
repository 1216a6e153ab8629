//! Configuration, ingestion, retrieval, drafting, PDF assembly and the typed
//! pipeline that turns an indexed corpus into a proposal document.

pub mod assemble;
pub mod bootstrap;
pub mod config;
pub mod error;
pub mod generate;
pub mod ingest;
pub mod notify;
pub mod observe;
pub mod pipeline;
pub mod retrieval;
pub mod sections;
pub mod vault;

pub use config::Config;
pub use error::{QuillError, RemoteError};
pub use pipeline::{Pipeline, PipelineError, Step};
