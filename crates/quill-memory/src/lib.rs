//! Vector store backends (Qdrant, Supabase, in-memory) and the document
//! loading and ingestion path that feeds them.

pub mod document;
pub mod error;
pub mod in_memory_store;
pub mod qdrant_ops;
pub mod supabase;
pub mod vector_store;

pub use error::MemoryError;
pub use in_memory_store::InMemoryVectorStore;
pub use qdrant_ops::QdrantOps;
pub use supabase::SupabaseStore;
pub use vector_store::{ScoredVectorPoint, VectorPoint, VectorStore, VectorStoreError};
