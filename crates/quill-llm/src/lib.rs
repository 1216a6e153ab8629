//! Completion and embedding provider abstraction and backend implementations.

pub mod any;
pub mod error;
pub mod http;
#[cfg(feature = "mock")]
pub mod mock;
pub mod openai;
pub mod provider;
pub mod vertex;

pub use any::AnyProvider;
pub use error::LlmError;
pub use provider::{CompletionParams, EmbedFuture, LlmProvider, Message, Role};
