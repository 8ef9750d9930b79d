//! OpenAI-compatible chat completions provider.

mod convert;
mod provider;
mod stream;
mod types;

pub use provider::OpenAIProvider;
pub use types::OpenAIConfig;
