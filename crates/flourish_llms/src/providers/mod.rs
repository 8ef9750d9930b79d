#[cfg(feature = "openai")]
pub mod openai;
pub mod scripted;

#[cfg(feature = "openai")]
pub use openai::{OpenAIConfig, OpenAIProvider};
pub use scripted::{ScriptedItem, ScriptedProvider};
