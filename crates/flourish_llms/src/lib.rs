//! flourish_llms - streaming model providers.
//!
//! A provider turns a [`ProviderRequest`] into an ordered stream of raw
//! events. Raw events are loosely typed JSON objects tagged by `type`:
//!
//! ```text
//! {"type":"text","text":"..."}
//! {"type":"thought","text":"..."}
//! {"type":"tool_call","id":"...","name":"...","arguments":{...}}
//! {"type":"finish","reason":"stop"}
//! {"type":"error","code":"rate_limit","message":"..."}
//! ```
//!
//! Classifying them is left to the consumer, which must treat anything it
//! does not recognize as a protocol error.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use flourish_llms::{OpenAIProvider, Provider, ProviderRequest, Message};
//! use futures::StreamExt;
//!
//! # async fn run() -> flourish_llms::Result<()> {
//! let provider = OpenAIProvider::from_env()?;
//! let request = ProviderRequest::new("gpt-4o-mini").with_message(Message::user("hi"));
//! let mut stream = provider.stream(request).await?;
//! while let Some(event) = stream.next().await {
//!     println!("{:?}", event?);
//! }
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod provider;
pub mod providers;
pub mod types;

#[cfg(test)]
mod tests;

pub use error::{Error, Result};
pub use provider::Provider;

#[cfg(feature = "openai")]
pub use providers::{OpenAIConfig, OpenAIProvider};
pub use providers::{ScriptedItem, ScriptedProvider};

pub use types::{Message, ProviderRequest, RawEvent, RawEventStream, ToolDefinition};
