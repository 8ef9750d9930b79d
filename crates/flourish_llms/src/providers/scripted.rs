//! Provider that replays a fixed script, one round per `stream` call.
//!
//! Used by tests and offline demos.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use flourish_core::ProviderCause;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::provider::Provider;
use crate::types::{ProviderRequest, RawEvent, RawEventStream};

#[derive(Debug, Clone)]
pub enum ScriptedItem {
    /// Emit this raw event.
    Event(RawEvent),
    /// End the stream with a transport-level failure.
    Fail { cause: ProviderCause, message: String },
    /// Wait before the next item.
    Delay(Duration),
    /// Never produce another item.
    Hang,
}

impl From<RawEvent> for ScriptedItem {
    fn from(event: RawEvent) -> Self {
        ScriptedItem::Event(event)
    }
}

impl From<Value> for ScriptedItem {
    fn from(value: Value) -> Self {
        ScriptedItem::Event(RawEvent(value))
    }
}

#[derive(Default)]
pub struct ScriptedProvider {
    rounds: Mutex<VecDeque<Vec<ScriptedItem>>>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the items for the next `stream` call.
    pub fn with_round<I, T>(self, items: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<ScriptedItem>,
    {
        self.push_round(items);
        self
    }

    pub fn push_round<I, T>(&self, items: I)
    where
        I: IntoIterator<Item = T>,
        T: Into<ScriptedItem>,
    {
        self.rounds
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(items.into_iter().map(Into::into).collect());
    }

    /// Requests received so far, in order.
    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn remaining_rounds(&self) -> usize {
        self.rounds.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn provider_id(&self) -> &str {
        "scripted"
    }

    async fn stream(&self, request: ProviderRequest) -> Result<RawEventStream> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(request);

        let items = self
            .rounds
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front()
            .ok_or_else(|| Error::provider_error(ProviderCause::InvalidRequest, "script exhausted"))?;

        let stream = async_stream::stream! {
            for item in items {
                match item {
                    ScriptedItem::Event(event) => yield Ok(event),
                    ScriptedItem::Fail { cause, message } => {
                        yield Err(Error::provider_error(cause, message));
                        break;
                    }
                    ScriptedItem::Delay(duration) => tokio::time::sleep(duration).await,
                    ScriptedItem::Hang => futures::future::pending::<()>().await,
                }
            }
        };

        Ok(Box::pin(stream))
    }
}
