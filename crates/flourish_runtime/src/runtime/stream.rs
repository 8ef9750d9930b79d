//! One provider round.

use flourish_core::{Event, ProviderCause, ToolCall, ToolResult, TurnError};
use flourish_observability::provider_span;
use futures::StreamExt;
use tokio::time::timeout;
use tracing::{debug, Instrument};

use crate::context;
use crate::normalizer::{normalize, normalize_error};

use super::turn_loop::TurnRunner;

/// What a round produced that the next round needs.
#[derive(Debug, Default)]
pub(super) struct RoundOutcome {
    /// Assistant text streamed during the round, unfiltered.
    pub(super) text: String,
    pub(super) exchanges: Vec<(ToolCall, ToolResult)>,
}

impl TurnRunner {
    /// Stream one provider response to its end. Tool calls are executed as
    /// they arrive; the provider is not polled while one runs.
    pub(super) async fn stream_round(&mut self, round: u32) -> Result<RoundOutcome, TurnError> {
        let shared = std::sync::Arc::clone(&self.shared);
        let span = provider_span!(shared.provider.provider_id(), shared.config.model, round);

        async {
            let request = context::build_request(
                &shared.config.model,
                &shared.config.system_prompt,
                &self.messages,
                &shared.tools,
            );
            let idle = shared.config.provider_idle_timeout;
            let idle_error = || {
                TurnError::provider(
                    ProviderCause::Timeout,
                    format!("no event from provider within {}s", idle.as_secs_f32()),
                )
            };

            debug!(messages = request.messages.len(), "opening provider stream");
            let mut stream = self
                .guarded(timeout(idle, shared.provider.stream(request)))
                .await?
                .map_err(|_| idle_error())?
                .map_err(|e| TurnError::provider(e.cause(), e.to_string()))?;

            let mut outcome = RoundOutcome::default();
            loop {
                let next = self
                    .guarded(timeout(idle, stream.next()))
                    .await?
                    .map_err(|_| idle_error())?;

                let event = match next {
                    None => {
                        return Err(TurnError::provider(
                            ProviderCause::Network,
                            "stream ended before a finish event",
                        ))
                    }
                    Some(Ok(raw)) => normalize(&raw),
                    Some(Err(e)) => normalize_error(&e),
                };

                match &event {
                    Event::Terminal { marker } => {
                        let error = marker.to_error();
                        self.emit(event);
                        match error {
                            Some(error) => return Err(error),
                            None => break,
                        }
                    }
                    Event::ToolCall { call }
                        if outcome.exchanges.iter().any(|(seen, _)| seen.call_id == call.call_id) =>
                    {
                        debug!(call_id = %call.call_id, "repeated tool call ignored");
                    }
                    Event::ToolCall { call } => {
                        let call = call.clone();
                        self.emit(event);
                        let result = self.run_tool(&call).await?;
                        outcome.exchanges.push((call, result));
                    }
                    Event::Text { content } => {
                        outcome.text.push_str(content);
                        self.emit(event);
                    }
                    Event::Thought { .. } | Event::ToolResult { .. } => self.emit(event),
                }
            }

            debug!(tool_calls = outcome.exchanges.len(), "provider round finished");
            Ok(outcome)
        }
        .instrument(span)
        .await
    }
}
