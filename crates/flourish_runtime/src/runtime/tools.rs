//! Tool dispatch for a running turn.

use std::sync::Arc;
use std::time::Instant;

use flourish_core::{Event, ToolCall, ToolResult, TurnError, TurnState};
use flourish_observability::{record_duration, tool_span};
use tracing::{info, Instrument};

use super::turn_loop::TurnRunner;

impl TurnRunner {
    /// Run one tool call to completion while the turn sits in `ToolPending`.
    ///
    /// Refused and failing commands come back as results; only cancellation
    /// is an error here.
    pub(super) async fn run_tool(&mut self, call: &ToolCall) -> Result<ToolResult, TurnError> {
        self.transition(TurnState::ToolPending);

        let span = tool_span!(call.name, call.call_id);
        let shared = Arc::clone(&self.shared);
        let start = Instant::now();

        let outcome = self
            .guarded(shared.toolbus.call(call, &self.tool_ctx).instrument(span.clone()))
            .await?;

        span.in_scope(|| {
            tracing::Span::current().record("tool.exit_code", outcome.result.exit_code);
            record_duration("tool.duration_ms", start.elapsed());
            info!(
                tool = %call.name,
                exit_code = outcome.result.exit_code,
                "tool call finished"
            );
        });

        if let Some(invocation) = outcome.invocation {
            let turn_id = self.slot.with(|turn| turn.id.clone());
            shared
                .audit
                .tool_invocation(&self.session_id, &turn_id, &invocation);
            self.assembler.record_invocation(invocation);
        }

        self.emit(Event::tool_result(outcome.result.clone()));
        self.transition(TurnState::Streaming);
        Ok(outcome.result)
    }
}
