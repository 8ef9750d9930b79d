//! Turn lifecycle: rounds, state transitions and the final update.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use flourish_core::{Event, SessionId, TurnError, TurnState};
use flourish_llms::Message;
use flourish_observability::{record_duration, record_error, turn_span};
use flourish_toolbus::ToolContext;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn, Instrument};

use crate::assembler::ResponseAssembler;
use crate::session::{TurnSlot, TurnUpdate};

use super::Shared;

/// Everything a turn's task needs, handed over by `Session::begin_turn`.
pub(crate) struct TurnTask {
    pub(crate) shared: Arc<Shared>,
    pub(crate) session_id: SessionId,
    pub(crate) slot: TurnSlot,
    pub(crate) input: String,
    pub(crate) history: Vec<Message>,
    pub(crate) tool_ctx: ToolContext,
    pub(crate) cancel: CancellationToken,
    pub(crate) updates: mpsc::UnboundedSender<TurnUpdate>,
}

pub(crate) async fn run_turn(task: TurnTask) {
    let turn_id = task.slot.with(|turn| turn.id.clone());
    let span = turn_span!(task.session_id, turn_id);
    TurnRunner::new(task).run().instrument(span).await
}

/// Owns one turn from `Pending` to `Completed` or `Failed`.
pub(super) struct TurnRunner {
    pub(super) shared: Arc<Shared>,
    pub(super) session_id: SessionId,
    pub(super) slot: TurnSlot,
    pub(super) tool_ctx: ToolContext,
    pub(super) cancel: CancellationToken,
    updates: mpsc::UnboundedSender<TurnUpdate>,
    pub(super) assembler: ResponseAssembler,
    /// Conversation sent to the provider; grows by one exchange per round.
    pub(super) messages: Vec<Message>,
}

impl TurnRunner {
    fn new(task: TurnTask) -> Self {
        let mut messages = task.history;
        messages.push(Message::user(task.input));
        Self {
            shared: task.shared,
            session_id: task.session_id,
            slot: task.slot,
            tool_ctx: task.tool_ctx,
            cancel: task.cancel,
            updates: task.updates,
            assembler: ResponseAssembler::new(),
            messages,
        }
    }

    async fn run(mut self) {
        let start = Instant::now();
        self.shared
            .audit
            .turn_started(&self.session_id, &self.slot.snapshot());
        info!("turn started");

        self.transition(TurnState::Streaming);
        let outcome = self.drive().await;
        record_duration("turn.duration_ms", start.elapsed());

        match outcome {
            Ok(()) => self.complete(),
            Err(error) => self.fail(error),
        }
    }

    /// Provider rounds until one ends without tool calls.
    async fn drive(&mut self) -> Result<(), TurnError> {
        let max_rounds = self.shared.config.max_rounds.max(1);

        for round in 1..=max_rounds {
            tracing::Span::current().record("turn.rounds", round);
            let outcome = self.stream_round(round).await?;
            if outcome.exchanges.is_empty() {
                return Ok(());
            }

            let calls = outcome.exchanges.iter().map(|(c, _)| c.clone()).collect();
            self.messages
                .push(Message::assistant_with_tools(outcome.text, calls));
            for (call, result) in &outcome.exchanges {
                self.messages
                    .push(Message::tool(&call.call_id, result.to_json().to_string()));
            }
        }

        warn!(
            max_rounds,
            "round limit reached, completing turn with the output assembled so far"
        );
        Ok(())
    }

    fn complete(mut self) {
        let result = std::mem::take(&mut self.assembler).finish();
        if let Err(e) = self.slot.with(|turn| turn.complete(result.clone())) {
            warn!(error = %e, "could not record turn completion");
        }
        info!(
            parts = result.parts.len(),
            invocations = result.invocations.len(),
            "turn completed"
        );
        self.shared
            .audit
            .turn_finished(&self.session_id, &self.slot.snapshot());
        let _ = self.updates.send(TurnUpdate::Completed(result));
    }

    fn fail(self, error: TurnError) {
        if error.is_cancelled() {
            info!("turn cancelled");
        } else {
            record_error(&error);
        }
        if let Err(e) = self.slot.with(|turn| turn.fail(error.clone())) {
            warn!(error = %e, "could not record turn failure");
        }
        self.shared
            .audit
            .turn_finished(&self.session_id, &self.slot.snapshot());
        let _ = self.updates.send(TurnUpdate::Failed(error));
    }

    /// Record an event on the turn, fold it and forward it to the caller.
    pub(super) fn emit(&mut self, event: Event) {
        let part = self.assembler.push(&event);
        if let Err(e) = self.slot.with(|turn| turn.record_event(event.clone())) {
            warn!(error = %e, "event arrived after the turn finished");
        }
        let _ = self.updates.send(TurnUpdate::Event { event, part });
    }

    pub(super) fn transition(&self, next: TurnState) {
        if let Err(e) = self.slot.with(|turn| turn.advance(next)) {
            warn!(error = %e, "rejected turn transition");
        }
    }

    /// Run `fut` unless the turn is cancelled first. Dropping `fut` on
    /// cancellation is what stops provider polling and kills processes.
    pub(super) async fn guarded<F, T>(&self, fut: F) -> Result<T, TurnError>
    where
        F: Future<Output = T>,
    {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(TurnError::Cancelled),
            out = fut => Ok(out),
        }
    }
}
