//! Sessions and the caller side of a running turn.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use flourish_core::{
    Event, OutputPart, SessionId, SessionStatus, Turn, TurnError, TurnId, TurnResult,
};
use flourish_toolbus::{ToolContext, WorkingDir};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::context;
use crate::runtime::{run_turn, Shared, TurnTask};

/// Progress of a turn as seen by its caller.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnUpdate {
    /// A canonical event, with the output part it added or updated.
    Event {
        event: Event,
        part: Option<OutputPart>,
    },
    Completed(TurnResult),
    Failed(TurnError),
}

#[derive(Debug, Default)]
pub(crate) struct SessionState {
    status: SessionStatus,
    turns: Vec<Turn>,
}

/// Write access to one turn of a session, held by the runner that owns it.
#[derive(Clone)]
pub(crate) struct TurnSlot {
    state: Arc<Mutex<SessionState>>,
    index: usize,
}

impl TurnSlot {
    pub(crate) fn with<R>(&self, f: impl FnOnce(&mut Turn) -> R) -> R {
        let mut state = lock(&self.state);
        f(&mut state.turns[self.index])
    }

    pub(crate) fn snapshot(&self) -> Turn {
        self.with(|turn| turn.clone())
    }
}

/// Lifecycle container for the turns of one conversation.
///
/// Closing or dropping a session cancels its in-flight turns.
pub struct Session {
    id: SessionId,
    created_at: DateTime<Utc>,
    shared: Arc<Shared>,
    state: Arc<Mutex<SessionState>>,
    working_dir: WorkingDir,
    cancel: CancellationToken,
}

impl Session {
    pub(crate) fn open(shared: Arc<Shared>) -> Self {
        let id = SessionId::new();
        shared.audit.session_started(&id);
        info!(session.id = %id, "session opened");

        let working_dir = WorkingDir::new(shared.config.working_dir.clone());
        Self {
            id,
            created_at: Utc::now(),
            shared,
            state: Arc::new(Mutex::new(SessionState::default())),
            working_dir,
            cancel: CancellationToken::new(),
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn status(&self) -> SessionStatus {
        lock(&self.state).status
    }

    /// Snapshot of every turn, in creation order.
    pub fn turns(&self) -> Vec<Turn> {
        lock(&self.state).turns.clone()
    }

    pub fn turn(&self, id: &TurnId) -> Option<Turn> {
        lock(&self.state).turns.iter().find(|t| &t.id == id).cloned()
    }

    /// Current directory used by this session's commands.
    pub fn working_dir(&self) -> PathBuf {
        self.working_dir.get()
    }

    /// Start a turn. It runs on its own task; the handle observes it.
    pub fn begin_turn(&self, input: impl Into<String>) -> Result<TurnHandle, TurnError> {
        let input = input.into();
        let (slot, turn_id, history) = {
            let mut state = lock(&self.state);
            if !state.status.is_open() {
                warn!(session.id = %self.id, "turn refused, session is closed");
                return Err(TurnError::SessionClosed);
            }

            let history = if self.shared.config.carry_context {
                context::history_messages(&state.turns)
            } else {
                Vec::new()
            };

            let turn = Turn::new(input.clone());
            let turn_id = turn.id.clone();
            state.turns.push(turn);
            let slot = TurnSlot {
                state: Arc::clone(&self.state),
                index: state.turns.len() - 1,
            };
            (slot, turn_id, history)
        };

        let cancel = self.cancel.child_token();
        let (updates_tx, updates_rx) = mpsc::unbounded_channel();
        let tool_ctx = ToolContext::new(self.working_dir.clone())
            .with_timeout(self.shared.config.tool_timeout);

        tokio::spawn(run_turn(TurnTask {
            shared: Arc::clone(&self.shared),
            session_id: self.id.clone(),
            slot,
            input,
            history,
            tool_ctx,
            cancel: cancel.clone(),
            updates: updates_tx,
        }));

        Ok(TurnHandle {
            id: turn_id,
            updates: updates_rx,
            cancel,
        })
    }

    /// Close the session. In-flight turns fail with `Cancelled`; new turns
    /// are refused.
    pub fn close(&self) {
        {
            let mut state = lock(&self.state);
            if !state.status.is_open() {
                return;
            }
            state.status = SessionStatus::Closed;
        }
        self.cancel.cancel();
        self.shared.audit.session_closed(&self.id);
        info!(session.id = %self.id, "session closed");
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.close();
    }
}

/// Caller-side handle of a running turn.
///
/// `wait` and `subscribe` both end with the same `TurnResult` the runner
/// assembled; `next_update` gives raw access to the update channel.
pub struct TurnHandle {
    id: TurnId,
    updates: mpsc::UnboundedReceiver<TurnUpdate>,
    cancel: CancellationToken,
}

impl TurnHandle {
    pub fn id(&self) -> &TurnId {
        &self.id
    }

    /// Request cancellation. Provider polling stops, a running command is
    /// killed and the turn fails with `Cancelled`.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Next update, or `None` once the final update has been received.
    pub async fn next_update(&mut self) -> Option<TurnUpdate> {
        self.updates.recv().await
    }

    /// Wait for the turn to finish.
    pub async fn wait(self) -> Result<TurnResult, TurnError> {
        self.subscribe(|_, _| {}, |_| {}, |_| {}).await
    }

    /// Observe the turn as it runs and get its outcome.
    pub async fn subscribe<E, C, F>(
        mut self,
        mut on_event: E,
        on_complete: C,
        on_error: F,
    ) -> Result<TurnResult, TurnError>
    where
        E: FnMut(&Event, Option<&OutputPart>),
        C: FnOnce(&TurnResult),
        F: FnOnce(&TurnError),
    {
        while let Some(update) = self.updates.recv().await {
            match update {
                TurnUpdate::Event { event, part } => on_event(&event, part.as_ref()),
                TurnUpdate::Completed(result) => {
                    on_complete(&result);
                    return Ok(result);
                }
                TurnUpdate::Failed(error) => {
                    on_error(&error);
                    return Err(error);
                }
            }
        }

        let error = TurnError::protocol("turn ended without a result");
        on_error(&error);
        Err(error)
    }
}

fn lock(state: &Mutex<SessionState>) -> MutexGuard<'_, SessionState> {
    state.lock().unwrap_or_else(|e| e.into_inner())
}
