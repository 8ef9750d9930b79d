//! Span macros and span field helpers for turns, tool calls and provider rounds.

/// Create a span for one turn of a session
///
/// # Example
///
/// ```rust
/// use flourish_observability::turn_span;
///
/// let span = turn_span!("session-1", "turn-1");
/// let _guard = span.enter();
/// ```
#[macro_export]
macro_rules! turn_span {
    ($session_id:expr, $turn_id:expr) => {
        tracing::info_span!(
            "turn",
            session.id = %$session_id,
            turn.id = %$turn_id,
            turn.rounds = tracing::field::Empty,
            turn.duration_ms = tracing::field::Empty,
            error = tracing::field::Empty,
            error.message = tracing::field::Empty,
        )
    };
}

/// Create a span for a single tool call
///
/// # Example
///
/// ```rust
/// use flourish_observability::tool_span;
///
/// let span = tool_span!("execute_bash", "call_1");
/// let _guard = span.enter();
/// ```
#[macro_export]
macro_rules! tool_span {
    ($tool_name:expr, $call_id:expr) => {
        tracing::info_span!(
            "tool.call",
            tool.name = %$tool_name,
            tool.call_id = %$call_id,
            tool.exit_code = tracing::field::Empty,
            tool.duration_ms = tracing::field::Empty,
        )
    };
}

/// Create a span for one provider round
#[macro_export]
macro_rules! provider_span {
    ($provider:expr, $model:expr, $round:expr) => {
        tracing::info_span!(
            "provider.round",
            provider.id = %$provider,
            provider.model = %$model,
            provider.round = $round,
            error = tracing::field::Empty,
            error.message = tracing::field::Empty,
        )
    };
}

/// Record an error on the current span
///
/// # Example
///
/// ```rust
/// use flourish_observability::record_error;
///
/// let err = std::io::Error::new(std::io::ErrorKind::Other, "boom");
/// record_error(&err);
/// ```
pub fn record_error<E: std::fmt::Display + ?Sized>(error: &E) {
    let span = tracing::Span::current();
    span.record("error", true);
    span.record("error.message", error.to_string());
    tracing::error!(error = %error, "Operation failed");
}

/// Record latency/duration on the current span
///
/// ```rust
/// use flourish_observability::record_duration;
/// use std::time::Instant;
///
/// let start = Instant::now();
/// record_duration("turn.duration_ms", start.elapsed());
/// ```
pub fn record_duration(key: &str, duration: std::time::Duration) {
    let span = tracing::Span::current();
    span.record(key, duration.as_millis() as u64);
}
