//! Raw provider events to canonical [`Event`]s.
//!
//! Every raw event maps to exactly one canonical event. Shapes that are not
//! recognized become `Terminal(Malformed)` so the turn fails instead of
//! silently losing output.

use flourish_core::{Event, FinishReason, ProviderCause, ToolCall};
use flourish_llms::RawEvent;
use serde_json::{Map, Value};

pub fn normalize(raw: &RawEvent) -> Event {
    let value = raw.as_value();
    let Some(kind) = raw.kind() else {
        return Event::malformed(format!("raw event without a type: {}", preview(value)));
    };

    match kind {
        "text" => match str_field(value, "text") {
            Some(text) => Event::text(text),
            None => missing(kind, "text"),
        },
        "thought" => match str_field(value, "text") {
            Some(text) => Event::thought(text),
            None => missing(kind, "text"),
        },
        "tool_call" => normalize_tool_call(value),
        "finish" => {
            let reason = str_field(value, "reason").unwrap_or_default();
            Event::finished(FinishReason::from_raw(reason))
        }
        "error" => {
            let cause = str_field(value, "code")
                .map(ProviderCause::from_code)
                .unwrap_or(ProviderCause::Unknown);
            let message = str_field(value, "message").unwrap_or("provider reported an error");
            Event::provider_failure(cause, message)
        }
        other => Event::malformed(format!("unknown raw event type '{}'", other)),
    }
}

/// A transport failure ends the stream with the error's cause preserved.
pub fn normalize_error(err: &flourish_llms::Error) -> Event {
    Event::provider_failure(err.cause(), err.to_string())
}

fn normalize_tool_call(value: &Value) -> Event {
    let Some(id) = str_field(value, "id") else {
        return missing("tool_call", "id");
    };
    let Some(name) = str_field(value, "name") else {
        return missing("tool_call", "name");
    };

    // Arguments arrive either as an object or as the JSON text of one.
    let arguments = match value.get("arguments") {
        None | Some(Value::Null) => Value::Object(Map::new()),
        Some(Value::Object(map)) => Value::Object(map.clone()),
        Some(Value::String(text)) if text.trim().is_empty() => Value::Object(Map::new()),
        Some(Value::String(text)) => match serde_json::from_str::<Value>(text) {
            Ok(parsed @ Value::Object(_)) => parsed,
            Ok(other) => {
                return Event::malformed(format!(
                    "tool_call '{}' arguments are not an object: {}",
                    id,
                    preview(&other)
                ))
            }
            Err(e) => {
                return Event::malformed(format!(
                    "tool_call '{}' arguments are not valid JSON: {}",
                    id, e
                ))
            }
        },
        Some(other) => {
            return Event::malformed(format!(
                "tool_call '{}' arguments are not an object: {}",
                id,
                preview(other)
            ))
        }
    };

    Event::tool_call(ToolCall::new(id, name, arguments))
}

fn str_field<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value.get(key).and_then(Value::as_str)
}

fn missing(kind: &str, field: &str) -> Event {
    Event::malformed(format!("{} event missing '{}'", kind, field))
}

fn preview(value: &Value) -> String {
    let text = value.to_string();
    match text.char_indices().nth(120) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text,
    }
}
