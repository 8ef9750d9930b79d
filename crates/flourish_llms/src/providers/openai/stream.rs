//! OpenAI streaming support
//!
//! Text deltas are coalesced into one `text` event per assistant segment, and
//! tool-call fragments are accumulated by index until the choice finishes.

use std::collections::BTreeMap;

use flourish_core::ProviderCause;
use futures::stream::StreamExt;
use reqwest_eventsource::{Event, EventSource};
use serde_json::Value;
use tracing::debug;

use super::types::{OpenAIStreamEvent, OpenAIStreamToolCall};
use crate::error::Error;
use crate::types::{RawEvent, RawEventStream};

/// Create a raw event stream from an OpenAI EventSource
pub fn create_stream(mut event_source: EventSource) -> RawEventStream {
    let stream = async_stream::stream! {
        let mut state = StreamState::default();
        let mut failed = false;
        let mut completed = false;

        while let Some(event) = event_source.next().await {
            match event {
                Ok(Event::Open) => continue,
                Ok(Event::Message(message)) => {
                    if message.data == "[DONE]" {
                        completed = true;
                        break;
                    }
                    match serde_json::from_str::<OpenAIStreamEvent>(&message.data) {
                        Ok(chunk) => {
                            for raw in state.process(chunk) {
                                yield Ok(raw);
                            }
                            if state.is_finished() {
                                completed = true;
                                break;
                            }
                        }
                        Err(e) => {
                            yield Err(Error::stream_error(format!("Failed to parse event: {}", e)));
                            failed = true;
                            break;
                        }
                    }
                }
                Err(reqwest_eventsource::Error::StreamEnded) => break,
                Err(reqwest_eventsource::Error::InvalidStatusCode(status, response)) => {
                    let body = response
                        .text()
                        .await
                        .unwrap_or_else(|_| "Unable to read error body".to_string());
                    yield Err(Error::Status { status: status.as_u16(), body });
                    failed = true;
                    break;
                }
                Err(reqwest_eventsource::Error::Transport(e)) => {
                    yield Err(Error::Http(e));
                    failed = true;
                    break;
                }
                Err(e) => {
                    yield Err(Error::stream_error(format!("Stream error: {}", e)));
                    failed = true;
                    break;
                }
            }
        }

        event_source.close();
        if completed {
            for raw in state.finish() {
                yield Ok(raw);
            }
        } else if !failed {
            // Transport closed mid-response; buffered tool calls must not run.
            yield Err(Error::stream_error("stream ended before a finish reason"));
        }
    };

    Box::pin(stream)
}

#[derive(Debug, Default)]
struct ToolCallState {
    id: String,
    name: String,
    arguments: String,
}

/// Folds OpenAI chunks into raw events.
#[derive(Debug, Default)]
pub(crate) struct StreamState {
    text: String,
    thought: String,
    tool_calls: BTreeMap<u32, ToolCallState>,
    finished: bool,
}

impl StreamState {
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn process(&mut self, chunk: OpenAIStreamEvent) -> Vec<RawEvent> {
        let mut events = Vec::new();
        if self.finished {
            return events;
        }

        if let Some(error) = chunk.error {
            let code = match &error.code {
                Some(Value::String(code)) => code.clone(),
                Some(other) => other.to_string(),
                None => error.type_.clone().unwrap_or_default(),
            };
            self.finished = true;
            events.push(RawEvent::error(ProviderCause::from_code(&code), error.message));
            return events;
        }

        // Only the first choice is used; the request never asks for more.
        let Some(choice) = chunk.choices.into_iter().find(|c| c.index == 0) else {
            return events;
        };
        let delta = choice.delta;

        if let Some(reasoning) = delta.reasoning_content {
            self.thought.push_str(&reasoning);
        }

        if let Some(content) = delta.content {
            if !content.is_empty() {
                self.flush_thought(&mut events);
                self.text.push_str(&content);
            }
        }

        if let Some(tool_calls) = delta.tool_calls {
            self.flush_thought(&mut events);
            self.flush_text(&mut events);
            for fragment in tool_calls {
                self.accumulate(fragment);
            }
        }

        if let Some(reason) = choice.finish_reason {
            debug!(reason = %reason, "openai stream finished");
            self.flush_all(&mut events);
            events.push(RawEvent::finish(reason));
            self.finished = true;
        }

        events
    }

    /// Flush whatever is buffered once `[DONE]` arrives. A response closed
    /// that way without a finish reason is closed with `stop`.
    pub fn finish(&mut self) -> Vec<RawEvent> {
        let mut events = Vec::new();
        if self.finished {
            return events;
        }
        self.flush_all(&mut events);
        events.push(RawEvent::finish("stop"));
        self.finished = true;
        events
    }

    fn accumulate(&mut self, fragment: OpenAIStreamToolCall) {
        let state = self.tool_calls.entry(fragment.index).or_default();
        if let Some(id) = fragment.id {
            state.id = id;
        }
        if let Some(function) = fragment.function {
            if let Some(name) = function.name {
                state.name.push_str(&name);
            }
            if let Some(arguments) = function.arguments {
                state.arguments.push_str(&arguments);
            }
        }
    }

    fn flush_all(&mut self, events: &mut Vec<RawEvent>) {
        self.flush_thought(events);
        self.flush_text(events);
        for (index, call) in std::mem::take(&mut self.tool_calls) {
            let id = if call.id.is_empty() {
                format!("call_{}", index)
            } else {
                call.id
            };
            let arguments = if call.arguments.trim().is_empty() {
                Value::Object(Default::default())
            } else {
                Value::String(call.arguments)
            };
            events.push(RawEvent::tool_call(id, call.name, arguments));
        }
    }

    fn flush_text(&mut self, events: &mut Vec<RawEvent>) {
        if !self.text.is_empty() {
            events.push(RawEvent::text(std::mem::take(&mut self.text)));
        }
    }

    fn flush_thought(&mut self, events: &mut Vec<RawEvent>) {
        if !self.thought.is_empty() {
            events.push(RawEvent::thought(std::mem::take(&mut self.thought)));
        }
    }
}
