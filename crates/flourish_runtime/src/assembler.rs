//! Folds the canonical events of a turn into one [`TurnResult`].
//!
//! The same assembler backs streaming and non-streaming callers, so feeding
//! events one at a time and folding them in one go always agree.

use std::collections::HashMap;

use flourish_core::{Event, OutputPart, ToolCall, ToolInvocation, ToolPart, ToolResult, TurnResult};

/// Longest tool output kept in a tool part, in characters.
pub const TOOL_OUTPUT_LIMIT: usize = 1000;

#[derive(Debug, Default)]
pub struct ResponseAssembler {
    parts: Vec<OutputPart>,
    // call id -> index into `parts`
    tools: HashMap<String, usize>,
    invocations: Vec<ToolInvocation>,
}

impl ResponseAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Batch fold over a complete event sequence.
    pub fn fold<'a, I>(events: I) -> TurnResult
    where
        I: IntoIterator<Item = &'a Event>,
    {
        let mut assembler = Self::new();
        for event in events {
            assembler.push(event);
        }
        assembler.finish()
    }

    /// Apply one event. Returns the part that was added or updated, or
    /// `None` when the event changed nothing visible.
    pub fn push(&mut self, event: &Event) -> Option<OutputPart> {
        match event {
            Event::Text { content } => {
                self.push_unique(OutputPart::Text {
                    content: content.clone(),
                })
            }
            Event::Thought { content } => self.push_unique(OutputPart::Thought {
                content: content.clone(),
            }),
            Event::ToolCall { call } => self.push_tool_call(call),
            Event::ToolResult { result } => Some(self.push_tool_result(result)),
            Event::Terminal { .. } => None,
        }
    }

    /// Keep the audit record of a command executed during the turn.
    pub fn record_invocation(&mut self, invocation: ToolInvocation) {
        self.invocations.push(invocation);
    }

    pub fn parts(&self) -> &[OutputPart] {
        &self.parts
    }

    pub fn final_text(&self) -> String {
        self.parts.iter().filter_map(OutputPart::as_text).collect()
    }

    pub fn snapshot(&self) -> TurnResult {
        TurnResult {
            final_text: self.final_text(),
            parts: self.parts.clone(),
            invocations: self.invocations.clone(),
        }
    }

    pub fn finish(self) -> TurnResult {
        TurnResult {
            final_text: self.final_text(),
            parts: self.parts,
            invocations: self.invocations,
        }
    }

    /// Drops empty parts and exact repeats. Equality includes the kind, so a
    /// Thought and a Text with the same content are both kept.
    fn push_unique(&mut self, part: OutputPart) -> Option<OutputPart> {
        if part_content(&part).is_some_and(str::is_empty) || self.parts.contains(&part) {
            return None;
        }
        self.parts.push(part.clone());
        Some(part)
    }

    fn push_tool_call(&mut self, call: &ToolCall) -> Option<OutputPart> {
        if self.tools.contains_key(&call.call_id) {
            return None;
        }
        let part = OutputPart::Tool(ToolPart {
            call_id: call.call_id.clone(),
            name: call.name.clone(),
            command: command_of(call),
            exit_code: None,
            output: None,
        });
        self.tools.insert(call.call_id.clone(), self.parts.len());
        self.parts.push(part.clone());
        Some(part)
    }

    fn push_tool_result(&mut self, result: &ToolResult) -> OutputPart {
        let index = match self.tools.get(&result.call_id) {
            Some(&index) => index,
            None => {
                // Result without a call: keep it rather than lose the output.
                self.parts.push(OutputPart::Tool(ToolPart {
                    call_id: result.call_id.clone(),
                    name: String::new(),
                    command: String::new(),
                    exit_code: None,
                    output: None,
                }));
                self.tools.insert(result.call_id.clone(), self.parts.len() - 1);
                self.parts.len() - 1
            }
        };

        if let OutputPart::Tool(tool) = &mut self.parts[index] {
            tool.exit_code = Some(result.exit_code);
            tool.output = Some(truncate_chars(&tool_output(result), TOOL_OUTPUT_LIMIT));
        }
        self.parts[index].clone()
    }
}

fn part_content(part: &OutputPart) -> Option<&str> {
    match part {
        OutputPart::Text { content } | OutputPart::Thought { content } => Some(content),
        OutputPart::Tool(_) => None,
    }
}

fn command_of(call: &ToolCall) -> String {
    call.str_arg("cmd")
        .or_else(|| call.str_arg("command"))
        .or_else(|| call.str_arg("path"))
        .map(str::to_string)
        .unwrap_or_else(|| call.arguments.to_string())
}

fn tool_output(result: &ToolResult) -> String {
    let stdout = result.stdout.trim_end();
    let stderr = result.stderr.trim_end();
    match (stdout.is_empty(), stderr.is_empty()) {
        (false, false) => format!("{}\n{}", stdout, stderr),
        (false, true) => stdout.to_string(),
        (true, _) => stderr.to_string(),
    }
}

/// Cut `text` to at most `limit` characters, marking the cut.
pub fn truncate_chars(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((idx, _)) => format!("{}... [truncated]", &text[..idx]),
        None => text.to_string(),
    }
}
