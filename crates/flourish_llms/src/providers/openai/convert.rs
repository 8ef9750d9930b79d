//! Conversion from provider-neutral requests to OpenAI requests.

use super::types::{
    OpenAIFunction, OpenAIFunctionCall, OpenAIMessage, OpenAIRequest, OpenAITool, OpenAIToolCall,
};
use crate::types::{Message, ProviderRequest, ToolDefinition};

pub fn to_openai_request(request: &ProviderRequest, stream: bool) -> OpenAIRequest {
    let mut messages = Vec::with_capacity(request.messages.len() + 1);

    if let Some(system) = &request.system_prompt {
        messages.push(OpenAIMessage {
            role: "system".to_string(),
            content: Some(system.clone()),
            tool_calls: None,
            tool_call_id: None,
        });
    }

    messages.extend(request.messages.iter().map(to_openai_message));

    let tools = (!request.tools.is_empty())
        .then(|| request.tools.iter().map(to_openai_tool).collect());

    OpenAIRequest {
        model: request.model.clone(),
        messages,
        stream,
        tools,
    }
}

fn to_openai_message(message: &Message) -> OpenAIMessage {
    match message {
        Message::User { content } => OpenAIMessage {
            role: "user".to_string(),
            content: Some(content.clone()),
            tool_calls: None,
            tool_call_id: None,
        },
        Message::Assistant {
            content,
            tool_calls,
        } => {
            let calls: Vec<OpenAIToolCall> = tool_calls
                .iter()
                .map(|call| OpenAIToolCall {
                    id: call.call_id.clone(),
                    type_: "function".to_string(),
                    function: OpenAIFunctionCall {
                        name: call.name.clone(),
                        arguments: call.arguments.to_string(),
                    },
                })
                .collect();
            OpenAIMessage {
                role: "assistant".to_string(),
                content: (!content.is_empty() || calls.is_empty()).then(|| content.clone()),
                tool_calls: (!calls.is_empty()).then_some(calls),
                tool_call_id: None,
            }
        }
        Message::Tool { call_id, content } => OpenAIMessage {
            role: "tool".to_string(),
            content: Some(content.clone()),
            tool_calls: None,
            tool_call_id: Some(call_id.clone()),
        },
    }
}

fn to_openai_tool(tool: &ToolDefinition) -> OpenAITool {
    OpenAITool {
        type_: "function".to_string(),
        function: OpenAIFunction {
            name: tool.name.clone(),
            description: tool.description.clone(),
            parameters: tool.parameters.clone(),
        },
    }
}
