//! Provider request construction.

use flourish_core::{Turn, TurnState};
use flourish_llms::{Message, ProviderRequest, ToolDefinition};
use flourish_toolbus::ToolBus;

/// Tool catalog advertised to the model, in bus order.
pub fn tool_definitions(toolbus: &ToolBus) -> Vec<ToolDefinition> {
    toolbus
        .list_tools()
        .into_iter()
        .map(|t| ToolDefinition::new(t.name, t.description, t.parameters))
        .collect()
}

/// User inputs and final texts of the completed turns, oldest first.
/// Failed and unfinished turns contribute nothing.
pub fn history_messages<'a, I>(turns: I) -> Vec<Message>
where
    I: IntoIterator<Item = &'a Turn>,
{
    turns
        .into_iter()
        .filter(|t| t.state == TurnState::Completed)
        .flat_map(|t| {
            let reply = t.final_text().unwrap_or_default();
            [Message::user(&t.input), Message::assistant(reply)]
        })
        .collect()
}

/// Assemble the request for one provider round.
pub fn build_request(
    model: &str,
    system_prompt: &str,
    messages: &[Message],
    tools: &[ToolDefinition],
) -> ProviderRequest {
    let request = ProviderRequest::new(model)
        .with_messages(messages.iter().cloned())
        .with_tools(tools.to_vec());

    if system_prompt.trim().is_empty() {
        request
    } else {
        request.with_system_prompt(system_prompt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flourish_core::{TurnError, TurnResult};

    fn completed(input: &str, reply: &str) -> Turn {
        let mut turn = Turn::new(input);
        turn.advance(TurnState::Streaming).unwrap();
        turn.complete(TurnResult {
            final_text: reply.to_string(),
            ..Default::default()
        })
        .unwrap();
        turn
    }

    #[test]
    fn test_history_skips_failed_turns() {
        let mut failed = Turn::new("broken");
        failed.fail(TurnError::Cancelled).unwrap();

        let turns = vec![completed("one", "1"), failed, completed("two", "2")];
        let messages = history_messages(&turns);

        assert_eq!(
            messages,
            vec![
                Message::user("one"),
                Message::assistant("1"),
                Message::user("two"),
                Message::assistant("2"),
            ]
        );
    }

    #[test]
    fn test_build_request() {
        let tools = vec![ToolDefinition::new("execute_bash", "run", serde_json::json!({}))];
        let request = build_request("m", "be brief", &[Message::user("hi")], &tools);
        assert_eq!(request.model, "m");
        assert_eq!(request.system_prompt.as_deref(), Some("be brief"));
        assert_eq!(request.tools.len(), 1);

        let bare = build_request("m", "  ", &[], &[]);
        assert!(bare.system_prompt.is_none());
    }
}
