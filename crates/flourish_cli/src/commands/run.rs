//! `flourish run` command.

use std::collections::BTreeSet;

use anyhow::Result;
use flourish_core::{TurnError, TurnResult};
use flourish_runtime::{Runtime, Session};
use flourish_toolbus::PolicyStore;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::output;

pub struct RunMode {
    pub stream: bool,
    pub confirm: bool,
}

pub async fn handle(runtime: &Runtime, prompt: &str, mode: RunMode) -> Result<()> {
    let session = runtime.open_session();
    let mut result = run_turn(&session, prompt, mode.stream).await;

    if mode.confirm {
        let refused = result.as_ref().map(refused_tokens).unwrap_or_default();
        if !refused.is_empty() && approve(runtime.store(), &refused)? {
            output::dim("Retrying with the updated allowlist");
            result = run_turn(&session, prompt, mode.stream).await;
        }
    }

    session.close();
    let result = result?;
    if !mode.stream {
        print_result(&result);
    }
    Ok(())
}

/// Run one turn on `session`. With `stream`, parts are printed as they are
/// assembled; otherwise a spinner runs until the turn ends. Ctrl-C cancels
/// the turn.
pub(crate) async fn run_turn(
    session: &Session,
    input: &str,
    stream: bool,
) -> Result<TurnResult, TurnError> {
    let handle = session.begin_turn(input)?;
    let ctrl_c = cancel_on_ctrl_c(handle.cancel_token());

    let outcome = if stream {
        handle
            .subscribe(
                |_, part| {
                    if let Some(part) = part {
                        output::part(part);
                    }
                },
                |_| {},
                |_| {},
            )
            .await
    } else {
        let spinner = output::spinner("Thinking...");
        let outcome = handle.wait().await;
        match &outcome {
            Ok(_) => spinner.finish_and_clear(),
            Err(e) => output::spinner_error(&spinner, &e.to_string()),
        }
        outcome
    };

    ctrl_c.abort();
    outcome
}

fn cancel_on_ctrl_c(token: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::select! {
            _ = token.cancelled() => {}
            Ok(()) = tokio::signal::ctrl_c() => token.cancel(),
        }
    })
}

fn print_result(result: &TurnResult) {
    if output::is_json() {
        output::data("result", result);
        return;
    }
    for part in &result.parts {
        output::part(part);
    }
}

/// Executable names the gate refused for lack of an allowlist entry.
fn refused_tokens(result: &TurnResult) -> BTreeSet<String> {
    result
        .invocations
        .iter()
        .filter_map(|inv| inv.decision.pending_confirmation())
        .flatten()
        .cloned()
        .collect()
}

fn approve(store: &PolicyStore, tokens: &BTreeSet<String>) -> Result<bool> {
    let list = tokens.iter().cloned().collect::<Vec<_>>().join(", ");
    output::warning(&format!("Refused because not allowlisted: {list}"));
    if !output::confirm("Add them to the allowlist and retry?") {
        return Ok(false);
    }
    for token in tokens {
        store.add_to_allowlist(token)?;
    }
    output::success(&format!("Allowlisted {list}"));
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use flourish_core::{BlockReason, Decision, ToolInvocation};

    fn invocation(decision: Decision) -> ToolInvocation {
        ToolInvocation::new("c1", "curl x | jq .", decision, Utc::now())
    }

    #[test]
    fn test_refused_tokens_collects_not_allowlisted_only() {
        let result = TurnResult {
            invocations: vec![
                invocation(Decision::blocked(BlockReason::NotAllowlisted {
                    tokens: vec!["jq".into(), "curl".into()],
                })),
                invocation(Decision::blocked(BlockReason::Blacklisted {
                    entry: "rm".into(),
                    segment: "rm -rf x".into(),
                })),
                invocation(Decision::blocked(BlockReason::NotAllowlisted {
                    tokens: vec!["curl".into()],
                })),
                invocation(Decision::Allowed),
            ],
            ..TurnResult::default()
        };

        let tokens: Vec<_> = refused_tokens(&result).into_iter().collect();
        assert_eq!(tokens, vec!["curl".to_string(), "jq".to_string()]);
    }

    #[test]
    fn test_refused_tokens_empty_for_clean_turn() {
        assert!(refused_tokens(&TurnResult::default()).is_empty());
    }
}
