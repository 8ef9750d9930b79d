//! `flourish chat`: a line-oriented session.

use std::io::Write;

use anyhow::Result;
use console::style;
use flourish_core::TurnError;
use flourish_runtime::Runtime;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::commands::run::run_turn;
use crate::output;

const EXIT_WORDS: &[&str] = &["exit", "quit", ":q"];

pub async fn handle(runtime: &Runtime) -> Result<()> {
    let session = runtime.open_session();
    output::header("flourish chat");
    output::dim("Type a request, or `exit` to leave. Ctrl-C cancels the running turn.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        prompt();
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if EXIT_WORDS.contains(&input) {
            break;
        }

        match run_turn(&session, input, true).await {
            Ok(_) => {}
            Err(TurnError::Cancelled) => output::warning("cancelled"),
            Err(TurnError::SessionClosed) => break,
            Err(e) => output::error(&e.to_string()),
        }
    }

    session.close();
    output::dim(&format!("{} turns", session.turns().len()));
    Ok(())
}

fn prompt() {
    if output::is_json() {
        return;
    }
    print!("{} ", style(">").cyan().bold());
    let _ = std::io::stdout().flush();
}
