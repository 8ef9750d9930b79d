//! `flourish check`: ask the gate without executing anything.

use anyhow::Result;
use flourish_core::Decision;
use flourish_toolbus::{gate, PolicyStore, SecurityGate};

use crate::output;

/// Prints the decision for `command` against the current policy. The store
/// is only read, so an AutoAdd policy reports what it would add.
pub fn handle(store: &PolicyStore, command: &str) -> Result<()> {
    let policy = store.read();
    let decision = SecurityGate::validate(command, &policy);

    if output::is_json() {
        output::data("decision", &decision);
        return Ok(());
    }

    let segments = gate::split_segments(command);
    output::kv("segments", &segments.join("  |  "));
    match &decision {
        Decision::Allowed => output::success("allowed"),
        Decision::AllowedWithMutation { added } => output::success(&format!(
            "allowed, would add to allowlist: {}",
            added.join(", ")
        )),
        Decision::Blocked { reason } => output::error(&format!("blocked: {reason}")),
    }
    Ok(())
}
