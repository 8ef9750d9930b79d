//! `flourish policy` subcommands.

use anyhow::Result;
use flourish_core::SecurityPolicy;
use flourish_toolbus::PolicyStore;

use crate::cli::PolicyAction;
use crate::output;

pub fn handle(store: &PolicyStore, action: PolicyAction) -> Result<()> {
    match action {
        PolicyAction::List => {
            list(store);
            Ok(())
        }
        PolicyAction::Allow { command } => {
            let policy = store.add_to_allowlist(command.trim())?;
            changed(store, &format!("Allowlisted {}", command.trim()), &policy);
            Ok(())
        }
        PolicyAction::Unallow { command } => {
            let policy = store.remove_from_allowlist(command.trim())?;
            changed(store, &format!("Removed {} from the allowlist", command.trim()), &policy);
            Ok(())
        }
        PolicyAction::Deny { command } => {
            let policy = store.add_to_blacklist(command.trim())?;
            changed(store, &format!("Blacklisted {}", command.trim()), &policy);
            Ok(())
        }
        PolicyAction::Undeny { command } => {
            let policy = store.remove_from_blacklist(command.trim())?;
            changed(store, &format!("Removed {} from the blacklist", command.trim()), &policy);
            Ok(())
        }
    }
}

fn list(store: &PolicyStore) {
    let policy = store.read();
    if store.is_degraded() {
        output::warning("Policy file is unreadable; showing the fail-closed policy");
    }
    if let Some(path) = store.path() {
        output::kv("file", &path.display().to_string());
    }
    output::kv("mutation", policy.mutation.as_str());

    let mut table = output::table();
    output::table_header(&mut table, &["List", "Entry"]);
    for entry in &policy.allowlist {
        output::table_row(&mut table, "allow", entry);
    }
    for entry in &policy.blacklist {
        output::table_row(&mut table, "deny", entry);
    }
    if policy.allowlist.is_empty() {
        output::dim("Allowlist is empty: every command not blacklisted is allowed");
    }
    output::table_print(&table, &policy_json(&policy));
}

fn changed(store: &PolicyStore, message: &str, policy: &SecurityPolicy) {
    output::success(message);
    if output::is_json() {
        output::data("policy", &policy_json(policy));
    } else if let Some(path) = store.path() {
        output::dim(&format!("  saved to {}", path.display()));
    }
}

fn policy_json(policy: &SecurityPolicy) -> serde_json::Value {
    serde_json::json!({
        "allowlist": policy.allowlist,
        "blacklist": policy.blacklist,
        "mutation": policy.mutation,
    })
}
