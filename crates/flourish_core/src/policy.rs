use std::collections::BTreeSet;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Blacklist used when no policy file exists or the file cannot be read.
pub const DEFAULT_BLACKLIST: &[&str] = &["rm", "dd", "format", "mkfs", "chmod 777"];

/// What the gate does with a command whose executable is not allowlisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationPolicy {
    AutoAdd,
    #[default]
    RequireConfirmation,
}

impl MutationPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            MutationPolicy::AutoAdd => "auto_add",
            MutationPolicy::RequireConfirmation => "require_confirmation",
        }
    }
}

impl FromStr for MutationPolicy {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "auto_add" | "auto" => Ok(MutationPolicy::AutoAdd),
            "require_confirmation" | "confirm" => Ok(MutationPolicy::RequireConfirmation),
            _ => Err(()),
        }
    }
}

impl std::fmt::Display for MutationPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time allowlist/blacklist snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SecurityPolicy {
    pub allowlist: BTreeSet<String>,
    pub blacklist: BTreeSet<String>,
    #[serde(default)]
    pub mutation: MutationPolicy,
}

impl SecurityPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_allowlist<I, S>(mut self, entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowlist.extend(entries.into_iter().map(Into::into));
        self
    }

    pub fn with_blacklist<I, S>(mut self, entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.blacklist.extend(entries.into_iter().map(Into::into));
        self
    }

    pub fn with_mutation(mut self, mutation: MutationPolicy) -> Self {
        self.mutation = mutation;
        self
    }

    /// Empty allowlist plus the default blacklist.
    pub fn fail_closed(default_blacklist: &[String], mutation: MutationPolicy) -> Self {
        Self::new()
            .with_blacklist(default_blacklist.iter().cloned())
            .with_mutation(mutation)
    }

    pub fn is_allowlisted(&self, token: &str) -> bool {
        self.allowlist.contains(token)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BlockReason {
    EmptyCommand,
    Blacklisted { entry: String, segment: String },
    NotAllowlisted { tokens: Vec<String> },
    PolicyUnavailable { detail: String },
}

impl std::fmt::Display for BlockReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BlockReason::EmptyCommand => write!(f, "empty command"),
            BlockReason::Blacklisted { entry, segment } => write!(
                f,
                "command '{}' is blacklisted ('{}') and cannot be executed",
                segment, entry
            ),
            BlockReason::NotAllowlisted { tokens } => write!(
                f,
                "not allowlisted: {} (confirmation required)",
                tokens.join(", ")
            ),
            BlockReason::PolicyUnavailable { detail } => {
                write!(f, "policy store unavailable: {}", detail)
            }
        }
    }
}

/// The gate's verdict on a command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Decision {
    Blocked { reason: BlockReason },
    Allowed,
    AllowedWithMutation { added: Vec<String> },
}

impl Decision {
    pub fn blocked(reason: BlockReason) -> Self {
        Decision::Blocked { reason }
    }

    pub fn is_blocked(&self) -> bool {
        matches!(self, Decision::Blocked { .. })
    }

    pub fn is_allowed(&self) -> bool {
        !self.is_blocked()
    }

    pub fn block_reason(&self) -> Option<&BlockReason> {
        match self {
            Decision::Blocked { reason } => Some(reason),
            _ => None,
        }
    }

    /// Tokens a confirmation step would need to allowlist before a retry.
    pub fn pending_confirmation(&self) -> Option<&[String]> {
        match self {
            Decision::Blocked {
                reason: BlockReason::NotAllowlisted { tokens },
            } => Some(tokens),
            _ => None,
        }
    }
}
