//! Command gate: decides whether a shell command may run under a policy.
//!
//! `validate` is a pure function of the command and a policy snapshot.
//! `authorize` additionally persists AutoAdd mutations through the store.

use flourish_core::{BlockReason, Decision, FlourishError, MutationPolicy, SecurityPolicy};
use tracing::{debug, warn};

use crate::policy_store::PolicyStore;

pub struct SecurityGate;

impl SecurityGate {
    pub fn validate(command: &str, policy: &SecurityPolicy) -> Decision {
        let segments = split_segments(command);
        if segments.is_empty() {
            return Decision::blocked(BlockReason::EmptyCommand);
        }

        // Blacklist is checked over every segment before the allowlist is consulted.
        for segment in &segments {
            if let Some(entry) = blacklist_match(segment, &policy.blacklist) {
                return Decision::blocked(BlockReason::Blacklisted {
                    entry: entry.to_string(),
                    segment: segment.clone(),
                });
            }
        }

        if policy.allowlist.is_empty() {
            return Decision::Allowed;
        }

        let mut missing: Vec<String> = Vec::new();
        for segment in &segments {
            if let Some(token) = leading_token(segment) {
                if !policy.is_allowlisted(&token) && !missing.contains(&token) {
                    missing.push(token);
                }
            }
        }

        if missing.is_empty() {
            return Decision::Allowed;
        }

        match policy.mutation {
            MutationPolicy::RequireConfirmation => {
                Decision::blocked(BlockReason::NotAllowlisted { tokens: missing })
            }
            MutationPolicy::AutoAdd => Decision::AllowedWithMutation { added: missing },
        }
    }

    /// Validate against the store's current snapshot and apply any AutoAdd
    /// mutation through it. Mutations are serialized by the store.
    pub fn authorize(
        command: &str,
        store: &PolicyStore,
    ) -> Result<Decision, FlourishError> {
        let policy = store.read();
        let decision = Self::validate(command, &policy);

        if let Decision::AllowedWithMutation { added } = &decision {
            for token in added {
                store.add_to_allowlist(token)?;
            }
            debug!(tokens = ?added, "auto-added tokens to allowlist");
        }
        if let Decision::Blocked { reason } = &decision {
            warn!(command = %command, %reason, "command blocked");
        }

        Ok(decision)
    }
}

/// Split a command line on `|`, `||`, `&&`, `&`, `;`, newlines and the
/// boundaries of subshells and command substitutions. Quotes are not
/// interpreted, so a separator inside a quoted string still splits.
pub fn split_segments(command: &str) -> Vec<String> {
    let mut segments = Vec::new();
    let mut current = String::new();

    let chars: Vec<char> = command.chars().collect();
    for (i, &ch) in chars.iter().enumerate() {
        match ch {
            // `2>&1`, `<&3` and `&>file` are redirections, not separators.
            '&' if is_redirection(&chars, i) => current.push(ch),
            '|' | '&' | ';' | '\n' | '\r' | '(' | ')' | '`' => {
                push_segment(&mut segments, &mut current);
            }
            _ => current.push(ch),
        }
    }
    push_segment(&mut segments, &mut current);
    segments
}

fn is_redirection(chars: &[char], i: usize) -> bool {
    let prev = i.checked_sub(1).and_then(|j| chars.get(j));
    let next = chars.get(i + 1);
    matches!(prev, Some('>') | Some('<')) || matches!(next, Some('>'))
}

fn push_segment(segments: &mut Vec<String>, current: &mut String) {
    let trimmed = current.trim();
    // `$(` leaves a bare `$` or `"$` behind; it carries no executable.
    let meaningful = trimmed
        .trim_matches(|c| c == '$' || c == '"' || c == '\'' || c == '{' || c == '}')
        .trim();
    if !meaningful.is_empty() {
        segments.push(trimmed.to_string());
    }
    current.clear();
}

/// Words that may open a segment without being the command it runs. `{` and
/// `}` only count as standalone words, so `${VAR}` is left alone.
const RESERVED_PREFIXES: &[&str] = &[
    "if", "then", "elif", "else", "fi", "do", "done", "while", "until", "!", "{", "}", "time",
];

/// The words of a segment with leading reserved words and `NAME=value`
/// assignments removed and the executable reduced to its file name.
fn command_words(segment: &str) -> Vec<String> {
    let mut words: Vec<String> = segment
        .split_whitespace()
        .map(|w| w.trim_matches(|c| c == '"' || c == '\'' || c == '$').to_string())
        .filter(|w| !w.is_empty())
        .collect();

    let mut skip = 0;
    while let Some(word) = words.get(skip) {
        if word == "time" {
            skip += 1;
            // `time -p cmd`
            while words.get(skip).is_some_and(|w| w.starts_with('-')) {
                skip += 1;
            }
        } else if RESERVED_PREFIXES.contains(&word.as_str()) || is_env_assignment(word) {
            skip += 1;
        } else {
            break;
        }
    }
    words.drain(..skip);

    if let Some(first) = words.first_mut() {
        if let Some(name) = first.rsplit('/').next() {
            if !name.is_empty() {
                *first = name.to_string();
            }
        }
    }
    words
}

pub fn leading_token(segment: &str) -> Option<String> {
    command_words(segment).into_iter().next()
}

fn is_env_assignment(word: &str) -> bool {
    match word.split_once('=') {
        Some((name, _)) => {
            let mut chars = name.chars();
            matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        None => false,
    }
}

fn blacklist_match<'a, I>(segment: &str, blacklist: I) -> Option<&'a str>
where
    I: IntoIterator<Item = &'a String>,
{
    let words = command_words(segment);
    if words.is_empty() {
        return None;
    }

    blacklist.into_iter().map(String::as_str).find(|entry| {
        let pattern: Vec<&str> = entry.split_whitespace().collect();
        match pattern.len() {
            0 => false,
            1 => words[0] == pattern[0],
            n => words.len() >= n && words.iter().zip(&pattern).all(|(w, p)| w == p),
        }
    })
}
