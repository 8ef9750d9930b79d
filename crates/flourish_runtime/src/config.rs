//! Runtime configuration for flourish

use std::path::PathBuf;
use std::time::Duration;

use flourish_core::{MutationPolicy, DEFAULT_BLACKLIST};

pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are flourish, a shell assistant. \
Answer the user's request directly. When you need information from the machine or need to \
change something on it, call the execute_bash tool with a single shell command and read its \
stdout, stderr and exit code before continuing. Commands can be refused by the user's \
allowlist or blacklist; when that happens, explain what was refused instead of retrying \
the same command. Use set_cwd to change directory rather than `cd` inside a command.";

/// Runtime configuration
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Model name sent with every provider request
    pub model: String,
    /// API key for the OpenAI-compatible endpoint
    pub api_key: Option<String>,
    /// Base URL of the OpenAI-compatible endpoint
    pub api_base: String,
    /// Policy file; `None` keeps the policy in memory only
    pub policy_file: Option<PathBuf>,
    /// Allowlist used until the policy file exists
    pub default_allowlist: Vec<String>,
    /// Blacklist used until the policy file exists, and when it cannot be read
    pub default_blacklist: Vec<String>,
    pub mutation_policy: MutationPolicy,
    /// Upper bound on a single command
    pub tool_timeout: Duration,
    /// Upper bound on the wait for the next provider event
    pub provider_idle_timeout: Duration,
    /// Provider rounds allowed per turn
    pub max_rounds: u32,
    /// Feed earlier completed turns of the session into each new request
    pub carry_context: bool,
    /// Directory for JSONL session audit logs; `None` disables them
    pub log_dir: Option<PathBuf>,
    /// Initial working directory of every session
    pub working_dir: PathBuf,
    pub system_prompt: String,
}

impl RuntimeConfig {
    pub fn new(working_dir: PathBuf) -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            api_key: None,
            api_base: DEFAULT_API_BASE.to_string(),
            policy_file: None,
            default_allowlist: Vec::new(),
            default_blacklist: DEFAULT_BLACKLIST.iter().map(|s| s.to_string()).collect(),
            mutation_policy: MutationPolicy::default(),
            tool_timeout: Duration::from_secs(60),
            provider_idle_timeout: Duration::from_secs(120),
            max_rounds: 10,
            carry_context: false,
            log_dir: None,
            working_dir,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into();
        self
    }

    pub fn with_policy_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.policy_file = Some(path.into());
        self
    }

    pub fn with_default_allowlist<I, S>(mut self, entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.default_allowlist = entries.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_default_blacklist<I, S>(mut self, entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.default_blacklist = entries.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_mutation_policy(mut self, policy: MutationPolicy) -> Self {
        self.mutation_policy = policy;
        self
    }

    pub fn with_tool_timeout(mut self, timeout: Duration) -> Self {
        self.tool_timeout = timeout;
        self
    }

    pub fn with_provider_idle_timeout(mut self, timeout: Duration) -> Self {
        self.provider_idle_timeout = timeout;
        self
    }

    pub fn with_max_rounds(mut self, max: u32) -> Self {
        self.max_rounds = max.max(1);
        self
    }

    pub fn with_carry_context(mut self, carry: bool) -> Self {
        self.carry_context = carry;
        self
    }

    pub fn with_log_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.log_dir = Some(dir.into());
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    /// Load configuration from environment variables
    pub fn from_env(working_dir: PathBuf) -> Self {
        Self::from_lookup(working_dir, |key| std::env::var(key).ok())
    }

    /// Same as `from_env`, reading values through `lookup`. Unparseable
    /// values are ignored and the default kept.
    pub fn from_lookup<F>(working_dir: PathBuf, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::new(working_dir);
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(model) = get("FLOURISH_MODEL").or_else(|| get("MODEL")) {
            config.model = model;
        }

        config.api_key = get("API_KEY").or_else(|| get("OPENAI_API_KEY"));

        if let Some(base) = get("API_BASE") {
            config.api_base = base;
        }

        if let Some(path) = get("FLOURISH_POLICY_FILE") {
            config.policy_file = Some(PathBuf::from(path));
        }

        if let Some(list) = get("DEFAULT_ALLOWLIST") {
            config.default_allowlist = split_list(&list);
        }

        if let Some(list) = get("DEFAULT_BLACKLIST") {
            config.default_blacklist = split_list(&list);
        }

        if let Some(policy) = get("FLOURISH_MUTATION_POLICY") {
            if let Ok(val) = policy.parse::<MutationPolicy>() {
                config.mutation_policy = val;
            }
        }

        if let Some(secs) = get("FLOURISH_TOOL_TIMEOUT_SECS") {
            if let Ok(val) = secs.trim().parse::<u64>() {
                config.tool_timeout = Duration::from_secs(val);
            }
        }

        if let Some(secs) = get("FLOURISH_PROVIDER_TIMEOUT_SECS") {
            if let Ok(val) = secs.trim().parse::<u64>() {
                config.provider_idle_timeout = Duration::from_secs(val);
            }
        }

        if let Some(max) = get("FLOURISH_MAX_ROUNDS") {
            if let Ok(val) = max.trim().parse::<u32>() {
                config.max_rounds = val.max(1);
            }
        }

        if let Some(carry) = get("FLOURISH_CARRY_CONTEXT") {
            config.carry_context = matches!(
                carry.trim().to_lowercase().as_str(),
                "1" | "true" | "yes" | "on"
            );
        }

        if let Some(dir) = get("FLOURISH_LOG_DIR") {
            config.log_dir = Some(PathBuf::from(dir));
        }

        config
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_runtime_config_new() {
        let config = RuntimeConfig::new(PathBuf::from("/repo"));
        assert_eq!(config.model, "gpt-4o-mini");
        assert_eq!(config.api_base, "https://api.openai.com/v1");
        assert_eq!(config.mutation_policy, MutationPolicy::RequireConfirmation);
        assert_eq!(config.tool_timeout, Duration::from_secs(60));
        assert_eq!(config.provider_idle_timeout, Duration::from_secs(120));
        assert_eq!(config.max_rounds, 10);
        assert!(!config.carry_context);
        assert!(config.default_allowlist.is_empty());
        assert!(config.default_blacklist.contains(&"chmod 777".to_string()));
    }

    #[test]
    fn test_runtime_config_builder() {
        let config = RuntimeConfig::new(PathBuf::from("/repo"))
            .with_model("gpt-4o")
            .with_api_key("sk-test")
            .with_default_allowlist(["ls", "git"])
            .with_mutation_policy(MutationPolicy::AutoAdd)
            .with_max_rounds(0)
            .with_carry_context(true);

        assert_eq!(config.model, "gpt-4o");
        assert_eq!(config.api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.default_allowlist, vec!["ls", "git"]);
        assert_eq!(config.mutation_policy, MutationPolicy::AutoAdd);
        assert_eq!(config.max_rounds, 1);
        assert!(config.carry_context);
    }

    #[test]
    fn test_from_lookup_reads_all_keys() {
        let config = RuntimeConfig::from_lookup(
            PathBuf::from("/repo"),
            lookup(&[
                ("MODEL", "fallback-model"),
                ("FLOURISH_MODEL", "gpt-4.1"),
                ("OPENAI_API_KEY", "sk-openai"),
                ("API_BASE", "http://localhost:8080/v1"),
                ("FLOURISH_POLICY_FILE", "/tmp/commands.json"),
                ("DEFAULT_ALLOWLIST", "ls, git ,,cat"),
                ("DEFAULT_BLACKLIST", "rm,shutdown"),
                ("FLOURISH_MUTATION_POLICY", "auto_add"),
                ("FLOURISH_TOOL_TIMEOUT_SECS", "5"),
                ("FLOURISH_PROVIDER_TIMEOUT_SECS", "30"),
                ("FLOURISH_MAX_ROUNDS", "3"),
                ("FLOURISH_CARRY_CONTEXT", "true"),
                ("FLOURISH_LOG_DIR", "/tmp/logs"),
            ]),
        );

        assert_eq!(config.model, "gpt-4.1");
        assert_eq!(config.api_key.as_deref(), Some("sk-openai"));
        assert_eq!(config.api_base, "http://localhost:8080/v1");
        assert_eq!(config.policy_file, Some(PathBuf::from("/tmp/commands.json")));
        assert_eq!(config.default_allowlist, vec!["ls", "git", "cat"]);
        assert_eq!(config.default_blacklist, vec!["rm", "shutdown"]);
        assert_eq!(config.mutation_policy, MutationPolicy::AutoAdd);
        assert_eq!(config.tool_timeout, Duration::from_secs(5));
        assert_eq!(config.provider_idle_timeout, Duration::from_secs(30));
        assert_eq!(config.max_rounds, 3);
        assert!(config.carry_context);
        assert_eq!(config.log_dir, Some(PathBuf::from("/tmp/logs")));
    }

    #[test]
    fn test_from_lookup_api_key_precedence() {
        let config = RuntimeConfig::from_lookup(
            PathBuf::from("/repo"),
            lookup(&[("API_KEY", "primary"), ("OPENAI_API_KEY", "secondary")]),
        );
        assert_eq!(config.api_key.as_deref(), Some("primary"));
    }

    #[test]
    fn test_from_lookup_ignores_bad_values() {
        let config = RuntimeConfig::from_lookup(
            PathBuf::from("/repo"),
            lookup(&[
                ("FLOURISH_MUTATION_POLICY", "sometimes"),
                ("FLOURISH_MAX_ROUNDS", "many"),
                ("FLOURISH_TOOL_TIMEOUT_SECS", "-1"),
                ("FLOURISH_MODEL", "  "),
            ]),
        );
        assert_eq!(config.mutation_policy, MutationPolicy::RequireConfirmation);
        assert_eq!(config.max_rounds, 10);
        assert_eq!(config.tool_timeout, Duration::from_secs(60));
        assert_eq!(config.model, "gpt-4o-mini");
    }
}
