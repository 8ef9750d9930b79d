//! Durable allowlist/blacklist state.
//!
//! Every mutation is a read-merge-write under one lock, and the file is
//! replaced with a temp-file rename so a crash never leaves it half written.

use std::collections::BTreeSet;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use flourish_core::{FlourishError, MutationPolicy, Result, SecurityPolicy, DEFAULT_BLACKLIST};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// On-disk shape of the policy file.
#[derive(Debug, Default, Serialize, Deserialize)]
struct PolicyFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    allowlist: Option<BTreeSet<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    blacklist: Option<BTreeSet<String>>,
}

/// Values used when the policy file does not exist yet, and the blacklist
/// used when it cannot be read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyDefaults {
    pub allowlist: Vec<String>,
    pub blacklist: Vec<String>,
}

impl Default for PolicyDefaults {
    fn default() -> Self {
        Self {
            allowlist: Vec::new(),
            blacklist: DEFAULT_BLACKLIST.iter().map(|s| s.to_string()).collect(),
        }
    }
}

#[derive(Debug)]
struct Snapshot {
    policy: SecurityPolicy,
    degraded: bool,
}

pub struct PolicyStore {
    path: Option<PathBuf>,
    defaults: PolicyDefaults,
    mutation: MutationPolicy,
    memory: Mutex<SecurityPolicy>,
    degraded: AtomicBool,
}

impl PolicyStore {
    /// Store backed by a JSON file. The file is created on the first mutation.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            defaults: PolicyDefaults::default(),
            mutation: MutationPolicy::default(),
            memory: Mutex::new(SecurityPolicy::new()),
            degraded: AtomicBool::new(false),
        }
    }

    /// Store that only lives in memory, seeded with `policy`.
    pub fn in_memory(policy: SecurityPolicy) -> Self {
        let mutation = policy.mutation;
        Self {
            path: None,
            defaults: PolicyDefaults::default(),
            mutation,
            memory: Mutex::new(policy),
            degraded: AtomicBool::new(false),
        }
    }

    pub fn with_defaults(mut self, defaults: PolicyDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn with_mutation(mut self, mutation: MutationPolicy) -> Self {
        self.mutation = mutation;
        self.lock_memory().mutation = mutation;
        self
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn mutation(&self) -> MutationPolicy {
        self.mutation
    }

    /// True when the last read found an unreadable file and fell back to
    /// the fail-closed policy.
    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::SeqCst)
    }

    /// Point-in-time snapshot of the policy.
    pub fn read(&self) -> SecurityPolicy {
        let guard = self.lock_memory();
        self.load(&guard).policy
    }

    pub fn add_to_allowlist(&self, token: &str) -> Result<SecurityPolicy> {
        self.update(|policy| policy.allowlist.insert(normalize(token)?.to_string()).then_some(()))
    }

    pub fn remove_from_allowlist(&self, token: &str) -> Result<SecurityPolicy> {
        self.update(|policy| policy.allowlist.remove(normalize(token)?).then_some(()))
    }

    pub fn add_to_blacklist(&self, entry: &str) -> Result<SecurityPolicy> {
        self.update(|policy| policy.blacklist.insert(normalize(entry)?.to_string()).then_some(()))
    }

    pub fn remove_from_blacklist(&self, entry: &str) -> Result<SecurityPolicy> {
        self.update(|policy| policy.blacklist.remove(normalize(entry)?).then_some(()))
    }

    /// Read-merge-write under the store lock. `apply` returns `None` when
    /// nothing changed, in which case nothing is written.
    fn update<F>(&self, apply: F) -> Result<SecurityPolicy>
    where
        F: FnOnce(&mut SecurityPolicy) -> Option<()>,
    {
        let mut guard = self.lock_memory();
        let Snapshot {
            mut policy,
            degraded,
        } = self.load(&guard);

        if apply(&mut policy).is_none() {
            return Ok(policy);
        }

        match &self.path {
            Some(path) => {
                if degraded {
                    quarantine(path)?;
                }
                write_atomic(path, &policy)?;
                self.degraded.store(false, Ordering::SeqCst);
            }
            None => *guard = policy.clone(),
        }

        Ok(policy)
    }

    fn load(&self, memory: &SecurityPolicy) -> Snapshot {
        let Some(path) = &self.path else {
            return Snapshot {
                policy: memory.clone(),
                degraded: false,
            };
        };

        let snapshot = match std::fs::read_to_string(path) {
            Ok(text) => match serde_json::from_str::<PolicyFile>(&text) {
                Ok(file) => Snapshot {
                    policy: self.from_file(file),
                    degraded: false,
                },
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "policy file is corrupt, failing closed");
                    self.fail_closed()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Snapshot {
                policy: self.from_file(PolicyFile::default()),
                degraded: false,
            },
            Err(e) => {
                warn!(path = %path.display(), error = %e, "policy file is unreadable, failing closed");
                self.fail_closed()
            }
        };

        self.degraded.store(snapshot.degraded, Ordering::SeqCst);
        snapshot
    }

    fn from_file(&self, file: PolicyFile) -> SecurityPolicy {
        let allowlist = file
            .allowlist
            .unwrap_or_else(|| self.defaults.allowlist.iter().cloned().collect());
        let blacklist = file
            .blacklist
            .unwrap_or_else(|| self.defaults.blacklist.iter().cloned().collect());
        SecurityPolicy {
            allowlist,
            blacklist,
            mutation: self.mutation,
        }
    }

    fn fail_closed(&self) -> Snapshot {
        Snapshot {
            policy: SecurityPolicy::fail_closed(&self.defaults.blacklist, self.mutation),
            degraded: true,
        }
    }

    fn lock_memory(&self) -> MutexGuard<'_, SecurityPolicy> {
        self.memory.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn normalize(entry: &str) -> Option<&str> {
    let trimmed = entry.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}

/// Path the unreadable policy file is moved to before it is replaced.
pub fn quarantine_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".corrupt");
    path.with_file_name(name)
}

fn quarantine(path: &Path) -> Result<()> {
    if path.exists() {
        let target = quarantine_path(path);
        std::fs::rename(path, &target)?;
        info!(from = %path.display(), to = %target.display(), "moved unreadable policy file aside");
    }
    Ok(())
}

fn write_atomic(path: &Path, policy: &SecurityPolicy) -> Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent)?;

    let file = PolicyFile {
        allowlist: Some(policy.allowlist.clone()),
        blacklist: Some(policy.blacklist.clone()),
    };
    let content = serde_json::to_string_pretty(&file)?;

    let mut temp_file = tempfile::NamedTempFile::new_in(parent)?;
    temp_file.write_all(content.as_bytes())?;
    temp_file.as_file().sync_all()?;
    temp_file
        .persist(path)
        .map_err(|e| FlourishError::Policy(format!("failed to persist policy file: {}", e)))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn store_in(dir: &TempDir) -> PolicyStore {
        PolicyStore::open(dir.path().join("commands.json"))
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir).with_defaults(PolicyDefaults {
            allowlist: vec!["ls".to_string()],
            blacklist: vec!["rm".to_string()],
        });

        let policy = store.read();
        assert!(policy.is_allowlisted("ls"));
        assert!(policy.blacklist.contains("rm"));
        assert!(!store.is_degraded());
        assert!(!dir.path().join("commands.json").exists());
    }

    #[test]
    fn test_add_to_allowlist_persists() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        let policy = store.add_to_allowlist("curl").unwrap();
        assert!(policy.is_allowlisted("curl"));

        let text = std::fs::read_to_string(dir.path().join("commands.json")).unwrap();
        let json: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(json["allowlist"], serde_json::json!(["curl"]));
        assert!(json["blacklist"].as_array().unwrap().contains(&"rm".into()));

        // A fresh store sees the same state.
        assert!(store_in(&dir).read().is_allowlisted("curl"));
    }

    #[test]
    fn test_add_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        store.add_to_allowlist("git").unwrap();
        let again = store.add_to_allowlist("git").unwrap();
        assert_eq!(again.allowlist.len(), 1);
    }

    #[test]
    fn test_remove_entries() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        store.add_to_allowlist("git").unwrap();
        let policy = store.remove_from_allowlist("git").unwrap();
        assert!(!policy.is_allowlisted("git"));

        let policy = store.remove_from_blacklist("rm").unwrap();
        assert!(!policy.blacklist.contains("rm"));
        let policy = store.add_to_blacklist("shutdown").unwrap();
        assert!(policy.blacklist.contains("shutdown"));
    }

    #[test]
    fn test_blank_entry_is_ignored() {
        let store = PolicyStore::in_memory(SecurityPolicy::new());
        let policy = store.add_to_allowlist("   ").unwrap();
        assert!(policy.allowlist.is_empty());
    }

    #[test]
    fn test_corrupt_file_fails_closed() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("commands.json");
        std::fs::write(&path, "{ not json").unwrap();
        let store = PolicyStore::open(&path);

        let policy = store.read();
        assert!(store.is_degraded());
        assert!(policy.allowlist.is_empty());
        for entry in DEFAULT_BLACKLIST {
            assert!(policy.blacklist.contains(*entry));
        }
    }

    #[test]
    fn test_corrupt_file_moved_aside_on_write() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("commands.json");
        std::fs::write(&path, "{ not json").unwrap();
        let store = PolicyStore::open(&path);

        store.add_to_allowlist("ls").unwrap();
        assert!(!store.is_degraded());
        assert_eq!(
            std::fs::read_to_string(quarantine_path(&path)).unwrap(),
            "{ not json"
        );
        assert!(store.read().is_allowlisted("ls"));
    }

    #[test]
    fn test_concurrent_adds_do_not_lose_updates() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(store_in(&dir));

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    store.add_to_allowlist(&format!("tool{}", i)).unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let policy = store_in(&dir).read();
        for i in 0..8 {
            assert!(policy.is_allowlisted(&format!("tool{}", i)));
        }
    }

    #[test]
    fn test_in_memory_store_keeps_mutation_flag() {
        let store = PolicyStore::in_memory(
            SecurityPolicy::new().with_mutation(MutationPolicy::AutoAdd),
        );
        store.add_to_allowlist("ls").unwrap();
        let policy = store.read();
        assert_eq!(policy.mutation, MutationPolicy::AutoAdd);
        assert!(policy.is_allowlisted("ls"));
    }
}
