//! Test doubles for the physical delete capability.
//!
//! Only available with the `testing` feature or during tests.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;

use crate::delete::PhysicalDelete;
use crate::entry::DroppedTableEntry;

#[derive(Debug, Default)]
struct Script {
    calls: Vec<String>,
    /// Remaining forced failures per path
    failures: HashMap<String, usize>,
    /// Paths whose delete never returns
    hangs: HashSet<String>,
    /// Paths whose next delete removes the data, then takes this long to return
    stalls: HashMap<String, Duration>,
    deleted: HashSet<String>,
    /// Deletes of a path that was already gone
    repeats: HashMap<String, usize>,
    delay: Option<Duration>,
}

/// In-memory [`PhysicalDelete`] keyed by metadata path, with scripted
/// behaviour per path.
///
/// Deleting a path that is already gone succeeds, like an idempotent storage
/// layer, but is counted in [`ScriptedDeleter::repeat_deletes`].
#[derive(Debug, Default)]
pub struct ScriptedDeleter {
    script: Mutex<Script>,
}

impl ScriptedDeleter {
    pub fn new() -> Self {
        Self::default()
    }

    fn script(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Fail the next `times` deletes of `path`.
    pub fn fail_next(&self, path: &str, times: usize) {
        self.script().failures.insert(path.to_string(), times);
    }

    /// Never return from deletes of `path`.
    pub fn hang_on(&self, path: &str) {
        self.script().hangs.insert(path.to_string());
    }

    /// Remove `path` on the next delete, then wait `stall` before returning.
    pub fn stall_next(&self, path: &str, stall: Duration) {
        self.script().stalls.insert(path.to_string(), stall);
    }

    /// Sleep this long inside every delete before acting.
    pub fn with_delay(self, delay: Duration) -> Self {
        self.script().delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.script().calls.clone()
    }

    pub fn call_count(&self, path: &str) -> usize {
        self.script().calls.iter().filter(|call| *call == path).count()
    }

    pub fn is_deleted(&self, path: &str) -> bool {
        self.script().deleted.contains(path)
    }

    /// How many deletes of `path` found it already removed.
    pub fn repeat_deletes(&self, path: &str) -> usize {
        self.script().repeats.get(path).copied().unwrap_or(0)
    }
}

#[async_trait]
impl PhysicalDelete for ScriptedDeleter {
    async fn delete(&self, entry: &DroppedTableEntry) -> Result<()> {
        let path = entry.metadata_path();
        let delay = {
            let mut script = self.script();
            script.calls.push(path.to_string());
            script.delay
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let (hang, stall) = {
            let mut script = self.script();
            if script.hangs.contains(path) {
                (true, None)
            } else if let Some(remaining) = script
                .failures
                .get_mut(path)
                .filter(|remaining| **remaining > 0)
            {
                *remaining -= 1;
                anyhow::bail!("injected failure deleting {path}");
            } else {
                if !script.deleted.insert(path.to_string()) {
                    *script.repeats.entry(path.to_string()).or_insert(0) += 1;
                }
                (false, script.stalls.remove(path))
            }
        };

        if hang {
            std::future::pending::<()>().await;
        }
        if let Some(stall) = stall {
            tokio::time::sleep(stall).await;
        }
        Ok(())
    }
}
