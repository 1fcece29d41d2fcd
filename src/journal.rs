/*
 * gsync/src/journal.rs
 *
 * Queue of remote operations that could not be delivered.
 *
 * When pushing merged checklist state to the Tasks API fails with a
 * transport error (connection refused, timeout), the mutation is recorded
 * here instead of being lost; every sync pass drains the queue before
 * touching any file. All public IO functions take a `&dyn AppContext`
 * argument; there are no hidden globals here.
 */

use crate::context::AppContext;
use crate::storage::LocalStorage;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub enum RemoteOp {
    /// Mark an existing remote task completed.
    Complete {
        list_id: String,
        task_id: String,
        title: String,
    },
    /// Create a remote task (subtask when `parent` is set).
    Insert {
        list_id: String,
        parent: Option<String>,
        title: String,
        completed: bool,
    },
}

#[derive(Serialize, Deserialize, Debug, Default)]
pub struct Journal {
    pub queue: Vec<RemoteOp>,
}

impl Journal {
    /// Return the on-disk journal path for the given context, if available.
    pub fn get_path(ctx: &dyn AppContext) -> Option<PathBuf> {
        ctx.get_journal_path()
    }

    /// Internal helper: load journal structure from a path without acquiring locks.
    fn load_internal(path: &PathBuf) -> Self {
        if path.exists()
            && let Ok(content) = fs::read_to_string(path)
            && let Ok(journal) = serde_json::from_str(&content)
        {
            return journal;
        }
        Self::default()
    }

    /// Load the journal from disk using the provided context.
    pub fn load(ctx: &dyn AppContext) -> Self {
        if let Some(path) = Self::get_path(ctx) {
            if !path.exists() {
                return Self::default();
            }
            return LocalStorage::with_lock(&path, || Ok(Self::load_internal(&path)))
                .unwrap_or_default();
        }
        Self::default()
    }

    /// Modify the journal by applying a closure to the queue, persisting changes.
    pub fn modify<F>(ctx: &dyn AppContext, f: F) -> Result<()>
    where
        F: FnOnce(&mut Vec<RemoteOp>),
    {
        if let Some(path) = Self::get_path(ctx) {
            LocalStorage::with_lock(&path, || {
                let mut journal = Self::load_internal(&path);
                f(&mut journal.queue);
                let json = serde_json::to_string_pretty(&journal)?;
                LocalStorage::atomic_write(&path, json)?;
                Ok(())
            })?;
        }
        Ok(())
    }

    /// Push a new operation into the journal.
    pub fn push(ctx: &dyn AppContext, op: RemoteOp) -> Result<()> {
        Self::modify(ctx, |queue| queue.push(op))
    }

    /// Is the in-memory journal empty?
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Compact the queue: exact duplicates collapse to their first
    /// occurrence, and a `Complete` is dropped when a completed `Insert`
    /// for the same list/title is also queued (the insert already lands in
    /// the final state, and the completion's task id may no longer exist).
    pub fn compact(&mut self) {
        let completed_inserts: HashSet<(String, String)> = self
            .queue
            .iter()
            .filter_map(|op| match op {
                RemoteOp::Insert {
                    list_id,
                    title,
                    completed: true,
                    ..
                } => Some((list_id.clone(), title.clone())),
                _ => None,
            })
            .collect();

        let mut seen: HashSet<String> = HashSet::new();
        self.queue.retain(|op| {
            if let RemoteOp::Complete { list_id, title, .. } = op
                && completed_inserts.contains(&(list_id.clone(), title.clone()))
            {
                return false;
            }
            let key = serde_json::to_string(op).unwrap_or_default();
            seen.insert(key)
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete(list: &str, task: &str, title: &str) -> RemoteOp {
        RemoteOp::Complete {
            list_id: list.to_string(),
            task_id: task.to_string(),
            title: title.to_string(),
        }
    }

    fn insert(list: &str, title: &str, completed: bool) -> RemoteOp {
        RemoteOp::Insert {
            list_id: list.to_string(),
            parent: None,
            title: title.to_string(),
            completed,
        }
    }

    #[test]
    fn test_compact_removes_duplicates() {
        let mut journal = Journal {
            queue: vec![
                insert("L1", "buy milk", false),
                insert("L1", "buy milk", false),
                insert("L1", "buy eggs", false),
            ],
        };
        journal.compact();
        assert_eq!(
            journal.queue,
            vec![insert("L1", "buy milk", false), insert("L1", "buy eggs", false)]
        );
    }

    #[test]
    fn test_compact_drops_shadowed_complete() {
        let mut journal = Journal {
            queue: vec![
                complete("L1", "t1", "buy milk"),
                insert("L1", "buy milk", true),
            ],
        };
        journal.compact();
        assert_eq!(journal.queue, vec![insert("L1", "buy milk", true)]);
    }

    #[test]
    fn test_compact_keeps_unrelated_complete() {
        let mut journal = Journal {
            queue: vec![
                complete("L1", "t1", "buy milk"),
                insert("L2", "buy milk", true),
                insert("L1", "buy milk", false),
            ],
        };
        journal.compact();
        assert_eq!(journal.queue.len(), 3);
    }
}
