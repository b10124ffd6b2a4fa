//! Checkpointed undo/redo over full task-state captures.
//!
//! History is a strictly linear stack of full-state snapshots: committing
//! after an undo discards the redo stack, and there is no branching. Full
//! captures beat operation-plus-inverse bookkeeping for collections this
//! size; an undo is a plain state swap with no per-operation inverse logic
//! to drift out of sync.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;

use crate::model::task::Task;

/// Undo stack depth; the oldest entry is silently evicted beyond this
pub const HISTORY_DEPTH_LIMIT: usize = 500;

/// One committed full-state capture
#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub id: u64,
    pub created_at: DateTime<Utc>,
    pub description: String,
    state: Vec<Task>,
}

impl HistoryEntry {
    pub fn task_count(&self) -> usize {
        self.state.len()
    }
}

/// An addressable, non-linear jump point distinct from the undo stack
#[derive(Debug, Clone)]
pub struct Checkpoint {
    pub id: u64,
    pub created_at: DateTime<Utc>,
    pub label: String,
    state: Vec<Task>,
}

/// Undo/redo stack plus named checkpoints over repository state
#[derive(Debug)]
pub struct HistoryManager {
    undo: Vec<HistoryEntry>,
    redo: Vec<HistoryEntry>,
    checkpoints: IndexMap<u64, Checkpoint>,
    next_id: u64,
    limit: usize,
}

impl Default for HistoryManager {
    fn default() -> Self {
        Self::new()
    }
}

impl HistoryManager {
    pub fn new() -> Self {
        Self::with_limit(HISTORY_DEPTH_LIMIT)
    }

    pub fn with_limit(limit: usize) -> Self {
        HistoryManager {
            undo: Vec::new(),
            redo: Vec::new(),
            checkpoints: IndexMap::new(),
            next_id: 0,
            limit: limit.max(1),
        }
    }

    /// Push the given state onto the undo stack. Clears the redo stack:
    /// history is linear, never a tree.
    pub fn commit(&mut self, description: &str, state: Vec<Task>) {
        let entry = self.entry(description, state);
        self.undo.push(entry);
        if self.undo.len() > self.limit {
            self.undo.drain(..self.undo.len() - self.limit);
        }
        self.redo.clear();
    }

    /// Swap back to the most recent committed state. `current` goes onto the
    /// redo stack; returns the state to restore, or `None` on an empty stack.
    pub fn undo(&mut self, current: Vec<Task>) -> Option<Vec<Task>> {
        let entry = self.undo.pop()?;
        let redo_entry = self.entry(&entry.description, current);
        self.redo.push(redo_entry);
        Some(entry.state)
    }

    /// Symmetric to `undo`; valid only until the next commit
    pub fn redo(&mut self, current: Vec<Task>) -> Option<Vec<Task>> {
        let entry = self.redo.pop()?;
        let undo_entry = self.entry(&entry.description, current);
        self.undo.push(undo_entry);
        Some(entry.state)
    }

    /// Record an addressable jump point and return its id
    pub fn create_checkpoint(&mut self, label: &str, state: Vec<Task>) -> u64 {
        self.next_id += 1;
        let id = self.next_id;
        self.checkpoints.insert(
            id,
            Checkpoint {
                id,
                created_at: Utc::now(),
                label: label.to_string(),
                state,
            },
        );
        id
    }

    /// All-or-nothing jump to a checkpoint. On success the pre-restore state
    /// becomes a fresh undo entry (the jump itself is undoable); an unknown
    /// id changes nothing and returns `None`.
    pub fn restore_checkpoint(&mut self, id: u64, current: Vec<Task>) -> Option<Vec<Task>> {
        let Some(checkpoint) = self.checkpoints.get(&id) else {
            tracing::warn!(checkpoint = id, "restore of unknown checkpoint refused");
            return None;
        };
        let state = checkpoint.state.clone();
        let label = checkpoint.label.clone();
        self.commit(&format!("restore checkpoint '{label}'"), current);
        Some(state)
    }

    pub fn checkpoint(&self, id: u64) -> Option<&Checkpoint> {
        self.checkpoints.get(&id)
    }

    /// Drop all undo/redo entries and checkpoints
    pub fn clear(&mut self) {
        self.undo.clear();
        self.redo.clear();
        self.checkpoints.clear();
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    pub fn undo_depth(&self) -> usize {
        self.undo.len()
    }

    pub fn redo_depth(&self) -> usize {
        self.redo.len()
    }

    pub fn checkpoint_count(&self) -> usize {
        self.checkpoints.len()
    }

    /// Descriptions of pending undo entries, newest first (for host menus)
    pub fn undo_descriptions(&self) -> Vec<&str> {
        self.undo
            .iter()
            .rev()
            .map(|e| e.description.as_str())
            .collect()
    }

    fn entry(&mut self, description: &str, state: Vec<Task>) -> HistoryEntry {
        self.next_id += 1;
        HistoryEntry {
            id: self.next_id,
            created_at: Utc::now(),
            description: description.to_string(),
            state,
        }
    }
}
