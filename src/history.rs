//! Undo/redo history over scene snapshots.
//!
//! The undo stack always holds at least the baseline snapshot the session
//! was opened with, and its top matches what the surface shows. Replaying a
//! snapshot (undo or redo) happens under a [`ReplayGuard`]; while one is
//! alive, captures are ignored so the surface's own side-effect events never
//! become history entries.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::debug;

use crate::access::AccessMode;
use crate::codec::{self, SceneSnapshot};
use crate::error::CodecError;
use crate::scene::Scene;

/// Default maximum number of undo entries kept
pub const DEFAULT_MAX_HISTORY: usize = 100;

/// Whether a snapshot is being replayed onto the surface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplayState {
    Idle,
    Replaying,
}

/// Two-state replay gate shared between the history and its guards
#[derive(Debug, Clone, Default)]
pub struct ReplayGate {
    replaying: Arc<AtomicBool>,
}

impl ReplayGate {
    pub fn state(&self) -> ReplayState {
        if self.replaying.load(Ordering::SeqCst) {
            ReplayState::Replaying
        } else {
            ReplayState::Idle
        }
    }

    /// Enter `Replaying` until the returned guard is dropped.
    ///
    /// Not reentrant: a gate has at most one live guard.
    pub fn begin(&self) -> ReplayGuard {
        let was_replaying = self.replaying.swap(true, Ordering::SeqCst);
        debug_assert!(!was_replaying, "replay already in progress");
        ReplayGuard { gate: self.clone() }
    }
}

/// Returns the gate to `Idle` when dropped, on every exit path
#[must_use = "the replay ends as soon as the guard is dropped"]
#[derive(Debug)]
pub struct ReplayGuard {
    gate: ReplayGate,
}

impl Drop for ReplayGuard {
    fn drop(&mut self) {
        self.gate.replaying.store(false, Ordering::SeqCst);
    }
}

/// A snapshot to apply, with the gate held for the duration
#[derive(Debug)]
pub struct Replay {
    pub snapshot: SceneSnapshot,
    pub guard: ReplayGuard,
}

/// Undo/redo ledger for one open document
#[derive(Debug)]
pub struct History {
    /// Oldest first; index 0 is the baseline
    undo_stack: Vec<SceneSnapshot>,
    /// Most recently undone last
    redo_stack: Vec<SceneSnapshot>,
    max_history: usize,
    access: AccessMode,
    gate: ReplayGate,
}

impl History {
    /// Start a history holding only `baseline`
    pub fn new(baseline: SceneSnapshot, access: AccessMode, max_history: usize) -> Self {
        Self {
            undo_stack: vec![baseline],
            redo_stack: Vec::new(),
            max_history: max_history.max(1),
            access,
            gate: ReplayGate::default(),
        }
    }

    /// Record the scene after a mutation.
    ///
    /// Returns the new snapshot, or `None` when capture is suppressed
    /// (replay in progress or read-only session).
    pub fn capture(&mut self, scene: &Scene) -> Result<Option<SceneSnapshot>, CodecError> {
        if self.is_replaying() || self.access.is_read_only() {
            return Ok(None);
        }
        let snapshot = codec::encode(scene)?;
        self.push(snapshot.clone());
        self.redo_stack.clear();
        debug!(undo = self.undo_stack.len(), "captured scene snapshot");
        Ok(Some(snapshot))
    }

    /// Pop the current state onto the redo stack and hand back the state to
    /// restore. `None` at the baseline or in read-only sessions.
    pub fn begin_undo(&mut self) -> Option<Replay> {
        if self.access.is_read_only() || self.undo_stack.len() <= 1 {
            return None;
        }
        let guard = self.gate.begin();
        let current = self.undo_stack.pop()?;
        self.redo_stack.push(current);
        let snapshot = self.undo_stack.last()?.clone();
        debug!(undo = self.undo_stack.len(), redo = self.redo_stack.len(), "undo");
        Some(Replay { snapshot, guard })
    }

    /// Pop the most recently undone state. Call [`History::complete_redo`]
    /// once it has been applied.
    pub fn begin_redo(&mut self) -> Option<Replay> {
        if self.access.is_read_only() || self.redo_stack.is_empty() {
            return None;
        }
        let guard = self.gate.begin();
        let snapshot = self.redo_stack.pop()?;
        debug!(undo = self.undo_stack.len(), redo = self.redo_stack.len(), "redo");
        Some(Replay { snapshot, guard })
    }

    /// Push a redone snapshot back as the current state
    pub fn complete_redo(&mut self, snapshot: SceneSnapshot) {
        self.push(snapshot);
    }

    /// Hold the replay gate outside undo/redo, e.g. while loading
    pub fn begin_replay(&self) -> ReplayGuard {
        self.gate.begin()
    }

    /// Drop all history and start again from `baseline`
    pub fn reset(&mut self, baseline: SceneSnapshot) {
        self.undo_stack.clear();
        self.undo_stack.push(baseline);
        self.redo_stack.clear();
    }

    fn push(&mut self, snapshot: SceneSnapshot) {
        self.undo_stack.push(snapshot);
        // Limit history size
        while self.undo_stack.len() > self.max_history {
            self.undo_stack.remove(0);
        }
    }

    pub fn is_replaying(&self) -> bool {
        self.gate.state() == ReplayState::Replaying
    }

    pub fn gate(&self) -> &ReplayGate {
        &self.gate
    }

    /// Snapshot the surface should be showing
    pub fn current(&self) -> Option<&SceneSnapshot> {
        self.undo_stack.last()
    }

    pub fn undo_stack(&self) -> &[SceneSnapshot] {
        &self.undo_stack
    }

    pub fn redo_stack(&self) -> &[SceneSnapshot] {
        &self.redo_stack
    }

    pub fn can_undo(&self) -> bool {
        !self.access.is_read_only() && self.undo_stack.len() > 1
    }

    pub fn can_redo(&self) -> bool {
        !self.access.is_read_only() && !self.redo_stack.is_empty()
    }

    /// Number of undo steps available (the baseline is not one)
    pub fn undo_count(&self) -> usize {
        self.undo_stack.len().saturating_sub(1)
    }

    pub fn redo_count(&self) -> usize {
        self.redo_stack.len()
    }
}
