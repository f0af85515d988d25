// Copyright 2025 the Zeobuilder Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Undo history: labeled actions made of primitives.
//!
//! An [`Action`] is an ordered batch of primitives that is undone in reverse and
//! redone in order, as a unit. The [`History`] keeps a bounded stack of done
//! actions and a stack of undone ones.
//!
//! Recording works in two modes:
//!
//! - Outside a recording, [`History::record`] applies the primitive right away and
//!   pushes it as a one-primitive action.
//! - Between [`History::begin`] and [`History::commit`], primitives are queued and
//!   applied together, in order, by `commit`. If one of them fails, the ones
//!   already applied are undone and the error is returned.
//!
//! Pushing a new action throws away everything that could have been redone.
//!
//! ```
//! use zeobuilder_tree::class::{ATOM, UNIVERSE};
//! use zeobuilder_tree::history::History;
//! use zeobuilder_tree::primitive::Primitive;
//! use zeobuilder_tree::{NodeInit, Tree};
//!
//! let mut tree = Tree::new();
//! let mut history = History::new();
//! let root = tree.create(&UNIVERSE, NodeInit::named("root"));
//!
//! history.begin("Add two atoms").unwrap();
//! for name in ["C", "O"] {
//!     let atom = tree.create(&ATOM, NodeInit::named(name));
//!     history.record(&mut tree, Primitive::add(atom, root, None)).unwrap();
//! }
//! history.commit(&mut tree).unwrap();
//! assert_eq!(tree.children(root).len(), 2);
//!
//! history.undo_last_action(&mut tree).unwrap();
//! assert!(tree.children(root).is_empty());
//! assert_eq!(history.redo_label(), Some("Add two atoms"));
//!
//! history.redo_last_action(&mut tree).unwrap();
//! assert_eq!(tree.children(root).len(), 2);
//! ```

use alloc::collections::VecDeque;
use alloc::string::String;
use alloc::vec::Vec;

use crate::error::{HistoryError, PrimitiveError};
use crate::primitive::{Primitive, PrimitiveState};
use crate::tree::Tree;

/// A labeled batch of primitives undone and redone as a unit.
#[derive(Clone, Debug)]
pub struct Action {
    label: String,
    primitives: Vec<Primitive>,
}

impl Action {
    /// Empty action.
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            primitives: Vec::new(),
        }
    }

    /// Append a primitive.
    pub fn push(&mut self, primitive: Primitive) {
        self.primitives.push(primitive);
    }

    /// Display label.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// The primitives, in application order.
    pub fn primitives(&self) -> &[Primitive] {
        &self.primitives
    }

    /// Number of primitives.
    pub fn len(&self) -> usize {
        self.primitives.len()
    }

    /// True if the action holds no primitives.
    pub fn is_empty(&self) -> bool {
        self.primitives.is_empty()
    }

    /// Apply every primitive that is not done yet, in order.
    ///
    /// On failure the primitives applied so far are undone, newest first.
    pub fn redo(&mut self, tree: &mut Tree) -> Result<(), PrimitiveError> {
        for i in 0..self.primitives.len() {
            if self.primitives[i].state() == PrimitiveState::Done {
                continue;
            }
            if let Err(err) = self.primitives[i].redo(tree) {
                tracing::warn!(action = %self.label, primitive = i, %err, "rolling back");
                for earlier in self.primitives[..i].iter_mut().rev() {
                    if earlier.state() == PrimitiveState::Done
                        && let Err(rollback) = earlier.undo(tree)
                    {
                        tracing::warn!(%rollback, "rollback failed");
                    }
                }
                return Err(err);
            }
        }
        Ok(())
    }

    /// Undo every primitive, newest first.
    ///
    /// On failure the primitives undone so far are redone, oldest first.
    pub fn undo(&mut self, tree: &mut Tree) -> Result<(), PrimitiveError> {
        for i in (0..self.primitives.len()).rev() {
            if let Err(err) = self.primitives[i].undo(tree) {
                tracing::warn!(action = %self.label, primitive = i, %err, "undo failed, reapplying");
                for later in &mut self.primitives[i + 1..] {
                    if let Err(reapply) = later.redo(tree) {
                        tracing::warn!(%reapply, "reapply failed");
                    }
                }
                return Err(err);
            }
        }
        Ok(())
    }

    /// Discard every primitive, freeing nodes nothing can bring back.
    pub fn discard(self, tree: &mut Tree) {
        for primitive in self.primitives.into_iter().rev() {
            primitive.discard(tree);
        }
    }
}

/// Limits for a [`History`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct HistoryConfig {
    /// Number of undoable actions kept; the oldest are discarded first.
    pub max_actions: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self { max_actions: 100 }
    }
}

/// Undo and redo stacks of [`Action`]s.
#[derive(Debug, Default)]
pub struct History {
    config: HistoryConfig,
    undo: VecDeque<Action>,
    redo: Vec<Action>,
    recording: Option<Action>,
}

impl History {
    /// History with the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// History with the given configuration.
    pub fn with_config(config: HistoryConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Configuration in use.
    pub fn config(&self) -> HistoryConfig {
        self.config
    }

    /// Start queueing primitives under `label`.
    pub fn begin(&mut self, label: impl Into<String>) -> Result<(), HistoryError> {
        if self.recording.is_some() {
            return Err(HistoryError::AlreadyRecording);
        }
        self.recording = Some(Action::new(label));
        Ok(())
    }

    /// Whether [`begin`](Self::begin) is in effect.
    pub fn is_recording(&self) -> bool {
        self.recording.is_some()
    }

    /// Validate a primitive and either queue it or apply it as its own action.
    ///
    /// The fixed-node check runs here, before anything is queued or applied. Nodes
    /// created for a primitive that fails stay with the caller.
    pub fn record(&mut self, tree: &mut Tree, primitive: Primitive) -> Result<(), HistoryError> {
        if primitive.state() != PrimitiveState::Done {
            primitive.check(tree)?;
        }
        if let Some(action) = &mut self.recording {
            action.push(primitive);
            return Ok(());
        }
        let mut action = Action::new(primitive.description());
        action.push(primitive);
        action.redo(tree)?;
        self.push(tree, action);
        Ok(())
    }

    /// Apply the queued primitives in order and push them as one action.
    ///
    /// An empty recording is dropped without touching the stacks. On failure the
    /// applied prefix is undone and the error returned; nothing is pushed.
    pub fn commit(&mut self, tree: &mut Tree) -> Result<(), HistoryError> {
        let mut action = self.recording.take().ok_or(HistoryError::NotRecording)?;
        if action.is_empty() {
            return Ok(());
        }
        action.redo(tree)?;
        self.push(tree, action);
        Ok(())
    }

    /// Stop recording and hand back the queued primitives without applying them.
    pub fn cancel(&mut self) -> Option<Action> {
        self.recording.take()
    }

    /// Undo the newest action and move it to the redo stack.
    ///
    /// If undoing fails, the action is reapplied and stays where it was.
    pub fn undo_last_action(&mut self, tree: &mut Tree) -> Result<(), HistoryError> {
        if self.recording.is_some() {
            return Err(HistoryError::AlreadyRecording);
        }
        let mut action = self.undo.pop_back().ok_or(HistoryError::NothingToUndo)?;
        if let Err(err) = action.undo(tree) {
            self.undo.push_back(action);
            return Err(err.into());
        }
        tracing::debug!(label = %action.label, "undo action");
        self.redo.push(action);
        Ok(())
    }

    /// Redo the newest undone action and move it back to the undo stack.
    pub fn redo_last_action(&mut self, tree: &mut Tree) -> Result<(), HistoryError> {
        if self.recording.is_some() {
            return Err(HistoryError::AlreadyRecording);
        }
        let mut action = self.redo.pop().ok_or(HistoryError::NothingToRedo)?;
        if let Err(err) = action.redo(tree) {
            self.redo.push(action);
            return Err(err.into());
        }
        tracing::debug!(label = %action.label, "redo action");
        self.undo.push_back(action);
        self.evict(tree);
        Ok(())
    }

    /// Whether there is an action to undo.
    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    /// Whether there is an action to redo.
    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    /// Label of the action [`undo_last_action`](Self::undo_last_action) would undo.
    pub fn undo_label(&self) -> Option<&str> {
        self.undo.back().map(Action::label)
    }

    /// Label of the action [`redo_last_action`](Self::redo_last_action) would redo.
    pub fn redo_label(&self) -> Option<&str> {
        self.redo.last().map(Action::label)
    }

    /// Number of undoable actions.
    pub fn undo_len(&self) -> usize {
        self.undo.len()
    }

    /// Number of redoable actions.
    pub fn redo_len(&self) -> usize {
        self.redo.len()
    }

    /// Forget everything, discarding every action.
    pub fn clear(&mut self, tree: &mut Tree) {
        for action in self.redo.drain(..).rev() {
            action.discard(tree);
        }
        while let Some(action) = self.undo.pop_back() {
            action.discard(tree);
        }
        if let Some(action) = self.recording.take() {
            action.discard(tree);
        }
    }

    fn push(&mut self, tree: &mut Tree, action: Action) {
        for stale in self.redo.drain(..).rev() {
            stale.discard(tree);
        }
        tracing::debug!(label = %action.label, primitives = action.len(), "push action");
        self.undo.push_back(action);
        self.evict(tree);
    }

    fn evict(&mut self, tree: &mut Tree) {
        while self.undo.len() > self.config.max_actions {
            if let Some(oldest) = self.undo.pop_front() {
                tracing::debug!(label = %oldest.label, "evict action");
                oldest.discard(tree);
            }
        }
    }
}
