// SPDX-License-Identifier: MIT OR Apache-2.0
//! Undo/redo history for graph edits.
//!
//! Edits made inside [`Graph::undoable`] are recorded as reversible actions
//! and grouped, so one user gesture is undone as a unit. Scopes opened with
//! the same merge group back to back are coalesced (dragging a key produces
//! a single undo step).

use crate::error::{GraphError, Result};
use crate::graph::Graph;
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Maximum undo history depth
const MAX_HISTORY: usize = 100;

/// A replayable graph edit
pub type ActionFn = Arc<dyn Fn(&mut Graph) -> Result<()> + Send + Sync>;

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

fn undo_step(action: &Action) -> &ActionFn {
    &action.undo
}

fn redo_step(action: &Action) -> &ActionFn {
    &action.redo
}

/// An edit that can be undone and redone
#[derive(Clone)]
pub struct Action {
    /// Human-readable description
    pub description: String,
    redo: ActionFn,
    undo: ActionFn,
}

impl Action {
    /// Create an action from its forward and reverse edits
    pub fn new<R, U>(description: impl Into<String>, redo: R, undo: U) -> Self
    where
        R: Fn(&mut Graph) -> Result<()> + Send + Sync + 'static,
        U: Fn(&mut Graph) -> Result<()> + Send + Sync + 'static,
    {
        Self {
            description: description.into(),
            redo: Arc::new(redo),
            undo: Arc::new(undo),
        }
    }
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Action")
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

/// Actions that are undone/redone together
#[derive(Debug, Clone)]
pub struct ActionGroup {
    /// Group ID
    pub id: u64,
    /// Human-readable description
    pub description: String,
    /// Consecutive groups with the same merge group are coalesced
    pub merge_group: Option<String>,
    /// Actions in the order they were performed
    pub actions: Vec<Action>,
    /// Timestamp
    pub timestamp: u64,
}

impl ActionGroup {
    fn new(id: u64, description: &str, merge_group: Option<&str>) -> Self {
        Self {
            id,
            description: description.to_string(),
            merge_group: merge_group.map(str::to_string),
            actions: Vec::new(),
            timestamp: now_secs(),
        }
    }

    /// Get action count
    pub fn count(&self) -> usize {
        self.actions.len()
    }
}

/// History statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HistoryStats {
    /// Groups in the undo stack
    pub undo_count: usize,
    /// Groups in the redo stack
    pub redo_count: usize,
    /// Actions across both stacks
    pub action_count: usize,
    /// Maximum history depth
    pub max_depth: usize,
}

/// Undo/redo history manager
#[derive(Debug)]
pub struct History {
    undo_stack: VecDeque<ActionGroup>,
    redo_stack: VecDeque<ActionGroup>,
    next_id: u64,
    max_depth: usize,
    /// Group being recorded by the outermost open scope
    open: Option<ActionGroup>,
    /// Nesting depth of open scopes
    depth: usize,
    /// Set while undo/redo replays actions
    replaying: bool,
}

impl History {
    /// Create a new history manager
    pub fn new() -> Self {
        Self::with_max_depth(MAX_HISTORY)
    }

    /// Create with custom maximum depth
    pub fn with_max_depth(max_depth: usize) -> Self {
        Self {
            undo_stack: VecDeque::new(),
            redo_stack: VecDeque::new(),
            next_id: 1,
            max_depth,
            open: None,
            depth: 0,
            replaying: false,
        }
    }

    /// Open a scope. Nested scopes join the outermost one.
    ///
    /// Returns the number of actions already recorded in the open group,
    /// the point a failed scope rolls back to.
    pub fn begin(&mut self, description: &str, merge_group: Option<&str>) -> usize {
        if self.depth == 0 {
            self.open = Some(ActionGroup::new(self.next_id, description, merge_group));
            self.next_id += 1;
        }
        self.depth += 1;
        self.open.as_ref().map_or(0, ActionGroup::count)
    }

    /// Remove the actions recorded after `mark` from the open group
    fn take_since(&mut self, mark: usize) -> Vec<Action> {
        match &mut self.open {
            Some(group) if mark < group.actions.len() => group.actions.split_off(mark),
            _ => Vec::new(),
        }
    }

    /// Close a scope, committing the group when the outermost scope closes
    pub fn end(&mut self) {
        self.depth = self.depth.saturating_sub(1);
        if self.depth == 0 {
            if let Some(group) = self.open.take() {
                self.commit(group);
            }
        }
    }

    /// Whether edits are currently being recorded
    pub fn is_recording(&self) -> bool {
        self.open.is_some() && !self.replaying
    }

    /// Record an action into the open group
    pub fn record(&mut self, action: Action) {
        if self.replaying {
            return;
        }
        if let Some(group) = &mut self.open {
            group.actions.push(action);
        }
    }

    fn commit(&mut self, group: ActionGroup) {
        if group.actions.is_empty() {
            return;
        }

        self.redo_stack.clear();

        if let Some(last) = self.undo_stack.back_mut() {
            if group.merge_group.is_some() && last.merge_group == group.merge_group {
                last.actions.extend(group.actions);
                last.timestamp = group.timestamp;
                return;
            }
        }

        self.undo_stack.push_back(group);
        while self.undo_stack.len() > self.max_depth {
            self.undo_stack.pop_front();
        }
    }

    /// Check if undo is available
    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    /// Check if redo is available
    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    /// Clear all history
    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }

    /// Get history statistics
    pub fn stats(&self) -> HistoryStats {
        HistoryStats {
            undo_count: self.undo_stack.len(),
            redo_count: self.redo_stack.len(),
            action_count: self
                .undo_stack
                .iter()
                .chain(&self.redo_stack)
                .map(ActionGroup::count)
                .sum(),
            max_depth: self.max_depth,
        }
    }

    /// Get description of next undo operation
    pub fn undo_description(&self) -> Option<&str> {
        self.undo_stack.back().map(|g| g.description.as_str())
    }

    /// Get description of next redo operation
    pub fn redo_description(&self) -> Option<&str> {
        self.redo_stack.back().map(|g| g.description.as_str())
    }
}

impl Default for History {
    fn default() -> Self {
        Self::new()
    }
}

impl Graph {
    /// Run `edit` as one undoable step
    pub fn undoable<T>(&mut self, description: &str, edit: impl FnOnce(&mut Graph) -> Result<T>) -> Result<T> {
        self.undoable_merged(description, None, edit)
    }

    /// Run `edit` as an undoable step that coalesces with the previous step
    /// when both use the same merge group
    pub fn undoable_merged<T>(
        &mut self,
        description: &str,
        merge_group: Option<&str>,
        edit: impl FnOnce(&mut Graph) -> Result<T>,
    ) -> Result<T> {
        let mark = self.history.begin(description, merge_group);
        let result = edit(self);
        if result.is_err() {
            let recorded = self.history.take_since(mark);
            if !recorded.is_empty() {
                tracing::debug!(description, actions = recorded.len(), "rolling back failed edit");
            }
            self.rollback(recorded.iter().rev());
        }
        self.history.end();
        result
    }

    /// Reverse `actions` in the given order, without recording
    fn rollback<'a>(&mut self, actions: impl Iterator<Item = &'a Action>) {
        let replaying = std::mem::replace(&mut self.history.replaying, true);
        for action in actions {
            if let Err(error) = (action.undo)(self) {
                tracing::warn!(action = %action.description, %error, "failed to roll back action");
            }
        }
        self.history.replaying = replaying;
    }

    /// Run `forward` for each action. When one fails, the actions that
    /// already ran are reverted with `backward`, newest first.
    fn replay<'a>(
        &mut self,
        actions: impl Iterator<Item = &'a Action>,
        forward: fn(&Action) -> &ActionFn,
        backward: fn(&Action) -> &ActionFn,
    ) -> Result<()> {
        let replaying = std::mem::replace(&mut self.history.replaying, true);
        let mut done = Vec::new();
        let mut result = Ok(());
        for action in actions {
            let step = forward(action);
            if let Err(error) = step(self) {
                result = Err(error);
                break;
            }
            done.push(action);
        }
        if result.is_err() {
            for action in done.into_iter().rev() {
                let step = backward(action);
                if let Err(error) = step(self) {
                    tracing::warn!(action = %action.description, %error, "failed to restore action");
                }
            }
        }
        self.history.replaying = replaying;
        result
    }

    /// Perform an action, recording it when inside an undoable scope
    pub fn enact(&mut self, action: Action) -> Result<()> {
        (action.redo)(self)?;
        self.history.record(action);
        Ok(())
    }

    /// Undo the last step
    pub fn undo(&mut self) -> Result<()> {
        let group = self.history.undo_stack.pop_back().ok_or(GraphError::NothingToUndo)?;
        tracing::debug!(description = %group.description, actions = group.count(), "undo");

        let result = self.replay(group.actions.iter().rev(), undo_step, redo_step);
        if result.is_ok() {
            self.history.redo_stack.push_back(group);
        } else {
            self.history.undo_stack.push_back(group);
        }
        result
    }

    /// Redo the last undone step
    pub fn redo(&mut self) -> Result<()> {
        let group = self.history.redo_stack.pop_back().ok_or(GraphError::NothingToRedo)?;
        tracing::debug!(description = %group.description, actions = group.count(), "redo");

        let result = self.replay(group.actions.iter(), redo_step, undo_step);
        if result.is_ok() {
            self.history.undo_stack.push_back(group);
        } else {
            self.history.redo_stack.push_back(group);
        }
        result
    }

    /// Check if undo is available
    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    /// Check if redo is available
    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    /// Get the undo history
    pub fn history(&self) -> &History {
        &self.history
    }

    /// Discard all undo and redo steps
    pub fn clear_history(&mut self) {
        self.history.clear();
    }
}
