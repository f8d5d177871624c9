//! Undo/redo history of remote-mutating actions.
//!
//! Every entry is a pair of stored async operations. Running an entry's
//! `inverse` yields the operation that re-applies it, so undo and redo are
//! the same move in opposite directions.

use std::{
    fmt,
    future::Future,
    sync::{Arc, Mutex, MutexGuard},
};

use anyhow::Result;
use futures::future::BoxFuture;
use tokio::{sync::watch, task::JoinHandle};
use tracing::{debug, error, warn};

type ActionFn = dyn Fn() -> BoxFuture<'static, Result<Action>> + Send + Sync;

/// An async operation that performs a change and yields its own inverse.
///
/// Cloning is cheap; clones share the same underlying operation.
#[derive(Clone)]
pub struct Action {
    label: Arc<str>,
    run: Arc<ActionFn>,
}

/// Same shape as [`Action`]: running an inverse yields the redo.
pub type Inverse = Action;

impl Action {
    pub fn new<F, Fut>(label: impl Into<String>, run: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Action>> + Send + 'static,
    {
        Self {
            label: Arc::from(label.into()),
            run: Arc::new(move || -> BoxFuture<'static, Result<Action>> { Box::pin(run()) }),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub async fn invoke(&self) -> Result<Action> {
        (self.run)().await
    }
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Action").field("label", &self.label).finish()
    }
}

#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub apply: Action,
    pub inverse: Inverse,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HistoryStatus {
    pub can_undo: bool,
    pub can_redo: bool,
    pub undo_depth: usize,
    pub redo_depth: usize,
}

#[derive(Default)]
struct HistoryState {
    past: Vec<HistoryEntry>,
    future: Vec<HistoryEntry>,
    epoch: u64,
}

impl HistoryState {
    fn status(&self) -> HistoryStatus {
        HistoryStatus {
            can_undo: !self.past.is_empty(),
            can_redo: !self.future.is_empty(),
            undo_depth: self.past.len(),
            redo_depth: self.future.len(),
        }
    }
}

/// Owns the undo (`past`) and redo (`future`) histories.
///
/// Operations do not serialize against each other; callers keep at most one
/// history operation in flight.
#[derive(Clone)]
pub struct CommandStack {
    state: Arc<Mutex<HistoryState>>,
    status: Arc<watch::Sender<HistoryStatus>>,
}

impl Default for CommandStack {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandStack {
    pub fn new() -> Self {
        let (status, _) = watch::channel(HistoryStatus::default());
        Self {
            state: Arc::new(Mutex::new(HistoryState::default())),
            status: Arc::new(status),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HistoryState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn publish_status(&self, state: &HistoryState) {
        self.status.send_replace(state.status());
    }

    /// Runs `action` in the background and records it once it settles.
    pub fn do_it(&self, action: Action) -> JoinHandle<()> {
        let stack = self.clone();
        tokio::spawn(async move {
            let _ = stack.execute(action).await;
        })
    }

    /// Runs `action`; on success pushes it onto the undo history and clears
    /// the redo history. A failed action never enters history.
    pub async fn execute(&self, action: Action) -> Result<()> {
        let epoch = self.lock().epoch;
        let inverse = match action.invoke().await {
            Ok(inverse) => inverse,
            Err(err) => {
                error!(action = action.label(), "history: action failed: {err:#}");
                return Err(err);
            }
        };

        let mut state = self.lock();
        if state.epoch != epoch {
            debug!(
                action = action.label(),
                "history: action settled after reset, not recorded"
            );
            return Ok(());
        }
        state.past.push(HistoryEntry {
            apply: action,
            inverse,
        });
        state.future.clear();
        self.publish_status(&state);
        Ok(())
    }

    /// Reverts the most recent entry. No-op when there is nothing to undo.
    pub async fn undo(&self) -> Result<()> {
        self.step(Direction::Undo).await
    }

    /// Re-applies the most recently undone entry. No-op when there is
    /// nothing to redo.
    pub async fn redo(&self) -> Result<()> {
        self.step(Direction::Redo).await
    }

    async fn step(&self, direction: Direction) -> Result<()> {
        let (entry, epoch) = {
            let mut state = self.lock();
            let popped = match direction {
                Direction::Undo => state.past.pop(),
                Direction::Redo => state.future.pop(),
            };
            let Some(entry) = popped else {
                return Ok(());
            };
            self.publish_status(&state);
            (entry, state.epoch)
        };

        let reverse = match entry.inverse.invoke().await {
            Ok(reverse) => reverse,
            Err(err) => {
                warn!(
                    action = entry.apply.label(),
                    direction = direction.as_str(),
                    "history: inverse failed, entry dropped: {err:#}"
                );
                return Err(err);
            }
        };

        let mut state = self.lock();
        if state.epoch != epoch {
            debug!(
                action = entry.apply.label(),
                direction = direction.as_str(),
                "history: step settled after reset, not recorded"
            );
            return Ok(());
        }
        let moved = HistoryEntry {
            apply: entry.inverse,
            inverse: reverse,
        };
        match direction {
            Direction::Undo => state.future.push(moved),
            Direction::Redo => state.past.push(moved),
        }
        self.publish_status(&state);
        Ok(())
    }

    /// Drops both histories without touching the device.
    pub fn reset(&self) {
        let mut state = self.lock();
        state.past.clear();
        state.future.clear();
        state.epoch = state.epoch.wrapping_add(1);
        self.publish_status(&state);
    }

    pub fn can_undo(&self) -> bool {
        !self.lock().past.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.lock().future.is_empty()
    }

    pub fn undo_depth(&self) -> usize {
        self.lock().past.len()
    }

    pub fn redo_depth(&self) -> usize {
        self.lock().future.len()
    }

    /// Label of the entry the next [`Self::undo`] reverts.
    pub fn undo_label(&self) -> Option<String> {
        self.lock()
            .past
            .last()
            .map(|entry| entry.apply.label().to_string())
    }

    /// Label of the operation the next [`Self::redo`] runs.
    pub fn redo_label(&self) -> Option<String> {
        self.lock()
            .future
            .last()
            .map(|entry| entry.inverse.label().to_string())
    }

    pub fn status(&self) -> HistoryStatus {
        self.lock().status()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<HistoryStatus> {
        self.status.subscribe()
    }
}

#[derive(Debug, Clone, Copy)]
enum Direction {
    Undo,
    Redo,
}

impl Direction {
    fn as_str(self) -> &'static str {
        match self {
            Self::Undo => "undo",
            Self::Redo => "redo",
        }
    }
}

#[cfg(test)]
#[path = "tests/command_stack_tests.rs"]
mod tests;
