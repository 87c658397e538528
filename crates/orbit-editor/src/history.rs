//! Undo/Redo command history.
//!
//! Every user-visible mutation is pushed here as a [`Command`]: a pair of
//! closures (execute / undo) plus a label. `push` runs `execute` right away;
//! `undo` and `redo` replay the closures and move commands between stacks.
//!
//! The undo stack is bounded: once it exceeds its capacity the oldest
//! command is dropped silently. The redo stack is unbounded and is cleared
//! by every push.

use crate::error::CommandResult;
use crate::signal::{Signal, Subscription};
use serde::Serialize;
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt;

/// Default maximum number of undo steps.
pub const DEFAULT_CAPACITY: usize = 100;

type Action = Box<dyn FnMut() -> CommandResult>;

/// History sizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryConfig {
    /// Maximum length of the undo stack.
    pub capacity: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
        }
    }
}

/// A recorded, reversible mutation.
pub struct Command {
    id: u64,
    history_index: usize,
    comment: String,
    execute: Action,
    undo: Action,
}

impl Command {
    /// Monotonic id, unique for the lifetime of the history.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Position in the linear history: one more than the command that was on
    /// top of the undo stack when this one was pushed.
    pub fn history_index(&self) -> usize {
        self.history_index
    }

    pub fn comment(&self) -> &str {
        &self.comment
    }

    fn entry(&self, steps: usize) -> HistoryEntry {
        HistoryEntry {
            id: self.id,
            history_index: self.history_index,
            comment: self.comment.clone(),
            steps,
        }
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("id", &self.id)
            .field("history_index", &self.history_index)
            .field("comment", &self.comment)
            .finish_non_exhaustive()
    }
}

/// Read-only view of a command, as listed in a history panel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub id: u64,
    pub history_index: usize,
    pub comment: String,
    /// Steps to pass to `undo_steps` (or `redo_steps`) so that this command
    /// is the last one reverted (or reapplied).
    pub steps: usize,
}

/// The slice of history a panel shows: the most recent undo entries and
/// the nearest redo entries, both oldest-first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HistoryWindow {
    pub undo: Vec<HistoryEntry>,
    pub redo: Vec<HistoryEntry>,
}

#[derive(Default)]
struct Stacks {
    undo: VecDeque<Command>,
    redo: Vec<Command>,
}

/// Bounded undo/redo stack of closure-based commands.
///
/// All methods take `&self`: the history is shared (`Rc<CommandHistory>`)
/// by every component that records commands. No borrow is held while a
/// command's closures run, so closures may freely query the history.
pub struct CommandHistory {
    stacks: RefCell<Stacks>,
    capacity: usize,
    next_id: Cell<u64>,
    changed: Signal,
}

impl CommandHistory {
    pub fn new() -> Self {
        Self::with_config(HistoryConfig::default())
    }

    pub fn with_config(config: HistoryConfig) -> Self {
        Self {
            stacks: RefCell::new(Stacks {
                undo: VecDeque::with_capacity(config.capacity.min(DEFAULT_CAPACITY)),
                redo: Vec::new(),
            }),
            capacity: config.capacity,
            next_id: Cell::new(0),
            changed: Signal::new(),
        }
    }

    /// Run `execute` and, if it succeeds, record the command.
    ///
    /// An empty `comment` is replaced by `Command <id>`. A failing `execute`
    /// leaves both stacks untouched and fires no notification.
    pub fn push<E, U>(&self, comment: &str, execute: E, undo: U) -> CommandResult
    where
        E: FnMut() -> CommandResult + 'static,
        U: FnMut() -> CommandResult + 'static,
    {
        let id = self.next_id.get();
        self.next_id.set(id + 1);

        let mut command = Command {
            id,
            history_index: self.last_history_index().map_or(0, |i| i + 1),
            comment: if comment.is_empty() {
                format!("Command {id}")
            } else {
                comment.to_string()
            },
            execute: Box::new(execute),
            undo: Box::new(undo),
        };

        (command.execute)()?;
        log::debug!(
            "history push #{} \"{}\"",
            command.history_index,
            command.comment
        );

        // Discarded commands are dropped after the borrow is released.
        let (evicted, invalidated) = {
            let mut stacks = self.stacks.borrow_mut();
            stacks.undo.push_back(command);
            let mut evicted = Vec::new();
            while stacks.undo.len() > self.capacity {
                evicted.extend(stacks.undo.pop_front());
            }
            (evicted, std::mem::take(&mut stacks.redo))
        };
        for command in &evicted {
            log::trace!("history evicted #{} \"{}\"", command.history_index, command.comment);
        }
        drop(evicted);
        drop(invalidated);

        self.changed.emit();
        Ok(())
    }

    /// Undo the most recent command. No-op when there is nothing to undo.
    pub fn undo(&self) -> CommandResult {
        self.undo_steps(1)
    }

    /// Redo the most recently undone command. No-op when there is nothing to
    /// redo.
    pub fn redo(&self) -> CommandResult {
        self.redo_steps(1)
    }

    /// Undo up to `count` commands, most recent first, stopping early when
    /// the undo stack runs out. Fires one notification if anything was
    /// undone.
    ///
    /// If a command's undo fails, that command stays on the undo stack, the
    /// commands already undone stay undone, and the error is returned.
    pub fn undo_steps(&self, count: usize) -> CommandResult {
        let mut processed = 0;
        let mut result = Ok(());

        while processed < count {
            let Some(mut command) = self.pop_undo() else {
                break;
            };
            if let Err(err) = (command.undo)() {
                log::warn!("undo of \"{}\" failed: {err}", command.comment);
                self.stacks.borrow_mut().undo.push_back(command);
                result = Err(err);
                break;
            }
            log::debug!("history undo #{} \"{}\"", command.history_index, command.comment);
            self.stacks.borrow_mut().redo.push(command);
            processed += 1;
        }

        if processed > 0 {
            self.changed.emit();
        }
        result
    }

    /// Redo up to `count` commands. Symmetric to [`undo_steps`](Self::undo_steps).
    pub fn redo_steps(&self, count: usize) -> CommandResult {
        let mut processed = 0;
        let mut result = Ok(());

        while processed < count {
            let Some(mut command) = self.pop_redo() else {
                break;
            };
            if let Err(err) = (command.execute)() {
                log::warn!("redo of \"{}\" failed: {err}", command.comment);
                self.stacks.borrow_mut().redo.push(command);
                result = Err(err);
                break;
            }
            log::debug!("history redo #{} \"{}\"", command.history_index, command.comment);
            self.stacks.borrow_mut().undo.push_back(command);
            processed += 1;
        }

        if processed > 0 {
            self.changed.emit();
        }
        result
    }

    fn pop_undo(&self) -> Option<Command> {
        self.stacks.borrow_mut().undo.pop_back()
    }

    fn pop_redo(&self) -> Option<Command> {
        self.stacks.borrow_mut().redo.pop()
    }

    pub fn can_undo(&self) -> bool {
        !self.stacks.borrow().undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.stacks.borrow().redo.is_empty()
    }

    pub fn undo_count(&self) -> usize {
        self.stacks.borrow().undo.len()
    }

    pub fn redo_count(&self) -> usize {
        self.stacks.borrow().redo.len()
    }

    /// Index of the command on top of the undo stack, `None` when empty.
    pub fn last_history_index(&self) -> Option<usize> {
        self.stacks.borrow().undo.back().map(Command::history_index)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Undo stack comments, oldest first.
    pub fn undo_comments(&self) -> Vec<String> {
        self.stacks
            .borrow()
            .undo
            .iter()
            .map(|c| c.comment.clone())
            .collect()
    }

    /// Redo stack comments, next-to-redo last.
    pub fn redo_comments(&self) -> Vec<String> {
        self.stacks
            .borrow()
            .redo
            .iter()
            .map(|c| c.comment.clone())
            .collect()
    }

    /// Entries for a history panel showing at most `limit` rows.
    ///
    /// Redo entries are kept first, undo entries fill what is left. Undo
    /// entries are oldest-first ending with the current state; redo entries
    /// are ordered the way they would be replayed.
    pub fn window(&self, limit: usize) -> HistoryWindow {
        let stacks = self.stacks.borrow();
        let redo_count = stacks.redo.len().min(limit);
        let undo_count = stacks.undo.len().min(limit - redo_count);

        let undo = stacks
            .undo
            .iter()
            .skip(stacks.undo.len() - undo_count)
            .enumerate()
            .map(|(i, c)| c.entry(undo_count - i))
            .collect();

        let redo = stacks
            .redo
            .iter()
            .rev()
            .take(redo_count)
            .enumerate()
            .map(|(i, c)| c.entry(i + 1))
            .collect();

        HistoryWindow { undo, redo }
    }

    /// Subscribe to the aggregate change signal (push, undo, redo).
    #[must_use = "dropping the subscription detaches the listener"]
    pub fn on_change(&self, listener: impl Fn() + 'static) -> Subscription {
        self.changed.subscribe(listener)
    }

    /// Change counter: number of notifications fired so far.
    pub fn version(&self) -> u64 {
        self.changed.version()
    }
}

impl Default for CommandHistory {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CommandHistory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandHistory")
            .field("undo_count", &self.undo_count())
            .field("redo_count", &self.redo_count())
            .field("capacity", &self.capacity)
            .field("version", &self.version())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CommandError;
    use std::rc::Rc;

    /// Push a command that adds `amount` to a shared counter.
    fn push_add(history: &CommandHistory, value: &Rc<Cell<i32>>, amount: i32, comment: &str) {
        let v1 = value.clone();
        let v2 = value.clone();
        history
            .push(
                comment,
                move || {
                    v1.set(v1.get() + amount);
                    Ok(())
                },
                move || {
                    v2.set(v2.get() - amount);
                    Ok(())
                },
            )
            .unwrap();
    }

    #[test]
    fn push_executes_immediately() {
        let history = CommandHistory::new();
        let value = Rc::new(Cell::new(0));
        push_add(&history, &value, 5, "add five");
        assert_eq!(value.get(), 5);
        assert_eq!(history.undo_count(), 1);
        assert_eq!(history.last_history_index(), Some(0));
    }

    #[test]
    fn undo_redo_move() {
        let history = CommandHistory::new();
        let value = Rc::new(Cell::new(0));
        push_add(&history, &value, 3, "add");

        history.undo().unwrap();
        assert_eq!(value.get(), 0);
        assert!(history.can_redo());
        assert!(!history.can_undo());

        history.redo().unwrap();
        assert_eq!(value.get(), 3);
        assert!(history.can_undo());
    }

    #[test]
    fn redo_clears_on_new_action() {
        let history = CommandHistory::new();
        let value = Rc::new(Cell::new(0));
        push_add(&history, &value, 1, "one");
        push_add(&history, &value, 2, "two");
        history.undo_steps(2).unwrap();
        assert_eq!(history.redo_count(), 2);

        push_add(&history, &value, 10, "ten");
        assert_eq!(history.redo_count(), 0);
        assert!(!history.can_redo());
    }

    #[test]
    fn max_depth_trims_oldest() {
        let history = CommandHistory::with_config(HistoryConfig { capacity: 3 });
        let value = Rc::new(Cell::new(0));
        for i in 0..5 {
            push_add(&history, &value, i + 1, &format!("step {i}"));
        }
        assert_eq!(history.undo_count(), 3);
        assert_eq!(history.undo_comments(), vec!["step 2", "step 3", "step 4"]);
    }

    #[test]
    fn empty_stacks_are_silent() {
        let history = CommandHistory::new();
        history.undo().unwrap();
        history.redo_steps(4).unwrap();
        assert_eq!(history.version(), 0);
        assert_eq!(history.last_history_index(), None);
    }

    #[test]
    fn multi_step_undo_notifies_once() {
        let history = CommandHistory::new();
        let value = Rc::new(Cell::new(0));
        push_add(&history, &value, 1, "a");
        push_add(&history, &value, 1, "b");
        push_add(&history, &value, 1, "c");
        let before = history.version();

        history.undo_steps(10).unwrap();
        assert_eq!(history.version(), before + 1);
        assert_eq!(history.redo_count(), 3);
        assert_eq!(value.get(), 0);
    }

    #[test]
    fn history_index_follows_top_of_stack() {
        let history = CommandHistory::new();
        let value = Rc::new(Cell::new(0));
        push_add(&history, &value, 1, "a");
        push_add(&history, &value, 1, "b");
        assert_eq!(history.last_history_index(), Some(1));

        history.undo().unwrap();
        push_add(&history, &value, 1, "c");
        // "c" continues from "a", the new linear history's top.
        assert_eq!(history.last_history_index(), Some(1));
        assert_eq!(history.undo_comments(), vec!["a", "c"]);
    }

    #[test]
    fn empty_comment_gets_a_default_label() {
        let history = CommandHistory::new();
        history.push("", || Ok(()), || Ok(())).unwrap();
        assert_eq!(history.undo_comments(), vec!["Command 0"]);
    }

    #[test]
    fn failing_execute_is_not_recorded() {
        let history = CommandHistory::new();
        let err = history
            .push(
                "broken",
                || Err(CommandError::Custom("nope".into())),
                || Ok(()),
            )
            .unwrap_err();
        assert_eq!(err, CommandError::Custom("nope".into()));
        assert_eq!(history.undo_count(), 0);
        assert_eq!(history.version(), 0);
    }

    #[test]
    fn failing_undo_stays_on_undo_stack() {
        let history = CommandHistory::new();
        let value = Rc::new(Cell::new(0));
        push_add(&history, &value, 1, "good");
        history
            .push(
                "stuck",
                || Ok(()),
                || Err(CommandError::InvalidState("stuck".into())),
            )
            .unwrap();

        assert!(history.undo_steps(2).is_err());
        assert_eq!(history.undo_count(), 2);
        assert_eq!(history.redo_count(), 0);
        assert_eq!(value.get(), 1);
    }

    #[test]
    fn window_prefers_redo_entries() {
        let history = CommandHistory::new();
        let value = Rc::new(Cell::new(0));
        for name in ["a", "b", "c", "d", "e"] {
            push_add(&history, &value, 1, name);
        }
        history.undo_steps(2).unwrap();

        let window = history.window(4);
        let undo: Vec<(&str, usize)> = window
            .undo
            .iter()
            .map(|e| (e.comment.as_str(), e.steps))
            .collect();
        let redo: Vec<(&str, usize)> = window
            .redo
            .iter()
            .map(|e| (e.comment.as_str(), e.steps))
            .collect();
        assert_eq!(undo, vec![("b", 2), ("c", 1)]);
        assert_eq!(redo, vec![("d", 1), ("e", 2)]);
    }

    #[test]
    fn closures_may_query_history() {
        let history = Rc::new(CommandHistory::new());
        let seen = Rc::new(Cell::new(usize::MAX));
        let h = Rc::downgrade(&history);
        let s = seen.clone();
        history
            .push(
                "peek",
                move || {
                    if let Some(h) = h.upgrade() {
                        s.set(h.undo_count());
                    }
                    Ok(())
                },
                || Ok(()),
            )
            .unwrap();
        assert_eq!(seen.get(), 0);
    }
}
