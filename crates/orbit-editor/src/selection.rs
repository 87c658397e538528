//! Observable, deduplicated selection of scene nodes.
//!
//! The selection never mutates itself directly: every change is pushed to
//! the [`CommandHistory`] as a command whose closures own a precomputed list
//! of nodes. Observers are therefore driven by history playback, and an
//! undo or redo looks exactly like the original change to them.

use crate::error::CommandResult;
use crate::history::CommandHistory;
use crate::signal::{Signal, Subscription};
use orbit_scene::NodeId;
use smallvec::SmallVec;
use std::cell::RefCell;
use std::collections::HashSet;
use std::fmt;
use std::rc::Rc;

type Members = SmallVec<[NodeId; 8]>;

/// Extra side effects tied to a selection command, run right after the
/// selection itself is updated in execute (or restored in undo).
///
/// Used to keep auxiliary state, such as the anchor of a range selection,
/// in lockstep with the selection across undo/redo.
pub struct CommandHooks {
    execute: Box<dyn FnMut()>,
    undo: Box<dyn FnMut()>,
}

impl CommandHooks {
    pub fn new(execute: impl FnMut() + 'static, undo: impl FnMut() + 'static) -> Self {
        Self {
            execute: Box::new(execute),
            undo: Box::new(undo),
        }
    }
}

impl fmt::Debug for CommandHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CommandHooks")
    }
}

/// The live set, shared with the closures of selection commands.
///
/// Playback goes through the filter too: a command replayed after one of
/// its nodes left the scene never brings that node back.
struct SelectionState {
    members: RefCell<Members>,
    changed: Signal,
    filter: Box<dyn Fn(NodeId) -> bool>,
}

impl SelectionState {
    fn replace(&self, nodes: &[NodeId]) {
        let nodes: Members = nodes.iter().copied().filter(|id| (self.filter)(*id)).collect();
        let changed = {
            let mut members = self.members.borrow_mut();
            if *members == nodes {
                false
            } else {
                *members = nodes;
                true
            }
        };
        if changed {
            self.changed.emit();
        }
    }

    fn insert_all(&self, nodes: &[NodeId]) {
        let changed = {
            let mut members = self.members.borrow_mut();
            let before = members.len();
            for id in nodes {
                if !members.contains(id) && (self.filter)(*id) {
                    members.push(*id);
                }
            }
            members.len() != before
        };
        if changed {
            self.changed.emit();
        }
    }

    /// Drop members that no longer pass the filter. Returns how many went.
    fn retain_valid(&self) -> usize {
        let removed = {
            let mut members = self.members.borrow_mut();
            let before = members.len();
            members.retain(|id| (self.filter)(*id));
            before - members.len()
        };
        if removed > 0 {
            self.changed.emit();
        }
        removed
    }

    fn remove_all(&self, nodes: &[NodeId]) {
        let changed = {
            let mut members = self.members.borrow_mut();
            let before = members.len();
            members.retain(|id| !nodes.contains(id));
            members.len() != before
        };
        if changed {
            self.changed.emit();
        }
    }
}

/// The set of currently selected nodes.
pub struct SelectionSet {
    state: Rc<SelectionState>,
    history: Rc<CommandHistory>,
}

impl SelectionSet {
    /// Create an empty selection recording into `history`. Only nodes for
    /// which `filter` returns `true` can ever be selected.
    pub fn new(history: Rc<CommandHistory>, filter: impl Fn(NodeId) -> bool + 'static) -> Self {
        Self {
            state: Rc::new(SelectionState {
                members: RefCell::new(Members::new()),
                changed: Signal::new(),
                filter: Box::new(filter),
            }),
            history,
        }
    }

    /// Drop rejected and duplicate nodes, logging how many were rejected.
    fn filtered(&self, nodes: impl IntoIterator<Item = NodeId>) -> Members {
        let mut total = 0;
        let mut rejected = 0;
        let mut out = Members::new();
        for id in nodes {
            total += 1;
            if !(self.state.filter)(id) {
                rejected += 1;
            } else if !out.contains(&id) {
                out.push(id);
            }
        }
        if rejected > 0 {
            log::warn!("invalid node detected, filtered {rejected} / {total} nodes");
        }
        out
    }

    /// Replace the selection. No-op (nothing recorded) when the result is
    /// set-equal to the current selection.
    pub fn set(&self, comment: &str, nodes: impl IntoIterator<Item = NodeId>) -> CommandResult {
        self.set_with_hooks(comment, nodes, None)
    }

    /// [`set`](Self::set), with extra side effects recorded in the same
    /// command.
    pub fn set_with_hooks(
        &self,
        comment: &str,
        nodes: impl IntoIterator<Item = NodeId>,
        hooks: Option<CommandHooks>,
    ) -> CommandResult {
        let next = self.filtered(nodes);
        if self.equals(next.iter().copied()) {
            return Ok(());
        }
        let previous = self.state.members.borrow().clone();
        let (mut on_execute, mut on_undo) = hooks.map(|h| (h.execute, h.undo)).unzip();

        let forward = self.state.clone();
        let backward = self.state.clone();
        self.history.push(
            comment,
            move || {
                forward.replace(&next);
                if let Some(hook) = on_execute.as_mut() {
                    hook();
                }
                Ok(())
            },
            move || {
                backward.replace(&previous);
                if let Some(hook) = on_undo.as_mut() {
                    hook();
                }
                Ok(())
            },
        )
    }

    /// Add nodes. Only the ones not already selected are recorded, so undo
    /// removes exactly what this call added.
    pub fn add(&self, comment: &str, nodes: impl IntoIterator<Item = NodeId>) -> CommandResult {
        let diff: Members = self
            .filtered(nodes)
            .into_iter()
            .filter(|id| !self.has(*id))
            .collect();

        let forward = self.state.clone();
        let backward = self.state.clone();
        let undo_diff = diff.clone();
        self.history.push(
            comment,
            move || {
                forward.insert_all(&diff);
                Ok(())
            },
            move || {
                backward.remove_all(&undo_diff);
                Ok(())
            },
        )
    }

    /// Remove nodes. Only the ones currently selected are recorded, so undo
    /// restores exactly what this call removed.
    pub fn remove(&self, comment: &str, nodes: impl IntoIterator<Item = NodeId>) -> CommandResult {
        let inter: Members = self
            .filtered(nodes)
            .into_iter()
            .filter(|id| self.has(*id))
            .collect();

        let forward = self.state.clone();
        let backward = self.state.clone();
        let undo_inter = inter.clone();
        self.history.push(
            comment,
            move || {
                forward.remove_all(&inter);
                Ok(())
            },
            move || {
                backward.insert_all(&undo_inter);
                Ok(())
            },
        )
    }

    /// Add `node` if unselected, remove it otherwise. `None` is a no-op.
    pub fn toggle(&self, comment: &str, node: Option<NodeId>) -> CommandResult {
        match node {
            Some(id) if self.has(id) => self.remove(comment, [id]),
            Some(id) => self.add(comment, [id]),
            None => Ok(()),
        }
    }

    /// Empty the selection. No-op (nothing recorded) when already empty.
    pub fn clear(&self, comment: &str) -> CommandResult {
        let previous = self.state.members.borrow().clone();
        if previous.is_empty() {
            return Ok(());
        }

        let forward = self.state.clone();
        let backward = self.state.clone();
        self.history.push(
            comment,
            move || {
                forward.replace(&[]);
                Ok(())
            },
            move || {
                backward.replace(&previous);
                Ok(())
            },
        )
    }

    /// Drop selected nodes that no longer pass the filter, e.g. after they
    /// were removed from the scene. Not recorded in the history: the nodes
    /// are gone, there is nothing to undo back to.
    pub fn revalidate(&self) -> usize {
        let removed = self.state.retain_valid();
        if removed > 0 {
            log::debug!("selection dropped {removed} stale nodes");
        }
        removed
    }

    pub fn has(&self, id: NodeId) -> bool {
        self.state.members.borrow().contains(&id)
    }

    pub fn len(&self) -> usize {
        self.state.members.borrow().len()
    }

    /// Alias of [`len`](Self::len).
    pub fn count(&self) -> usize {
        self.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.members.borrow().is_empty()
    }

    /// Selected nodes in insertion order.
    pub fn objects(&self) -> Vec<NodeId> {
        self.state.members.borrow().to_vec()
    }

    /// The `index`-th selected node in insertion order.
    pub fn at(&self, index: usize) -> Option<NodeId> {
        self.state.members.borrow().get(index).copied()
    }

    /// Set-equality against `nodes`; order and duplicates are ignored.
    pub fn equals(&self, nodes: impl IntoIterator<Item = NodeId>) -> bool {
        let other: HashSet<NodeId> = nodes.into_iter().collect();
        let members = self.state.members.borrow();
        other.len() == members.len() && members.iter().all(|id| other.contains(id))
    }

    pub fn history(&self) -> &Rc<CommandHistory> {
        &self.history
    }

    /// Fires whenever the selected set changes, including through undo/redo.
    #[must_use = "dropping the subscription detaches the listener"]
    pub fn on_change(&self, listener: impl Fn() + 'static) -> Subscription {
        self.state.changed.subscribe(listener)
    }

    pub fn version(&self) -> u64 {
        self.state.changed.version()
    }
}

impl fmt::Debug for SelectionSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SelectionSet")
            .field("members", &*self.state.members.borrow())
            .finish_non_exhaustive()
    }
}
