//! Snapshot batching for continuous transform edits.
//!
//! A drag moves nodes live, many times per second. Recording each step would
//! flood the history, so the gesture is bracketed instead: the targets'
//! transforms are captured before and after, and [`TransformAction::flush`]
//! pushes a single command that swaps between the two snapshots.
//!
//! ```text
//! Idle ─reset─▶ Armed ─before_snapshot─▶ Captured ─after_snapshot─▶ Ready ─flush─▶ Done
//!                  ╰──────────────────────────── discard ──────────────────────────╯
//! ```

use crate::context::SceneHandle;
use crate::error::{CommandError, CommandResult};
use crate::history::CommandHistory;
use orbit_scene::{Euler, NodeId, SceneGraph, SceneNode, Vec3};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::rc::Rc;

/// Transform fields of one node at one instant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransformSnapshot {
    pub position: Vec3,
    pub rotation: Euler,
    pub scale: Vec3,
    /// Captured alongside the pose; commands never write it back.
    pub visible: bool,
}

impl TransformSnapshot {
    pub fn capture(node: &SceneNode) -> Self {
        Self {
            position: node.transform.position,
            rotation: node.transform.rotation,
            scale: node.transform.scale,
            visible: node.visible,
        }
    }

    /// Write position, rotation and scale. Visibility is left untouched so
    /// that visibility commands recorded during a gesture stay in effect.
    pub fn apply_to(&self, node: &mut SceneNode) {
        node.transform.position = self.position;
        node.transform.rotation = self.rotation;
        node.transform.scale = self.scale;
    }

    /// Position, rotation (order included) and scale match. Visibility is
    /// not compared.
    pub fn same_pose(&self, other: &Self) -> bool {
        self.position == other.position && self.rotation == other.rotation && self.scale == other.scale
    }
}

/// One of the three transform components, as edited from an inspector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransformField {
    Position,
    Rotation,
    Scale,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    X,
    Y,
    Z,
}

impl TransformField {
    pub fn as_str(self) -> &'static str {
        match self {
            TransformField::Position => "position",
            TransformField::Rotation => "rotation",
            TransformField::Scale => "scale",
        }
    }

    /// Set one axis of this component on `node`.
    pub fn write(self, node: &mut SceneNode, axis: Axis, value: f32) {
        let t = &mut node.transform;
        let [x, y, z] = match self {
            TransformField::Position => [&mut t.position.x, &mut t.position.y, &mut t.position.z],
            TransformField::Rotation => [&mut t.rotation.x, &mut t.rotation.y, &mut t.rotation.z],
            TransformField::Scale => [&mut t.scale.x, &mut t.scale.y, &mut t.scale.z],
        };
        let slot = match axis {
            Axis::X => x,
            Axis::Y => y,
            Axis::Z => z,
        };
        *slot = value;
    }
}

impl fmt::Display for TransformField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Axis {
    pub fn as_str(self) -> &'static str {
        match self {
            Axis::X => "x",
            Axis::Y => "y",
            Axis::Z => "z",
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a [`TransformAction`] is in its single-use lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Idle,
    /// Targets chosen, nothing captured yet.
    Armed,
    /// `before` captured; the gesture is in progress.
    Captured,
    /// `after` captured; ready to flush.
    Ready,
    /// Flushed or discarded. Reuse requires `reset`.
    Done,
}

/// One batched transform edit over a fixed, ordered list of nodes.
#[derive(Debug, Default)]
pub struct TransformAction {
    targets: Vec<NodeId>,
    comment: String,
    before: Vec<TransformSnapshot>,
    after: Vec<TransformSnapshot>,
    phase: Phase,
}

fn snapshot_all(scene: &SceneGraph, targets: &[NodeId]) -> CommandResult<Vec<TransformSnapshot>> {
    targets
        .iter()
        .map(|id| {
            scene
                .get_by_id(*id)
                .map(TransformSnapshot::capture)
                .ok_or(CommandError::TargetNotFound(*id))
        })
        .collect()
}

/// Write `snapshots` onto `targets`. Every target is checked first so a
/// missing node leaves the scene untouched.
fn apply_all(scene: &SceneHandle, targets: &[NodeId], snapshots: &[TransformSnapshot]) -> CommandResult {
    let mut scene = scene.borrow_mut();
    if let Some(missing) = targets.iter().find(|id| !scene.contains(**id)) {
        log::warn!("transform command skipped: node {missing} left the scene");
        return Err(CommandError::TargetNotFound(*missing));
    }
    for (id, snapshot) in targets.iter().zip(snapshots) {
        if let Some(node) = scene.get_by_id_mut(*id) {
            snapshot.apply_to(node);
        }
    }
    Ok(())
}

impl TransformAction {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start over with a new target list. Clears snapshots and comment.
    pub fn reset(&mut self, nodes: impl IntoIterator<Item = NodeId>) {
        self.targets = nodes.into_iter().collect();
        self.comment.clear();
        self.before.clear();
        self.after.clear();
        self.phase = Phase::Armed;
    }

    pub fn comment(&mut self, text: impl Into<String>) {
        self.comment = text.into();
    }

    /// Capture the targets' current transforms as the undo state.
    ///
    /// # Panics
    /// If called before `reset` or after the snapshot was already taken.
    pub fn before_snapshot(&mut self, scene: &SceneGraph) -> CommandResult {
        assert_eq!(self.phase, Phase::Armed, "before_snapshot out of order");
        self.before = snapshot_all(scene, &self.targets)?;
        self.phase = Phase::Captured;
        Ok(())
    }

    /// Capture the targets' current transforms as the redo state.
    ///
    /// # Panics
    /// If `before_snapshot` has not been taken.
    pub fn after_snapshot(&mut self, scene: &SceneGraph) -> CommandResult {
        assert_eq!(self.phase, Phase::Captured, "after_snapshot out of order");
        self.after = snapshot_all(scene, &self.targets)?;
        self.phase = Phase::Ready;
        Ok(())
    }

    /// Whether applying `after` would change nothing.
    ///
    /// # Panics
    /// If the two snapshots cover a different number of nodes.
    pub fn is_noop(&self) -> bool {
        assert_eq!(
            self.before.len(),
            self.after.len(),
            "transform snapshots cover different node counts"
        );
        self.before
            .iter()
            .zip(&self.after)
            .all(|(b, a)| b.same_pose(a))
    }

    /// Record the edit in `history`. Nothing is recorded when the gesture
    /// was a no-op.
    ///
    /// The edit is already live in the scene, so the pushed command's
    /// execute just re-applies `after`.
    ///
    /// # Panics
    /// If both snapshots have not been captured.
    pub fn flush(&mut self, history: &CommandHistory, scene: &SceneHandle) -> CommandResult {
        assert_eq!(self.phase, Phase::Ready, "flush before after_snapshot");
        self.phase = Phase::Done;
        if self.is_noop() {
            log::trace!("transform \"{}\" was a no-op", self.comment);
            return Ok(());
        }

        let targets: Rc<[NodeId]> = std::mem::take(&mut self.targets).into();
        let before = std::mem::take(&mut self.before);
        let after = std::mem::take(&mut self.after);
        let (forward_scene, backward_scene) = (scene.clone(), scene.clone());
        let forward_targets = targets.clone();

        history.push(
            &self.comment,
            move || apply_all(&forward_scene, &forward_targets, &after),
            move || apply_all(&backward_scene, &targets, &before),
        )
    }

    /// Abandon the gesture without recording anything.
    pub fn discard(&mut self) {
        self.before.clear();
        self.after.clear();
        self.phase = Phase::Done;
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// True between `before_snapshot` and `flush`/`discard`.
    pub fn in_progress(&self) -> bool {
        matches!(self.phase, Phase::Captured | Phase::Ready)
    }

    pub fn targets(&self) -> &[NodeId] {
        &self.targets
    }
}
