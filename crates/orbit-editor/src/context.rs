//! The editor context: one scene, one history, and the state layered on it.
//!
//! [`EditorContext`] owns the collaborators and hands them to each other at
//! construction; nothing is global. The change signals of the history, the
//! metadata store and the selection are forwarded into a single refresh
//! signal that views subscribe to.

use crate::actions;
use crate::error::{CommandError, CommandResult};
use crate::hierarchy::HierarchyTree;
use crate::history::{CommandHistory, HistoryConfig};
use crate::metadata::{KindPolicy, MetadataPolicy, MetadataStore};
use crate::selection::SelectionSet;
use crate::shortcuts::ShortcutAction;
use crate::signal::{Signal, Subscription};
use crate::transform_action::{Axis, TransformAction, TransformField};
use orbit_scene::{NodeId, SceneGraph, SceneNode};
use serde::{Deserialize, Serialize};
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

/// Shared, single-threaded handle to the scene being edited.
pub type SceneHandle = Rc<RefCell<SceneGraph>>;

// ─── Preferences ─────────────────────────────────────────────────────────

/// Active manipulation tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolKind {
    #[default]
    Select,
    Move,
    Rotate,
    Scale,
}

impl ToolKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ToolKind::Select => "select",
            ToolKind::Move => "move",
            ToolKind::Rotate => "rotate",
            ToolKind::Scale => "scale",
        }
    }
}

impl fmt::Display for ToolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coordinate space the transform gizmo works in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpaceMode {
    World,
    #[default]
    Local,
}

impl SpaceMode {
    pub fn as_str(self) -> &'static str {
        match self {
            SpaceMode::World => "world",
            SpaceMode::Local => "local",
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            SpaceMode::World => SpaceMode::Local,
            SpaceMode::Local => SpaceMode::World,
        }
    }
}

impl fmt::Display for SpaceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Persistable editor preferences. Missing fields fall back to defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EditorPrefs {
    pub tool_type: ToolKind,
    pub space_mode: SpaceMode,
}

// ─── Configuration ───────────────────────────────────────────────────────

/// Construction-time settings of an [`EditorContext`].
pub struct EditorConfig {
    pub history: HistoryConfig,
    pub metadata_policy: Box<dyn MetadataPolicy>,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            history: HistoryConfig::default(),
            metadata_policy: Box::new(KindPolicy),
        }
    }
}

impl fmt::Debug for EditorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EditorConfig")
            .field("history", &self.history)
            .finish_non_exhaustive()
    }
}

// ─── Context ─────────────────────────────────────────────────────────────

pub struct EditorContext {
    scene: SceneHandle,
    history: Rc<CommandHistory>,
    metadata: Rc<MetadataStore>,
    selection: SelectionSet,
    tool: Cell<ToolKind>,
    space: Cell<SpaceMode>,
    transform: RefCell<TransformAction>,
    last_click: Rc<Cell<Option<NodeId>>>,
    refresh: Signal,
    _forwarders: Vec<Subscription>,
}

impl EditorContext {
    pub fn new(scene: SceneHandle) -> Self {
        Self::with_config(scene, EditorConfig::default())
    }

    pub fn with_config(scene: SceneHandle, config: EditorConfig) -> Self {
        let history = Rc::new(CommandHistory::with_config(config.history));
        let metadata = Rc::new(MetadataStore::with_boxed_policy(config.metadata_policy));

        // Only nodes currently in the scene can be selected.
        let weak_scene = Rc::downgrade(&scene);
        let selection = SelectionSet::new(history.clone(), move |id| {
            weak_scene
                .upgrade()
                .and_then(|scene| scene.try_borrow().ok().map(|s| s.contains(id)))
                .unwrap_or(false)
        });

        let refresh = Signal::new();
        let forward = |refresh: &Signal| {
            let refresh = refresh.clone();
            move || refresh.emit()
        };
        let forwarders = vec![
            history.on_change(forward(&refresh)),
            metadata.on_change(forward(&refresh)),
            selection.on_change(forward(&refresh)),
        ];

        Self {
            scene,
            history,
            metadata,
            selection,
            tool: Cell::new(ToolKind::default()),
            space: Cell::new(SpaceMode::default()),
            transform: RefCell::new(TransformAction::new()),
            last_click: Rc::new(Cell::new(None)),
            refresh,
            _forwarders: forwarders,
        }
    }

    pub fn scene(&self) -> &SceneHandle {
        &self.scene
    }

    pub fn history(&self) -> &Rc<CommandHistory> {
        &self.history
    }

    pub fn metadata(&self) -> &Rc<MetadataStore> {
        &self.metadata
    }

    pub fn selection(&self) -> &SelectionSet {
        &self.selection
    }

    /// Build a fresh hierarchy snapshot.
    pub fn hierarchy(&self) -> HierarchyTree {
        HierarchyTree::build(&self.scene.borrow(), &self.metadata, &self.selection)
    }

    // ── Tool & space ──

    pub fn tool(&self) -> ToolKind {
        self.tool.get()
    }

    pub fn set_tool(&self, tool: ToolKind) {
        if self.tool.replace(tool) != tool {
            self.refresh.emit();
        }
    }

    pub fn space(&self) -> SpaceMode {
        self.space.get()
    }

    pub fn set_space(&self, space: SpaceMode) {
        if self.space.replace(space) != space {
            self.refresh.emit();
        }
    }

    pub fn toggle_space(&self) {
        self.set_space(self.space().toggled());
    }

    pub fn prefs(&self) -> EditorPrefs {
        EditorPrefs {
            tool_type: self.tool(),
            space_mode: self.space(),
        }
    }

    pub fn apply_prefs(&self, prefs: EditorPrefs) {
        self.set_tool(prefs.tool_type);
        self.set_space(prefs.space_mode);
    }

    /// The node a transform gizmo should attach to: the only selected node,
    /// unless the select tool is active.
    pub fn gizmo_target(&self) -> Option<NodeId> {
        if self.tool() == ToolKind::Select || self.selection.len() != 1 {
            return None;
        }
        self.selection.at(0)
    }

    // ── Transform gesture ──

    /// Capture the selection's transforms at the start of a gizmo drag.
    pub fn begin_transform(&self) -> CommandResult {
        self.begin_transform_as(format!("Transform \"{}\" ({})", self.tool(), self.space()))
    }

    /// Start an inspector slider drag on one axis of `field`.
    pub fn begin_field_drag(&self, field: TransformField, axis: Axis) -> CommandResult {
        self.begin_transform_as(format!("Dragging \"{axis}\" {field}"))
    }

    /// Start a gesture over the selection, recorded under `comment`.
    pub fn begin_transform_as(&self, comment: impl Into<String>) -> CommandResult {
        let mut action = self.transform.borrow_mut();
        if action.in_progress() {
            log::warn!("transform gesture already in progress");
            return Ok(());
        }
        action.reset(self.selection.objects());
        action.comment(comment);
        let captured = action.before_snapshot(&self.scene.borrow());
        if captured.is_err() {
            action.discard();
        }
        captured
    }

    /// Capture the final transforms and record the drag as one command.
    /// Drags that changed nothing are not recorded.
    pub fn end_transform(&self) -> CommandResult {
        let mut action = std::mem::take(&mut *self.transform.borrow_mut());
        if !action.in_progress() {
            log::warn!("transform gesture ended without a beginning");
            return Ok(());
        }
        action.after_snapshot(&self.scene.borrow())?;
        action.flush(&self.history, &self.scene)
    }

    /// Drop the gesture in progress without recording it.
    pub fn cancel_transform(&self) {
        self.transform.borrow_mut().discard();
    }

    pub fn transform_in_progress(&self) -> bool {
        self.transform.borrow().in_progress()
    }

    /// Apply `edit` to every selected node, in selection order, and record
    /// the result as one command. `edit` receives the node's position in
    /// the selection. Edits that change nothing are not recorded.
    pub fn edit_transform(
        &self,
        comment: impl Into<String>,
        mut edit: impl FnMut(usize, &mut SceneNode),
    ) -> CommandResult {
        let mut action = TransformAction::new();
        action.reset(self.selection.objects());
        action.before_snapshot(&self.scene.borrow())?;
        {
            let mut scene = self.scene.borrow_mut();
            for (i, id) in action.targets().iter().enumerate() {
                if let Some(node) = scene.get_by_id_mut(*id) {
                    edit(i, node);
                }
            }
        }
        action.after_snapshot(&self.scene.borrow())?;
        action.comment(comment);
        action.flush(&self.history, &self.scene)
    }

    /// Typed inspector input: set one axis of `field` on every selected
    /// node to the number in `input`.
    pub fn set_transform_field(&self, field: TransformField, axis: Axis, input: &str) -> CommandResult {
        let value: f32 = input
            .trim()
            .parse()
            .map_err(|_| CommandError::InvalidState(format!("not a number: {input}")))?;
        self.edit_transform(format!("Set \"{axis}\" {field} ({input})"), |_, node| {
            field.write(node, axis, value)
        })
    }

    // ── Misc ──

    /// Last row clicked in the hierarchy, the anchor of range selection.
    pub fn last_click_target(&self) -> Option<NodeId> {
        self.last_click.get()
    }

    pub(crate) fn last_click_cell(&self) -> &Rc<Cell<Option<NodeId>>> {
        &self.last_click
    }

    /// Clear the selection and abandon any gesture in progress.
    pub fn reset(&self) -> CommandResult {
        self.cancel_transform();
        self.selection.clear("Editor Context Reset")
    }

    /// Remove `id` and its subtree from the scene, then forget the removed
    /// nodes' metadata and drop them from the selection. Neither the removal
    /// nor the cleanup is recorded. Returns the removed ids, parents first.
    pub fn remove_node(&self, id: NodeId) -> Vec<NodeId> {
        let removed: Vec<NodeId> = {
            let mut scene = self.scene.borrow_mut();
            match scene.index_of(id) {
                Some(idx) => scene.remove_node(idx).into_iter().map(|n| n.id).collect(),
                None => return Vec::new(),
            }
        };
        for id in &removed {
            self.metadata.forget(*id);
        }
        self.selection.revalidate();
        removed
    }

    /// Drop metadata of nodes that left the scene.
    pub fn prune_metadata(&self) -> usize {
        let removed = self.metadata.prune(&self.scene.borrow());
        if removed > 0 {
            log::trace!("pruned metadata of {removed} removed nodes");
        }
        removed
    }

    /// Run a shortcut action. Returns `false` for actions the host has to
    /// handle itself.
    pub fn dispatch(&self, action: ShortcutAction) -> CommandResult<bool> {
        match action {
            ShortcutAction::Tool(tool) => self.set_tool(tool),
            ShortcutAction::ToggleSpace => self.toggle_space(),
            ShortcutAction::Undo => self.history.undo()?,
            ShortcutAction::Redo => self.history.redo()?,
            ShortcutAction::SelectChildren => actions::select_children(self)?,
            ShortcutAction::SelectParents => actions::select_parents(self)?,
            ShortcutAction::ToggleFullscreen => return Ok(false),
        }
        Ok(true)
    }

    /// Fires after any change a view may want to redraw for.
    #[must_use = "dropping the subscription detaches the listener"]
    pub fn on_refresh(&self, listener: impl Fn() + 'static) -> Subscription {
        self.refresh.subscribe(listener)
    }

    /// Number of refreshes so far.
    pub fn revision(&self) -> u64 {
        self.refresh.version()
    }
}

impl fmt::Debug for EditorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EditorContext")
            .field("tool", &self.tool())
            .field("space", &self.space())
            .field("selection", &self.selection)
            .field("history", &self.history)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orbit_scene::{NodeKind, SceneNode, Vec3};

    fn context_with(keys: &[&str]) -> EditorContext {
        let mut scene = SceneGraph::new();
        let root = scene.root_id();
        for key in keys {
            scene
                .insert(root, SceneNode::new(NodeId::intern(key), NodeKind::Mesh))
                .unwrap();
        }
        EditorContext::new(Rc::new(RefCell::new(scene)))
    }

    #[test]
    fn transform_comment_names_tool_and_space() {
        let ctx = context_with(&["ctx_box"]);
        let id = NodeId::intern("ctx_box");
        ctx.selection().set("pick", [id]).unwrap();
        ctx.set_tool(ToolKind::Move);

        ctx.begin_transform().unwrap();
        ctx.scene()
            .borrow_mut()
            .get_by_id_mut(id)
            .unwrap()
            .transform
            .position = Vec3::new(0.0, 2.0, 0.0);
        ctx.end_transform().unwrap();

        assert_eq!(
            ctx.history().undo_comments().last().map(String::as_str),
            Some("Transform \"move\" (local)")
        );
    }

    #[test]
    fn selection_rejects_nodes_outside_the_scene() {
        let ctx = context_with(&["ctx_in"]);
        ctx.selection()
            .set("pick", [NodeId::intern("ctx_in"), NodeId::intern("ctx_out")])
            .unwrap();
        assert_eq!(ctx.selection().objects(), vec![NodeId::intern("ctx_in")]);
    }

    #[test]
    fn refresh_aggregates_sources() {
        let ctx = context_with(&["ctx_r"]);
        let before = ctx.revision();
        ctx.set_tool(ToolKind::Scale);
        ctx.set_tool(ToolKind::Scale);
        assert_eq!(ctx.revision(), before + 1);

        ctx.toggle_space();
        assert_eq!(ctx.space(), SpaceMode::World);
        assert!(ctx.revision() > before + 1);
    }

    #[test]
    fn reset_clears_selection() {
        let ctx = context_with(&["ctx_reset"]);
        ctx.selection().set("pick", [NodeId::intern("ctx_reset")]).unwrap();
        ctx.reset().unwrap();
        assert!(ctx.selection().is_empty());
        assert_eq!(
            ctx.history().undo_comments().last().map(String::as_str),
            Some("Editor Context Reset")
        );
    }

    #[test]
    fn gizmo_needs_single_selection_and_a_tool() {
        let ctx = context_with(&["gz_a", "gz_b"]);
        let (a, b) = (NodeId::intern("gz_a"), NodeId::intern("gz_b"));
        ctx.selection().set("pick", [a]).unwrap();
        assert_eq!(ctx.gizmo_target(), None);
        ctx.set_tool(ToolKind::Rotate);
        assert_eq!(ctx.gizmo_target(), Some(a));
        ctx.selection().add("more", [b]).unwrap();
        assert_eq!(ctx.gizmo_target(), None);
    }

    #[test]
    fn removed_nodes_leave_the_selection() {
        let ctx = context_with(&["rm_a", "rm_b"]);
        let (a, b) = (NodeId::intern("rm_a"), NodeId::intern("rm_b"));
        ctx.selection().set("pick", [a]).unwrap();
        ctx.set_tool(ToolKind::Move);

        assert_eq!(ctx.remove_node(a), vec![a]);
        assert!(ctx.selection().is_empty());
        assert_eq!(ctx.gizmo_target(), None);
        assert!(!ctx.metadata().contains(a));
        assert_eq!(ctx.history().undo_count(), 1);

        ctx.selection().set("pick b", [b]).unwrap();
        ctx.begin_transform().unwrap();
        ctx.end_transform().unwrap();
        // Undoing both picks never brings the removed node back.
        ctx.history().undo_steps(2).unwrap();
        ctx.history().redo().unwrap();
        assert!(ctx.selection().is_empty());
    }

    #[test]
    fn typed_field_edit_is_one_labelled_command() {
        let ctx = context_with(&["tf_a", "tf_b"]);
        let (a, b) = (NodeId::intern("tf_a"), NodeId::intern("tf_b"));
        ctx.selection().set("pick", [a, b]).unwrap();

        ctx.set_transform_field(TransformField::Position, Axis::X, " 2.5").unwrap();
        assert_eq!(
            ctx.history().undo_comments().last().map(String::as_str),
            Some("Set \"x\" position ( 2.5)")
        );
        for id in [a, b] {
            assert_eq!(
                ctx.scene().borrow().get_by_id(id).unwrap().transform.position,
                Vec3::new(2.5, 0.0, 0.0)
            );
        }

        ctx.history().undo().unwrap();
        assert_eq!(
            ctx.scene().borrow().get_by_id(b).unwrap().transform.position,
            Vec3::ZERO
        );
        assert_eq!(ctx.history().undo_count(), 1);
    }

    #[test]
    fn typed_field_edit_rejects_garbage_and_noops() {
        let ctx = context_with(&["tf_c"]);
        ctx.selection().set("pick", [NodeId::intern("tf_c")]).unwrap();

        let err = ctx
            .set_transform_field(TransformField::Scale, Axis::Y, "big")
            .unwrap_err();
        assert_eq!(err, CommandError::InvalidState("not a number: big".into()));
        // Scale is already 1.
        ctx.set_transform_field(TransformField::Scale, Axis::Y, "1").unwrap();
        assert_eq!(ctx.history().undo_count(), 1);
    }

    #[test]
    fn slider_drag_uses_its_own_label() {
        let ctx = context_with(&["sl_a"]);
        let id = NodeId::intern("sl_a");
        ctx.selection().set("pick", [id]).unwrap();

        ctx.begin_field_drag(TransformField::Rotation, Axis::Y).unwrap();
        for step in 1..=3 {
            let mut scene = ctx.scene().borrow_mut();
            let node = scene.get_by_id_mut(id).unwrap();
            TransformField::Rotation.write(node, Axis::Y, 0.1 * step as f32);
        }
        ctx.end_transform().unwrap();
        assert_eq!(
            ctx.history().undo_comments().last().map(String::as_str),
            Some("Dragging \"y\" rotation")
        );
        assert_eq!(ctx.history().undo_count(), 2);
    }

    #[test]
    fn dispatch_leaves_fullscreen_to_the_host() {
        let ctx = context_with(&[]);
        assert!(!ctx.dispatch(ShortcutAction::ToggleFullscreen).unwrap());
        assert!(ctx.dispatch(ShortcutAction::Tool(ToolKind::Move)).unwrap());
        assert_eq!(ctx.tool(), ToolKind::Move);
    }

    #[test]
    fn prefs_default_missing_fields() {
        let ctx = context_with(&[]);
        ctx.apply_prefs(EditorPrefs {
            tool_type: ToolKind::Rotate,
            ..EditorPrefs::default()
        });
        assert_eq!(ctx.prefs().tool_type, ToolKind::Rotate);
        assert_eq!(ctx.prefs().space_mode, SpaceMode::Local);
    }
}
