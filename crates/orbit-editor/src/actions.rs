//! User-level editor actions built on the context's collaborators.
//!
//! Each action turns one gesture (a key, a click on a hierarchy row, a tap
//! in the viewport) into at most one history command.

use crate::context::{EditorContext, SceneHandle};
use crate::error::{CommandError, CommandResult};
use crate::hierarchy::HierarchyTree;
use crate::metadata::MetadataPatch;
use crate::selection::CommandHooks;
use orbit_scene::{NodeId, SceneGraph, SceneNode, UserValue, user_keys};
use smallvec::SmallVec;

fn push_unique(out: &mut SmallVec<[NodeId; 8]>, id: NodeId) {
    if !out.contains(&id) {
        out.push(id);
    }
}

/// Select the parents of the selected nodes. The scene root is never
/// selected this way.
pub fn select_parents(ctx: &EditorContext) -> CommandResult {
    let mut parents = SmallVec::<[NodeId; 8]>::new();
    {
        let scene = ctx.scene().borrow();
        for id in ctx.selection().objects() {
            if let Some(parent) = scene.parent_id(id)
                && scene.parent_id(parent).is_some()
            {
                push_unique(&mut parents, parent);
            }
        }
    }
    ctx.selection().set("Select Parents", parents)
}

/// Select the children of the selected nodes.
pub fn select_children(ctx: &EditorContext) -> CommandResult {
    let mut children = SmallVec::<[NodeId; 8]>::new();
    {
        let scene = ctx.scene().borrow();
        for id in ctx.selection().objects() {
            for child in scene.children_ids(id) {
                push_unique(&mut children, child);
            }
        }
    }
    ctx.selection().set("Select Children", children)
}

/// Nodes affected by a per-row button: the whole selection when `node` is
/// part of it, otherwise `node` alone.
pub fn targets_for(ctx: &EditorContext, node: NodeId) -> Vec<NodeId> {
    if ctx.selection().has(node) {
        ctx.selection().objects()
    } else {
        vec![node]
    }
}

fn ensure_present(scene: &SceneGraph, ids: &[NodeId]) -> CommandResult {
    match ids.iter().find(|id| !scene.contains(**id)) {
        Some(missing) => {
            log::warn!("command skipped: node {missing} left the scene");
            Err(CommandError::TargetNotFound(*missing))
        }
        None => Ok(()),
    }
}

fn write_all<T>(
    scene: &SceneHandle,
    targets: &[NodeId],
    values: impl Iterator<Item = T>,
    write: &impl Fn(&mut SceneNode, T),
) -> CommandResult {
    let mut scene = scene.borrow_mut();
    ensure_present(&scene, targets)?;
    for (id, value) in targets.iter().zip(values) {
        if let Some(node) = scene.get_by_id_mut(*id) {
            write(node, value);
        }
    }
    Ok(())
}

/// Record a per-node property write: execute writes `value` to every
/// target, undo restores what each target held before.
fn push_property<T, R, W>(
    ctx: &EditorContext,
    comment: String,
    targets: Vec<NodeId>,
    value: T,
    read: R,
    write: W,
) -> CommandResult
where
    T: Clone + 'static,
    R: Fn(&SceneNode) -> T,
    W: Fn(&mut SceneNode, T) + Clone + 'static,
{
    let previous: Vec<T> = {
        let scene = ctx.scene().borrow();
        ensure_present(&scene, &targets)?;
        targets
            .iter()
            .filter_map(|id| scene.get_by_id(*id))
            .map(read)
            .collect()
    };

    let (forward_scene, backward_scene) = (ctx.scene().clone(), ctx.scene().clone());
    let forward_targets = targets.clone();
    let forward_write = write.clone();
    ctx.history().push(
        &comment,
        move || {
            write_all(
                &forward_scene,
                &forward_targets,
                std::iter::repeat(value.clone()),
                &forward_write,
            )
        },
        move || write_all(&backward_scene, &targets, previous.iter().cloned(), &write),
    )
}

/// Flip scene visibility of `node` (or of the selection containing it).
pub fn toggle_visibility(ctx: &EditorContext, node: NodeId) -> CommandResult {
    let visible = {
        let scene = ctx.scene().borrow();
        let target = scene.get_by_id(node).ok_or(CommandError::TargetNotFound(node))?;
        !target.visible
    };
    let targets = targets_for(ctx, node);
    let comment = format!(
        "Toggle visibility ({} x{} objects)",
        if visible { "visible" } else { "hidden" },
        targets.len()
    );
    push_property(
        ctx,
        comment,
        targets,
        visible,
        |n| n.visible,
        |n, v| n.visible = v,
    )
}

/// Flip the `pickable` user flag of `node` (or of the selection containing
/// it). An absent flag counts as pickable.
pub fn toggle_pickable(ctx: &EditorContext, node: NodeId) -> CommandResult {
    let pickable = {
        let scene = ctx.scene().borrow();
        let target = scene.get_by_id(node).ok_or(CommandError::TargetNotFound(node))?;
        target.user_flag(user_keys::PICKABLE) == Some(false)
    };
    let targets = targets_for(ctx, node);
    let comment = format!(
        "Toggle pickable ({} x{} objects)",
        if pickable { "pickable" } else { "unpickable" },
        targets.len()
    );
    push_property(
        ctx,
        comment,
        targets,
        Some(UserValue::Bool(pickable)),
        |n| n.user_data.get(user_keys::PICKABLE).cloned(),
        |n, v| match v {
            Some(value) => {
                n.user_data.insert(user_keys::PICKABLE.to_string(), value);
            }
            None => {
                n.user_data.remove(user_keys::PICKABLE);
            }
        },
    )
}

/// Fold or unfold `node` (or the selection containing it) in the
/// hierarchy. Not recorded in the history.
pub fn toggle_hierarchy_open(ctx: &EditorContext, node: NodeId) -> CommandResult<bool> {
    let open = !ctx
        .metadata()
        .get_in(&ctx.scene().borrow(), node)
        .ok_or(CommandError::TargetNotFound(node))?
        .hierarchy_open;
    let targets = targets_for(ctx, node);
    Ok(ctx
        .metadata()
        .set_many_in(ctx.scene(), &targets, || MetadataPatch::new().hierarchy_open(open)))
}

/// How a click on a hierarchy row changes the selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickMode {
    /// Select the clicked row only.
    Set,
    /// Add or remove the clicked row.
    ToggleOne,
    /// Add every row between the previous click and this one.
    AddRange,
}

impl ClickMode {
    /// Shift wins over Ctrl/Cmd.
    pub fn from_modifiers(shift: bool, ctrl_or_meta: bool) -> Self {
        if shift {
            ClickMode::AddRange
        } else if ctrl_or_meta {
            ClickMode::ToggleOne
        } else {
            ClickMode::Set
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ClickMode::Set => "set",
            ClickMode::ToggleOne => "toggle-one",
            ClickMode::AddRange => "add-range",
        }
    }
}

/// Apply a click on the hierarchy row of `node`.
///
/// The clicked node becomes the anchor of the next range click. The anchor
/// is updated by the selection command itself, so undo puts the previous
/// anchor back.
pub fn click_row(ctx: &EditorContext, tree: &HierarchyTree, node: NodeId, mode: ClickMode) -> CommandResult {
    let previous_anchor = ctx.last_click_target();
    let mut objects: SmallVec<[NodeId; 8]> = match mode {
        ClickMode::Set => SmallVec::new(),
        ClickMode::ToggleOne | ClickMode::AddRange => ctx.selection().objects().into_iter().collect(),
    };
    match mode {
        ClickMode::Set => objects.push(node),
        ClickMode::ToggleOne => match objects.iter().position(|id| *id == node) {
            Some(i) => {
                objects.remove(i);
            }
            None => objects.push(node),
        },
        ClickMode::AddRange => {
            let range = match previous_anchor {
                Some(anchor) => tree.range(anchor, node),
                None => vec![node],
            };
            for id in range {
                push_unique(&mut objects, id);
            }
        }
    }

    let comment = format!(
        "Change selection in hierarchy (mode \"{}\", {} objects selected)",
        mode.as_str(),
        objects.len()
    );
    let (forward, backward) = (ctx.last_click_cell().clone(), ctx.last_click_cell().clone());
    ctx.selection().set_with_hooks(
        &comment,
        objects,
        Some(CommandHooks::new(
            move || forward.set(Some(node)),
            move || backward.set(previous_anchor),
        )),
    )
}

/// Whether a raycast hit on `id` may be picked: helpers are skipped, and so
/// is anything under a node flagged `ignoreRaycast` or `pickable = false`.
pub fn is_pickable(scene: &SceneGraph, id: NodeId) -> bool {
    let Some(node) = scene.get_by_id(id) else {
        return false;
    };
    if node.kind.is_helper() {
        return false;
    }
    std::iter::once(id)
        .chain(scene.ancestors(id))
        .filter_map(|a| scene.get_by_id(a))
        .all(|a| {
            a.user_flag(user_keys::IGNORE_RAYCAST) != Some(true)
                && a.user_flag(user_keys::PICKABLE) != Some(false)
        })
}

/// Resolve a viewport tap. `hits` are the raycast intersections, nearest
/// first.
///
/// Shift toggles the picked node. A plain tap selects it, or clears the
/// selection when nothing pickable was hit.
pub fn pick(ctx: &EditorContext, hits: &[NodeId], shift: bool) -> CommandResult {
    let picked = {
        let scene = ctx.scene().borrow();
        hits.iter()
            .copied()
            .find(|id| is_pickable(&scene, *id))
            .and_then(|id| match scene.get_by_id(id)?.user_flag(user_keys::SELECT_PARENT_ON_TAP) {
                Some(true) => scene.parent_id(id),
                _ => Some(id),
            })
    };

    match (picked, shift) {
        (Some(id), true) => ctx.selection().toggle("Scene Raycast Toggle", Some(id)),
        (Some(id), false) => ctx.selection().set("Scene Raycast Pick", [id]),
        (None, false) => ctx.selection().clear("Scene Raycast Clear"),
        (None, true) => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orbit_scene::NodeKind;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn ctx() -> EditorContext {
        EditorContext::new(Rc::new(RefCell::new(SceneGraph::new())))
    }

    fn add(ctx: &EditorContext, parent: NodeId, key: &str, kind: NodeKind) -> NodeId {
        let id = NodeId::intern(key);
        ctx.scene()
            .borrow_mut()
            .insert(parent, SceneNode::new(id, kind))
            .unwrap();
        id
    }

    fn visible(ctx: &EditorContext, id: NodeId) -> bool {
        ctx.scene().borrow().get_by_id(id).unwrap().visible
    }

    #[test]
    fn select_parents_skips_root() {
        let ctx = ctx();
        let root = ctx.scene().borrow().root_id();
        let group = add(&ctx, root, "act_group", NodeKind::Group);
        let leaf = add(&ctx, group, "act_leaf", NodeKind::Mesh);

        ctx.selection().set("pick", [leaf, group]).unwrap();
        select_parents(&ctx).unwrap();
        assert_eq!(ctx.selection().objects(), vec![group]);
    }

    #[test]
    fn select_children_collects_all() {
        let ctx = ctx();
        let root = ctx.scene().borrow().root_id();
        let a = add(&ctx, root, "kids_a", NodeKind::Group);
        let a1 = add(&ctx, a, "kids_a1", NodeKind::Mesh);
        let a2 = add(&ctx, a, "kids_a2", NodeKind::Mesh);

        ctx.selection().set("pick", [a]).unwrap();
        select_children(&ctx).unwrap();
        assert_eq!(ctx.selection().objects(), vec![a1, a2]);
        assert_eq!(
            ctx.history().undo_comments().last().map(String::as_str),
            Some("Select Children")
        );
    }

    #[test]
    fn visibility_toggle_targets_selection() {
        let ctx = ctx();
        let root = ctx.scene().borrow().root_id();
        let a = add(&ctx, root, "vis_a", NodeKind::Mesh);
        let b = add(&ctx, root, "vis_b", NodeKind::Mesh);
        let c = add(&ctx, root, "vis_c", NodeKind::Mesh);
        ctx.selection().set("pick", [a, b]).unwrap();

        toggle_visibility(&ctx, a).unwrap();
        assert!(!visible(&ctx, a));
        assert!(!visible(&ctx, b));
        assert!(visible(&ctx, c));

        toggle_visibility(&ctx, c).unwrap();
        assert!(!visible(&ctx, c));

        ctx.history().undo_steps(2).unwrap();
        assert!(visible(&ctx, a) && visible(&ctx, b) && visible(&ctx, c));
    }

    #[test]
    fn pickable_toggle_restores_absent_flag() {
        let ctx = ctx();
        let root = ctx.scene().borrow().root_id();
        let a = add(&ctx, root, "pk_a", NodeKind::Mesh);

        toggle_pickable(&ctx, a).unwrap();
        assert_eq!(
            ctx.scene().borrow().get_by_id(a).unwrap().user_flag(user_keys::PICKABLE),
            Some(false)
        );
        ctx.history().undo().unwrap();
        assert!(
            !ctx.scene()
                .borrow()
                .get_by_id(a)
                .unwrap()
                .user_data
                .contains_key(user_keys::PICKABLE)
        );
    }

    #[test]
    fn hierarchy_open_is_not_recorded() {
        let ctx = ctx();
        let root = ctx.scene().borrow().root_id();
        let a = add(&ctx, root, "fold_a", NodeKind::Group);

        assert!(toggle_hierarchy_open(&ctx, a).unwrap());
        let scene = ctx.scene().borrow();
        assert!(ctx.metadata().get_in(&scene, a).unwrap().hierarchy_open);
        assert_eq!(ctx.history().undo_count(), 0);
    }

    #[test]
    fn fold_listeners_may_edit_the_scene() {
        let ctx = ctx();
        let root = ctx.scene().borrow().root_id();
        let a = add(&ctx, root, "fold_edit", NodeKind::Group);

        let scene = Rc::downgrade(ctx.scene());
        let writable = Rc::new(std::cell::Cell::new(false));
        let w = writable.clone();
        let _sub = ctx.metadata().on_change(move || {
            if let Some(scene) = scene.upgrade() {
                w.set(scene.try_borrow_mut().is_ok());
            }
        });

        toggle_hierarchy_open(&ctx, a).unwrap();
        assert!(writable.get());
    }

    #[test]
    fn pick_filters_helpers_and_unpickable_branches() {
        let ctx = ctx();
        let root = ctx.scene().borrow().root_id();
        let helper = add(&ctx, root, "pick_helper", NodeKind::AxesHelper);
        let locked = add(&ctx, root, "pick_locked", NodeKind::Group);
        let inside = add(&ctx, locked, "pick_inside", NodeKind::Mesh);
        let free = add(&ctx, root, "pick_free", NodeKind::Mesh);
        ctx.scene()
            .borrow_mut()
            .get_by_id_mut(locked)
            .unwrap()
            .set_user_flag(user_keys::PICKABLE, false);

        pick(&ctx, &[helper, inside, free], false).unwrap();
        assert_eq!(ctx.selection().objects(), vec![free]);

        pick(&ctx, &[], true).unwrap();
        assert_eq!(ctx.selection().len(), 1);
        pick(&ctx, &[], false).unwrap();
        assert!(ctx.selection().is_empty());
    }

    #[test]
    fn pick_redirects_to_parent() {
        let ctx = ctx();
        let root = ctx.scene().borrow().root_id();
        let body = add(&ctx, root, "tap_body", NodeKind::Group);
        let wheel = add(&ctx, body, "tap_wheel", NodeKind::Mesh);
        ctx.scene()
            .borrow_mut()
            .get_by_id_mut(wheel)
            .unwrap()
            .set_user_flag(user_keys::SELECT_PARENT_ON_TAP, true);

        pick(&ctx, &[wheel], false).unwrap();
        assert_eq!(ctx.selection().objects(), vec![body]);
        pick(&ctx, &[wheel], true).unwrap();
        assert!(ctx.selection().is_empty());
    }

    #[test]
    fn click_modes() {
        assert_eq!(ClickMode::from_modifiers(true, true), ClickMode::AddRange);
        assert_eq!(ClickMode::from_modifiers(false, true), ClickMode::ToggleOne);
        assert_eq!(ClickMode::from_modifiers(false, false), ClickMode::Set);
    }
}
