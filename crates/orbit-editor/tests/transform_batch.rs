//! Integration tests: transform gestures batched into single commands.

use orbit_editor::actions;
use orbit_editor::{EditorContext, MetadataPatch, SceneHandle, ToolKind};
use orbit_scene::{Euler, NodeId, NodeKind, SceneGraph, SceneNode, Vec3};
use pretty_assertions::assert_eq;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

fn make_editor(keys: &[&str]) -> EditorContext {
    let mut scene = SceneGraph::new();
    let root = scene.root_id();
    for key in keys {
        scene
            .insert(root, SceneNode::new(NodeId::intern(key), NodeKind::Mesh))
            .unwrap();
    }
    let handle: SceneHandle = Rc::new(RefCell::new(scene));
    EditorContext::new(handle)
}

#[test]
fn gesture_without_motion_is_not_recorded() {
    let ctx = make_editor(&["still"]);
    ctx.selection().set("pick", [NodeId::intern("still")]).unwrap();
    let before = ctx.history().undo_count();

    ctx.begin_transform().unwrap();
    ctx.end_transform().unwrap();
    assert_eq!(ctx.history().undo_count(), before);
    assert!(!ctx.transform_in_progress());
}

#[test]
fn motion_that_returns_home_is_not_recorded() {
    let ctx = make_editor(&["yoyo"]);
    let id = NodeId::intern("yoyo");
    ctx.selection().set("pick", [id]).unwrap();

    ctx.begin_transform().unwrap();
    {
        let mut scene = ctx.scene().borrow_mut();
        let node = scene.get_by_id_mut(id).unwrap();
        node.transform.position.set(3.0, 0.0, 0.0);
        node.transform.position.set(0.0, 0.0, 0.0);
    }
    ctx.end_transform().unwrap();
    assert_eq!(ctx.history().undo_count(), 1);
}

#[test]
fn multi_node_gesture_undoes_together() {
    let ctx = make_editor(&["m1", "m2"]);
    let (m1, m2) = (NodeId::intern("m1"), NodeId::intern("m2"));
    ctx.selection().set("pick", [m1, m2]).unwrap();
    ctx.set_tool(ToolKind::Rotate);

    ctx.begin_transform().unwrap();
    for id in [m1, m2] {
        let mut scene = ctx.scene().borrow_mut();
        scene.get_by_id_mut(id).unwrap().transform.rotation = Euler::new(0.0, 1.5, 0.0);
    }
    ctx.end_transform().unwrap();
    assert_eq!(
        ctx.history().undo_comments().last().map(String::as_str),
        Some("Transform \"rotate\" (local)")
    );

    ctx.history().undo().unwrap();
    let scene = ctx.scene().borrow();
    for id in [m1, m2] {
        assert_eq!(scene.get_by_id(id).unwrap().transform.rotation, Euler::IDENTITY);
    }
}

#[test]
fn undoing_a_drag_keeps_visibility_edits_made_during_it() {
    let ctx = make_editor(&["blink"]);
    let id = NodeId::intern("blink");
    ctx.selection().set("pick", [id]).unwrap();

    ctx.begin_transform().unwrap();
    actions::toggle_visibility(&ctx, id).unwrap();
    ctx.scene()
        .borrow_mut()
        .get_by_id_mut(id)
        .unwrap()
        .transform
        .position
        .x = 5.0;
    ctx.end_transform().unwrap();

    let visible = |ctx: &EditorContext| ctx.scene().borrow().get_by_id(id).unwrap().visible;
    let position = |ctx: &EditorContext| ctx.scene().borrow().get_by_id(id).unwrap().transform.position;

    ctx.history().undo().unwrap();
    assert_eq!(position(&ctx), Vec3::ZERO);
    assert!(!visible(&ctx));

    ctx.history().undo().unwrap();
    assert!(visible(&ctx));

    ctx.history().redo_steps(2).unwrap();
    assert!(!visible(&ctx));
    assert_eq!(position(&ctx), Vec3::new(5.0, 0.0, 0.0));
}

#[test]
fn cancelled_gesture_leaves_no_trace() {
    let ctx = make_editor(&["c"]);
    let id = NodeId::intern("c");
    ctx.selection().set("pick", [id]).unwrap();
    let fired = Rc::new(Cell::new(0));
    let f = fired.clone();
    let _sub = ctx.history().on_change(move || f.set(f.get() + 1));

    ctx.begin_transform().unwrap();
    ctx.scene()
        .borrow_mut()
        .get_by_id_mut(id)
        .unwrap()
        .transform
        .scale = Vec3::new(2.0, 2.0, 2.0);
    ctx.cancel_transform();
    ctx.end_transform().unwrap();

    assert_eq!(fired.get(), 0);
    assert!(!ctx.transform_in_progress());
}

#[test]
fn metadata_changes_coalesce() {
    let ctx = make_editor(&["meta"]);
    let fired = Rc::new(Cell::new(0));
    let f = fired.clone();
    let _sub = ctx.metadata().on_change(move || f.set(f.get() + 1));

    let scene = ctx.scene().borrow();
    let changed = ctx.metadata().set_in(
        &scene,
        NodeId::intern("meta"),
        MetadataPatch::new()
            .hierarchy_open(true)
            .update_selectable(|s| !s),
    );
    assert!(changed);
    assert_eq!(fired.get(), 1);

    // Same values again: no change, no notification.
    ctx.metadata().set_in(
        &scene,
        NodeId::intern("meta"),
        MetadataPatch::new().hierarchy_open(true),
    );
    assert_eq!(fired.get(), 1);
}
