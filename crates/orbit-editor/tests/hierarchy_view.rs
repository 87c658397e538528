//! Integration tests: hierarchy view-model built from a live editor.

use orbit_editor::{EditorContext, HierarchyTree, MetadataPatch, SceneHandle};
use orbit_scene::{NodeId, NodeKind, SceneGraph, SceneNode};
use pretty_assertions::assert_eq;
use std::cell::RefCell;
use std::rc::Rc;

/// R
/// ├── A (open)
/// │   └── B
/// └── C (closed)
///     └── D
fn make_editor() -> EditorContext {
    let mut scene = SceneGraph::with_root(SceneNode::new(NodeId::intern("R"), NodeKind::Scene));
    let r = scene.root_id();
    let (a, c) = (NodeId::intern("A"), NodeId::intern("C"));
    scene.insert(r, SceneNode::new(a, NodeKind::Group)).unwrap();
    scene
        .insert(a, SceneNode::new(NodeId::intern("B"), NodeKind::Mesh))
        .unwrap();
    scene.insert(r, SceneNode::new(c, NodeKind::Group)).unwrap();
    scene
        .insert(c, SceneNode::new(NodeId::intern("D"), NodeKind::Mesh))
        .unwrap();
    let handle: SceneHandle = Rc::new(RefCell::new(scene));

    let ctx = EditorContext::new(handle);
    ctx.metadata().set_in(
        &ctx.scene().borrow(),
        a,
        MetadataPatch::new().hierarchy_open(true),
    );
    ctx
}

fn labels<'a>(tree: &'a HierarchyTree, indices: impl IntoIterator<Item = usize>) -> Vec<&'a str> {
    indices
        .into_iter()
        .map(|i| tree.node(i).unwrap().id.as_str())
        .collect()
}

fn keys(ids: &[NodeId]) -> Vec<&str> {
    ids.iter().map(|id| id.as_str()).collect()
}

#[test]
fn closed_branches_leave_the_row_list() {
    let ctx = make_editor();
    let tree = ctx.hierarchy();
    assert_eq!(labels(&tree, tree.rows().iter().copied()), vec!["R", "A", "B", "C"]);
    assert_eq!(labels(&tree, tree.descendants(0)), vec!["A", "B", "C", "D"]);
}

#[test]
fn counts_include_folded_descendants() {
    let ctx = make_editor();
    let tree = ctx.hierarchy();
    let c = tree.find(NodeId::intern("C")).unwrap();
    assert_eq!(tree.root().total_child_count, 4);
    assert_eq!(tree.node(c).unwrap().total_child_count, 1);
    assert!(tree.is_closed(c));
    assert!(!tree.parents_are_open(tree.find(NodeId::intern("D")).unwrap()));
}

#[test]
fn range_with_folded_endpoint_falls_back() {
    let ctx = make_editor();
    let tree = ctx.hierarchy();
    let (a, d) = (NodeId::intern("A"), NodeId::intern("D"));
    assert_eq!(keys(&tree.range(a, d)), vec!["A"]);
    assert_eq!(keys(&tree.range(d, a)), vec!["A"]);
    assert!(tree.range(d, NodeId::intern("nowhere")).is_empty());
}

#[test]
fn range_is_order_independent() {
    let ctx = make_editor();
    let tree = ctx.hierarchy();
    let (b, c) = (NodeId::intern("B"), NodeId::intern("C"));
    assert_eq!(keys(&tree.range(c, b)), vec!["B", "C"]);
    assert_eq!(tree.range(b, c), tree.range(c, b));
}

#[test]
fn rebuild_reflects_open_toggle() {
    let ctx = make_editor();
    orbit_editor::actions::toggle_hierarchy_open(&ctx, NodeId::intern("C")).unwrap();
    let tree = ctx.hierarchy();
    assert_eq!(
        labels(&tree, tree.rows().iter().copied()),
        vec!["R", "A", "B", "C", "D"]
    );
    // Folding is view state, not an edit.
    assert_eq!(ctx.history().undo_count(), 0);
}

#[test]
fn folded_row_highlights_hidden_selection() {
    let ctx = make_editor();
    ctx.selection()
        .set("pick", [NodeId::intern("D")])
        .unwrap();
    let tree = ctx.hierarchy();
    let c = tree.find(NodeId::intern("C")).unwrap();
    assert!(tree.contains_selected(c));

    let blocks = tree.selection_blocks();
    assert!(blocks.selected.is_empty());
    assert_eq!(blocks.contains_selected, vec![3..4]);
}

#[test]
fn child_count_badges() {
    let ctx = make_editor();
    let tree = ctx.hierarchy();
    assert_eq!(tree.child_count_label(0).as_deref(), Some("(2/4)"));
    let a = tree.find(NodeId::intern("A")).unwrap();
    assert_eq!(tree.child_count_label(a).as_deref(), Some("(1)"));
}
