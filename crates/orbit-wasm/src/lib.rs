//! WASM bridge for Orbit: exposes the editor state core to JavaScript.
//!
//! Compiled via `wasm-pack build --target web`. The host page owns the
//! renderer and the DOM; it forwards gestures here and pulls JSON snapshots
//! back. Fallible calls return `{"ok":true}` or `{"ok":false,"error":"..."}`.

use orbit_editor::actions::{self, ClickMode};
use orbit_editor::{
    Axis, CommandError, CommandResult, EditorContext, EditorPrefs, HierarchyTree, LinkGuide, NodeInfo, SceneHandle,
    SelectionBlocks, ShortcutAction, ShortcutMap, Subscription, ToolKind, TransformField,
};
use orbit_scene::{Euler, NodeId, NodeKind, SceneGraph, SceneNode, Vec3};
use serde::Serialize;
use std::cell::RefCell;
use std::rc::Rc;
use wasm_bindgen::prelude::*;

/// The main WASM-facing editor controller.
#[wasm_bindgen]
pub struct OrbitEditor {
    ctx: EditorContext,
    /// Keeps JS refresh callbacks attached.
    listeners: Vec<Subscription>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RowView<'a> {
    #[serde(flatten)]
    node: &'a NodeInfo,
    badge: Option<String>,
    guide: LinkGuide,
    contains_selected: bool,
}

#[derive(Serialize)]
struct HierarchyView<'a> {
    rows: Vec<RowView<'a>>,
    blocks: SelectionBlocks,
}

fn result_json(result: CommandResult) -> String {
    match result {
        Ok(()) => serde_json::json!({ "ok": true }).to_string(),
        Err(e) => serde_json::json!({ "ok": false, "error": e.to_string() }).to_string(),
    }
}

fn parse_kind(kind: &str) -> Option<NodeKind> {
    serde_json::from_value(serde_json::Value::String(kind.to_string())).ok()
}

fn parse_tool(name: &str) -> Option<ToolKind> {
    serde_json::from_value(serde_json::Value::String(name.to_string())).ok()
}

fn parse_field(field: &str, axis: &str) -> Result<(TransformField, Axis), CommandError> {
    let field = serde_json::from_value(serde_json::Value::String(field.to_string()))
        .map_err(|_| CommandError::InvalidState(format!("unknown transform field {field}")))?;
    let axis = serde_json::from_value(serde_json::Value::String(axis.to_string()))
        .map_err(|_| CommandError::InvalidState(format!("unknown axis {axis}")))?;
    Ok((field, axis))
}

fn action_to_name(action: ShortcutAction) -> &'static str {
    match action {
        ShortcutAction::Tool(_) => "tool",
        ShortcutAction::ToggleSpace => "toggleSpace",
        ShortcutAction::Undo => "undo",
        ShortcutAction::Redo => "redo",
        ShortcutAction::SelectChildren => "selectChildren",
        ShortcutAction::SelectParents => "selectParents",
        ShortcutAction::ToggleFullscreen => "toggleFullscreen",
    }
}

impl OrbitEditor {
    fn scene(&self) -> &SceneHandle {
        self.ctx.scene()
    }

    /// Mutate a node's transform in place. Live edits are not recorded;
    /// wrap them in `begin_transform` / `end_transform`.
    fn edit_node(&self, id: &str, edit: impl FnOnce(&mut SceneNode)) -> bool {
        let mut scene = self.scene().borrow_mut();
        match scene.get_by_id_mut(NodeId::intern(id)) {
            Some(node) => {
                edit(node);
                true
            }
            None => {
                log::warn!("no node with id {id}");
                false
            }
        }
    }

    fn hierarchy_view(tree: &HierarchyTree) -> HierarchyView<'_> {
        let rows = tree
            .rows()
            .iter()
            .filter_map(|&index| {
                Some(RowView {
                    node: tree.node(index)?,
                    badge: tree.child_count_label(index),
                    guide: tree.link_guide(index),
                    contains_selected: tree.contains_selected(index),
                })
            })
            .collect();
        HierarchyView {
            rows,
            blocks: tree.selection_blocks(),
        }
    }
}

#[wasm_bindgen]
impl OrbitEditor {
    /// Create an editor around an empty scene.
    #[wasm_bindgen(constructor)]
    pub fn new() -> Self {
        console_error_panic_hook_setup();
        let scene: SceneHandle = Rc::new(RefCell::new(SceneGraph::new()));
        Self {
            ctx: EditorContext::new(scene),
            listeners: Vec::new(),
        }
    }

    // ─── Scene building ──────────────────────────────────────────────────

    pub fn root_id(&self) -> String {
        self.scene().borrow().root_id().to_string()
    }

    /// Add a node of `kind` (engine type name, e.g. `"Mesh"`) under
    /// `parent_id`. Returns the new id, or an empty string on failure.
    pub fn add_node(&self, parent_id: &str, kind: &str, name: &str) -> String {
        let Some(kind) = parse_kind(kind) else {
            log::warn!("unknown node kind {kind}");
            return String::new();
        };
        let node = SceneNode::anonymous(kind).named(name);
        let id = node.id;
        match self.scene().borrow_mut().insert(NodeId::intern(parent_id), node) {
            Some(_) => id.to_string(),
            None => String::new(),
        }
    }

    /// Remove a node and its subtree, dropping their metadata and their
    /// selection.
    pub fn remove_node(&self, id: &str) -> bool {
        !self.ctx.remove_node(NodeId::intern(id)).is_empty()
    }

    /// JSON of one scene node, or `null`.
    pub fn node_json(&self, id: &str) -> String {
        let scene = self.scene().borrow();
        serde_json::to_string(&scene.get_by_id(NodeId::intern(id))).unwrap_or_else(|_| "null".to_string())
    }

    pub fn set_position(&self, id: &str, x: f32, y: f32, z: f32) -> bool {
        self.edit_node(id, |node| node.transform.position = Vec3::new(x, y, z))
    }

    pub fn set_rotation(&self, id: &str, x: f32, y: f32, z: f32) -> bool {
        self.edit_node(id, |node| {
            let order = node.transform.rotation.order;
            node.transform.rotation = Euler::new(x, y, z).with_order(order);
        })
    }

    pub fn set_scale(&self, id: &str, x: f32, y: f32, z: f32) -> bool {
        self.edit_node(id, |node| node.transform.scale = Vec3::new(x, y, z))
    }

    // ─── Transform gesture ───────────────────────────────────────────────

    pub fn begin_transform(&self) -> String {
        result_json(self.ctx.begin_transform())
    }

    pub fn end_transform(&self) -> String {
        result_json(self.ctx.end_transform())
    }

    /// Start a gesture recorded under a caller-chosen comment.
    pub fn begin_transform_as(&self, comment: &str) -> String {
        result_json(self.ctx.begin_transform_as(comment))
    }

    /// Start an inspector slider drag, e.g. `("position", "x")`. Finish it
    /// with `end_transform`.
    pub fn begin_field_drag(&self, field: &str, axis: &str) -> String {
        result_json(parse_field(field, axis).and_then(|(f, a)| self.ctx.begin_field_drag(f, a)))
    }

    /// Typed inspector input applied to the whole selection as one command.
    pub fn set_field(&self, field: &str, axis: &str, input: &str) -> String {
        result_json(parse_field(field, axis).and_then(|(f, a)| self.ctx.set_transform_field(f, a, input)))
    }

    pub fn cancel_transform(&self) {
        self.ctx.cancel_transform();
    }

    /// Id the gizmo should attach to, or an empty string.
    pub fn gizmo_target(&self) -> String {
        self.ctx
            .gizmo_target()
            .map(|id| id.to_string())
            .unwrap_or_default()
    }

    // ─── History ─────────────────────────────────────────────────────────

    pub fn undo(&self) -> String {
        result_json(self.ctx.history().undo())
    }

    pub fn redo(&self) -> String {
        result_json(self.ctx.history().redo())
    }

    /// Jump several steps back, e.g. when a history panel entry is clicked.
    pub fn undo_steps(&self, count: usize) -> String {
        result_json(self.ctx.history().undo_steps(count))
    }

    pub fn redo_steps(&self, count: usize) -> String {
        result_json(self.ctx.history().redo_steps(count))
    }

    /// History panel entries as JSON: `{"undo":[...],"redo":[...]}`.
    pub fn history_json(&self, limit: usize) -> String {
        serde_json::to_string(&self.ctx.history().window(limit)).unwrap_or_else(|_| "{}".to_string())
    }

    // ─── Hierarchy & selection ───────────────────────────────────────────

    /// Displayed hierarchy rows and highlight blocks as JSON.
    pub fn hierarchy_json(&self) -> String {
        let tree = self.ctx.hierarchy();
        serde_json::to_string(&Self::hierarchy_view(&tree)).unwrap_or_else(|_| "{}".to_string())
    }

    pub fn click_row(&self, id: &str, shift: bool, ctrl_or_meta: bool) -> String {
        let tree = self.ctx.hierarchy();
        let mode = ClickMode::from_modifiers(shift, ctrl_or_meta);
        result_json(actions::click_row(&self.ctx, &tree, NodeId::intern(id), mode))
    }

    pub fn toggle_visibility(&self, id: &str) -> String {
        result_json(actions::toggle_visibility(&self.ctx, NodeId::intern(id)))
    }

    pub fn toggle_pickable(&self, id: &str) -> String {
        result_json(actions::toggle_pickable(&self.ctx, NodeId::intern(id)))
    }

    pub fn toggle_hierarchy_open(&self, id: &str) -> String {
        result_json(actions::toggle_hierarchy_open(&self.ctx, NodeId::intern(id)).map(|_| ()))
    }

    /// Resolve a viewport tap. `hits` are raycast results, nearest first.
    pub fn pick(&self, hits: Vec<String>, shift: bool) -> String {
        let hits: Vec<NodeId> = hits.iter().map(|h| NodeId::intern(h)).collect();
        result_json(actions::pick(&self.ctx, &hits, shift))
    }

    /// Selected ids in selection order, as a JSON array.
    pub fn selected_ids(&self) -> String {
        let ids: Vec<&str> = self
            .ctx
            .selection()
            .objects()
            .into_iter()
            .map(|id| id.as_str())
            .collect();
        serde_json::to_string(&ids).unwrap_or_else(|_| "[]".to_string())
    }

    // ─── Tools & keys ────────────────────────────────────────────────────

    pub fn set_tool(&self, name: &str) -> bool {
        match parse_tool(name) {
            Some(tool) => {
                self.ctx.set_tool(tool);
                true
            }
            None => false,
        }
    }

    pub fn tool_name(&self) -> String {
        self.ctx.tool().to_string()
    }

    pub fn space_name(&self) -> String {
        self.ctx.space().to_string()
    }

    pub fn toggle_space(&self) {
        self.ctx.toggle_space();
    }

    pub fn prefs_json(&self) -> String {
        serde_json::to_string(&self.ctx.prefs()).unwrap_or_else(|_| "{}".to_string())
    }

    /// Restore preferences saved by `prefs_json`. Returns `false` on
    /// malformed input.
    pub fn set_prefs_json(&self, json: &str) -> bool {
        match serde_json::from_str::<EditorPrefs>(json) {
            Ok(prefs) => {
                self.ctx.apply_prefs(prefs);
                true
            }
            Err(e) => {
                log::warn!("invalid editor prefs: {e}");
                false
            }
        }
    }

    /// Handle a key event. Returns JSON:
    /// `{"handled":bool,"action":"...","tool":"...","space":"...","error":...}`.
    ///
    /// `handled` is `false` for unbound keys and for actions the page has to
    /// perform itself (fullscreen).
    pub fn handle_key(&self, key: &str, ctrl: bool, shift: bool, alt: bool, meta: bool) -> String {
        let Some(action) = ShortcutMap::resolve(key, ctrl, shift, alt, meta) else {
            return serde_json::json!({ "handled": false, "action": "none" }).to_string();
        };
        let (handled, error) = match self.ctx.dispatch(action) {
            Ok(handled) => (handled, None),
            Err(e) => (true, Some(e.to_string())),
        };
        serde_json::json!({
            "handled": handled,
            "action": action_to_name(action),
            "tool": self.ctx.tool().as_str(),
            "space": self.ctx.space().as_str(),
            "error": error,
        })
        .to_string()
    }

    // ─── Refresh ─────────────────────────────────────────────────────────

    /// Refresh counter; redraw when it differs from the last seen value.
    pub fn revision(&self) -> f64 {
        self.ctx.revision() as f64
    }

    /// Call `callback` after every change that may need a redraw.
    pub fn on_refresh(&mut self, callback: js_sys::Function) {
        let subscription = self.ctx.on_refresh(move || {
            if let Err(e) = callback.call0(&JsValue::NULL) {
                web_sys::console::error_1(&e);
            }
        });
        self.listeners.push(subscription);
    }

    /// Detach every callback registered with `on_refresh`.
    pub fn clear_refresh_listeners(&mut self) {
        self.listeners.clear();
    }
}

impl Default for OrbitEditor {
    fn default() -> Self {
        Self::new()
    }
}

/// Route panics to the browser console.
fn console_error_panic_hook_setup() {
    #[cfg(target_arch = "wasm32")]
    {
        use std::sync::Once;
        static SET_HOOK: Once = Once::new();
        SET_HOOK.call_once(|| {
            std::panic::set_hook(Box::new(|info| {
                let msg = format!("Orbit WASM panic: {info}");
                web_sys::console::error_1(&msg.into());
            }));
        });
    }
}
