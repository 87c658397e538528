//! Editor-only attributes attached to scene nodes.
//!
//! The store is a side-table keyed by [`NodeId`]: nodes are never modified
//! and never kept alive by it. Entries are created lazily on first access
//! from a [`MetadataPolicy`], and pruned once their node leaves the scene.
//!
//! All writes go through [`MetadataPatch`], a partial record whose fields are
//! either a literal or a function of the current value. A patch fires at most
//! one change notification, and only if some field actually changed.

use crate::context::SceneHandle;
use crate::signal::{Signal, Subscription};
use orbit_scene::{NodeId, NodeKind, SceneGraph, SceneNode};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;

// ─── Attributes ──────────────────────────────────────────────────────────

/// Whether a node belongs to the user's content or to editor internals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    #[default]
    Public,
    Internal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Visible,
    Hidden,
}

/// The per-node metadata record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    pub scope: Scope,
    /// Whether the node gets a row in the hierarchy at all.
    pub hierarchy_visibility: Visibility,
    /// Whether the node's children are expanded in the hierarchy.
    pub hierarchy_open: bool,
    pub scene_visibility: Visibility,
    pub selectable: bool,
}

impl Default for Metadata {
    fn default() -> Self {
        Self {
            scope: Scope::Public,
            hierarchy_visibility: Visibility::Visible,
            hierarchy_open: false,
            scene_visibility: Visibility::Visible,
            selectable: true,
        }
    }
}

impl Metadata {
    /// Whether the node should appear in the hierarchy view.
    pub fn is_listed(&self) -> bool {
        self.hierarchy_visibility == Visibility::Visible && self.scope != Scope::Internal
    }
}

// ─── Patches ─────────────────────────────────────────────────────────────

/// One field of a [`MetadataPatch`].
pub enum Field<T> {
    Keep,
    Set(T),
    Update(Box<dyn FnOnce(T) -> T>),
}

impl<T> Default for Field<T> {
    fn default() -> Self {
        Field::Keep
    }
}

impl<T: Copy + PartialEq> Field<T> {
    /// Write the new value into `slot`; report whether it differs.
    fn apply(self, slot: &mut T) -> bool {
        let next = match self {
            Field::Keep => return false,
            Field::Set(value) => value,
            Field::Update(f) => f(*slot),
        };
        if next == *slot {
            return false;
        }
        *slot = next;
        true
    }
}

impl<T: fmt::Debug> fmt::Debug for Field<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Field::Keep => f.write_str("Keep"),
            Field::Set(v) => f.debug_tuple("Set").field(v).finish(),
            Field::Update(_) => f.write_str("Update(..)"),
        }
    }
}

/// A partial update of a [`Metadata`] record.
///
/// ```
/// use orbit_editor::metadata::MetadataPatch;
/// let patch = MetadataPatch::new()
///     .selectable(false)
///     .update_hierarchy_open(|open| !open);
/// # let _ = patch;
/// ```
#[derive(Debug, Default)]
pub struct MetadataPatch {
    pub scope: Field<Scope>,
    pub hierarchy_visibility: Field<Visibility>,
    pub hierarchy_open: Field<bool>,
    pub scene_visibility: Field<Visibility>,
    pub selectable: Field<bool>,
}

impl MetadataPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scope(mut self, value: Scope) -> Self {
        self.scope = Field::Set(value);
        self
    }

    pub fn hierarchy_visibility(mut self, value: Visibility) -> Self {
        self.hierarchy_visibility = Field::Set(value);
        self
    }

    pub fn hierarchy_open(mut self, value: bool) -> Self {
        self.hierarchy_open = Field::Set(value);
        self
    }

    pub fn update_hierarchy_open(mut self, f: impl FnOnce(bool) -> bool + 'static) -> Self {
        self.hierarchy_open = Field::Update(Box::new(f));
        self
    }

    pub fn scene_visibility(mut self, value: Visibility) -> Self {
        self.scene_visibility = Field::Set(value);
        self
    }

    pub fn update_scene_visibility(
        mut self,
        f: impl FnOnce(Visibility) -> Visibility + 'static,
    ) -> Self {
        self.scene_visibility = Field::Update(Box::new(f));
        self
    }

    pub fn selectable(mut self, value: bool) -> Self {
        self.selectable = Field::Set(value);
        self
    }

    pub fn update_selectable(mut self, f: impl FnOnce(bool) -> bool + 'static) -> Self {
        self.selectable = Field::Update(Box::new(f));
        self
    }

    /// Apply every field to `target`. Returns `true` if anything changed.
    pub fn apply(self, target: &mut Metadata) -> bool {
        // Non-short-circuiting: every field is applied.
        self.scope.apply(&mut target.scope)
            | self
                .hierarchy_visibility
                .apply(&mut target.hierarchy_visibility)
            | self.hierarchy_open.apply(&mut target.hierarchy_open)
            | self.scene_visibility.apply(&mut target.scene_visibility)
            | self.selectable.apply(&mut target.selectable)
    }
}

/// Single-field shorthand, convertible into a [`MetadataPatch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataField {
    Scope(Scope),
    HierarchyVisibility(Visibility),
    HierarchyOpen(bool),
    SceneVisibility(Visibility),
    Selectable(bool),
}

impl From<MetadataField> for MetadataPatch {
    fn from(field: MetadataField) -> Self {
        let patch = MetadataPatch::new();
        match field {
            MetadataField::Scope(v) => patch.scope(v),
            MetadataField::HierarchyVisibility(v) => patch.hierarchy_visibility(v),
            MetadataField::HierarchyOpen(v) => patch.hierarchy_open(v),
            MetadataField::SceneVisibility(v) => patch.scene_visibility(v),
            MetadataField::Selectable(v) => patch.selectable(v),
        }
    }
}

// ─── Defaults ────────────────────────────────────────────────────────────

/// Decides the metadata a node starts with.
pub trait MetadataPolicy {
    fn defaults_for(&self, node: &SceneNode) -> Metadata;
}

/// Default policy keyed on [`NodeKind`]: the scene root starts open and
/// unselectable, camera helpers start unselectable, everything else gets
/// [`Metadata::default`].
#[derive(Debug, Clone, Copy, Default)]
pub struct KindPolicy;

impl MetadataPolicy for KindPolicy {
    fn defaults_for(&self, node: &SceneNode) -> Metadata {
        let mut metadata = Metadata::default();
        match node.kind {
            NodeKind::Scene => {
                metadata.hierarchy_open = true;
                metadata.selectable = false;
            }
            NodeKind::CameraHelper => metadata.selectable = false,
            _ => {}
        }
        metadata
    }
}

impl<F: Fn(&SceneNode) -> Metadata> MetadataPolicy for F {
    fn defaults_for(&self, node: &SceneNode) -> Metadata {
        self(node)
    }
}

// ─── Store ───────────────────────────────────────────────────────────────

/// Side-table of [`Metadata`] keyed by node identity.
pub struct MetadataStore {
    entries: RefCell<HashMap<NodeId, Metadata>>,
    policy: Box<dyn MetadataPolicy>,
    changed: Signal,
}

impl MetadataStore {
    pub fn new() -> Self {
        Self::with_policy(KindPolicy)
    }

    pub fn with_policy(policy: impl MetadataPolicy + 'static) -> Self {
        Self::with_boxed_policy(Box::new(policy))
    }

    pub fn with_boxed_policy(policy: Box<dyn MetadataPolicy>) -> Self {
        Self {
            entries: RefCell::new(HashMap::new()),
            policy,
            changed: Signal::new(),
        }
    }

    /// Metadata of `node`, created from the policy on first access.
    /// Creating an entry is not a change and fires nothing.
    pub fn get(&self, node: &SceneNode) -> Metadata {
        *self.entries.borrow_mut().entry(node.id).or_insert_with(|| {
            log::trace!("metadata defaults for {}", node.id);
            self.policy.defaults_for(node)
        })
    }

    /// Metadata of the node `id` in `scene`; `None` if it is not in the scene.
    pub fn get_in(&self, scene: &SceneGraph, id: NodeId) -> Option<Metadata> {
        scene.get_by_id(id).map(|node| self.get(node))
    }

    /// Apply `patch` to the entry of `node`. Fires one notification if any
    /// field changed. Returns whether something changed.
    pub fn set(&self, node: &SceneNode, patch: impl Into<MetadataPatch>) -> bool {
        let patch: MetadataPatch = patch.into();
        let changed = {
            let mut entries = self.entries.borrow_mut();
            let entry = entries
                .entry(node.id)
                .or_insert_with(|| self.policy.defaults_for(node));
            patch.apply(entry)
        };
        if changed {
            self.changed.emit();
        }
        changed
    }

    /// Set a single field.
    pub fn set_field(&self, node: &SceneNode, field: MetadataField) -> bool {
        self.set(node, field)
    }

    /// Apply `patch` to the node `id` in `scene`. Unknown ids are ignored.
    pub fn set_in(&self, scene: &SceneGraph, id: NodeId, patch: impl Into<MetadataPatch>) -> bool {
        match scene.get_by_id(id) {
            Some(node) => self.set(node, patch),
            None => {
                log::warn!("metadata update for unknown node {id}");
                false
            }
        }
    }

    /// Apply `patch` to several nodes, firing a single notification if any
    /// of them changed.
    pub fn set_many(
        &self,
        scene: &SceneGraph,
        ids: &[NodeId],
        patch: impl Fn() -> MetadataPatch,
    ) -> bool {
        let changed = self.apply_many(scene, ids, patch);
        if changed {
            self.changed.emit();
        }
        changed
    }

    /// [`set_many`](Self::set_many) on a shared scene. The scene borrow is
    /// released before listeners run, so they may mutate the scene.
    pub fn set_many_in(
        &self,
        scene: &SceneHandle,
        ids: &[NodeId],
        patch: impl Fn() -> MetadataPatch,
    ) -> bool {
        let changed = self.apply_many(&scene.borrow(), ids, patch);
        if changed {
            self.changed.emit();
        }
        changed
    }

    fn apply_many(&self, scene: &SceneGraph, ids: &[NodeId], patch: impl Fn() -> MetadataPatch) -> bool {
        let mut entries = self.entries.borrow_mut();
        let mut changed = false;
        for node in ids.iter().filter_map(|id| scene.get_by_id(*id)) {
            let entry = entries
                .entry(node.id)
                .or_insert_with(|| self.policy.defaults_for(node));
            changed |= patch().apply(entry);
        }
        changed
    }

    /// Whether an entry exists for `id`, without creating one.
    pub fn contains(&self, id: NodeId) -> bool {
        self.entries.borrow().contains_key(&id)
    }

    /// Drop the entry of a node that is gone for good.
    pub fn forget(&self, id: NodeId) -> bool {
        self.entries.borrow_mut().remove(&id).is_some()
    }

    /// Drop every entry whose node is no longer in `scene`.
    /// Returns how many entries were removed.
    pub fn prune(&self, scene: &SceneGraph) -> usize {
        let mut entries = self.entries.borrow_mut();
        let before = entries.len();
        entries.retain(|id, _| scene.contains(*id));
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    #[must_use = "dropping the subscription detaches the listener"]
    pub fn on_change(&self, listener: impl Fn() + 'static) -> Subscription {
        self.changed.subscribe(listener)
    }

    pub fn version(&self) -> u64 {
        self.changed.version()
    }
}

impl Default for MetadataStore {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for MetadataStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetadataStore")
            .field("entries", &self.len())
            .field("version", &self.version())
            .finish_non_exhaustive()
    }
}
