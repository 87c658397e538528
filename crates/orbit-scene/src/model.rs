//! Scene-graph data model consumed by the editor core.
//!
//! The scene is a tree: nodes carry a name, a kind tag, a local transform, a
//! visibility flag and an open-ended user-data bag. Edges go parent → child.
//! The editor never owns nodes; it references them through [`NodeId`].

use crate::id::NodeId;
use crate::transform::Transform;
use petgraph::graph::NodeIndex;
use petgraph::stable_graph::StableDiGraph;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::collections::{BTreeMap, HashMap};

// ─── Node kinds ──────────────────────────────────────────────────────────

/// The node kinds the engine exposes. Only used for classification
/// (display names, metadata defaults, pick filtering).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    /// Root of the scene.
    Scene,
    /// Plain transform node with no visual of its own.
    Object3D,
    Group,
    Mesh,
    InstancedMesh,
    Points,
    PerspectiveCamera,
    OrthographicCamera,
    AmbientLight,
    DirectionalLight,
    PointLight,
    /// Frustum visualization attached to a camera.
    CameraHelper,
    AxesHelper,
    GridHelper,
}

impl NodeKind {
    /// Engine type name, shown in the hierarchy when a node has no name.
    pub fn type_name(self) -> &'static str {
        match self {
            NodeKind::Scene => "Scene",
            NodeKind::Object3D => "Object3D",
            NodeKind::Group => "Group",
            NodeKind::Mesh => "Mesh",
            NodeKind::InstancedMesh => "InstancedMesh",
            NodeKind::Points => "Points",
            NodeKind::PerspectiveCamera => "PerspectiveCamera",
            NodeKind::OrthographicCamera => "OrthographicCamera",
            NodeKind::AmbientLight => "AmbientLight",
            NodeKind::DirectionalLight => "DirectionalLight",
            NodeKind::PointLight => "PointLight",
            NodeKind::CameraHelper => "CameraHelper",
            NodeKind::AxesHelper => "AxesHelper",
            NodeKind::GridHelper => "GridHelper",
        }
    }

    /// Visual aids that are part of the scene but not part of the content.
    pub fn is_helper(self) -> bool {
        self.type_name().ends_with("Helper")
    }

    pub fn is_scene(self) -> bool {
        matches!(self, NodeKind::Scene)
    }
}

// ─── User data ───────────────────────────────────────────────────────────

/// A value in a node's user-data bag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UserValue {
    Bool(bool),
    Number(f64),
    Text(String),
}

/// Well-known user-data keys read by the editor.
pub mod user_keys {
    /// `false` makes the node (and its subtree) ignored by scene picking.
    pub const PICKABLE: &str = "pickable";
    /// `true` makes the node (and its subtree) invisible to raycasts.
    pub const IGNORE_RAYCAST: &str = "ignoreRaycast";
    /// `true` redirects a pick on this node to its parent.
    pub const SELECT_PARENT_ON_TAP: &str = "selectParentOnTap";
}

// ─── Scene nodes ─────────────────────────────────────────────────────────

/// A single node in the scene graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneNode {
    pub id: NodeId,
    /// User-facing name; may be empty.
    pub name: String,
    pub kind: NodeKind,
    pub transform: Transform,
    pub visible: bool,
    pub user_data: BTreeMap<String, UserValue>,
}

impl SceneNode {
    pub fn new(id: NodeId, kind: NodeKind) -> Self {
        Self {
            id,
            name: String::new(),
            kind,
            transform: Transform::IDENTITY,
            visible: true,
            user_data: BTreeMap::new(),
        }
    }

    /// Create a node with a fresh id prefixed by its kind.
    pub fn anonymous(kind: NodeKind) -> Self {
        let prefix = kind.type_name().to_ascii_lowercase();
        Self::new(NodeId::with_prefix(&prefix), kind)
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    /// Name if set, otherwise the engine type name.
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            self.kind.type_name()
        } else {
            &self.name
        }
    }

    /// Read a boolean user-data flag. Non-boolean values read as absent.
    pub fn user_flag(&self, key: &str) -> Option<bool> {
        match self.user_data.get(key) {
            Some(UserValue::Bool(b)) => Some(*b),
            _ => None,
        }
    }

    pub fn set_user_flag(&mut self, key: &str, value: bool) {
        self.user_data.insert(key.to_string(), UserValue::Bool(value));
    }
}

// ─── Scene graph ─────────────────────────────────────────────────────────

/// The complete scene: a tree of [`SceneNode`] values with a single root.
#[derive(Debug, Clone)]
pub struct SceneGraph {
    /// The underlying directed graph (parent → child edges).
    pub graph: StableDiGraph<SceneNode, ()>,

    /// The root node index.
    pub root: NodeIndex,

    /// Index from NodeId → NodeIndex for fast lookup.
    pub id_index: HashMap<NodeId, NodeIndex>,

    /// Explicit child order per parent. Slot indices get recycled by the
    /// stable graph, so insertion order is tracked here instead.
    child_order: HashMap<NodeIndex, SmallVec<[NodeIndex; 4]>>,
}

impl SceneGraph {
    /// Create a new scene containing only a root `Scene` node.
    #[must_use]
    pub fn new() -> Self {
        Self::with_root(SceneNode::new(NodeId::intern("scene"), NodeKind::Scene))
    }

    /// Create a new scene around a caller-provided root node.
    #[must_use]
    pub fn with_root(root_node: SceneNode) -> Self {
        let mut graph = StableDiGraph::new();
        let root_id = root_node.id;
        let root = graph.add_node(root_node);

        let mut id_index = HashMap::new();
        id_index.insert(root_id, root);

        Self {
            graph,
            root,
            id_index,
            child_order: HashMap::new(),
        }
    }

    pub fn root_id(&self) -> NodeId {
        self.graph[self.root].id
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Add a node as the last child of `parent`. Returns the new node's index.
    pub fn add_node(&mut self, parent: NodeIndex, node: SceneNode) -> NodeIndex {
        let id = node.id;
        let idx = self.graph.add_node(node);
        self.graph.add_edge(parent, idx, ());
        self.child_order.entry(parent).or_default().push(idx);
        self.id_index.insert(id, idx);
        idx
    }

    /// Add a node under the parent identified by `parent_id`.
    /// Returns `None` if the parent does not exist or the id is taken.
    pub fn insert(&mut self, parent_id: NodeId, node: SceneNode) -> Option<NodeIndex> {
        if self.id_index.contains_key(&node.id) {
            log::warn!("scene already contains a node with id {}", node.id);
            return None;
        }
        let parent = self.index_of(parent_id)?;
        Some(self.add_node(parent, node))
    }

    /// Remove a node and its whole subtree, keeping the indices synchronized.
    /// Returns the removed nodes, parents before children. The root cannot be
    /// removed.
    pub fn remove_node(&mut self, idx: NodeIndex) -> Vec<SceneNode> {
        if idx == self.root || !self.graph.contains_node(idx) {
            return Vec::new();
        }
        if let Some(parent) = self.parent(idx)
            && let Some(order) = self.child_order.get_mut(&parent)
        {
            order.retain(|c| *c != idx);
        }

        let mut doomed = vec![idx];
        let mut cursor = 0;
        while cursor < doomed.len() {
            let next = self.children(doomed[cursor]);
            doomed.extend(next);
            cursor += 1;
        }

        doomed
            .into_iter()
            .filter_map(|i| {
                self.child_order.remove(&i);
                let removed = self.graph.remove_node(i)?;
                self.id_index.remove(&removed.id);
                Some(removed)
            })
            .collect()
    }

    /// Look up a node by id.
    pub fn get_by_id(&self, id: NodeId) -> Option<&SceneNode> {
        self.id_index.get(&id).map(|idx| &self.graph[*idx])
    }

    /// Look up a node mutably by id.
    pub fn get_by_id_mut(&mut self, id: NodeId) -> Option<&mut SceneNode> {
        self.id_index
            .get(&id)
            .copied()
            .map(|idx| &mut self.graph[idx])
    }

    /// Get the index for a NodeId.
    pub fn index_of(&self, id: NodeId) -> Option<NodeIndex> {
        self.id_index.get(&id).copied()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.id_index.contains_key(&id)
    }

    /// Get the parent index of a node.
    pub fn parent(&self, idx: NodeIndex) -> Option<NodeIndex> {
        self.graph
            .neighbors_directed(idx, petgraph::Direction::Incoming)
            .next()
    }

    /// Get the parent id of a node, `None` for the root or unknown ids.
    pub fn parent_id(&self, id: NodeId) -> Option<NodeId> {
        let idx = self.index_of(id)?;
        self.parent(idx).map(|p| self.graph[p].id)
    }

    /// Get children of a node in insertion order.
    pub fn children(&self, idx: NodeIndex) -> Vec<NodeIndex> {
        self.child_order
            .get(&idx)
            .map(|order| order.to_vec())
            .unwrap_or_default()
    }

    /// Child ids of `id` in insertion order; empty for unknown ids.
    pub fn children_ids(&self, id: NodeId) -> Vec<NodeId> {
        self.index_of(id)
            .map(|idx| {
                self.children(idx)
                    .into_iter()
                    .map(|c| self.graph[c].id)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Ancestors of `id`, nearest first, ending with the root.
    pub fn ancestors(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let Some(mut idx) = self.index_of(id) else {
            return out;
        };
        while let Some(parent_idx) = self.parent(idx) {
            out.push(self.graph[parent_idx].id);
            idx = parent_idx;
        }
        out
    }

    /// Display label of a node, or `None` for unknown ids.
    pub fn display_name(&self, id: NodeId) -> Option<&str> {
        self.get_by_id(id).map(SceneNode::display_name)
    }
}

impl Default for SceneGraph {
    fn default() -> Self {
        Self::new()
    }
}
