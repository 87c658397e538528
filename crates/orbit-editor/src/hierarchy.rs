//! Hierarchy view-model: a filtered, depth-first projection of the scene.
//!
//! A [`HierarchyTree`] is rebuilt from scratch on every refresh. Nodes live
//! in an arena in pre-order (index 0 is the scene root) and refer to each
//! other by index. Nodes hidden from the hierarchy, or internal to the
//! editor, are left out together with their whole subtree.
//!
//! Two orders matter:
//! - the arena, which holds every listed node, folded or not;
//! - the flat row list ([`HierarchyTree::rows`]), which holds only nodes
//!   whose ancestors are all open, i.e. the rows actually displayed.

use crate::metadata::{Metadata, MetadataStore};
use crate::selection::SelectionSet;
use orbit_scene::{NodeId, NodeIndex, SceneGraph, user_keys};
use serde::Serialize;
use std::collections::HashMap;
use std::ops::Range;

/// One listed scene node.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeInfo {
    pub id: NodeId,
    /// Node name, or its type name when unnamed.
    pub label: String,
    pub depth: usize,
    #[serde(skip)]
    pub parent: Option<usize>,
    #[serde(skip)]
    pub children: Vec<usize>,
    /// Listed descendants at any depth.
    pub total_child_count: usize,
    pub is_selected: bool,
    pub metadata: Metadata,
    /// Scene visibility of the node itself.
    pub visible: bool,
    pub pickable: bool,
}

impl NodeInfo {
    pub fn child_count(&self) -> usize {
        self.children.len()
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    /// Has listed children and is folded.
    pub fn is_closed(&self) -> bool {
        !self.children.is_empty() && !self.metadata.hierarchy_open
    }
}

/// Connector pieces drawn left of a row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkGuide {
    pub depth: usize,
    /// Expanded with children: a line runs down to the first child.
    pub open: bool,
    /// Folded with children: the "closed" marker.
    pub closed: bool,
    /// Last child of its parent: an elbow connector.
    pub ending: bool,
    /// Not the last child: a tee connector.
    pub tee: bool,
    pub has_children: bool,
    /// Vertical continuation lines, as distances (1 = parent level) from the
    /// row's own depth, for each ancestor that has a next sibling.
    pub continuations: Vec<usize>,
}

/// Contiguous runs of highlighted rows, as indices into the row list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionBlocks {
    /// Runs of selected rows.
    pub selected: Vec<Range<usize>>,
    /// Runs of folded rows hiding a selected descendant.
    pub contains_selected: Vec<Range<usize>>,
}

/// Accumulates row indices into contiguous runs.
#[derive(Default)]
struct BlockBuilder {
    blocks: Vec<Range<usize>>,
    open: bool,
}

impl BlockBuilder {
    fn add(&mut self, row: usize) {
        match self.blocks.last_mut() {
            Some(block) if self.open => block.end = row + 1,
            _ => self.blocks.push(row..row + 1),
        }
        self.open = true;
    }

    fn close(&mut self) {
        self.open = false;
    }
}

/// The hierarchy snapshot.
#[derive(Debug, Clone)]
pub struct HierarchyTree {
    nodes: Vec<NodeInfo>,
    rows: Vec<usize>,
    by_id: HashMap<NodeId, usize>,
}

struct Pending {
    scene_index: NodeIndex,
    parent: Option<usize>,
    depth: usize,
    parents_open: bool,
}

impl HierarchyTree {
    /// Build the tree in one depth-first pass from the scene root.
    ///
    /// Reading metadata may create entries with default values; that never
    /// fires a notification.
    pub fn build(scene: &SceneGraph, metadata: &MetadataStore, selection: &SelectionSet) -> Self {
        let mut nodes: Vec<NodeInfo> = Vec::new();
        let mut rows = Vec::new();
        let mut stack = vec![Pending {
            scene_index: scene.root,
            parent: None,
            depth: 0,
            parents_open: true,
        }];

        while let Some(Pending {
            scene_index,
            parent,
            depth,
            parents_open,
        }) = stack.pop()
        {
            let node = &scene.graph[scene_index];
            let meta = metadata.get(node);
            let index = nodes.len();
            if let Some(p) = parent {
                nodes[p].children.push(index);
            }
            if parents_open {
                rows.push(index);
            }
            nodes.push(NodeInfo {
                id: node.id,
                label: node.display_name().to_string(),
                depth,
                parent,
                children: Vec::new(),
                total_child_count: 0,
                is_selected: selection.has(node.id),
                metadata: meta,
                visible: node.visible,
                pickable: node.user_flag(user_keys::PICKABLE) != Some(false),
            });

            let children_open = parents_open && meta.hierarchy_open;
            // Reversed so children pop in scene order.
            for child in scene.children(scene_index).into_iter().rev() {
                if metadata.get(&scene.graph[child]).is_listed() {
                    stack.push(Pending {
                        scene_index: child,
                        parent: Some(index),
                        depth: depth + 1,
                        parents_open: children_open,
                    });
                }
            }
        }

        // Children always follow their parent in pre-order.
        for i in (1..nodes.len()).rev() {
            if let Some(p) = nodes[i].parent {
                nodes[p].total_child_count += 1 + nodes[i].total_child_count;
            }
        }

        let by_id = nodes.iter().enumerate().map(|(i, n)| (n.id, i)).collect();
        log::trace!("hierarchy rebuilt: {} nodes, {} rows", nodes.len(), rows.len());
        Self { nodes, rows, by_id }
    }

    pub fn root(&self) -> &NodeInfo {
        &self.nodes[0]
    }

    pub fn node(&self, index: usize) -> Option<&NodeInfo> {
        self.nodes.get(index)
    }

    /// Arena index of the node `id`, if it is listed.
    pub fn find(&self, id: NodeId) -> Option<usize> {
        self.by_id.get(&id).copied()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Displayed rows, top to bottom, as arena indices.
    pub fn rows(&self) -> &[usize] {
        &self.rows
    }

    /// Displayed rows, top to bottom.
    pub fn all_nodes(&self) -> impl Iterator<Item = &NodeInfo> + '_ {
        self.rows.iter().map(|&i| &self.nodes[i])
    }

    pub fn parent(&self, index: usize) -> Option<usize> {
        self.nodes[index].parent
    }

    pub fn children(&self, index: usize) -> &[usize] {
        &self.nodes[index].children
    }

    pub fn child_count(&self, index: usize) -> usize {
        self.nodes[index].child_count()
    }

    pub fn is_root(&self, index: usize) -> bool {
        self.nodes[index].is_root()
    }

    pub fn is_closed(&self, index: usize) -> bool {
        self.nodes[index].is_closed()
    }

    /// Ancestors of `index`, nearest first.
    pub fn parents(&self, index: usize) -> Parents<'_> {
        Parents {
            tree: self,
            next: self.nodes[index].parent,
        }
    }

    /// Listed descendants of `index` in depth-first pre-order. Folded
    /// branches are included.
    pub fn descendants(&self, index: usize) -> Descendants<'_> {
        Descendants {
            tree: self,
            stack: self.nodes[index].children.iter().rev().copied().collect(),
        }
    }

    pub fn parents_are_open(&self, index: usize) -> bool {
        self.parents(index)
            .all(|p| self.nodes[p].metadata.hierarchy_open)
    }

    /// `false` for the root.
    pub fn is_last_child(&self, index: usize) -> bool {
        self.nodes[index]
            .parent
            .is_some_and(|p| self.nodes[p].children.last() == Some(&index))
    }

    pub fn next_sibling(&self, index: usize) -> Option<usize> {
        let siblings = &self.nodes[self.nodes[index].parent?].children;
        let position = siblings.iter().position(|&c| c == index)?;
        siblings.get(position + 1).copied()
    }

    /// Folded node with a selected node somewhere below it.
    pub fn contains_selected(&self, index: usize) -> bool {
        !self.nodes[index].metadata.hierarchy_open
            && self.descendants(index).any(|d| self.nodes[d].is_selected)
    }

    /// Rows between `a` and `b` inclusive, in display order, whichever comes
    /// first. When only one endpoint is displayed, just that one; when
    /// neither is, nothing.
    pub fn range(&self, a: NodeId, b: NodeId) -> Vec<NodeId> {
        let row_of = |id: NodeId| self.rows.iter().position(|&i| self.nodes[i].id == id);
        match (row_of(a), row_of(b)) {
            (None, None) => Vec::new(),
            (Some(_), None) => vec![a],
            (None, Some(_)) => vec![b],
            (Some(ra), Some(rb)) => self.rows[ra.min(rb)..=ra.max(rb)]
                .iter()
                .filter(|&&i| self.parents_are_open(i))
                .map(|&i| self.nodes[i].id)
                .collect(),
        }
    }

    /// Child count badge: `(n)`, or `(n/total)` when grandchildren exist.
    /// `None` for leaves.
    pub fn child_count_label(&self, index: usize) -> Option<String> {
        let node = &self.nodes[index];
        match node.child_count() {
            0 => None,
            n if node.total_child_count > n => Some(format!("({n}/{})", node.total_child_count)),
            n => Some(format!("({n})")),
        }
    }

    pub fn link_guide(&self, index: usize) -> LinkGuide {
        let node = &self.nodes[index];
        let has_children = node.child_count() > 0;
        let has_parent = node.parent.is_some();
        let last = self.is_last_child(index);

        let continuations = self
            .parents(index)
            .enumerate()
            .filter(|(_, p)| self.next_sibling(*p).is_some())
            .map(|(distance, _)| distance + 1)
            .collect();

        LinkGuide {
            depth: node.depth,
            open: has_children && node.metadata.hierarchy_open,
            closed: node.is_closed(),
            ending: has_parent && last,
            tee: has_parent && !last,
            has_children,
            continuations,
        }
    }

    /// Highlight runs over the displayed rows. The root row never takes
    /// part and breaks no run.
    pub fn selection_blocks(&self) -> SelectionBlocks {
        let mut selected = BlockBuilder::default();
        let mut hiding = BlockBuilder::default();
        for (row, &index) in self.rows.iter().enumerate().skip(1) {
            if self.nodes[index].is_selected {
                selected.add(row);
            } else {
                selected.close();
            }
            if self.contains_selected(index) {
                hiding.add(row);
            } else {
                hiding.close();
            }
        }
        SelectionBlocks {
            selected: selected.blocks,
            contains_selected: hiding.blocks,
        }
    }
}

/// Iterator over ancestors, see [`HierarchyTree::parents`].
pub struct Parents<'a> {
    tree: &'a HierarchyTree,
    next: Option<usize>,
}

impl Iterator for Parents<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        let current = self.next?;
        self.next = self.tree.nodes[current].parent;
        Some(current)
    }
}

/// Pre-order iterator over descendants, see [`HierarchyTree::descendants`].
pub struct Descendants<'a> {
    tree: &'a HierarchyTree,
    stack: Vec<usize>,
}

impl Iterator for Descendants<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        let current = self.stack.pop()?;
        self.stack
            .extend(self.tree.nodes[current].children.iter().rev().copied());
        Some(current)
    }
}
