use std::collections::BTreeMap;

use crate::geometry::{Dimensions, Edge, Point, Rect, Size};
use crate::ir::{BoxContainer, BoxId, ChartBox, NONE};
use crate::layout::LayoutStrategy;

pub type NodeIndex = usize;

/// Orthogonal connector routed for a node's children.
#[derive(Debug, Clone, PartialEq)]
pub struct Connector {
    pub segments: Vec<Edge>,
}

/// Per-node mutable geometry and strategy scratch space.
#[derive(Debug, Clone)]
pub struct NodeLayoutInfo {
    pub top_left: Point,
    pub size: Size,
    /// Bounding rect of this node's branch after layout.
    pub branch_exterior: Rect,
    /// Vertical band occupied by this node's sibling row.
    pub siblings_row_v: Dimensions,
    pub number_of_siblings: usize,
    pub number_of_sibling_rows: usize,
    pub number_of_sibling_columns: usize,
    pub effective_strategy: Option<LayoutStrategy>,
    pub connector: Option<Connector>,
}

impl Default for NodeLayoutInfo {
    fn default() -> Self {
        Self {
            top_left: Point::default(),
            size: Size::default(),
            branch_exterior: Rect::default(),
            siblings_row_v: Dimensions::min_max(),
            number_of_siblings: 0,
            number_of_sibling_rows: 0,
            number_of_sibling_columns: 0,
            effective_strategy: None,
            connector: None,
        }
    }
}

impl NodeLayoutInfo {
    /// Fresh state at the origin with the given intrinsic size.
    pub fn reset(&mut self, size: Size) {
        *self = Self {
            size,
            branch_exterior: Rect::new(Point::default(), size),
            ..Self::default()
        };
    }

    pub fn rect(&self) -> Rect {
        Rect::new(self.top_left, self.size)
    }

    pub fn left(&self) -> f64 {
        self.rect().left()
    }

    pub fn right(&self) -> f64 {
        self.rect().right()
    }

    pub fn top(&self) -> f64 {
        self.rect().top()
    }

    pub fn bottom(&self) -> f64 {
        self.rect().bottom()
    }

    pub fn center_h(&self) -> f64 {
        self.rect().center_h()
    }

    pub fn center_v(&self) -> f64 {
        self.rect().center_v()
    }
}

#[derive(Debug, Clone)]
pub struct TreeNode {
    pub element: ChartBox,
    pub level: usize,
    pub parent: Option<NodeIndex>,
    pub children: Vec<NodeIndex>,
    pub assistants_root: Option<NodeIndex>,
    /// This node wraps a synthetic box whose children are assistants.
    pub is_assistants_root: bool,
    pub state: NodeLayoutInfo,
}

impl TreeNode {
    fn new(element: ChartBox) -> Self {
        Self {
            element,
            level: 0,
            parent: None,
            children: Vec::new(),
            assistants_root: None,
            is_assistants_root: false,
            state: NodeLayoutInfo::default(),
        }
    }
}

/// The visual tree built from a box container for one layout run.
#[derive(Debug, Clone, Default)]
pub struct BoxTree {
    nodes: Vec<TreeNode>,
    pub roots: Vec<NodeIndex>,
    /// Maximum nesting of the tree, counting assistants-root hops.
    pub depth: usize,
    by_box: BTreeMap<BoxId, NodeIndex>,
    next_box_id: BoxId,
}

impl BoxTree {
    /// Builds the tree from the container: parent-id lookup, assistant
    /// attachment, and the permissive orphan recovery path.
    pub fn build(container: &BoxContainer) -> Self {
        let mut tree = Self {
            next_box_id: container.max_id() + 1,
            ..Self::default()
        };
        for chart_box in container.boxes() {
            let idx = tree.nodes.len();
            tree.by_box.insert(chart_box.id, idx);
            tree.nodes.push(TreeNode::new(chart_box.clone()));
        }
        let system_root = container
            .system_root_id()
            .and_then(|id| tree.by_box.get(&id).copied());
        for idx in 0..tree.nodes.len() {
            let parent_id = tree.nodes[idx].element.parent_id;
            if parent_id == NONE {
                tree.roots.push(idx);
                continue;
            }
            match tree.by_box.get(&parent_id).copied() {
                Some(parent) => {
                    let assistant = tree.nodes[idx].element.is_assistant
                        && tree.nodes[parent].element.parent_id != NONE;
                    if assistant {
                        tree.add_assistant_child(parent, idx);
                    } else {
                        tree.add_regular_child(parent, idx);
                    }
                }
                // Parent id present but missing from the container: keep the
                // box by re-attaching it under the system root.
                None => match system_root {
                    Some(parent) => tree.add_regular_child(parent, idx),
                    None => tree.roots.push(idx),
                },
            }
        }
        tree
    }

    fn add_regular_child(&mut self, parent: NodeIndex, child: NodeIndex) {
        self.nodes[child].parent = Some(parent);
        self.nodes[child].level = self.nodes[parent].level + 1;
        self.nodes[parent].children.push(child);
    }

    fn add_assistant_child(&mut self, parent: NodeIndex, child: NodeIndex) {
        let assistants_root = match self.nodes[parent].assistants_root {
            Some(idx) => idx,
            None => {
                let owner_id = self.nodes[parent].element.id;
                let owner_level = self.nodes[parent].level;
                let id = self.allocate_box_id();
                let idx = self.nodes.len();
                let mut node = TreeNode::new(ChartBox::special(id, owner_id));
                node.parent = Some(parent);
                node.level = owner_level;
                node.is_assistants_root = true;
                self.by_box.insert(id, idx);
                self.nodes.push(node);
                self.nodes[parent].assistants_root = Some(idx);
                idx
            }
        };
        self.nodes[child].parent = Some(assistants_root);
        self.nodes[child].level = self.nodes[assistants_root].level + 1;
        self.nodes[assistants_root].children.push(child);
    }

    fn allocate_box_id(&mut self) -> BoxId {
        let id = self.next_box_id;
        self.next_box_id += 1;
        id
    }

    /// Appends a synthetic spacer box as a regular child and returns its node.
    pub fn append_special_child(&mut self, parent: NodeIndex) -> NodeIndex {
        let parent_box_id = self.nodes[parent].element.id;
        let affects = self.nodes[parent].element.affects_layout;
        let id = self.allocate_box_id();
        let idx = self.nodes.len();
        let mut spacer = ChartBox::special(id, parent_box_id);
        spacer.affects_layout = affects;
        let mut node = TreeNode::new(spacer);
        node.parent = Some(parent);
        node.level = self.nodes[parent].level + 1;
        self.by_box.insert(id, idx);
        self.nodes.push(node);
        self.nodes[parent].children.push(idx);
        idx
    }

    pub fn node(&self, idx: NodeIndex) -> &TreeNode {
        &self.nodes[idx]
    }

    pub fn node_mut(&mut self, idx: NodeIndex) -> &mut TreeNode {
        &mut self.nodes[idx]
    }

    pub fn node_for_box(&self, id: BoxId) -> Option<NodeIndex> {
        self.by_box.get(&id).copied()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeIndex, &TreeNode)> {
        self.nodes.iter().enumerate()
    }

    /// Recomputes node levels and the physical tree depth.
    ///
    /// Assistants share the logical band of their owner: an assistants root
    /// keeps the owner's level and so do its direct children.
    pub fn update_hierarchy_stats(&mut self) {
        self.depth = 0;
        for root_pos in 0..self.roots.len() {
            let root = self.roots[root_pos];
            self.update_levels(root, 0, 1);
        }
    }

    fn update_levels(&mut self, idx: NodeIndex, level: usize, nesting: usize) {
        self.nodes[idx].level = level;
        self.depth = self.depth.max(nesting);
        let is_assistants_root = self.nodes[idx].is_assistants_root;
        if let Some(assistants_root) = self.nodes[idx].assistants_root {
            self.update_levels(assistants_root, level, nesting + 1);
        }
        let child_level = if is_assistants_root { level } else { level + 1 };
        let children = self.nodes[idx].children.clone();
        for child in children {
            self.update_levels(child, child_level, nesting + 1);
        }
    }
}

/// Child-first traversal: assistants subtree, then child subtrees, then the
/// node itself. Returns false as soon as the visitor does.
pub fn visit_child_first(
    tree: &mut BoxTree,
    idx: NodeIndex,
    visit: &mut dyn FnMut(&mut BoxTree, NodeIndex) -> bool,
) -> bool {
    if let Some(assistants_root) = tree.node(idx).assistants_root
        && !visit_child_first(tree, assistants_root, visit)
    {
        return false;
    }
    let children = tree.node(idx).children.clone();
    for child in children {
        if !visit_child_first(tree, child, visit) {
            return false;
        }
    }
    visit(tree, idx)
}

/// Parent-first traversal with enter/exit hooks. A false return from `enter`
/// prunes the descent into that subtree only; siblings still run.
pub fn visit_parent_first(
    tree: &mut BoxTree,
    idx: NodeIndex,
    enter: &mut dyn FnMut(&mut BoxTree, NodeIndex) -> bool,
    exit: &mut dyn FnMut(&mut BoxTree, NodeIndex),
) {
    if !enter(tree, idx) {
        exit(tree, idx);
        return;
    }
    if let Some(assistants_root) = tree.node(idx).assistants_root {
        visit_parent_first(tree, assistants_root, enter, exit);
    }
    let children = tree.node(idx).children.clone();
    for child in children {
        visit_parent_first(tree, child, enter, exit);
    }
    exit(tree, idx);
}
