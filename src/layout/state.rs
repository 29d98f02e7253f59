use crate::config::DiagramLayoutSettings;
use crate::error::{LayoutError, Result};
use crate::geometry::Size;
use crate::ir::{BoxContainer, BoxId};
use crate::layout::algorithm;
use crate::layout::boundary::Boundary;
use crate::tree::{BoxTree, NodeIndex};

/// Pure configuration for one layout run.
#[derive(Debug, Clone)]
pub struct Diagram {
    pub boxes: BoxContainer,
    pub layout_settings: DiagramLayoutSettings,
}

/// Phase of the current layout operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Preparing,
    PreprocessVisualTree,
    VerticalLayout,
    HorizontalLayout,
    ConnectorsLayout,
    Completed,
}

/// One in-progress subtree frame on the layout stack.
#[derive(Debug)]
pub struct LayoutLevel {
    pub branch_root: NodeIndex,
    pub boundary: Boundary,
}

pub type SizeLookup = Box<dyn Fn(&str) -> Size>;
pub type OperationChanged = Box<dyn Fn(Operation)>;
pub type BoundaryChanged = Box<dyn Fn(&Boundary, BoxId)>;

/// The only mutable carrier of a layout run: the visual tree, the stack of
/// subtree frames, and the pooled boundaries (one per tree depth slot).
pub struct LayoutState {
    pub diagram: Diagram,
    pub visual_tree: BoxTree,
    stack: Vec<LayoutLevel>,
    pool: Vec<Boundary>,
    operation: Operation,
    /// Optional `data_id -> Size` callback applied once per data-bound box.
    pub size_lookup: Option<SizeLookup>,
    /// Fire-and-forget observers; must not mutate layout state.
    pub operation_changed: Option<OperationChanged>,
    pub boundary_changed: Option<BoundaryChanged>,
}

impl LayoutState {
    pub fn new(diagram: Diagram) -> Self {
        Self {
            diagram,
            visual_tree: BoxTree::default(),
            stack: Vec::new(),
            pool: Vec::new(),
            operation: Operation::Preparing,
            size_lookup: None,
            operation_changed: None,
            boundary_changed: None,
        }
    }

    pub fn operation(&self) -> Operation {
        self.operation
    }

    pub(crate) fn set_operation(&mut self, operation: Operation) {
        self.operation = operation;
        tracing::debug!(?operation, "layout operation changed");
        if let Some(hook) = &self.operation_changed {
            hook(operation);
        }
    }

    /// Re-creates the boundary pool, one boundary per tree depth slot.
    pub(crate) fn attach_boundary_pool(&mut self, depth: usize, margin: f64) {
        self.stack.clear();
        self.pool = (0..depth.max(1)).map(|_| Boundary::new(margin)).collect();
    }

    pub fn level_root(&self, level: usize) -> NodeIndex {
        self.stack[level].branch_root
    }

    pub fn current_level(&self) -> Option<&LayoutLevel> {
        self.stack.last()
    }

    /// Opens a new subtree frame. During the horizontal phase the branch
    /// root's own rect seeds the fresh boundary.
    pub(crate) fn push_layout_level(&mut self, node: NodeIndex) -> Result<usize> {
        let mut boundary = self.pool.pop().ok_or(LayoutError::LevelStackOverflow)?;
        boundary.clear();
        if self.operation == Operation::HorizontalLayout {
            boundary.merge(self.visual_tree.node(node).state.rect());
        }
        self.stack.push(LayoutLevel {
            branch_root: node,
            boundary,
        });
        Ok(self.stack.len() - 1)
    }

    /// Closes the top frame. During the horizontal phase the popped branch is
    /// shifted right until it clears everything already merged into the
    /// enclosing frame, then its boundary is merged there. The boundary goes
    /// back to the pool either way.
    pub(crate) fn pop_layout_level(&mut self) {
        let Some(mut level) = self.stack.pop() else {
            return;
        };
        if self.operation == Operation::HorizontalLayout
            && let Some(parent) = self.stack.last_mut()
        {
            let spacing = self.diagram.layout_settings.branch_spacing;
            let offset = parent.boundary.compute_overlap(&level.boundary, spacing);
            if offset > f64::EPSILON {
                algorithm::move_one_child(&mut self.visual_tree, level.branch_root, offset);
                level.boundary.translate_h(offset);
            }
            parent.boundary.merge_from(&level.boundary);
            if let Some(hook) = &self.boundary_changed {
                let box_id = self.visual_tree.node(level.branch_root).element.id;
                hook(&parent.boundary, box_id);
            }
        }
        self.pool.push(level.boundary);
    }

    /// Merges a placed spacer's rect into the top frame's boundary.
    pub(crate) fn merge_spacer(&mut self, spacer: NodeIndex) {
        let rect = self.visual_tree.node(spacer).state.rect();
        if let Some(level) = self.stack.last_mut() {
            level.boundary.merge(rect);
            if let Some(hook) = &self.boundary_changed {
                let box_id = self.visual_tree.node(spacer).element.id;
                hook(&level.boundary, box_id);
            }
        }
    }

    /// Rebuilds the boundary of the given frame from its branch. Needed after
    /// children have been moved, which invalidates previously merged spans.
    pub(crate) fn reload_boundary(&mut self, level: usize) {
        let root = self.stack[level].branch_root;
        self.stack[level]
            .boundary
            .reload_from_branch(&self.visual_tree, root);
    }

    /// Clears every node's placement so `apply` can be re-run from scratch.
    pub fn reset_box_positions(&mut self) {
        for idx in 0..self.visual_tree.len() {
            let node = self.visual_tree.node_mut(idx);
            let size = node.element.size;
            node.state.reset(size);
        }
    }
}
