pub mod cli;
pub mod config;
pub mod error;
pub mod geometry;
pub mod ir;
pub mod layout;
pub mod layout_dump;
pub mod tree;

pub use cli::run;
pub use config::{DiagramLayoutSettings, load_settings};
pub use error::{LayoutError, Result};
pub use geometry::{Dimensions, Edge, Point, Rect, Size, is_equal};
pub use ir::{BoxContainer, BoxId, ChartBox, ChartSource, NONE};
pub use layout::{
    Diagram, LayoutState, LayoutStrategy, Operation, ParentAlignment, StrategyCore, apply,
    compute_branch_visual_bounding_rect,
};
pub use layout_dump::{LayoutDump, write_layout_dump};
pub use tree::{
    BoxTree, Connector, NodeIndex, NodeLayoutInfo, TreeNode, visit_child_first, visit_parent_first,
};
