mod algorithm;
mod assistants;
mod boundary;
mod fishbone;
mod linear;
mod single_column;
mod state;
mod strategy;

pub use algorithm::{
    align_horizontal_centers, apply, compute_branch_visual_bounding_rect, move_branch,
    move_children_only, move_one_child,
};
pub use boundary::Boundary;
pub use state::{Diagram, LayoutLevel, LayoutState, Operation};
pub use strategy::{LayoutStrategy, ParentAlignment, StrategyCore};
