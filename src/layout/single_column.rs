use crate::error::{LayoutError, Result};
use crate::geometry::{Dimensions, Edge, Point, Size};
use crate::layout::algorithm::{
    align_horizontal_centers, horizontal_layout, horizontal_layout_assistants,
    merge_branch_exterior, move_children_only, require_branch_level, vertical_layout,
    vertical_layout_assistants,
};
use crate::layout::state::LayoutState;
use crate::layout::strategy::{ParentAlignment, StrategyCore};
use crate::tree::{Connector, NodeIndex};

pub(super) fn pre_process(
    core: &StrategyCore,
    state: &mut LayoutState,
    idx: NodeIndex,
) -> Result<()> {
    if core.parent_alignment == ParentAlignment::Center {
        return Err(LayoutError::UnsupportedAlignment {
            strategy: "single-column",
            alignment: core.parent_alignment,
        });
    }
    let tree = &mut state.visual_tree;
    let count = tree.node(idx).children.len();
    {
        let node = tree.node_mut(idx);
        node.state.number_of_siblings = count;
        node.state.number_of_sibling_rows = count;
        node.state.number_of_sibling_columns = usize::from(count > 0);
    }
    let node = tree.node(idx);
    if count > 0 && !node.element.is_collapsed && !node.element.is_special {
        // one vertical carrier spacer appended after the regular children
        tree.append_special_child(idx);
    }
    Ok(())
}

pub(super) fn apply_vertical_layout(
    core: &StrategyCore,
    state: &mut LayoutState,
    level: usize,
) -> Result<()> {
    let idx = state.level_root(level);
    require_branch_level(&state.visual_tree, idx)?;
    {
        let node = state.visual_tree.node_mut(idx);
        node.state.branch_exterior = node.state.rect();
        if node.level == 0 {
            node.state.siblings_row_v = node.state.rect().vertical_span();
        }
    }
    if state.visual_tree.node(idx).element.is_collapsed {
        return Ok(());
    }
    vertical_layout_assistants(state, idx)?;

    let count = state.visual_tree.node(idx).state.number_of_siblings;
    if count == 0 {
        return Ok(());
    }
    let node = state.visual_tree.node(idx);
    let special = node.element.is_special;
    let children = node.children.clone();
    let mut next_top = if special {
        node.state.top()
    } else {
        node.state.branch_exterior.bottom() + core.parent_child_spacing
    };
    for &child in children.iter().take(count) {
        {
            let child_node = state.visual_tree.node_mut(child);
            child_node.state.top_left.y = next_top;
            child_node.state.branch_exterior = child_node.state.rect();
            child_node.state.siblings_row_v =
                Dimensions::new(next_top, next_top + child_node.state.size.height);
        }
        vertical_layout(state, child)?;
        let branch = merge_branch_exterior(&mut state.visual_tree, idx, child);
        next_top = branch.bottom() + core.parent_child_spacing;
    }
    Ok(())
}

pub(super) fn apply_horizontal_layout(
    core: &StrategyCore,
    state: &mut LayoutState,
    level: usize,
) -> Result<()> {
    let idx = state.level_root(level);
    require_branch_level(&state.visual_tree, idx)?;
    {
        let node = state.visual_tree.node_mut(idx);
        node.state.branch_exterior = node.state.rect();
    }
    if state.visual_tree.node(idx).element.is_collapsed {
        return Ok(());
    }
    horizontal_layout_assistants(state, idx)?;

    let count = state.visual_tree.node(idx).state.number_of_siblings;
    if count == 0 {
        return Ok(());
    }
    let children = state.visual_tree.node(idx).children.clone();
    for &child in children.iter().take(count) {
        horizontal_layout(state, child)?;
    }
    let span = align_horizontal_centers(state, level, &children[..count]);

    let node = state.visual_tree.node(idx);
    let special = node.element.is_special;
    if !special {
        let center = node.state.center_h();
        let dx = match core.parent_alignment {
            ParentAlignment::Left => center + core.parent_connector_shield / 2.0 - span.from,
            ParentAlignment::Right => center - core.parent_connector_shield / 2.0 - span.to,
            ParentAlignment::Center => {
                return Err(LayoutError::UnsupportedAlignment {
                    strategy: "single-column",
                    alignment: core.parent_alignment,
                });
            }
        };
        move_children_only(state, level, dx);

        // thin carrier from the parent's bottom edge to the last child's
        if let Some(&spacer) = state.visual_tree.node(idx).children.get(count) {
            let node_state = &state.visual_tree.node(idx).state;
            let top = node_state.bottom();
            let left = node_state.center_h() - core.parent_connector_shield / 2.0;
            let last = children[count - 1];
            let bottom = state.visual_tree.node(last).state.bottom();
            {
                let spacer_node = state.visual_tree.node_mut(spacer);
                spacer_node.state.top_left = Point::new(left, top);
                spacer_node.state.size =
                    Size::new(core.parent_connector_shield, (bottom - top).max(0.0));
                spacer_node.state.branch_exterior = spacer_node.state.rect();
            }
            state.merge_spacer(spacer);
        }
    }

    let all = state.visual_tree.node(idx).children.clone();
    for child in all {
        merge_branch_exterior(&mut state.visual_tree, idx, child);
    }
    Ok(())
}

pub(super) fn route_connectors(
    core: &StrategyCore,
    state: &mut LayoutState,
    idx: NodeIndex,
) -> Result<()> {
    let node = state.visual_tree.node(idx);
    let count = node.state.number_of_siblings;
    if count == 0 || node.element.is_collapsed {
        return Ok(());
    }
    let carrier_x = node.state.center_h();
    let bottom = node.state.bottom();
    let children = node.children.clone();
    let last_center = state.visual_tree.node(children[count - 1]).state.center_v();

    let mut segments = Vec::with_capacity(count + 1);
    segments.push(Edge::new(
        Point::new(carrier_x, bottom),
        Point::new(carrier_x, last_center),
    ));
    for &child in children.iter().take(count) {
        let child_state = &state.visual_tree.node(child).state;
        let hook_y = child_state.center_v();
        let inner_x = match core.parent_alignment {
            ParentAlignment::Left => child_state.left(),
            ParentAlignment::Right => child_state.right(),
            ParentAlignment::Center => child_state.left(),
        };
        segments.push(Edge::new(
            Point::new(carrier_x, hook_y),
            Point::new(inner_x, hook_y),
        ));
    }
    state.visual_tree.node_mut(idx).state.connector = Some(Connector { segments });
    Ok(())
}

