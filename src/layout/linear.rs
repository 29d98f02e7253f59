use crate::error::Result;
use crate::geometry::{Dimensions, Edge, Point, Size};
use crate::layout::algorithm::{
    horizontal_layout, horizontal_layout_assistants, merge_branch_exterior, move_children_only,
    require_branch_level, vertical_layout, vertical_layout_assistants,
};
use crate::layout::state::LayoutState;
use crate::layout::strategy::{ParentAlignment, StrategyCore};
use crate::tree::{Connector, NodeIndex};

pub(super) fn pre_process(
    _core: &StrategyCore,
    state: &mut LayoutState,
    idx: NodeIndex,
) -> Result<()> {
    let tree = &mut state.visual_tree;
    let count = tree.node(idx).children.len();
    {
        let node = tree.node_mut(idx);
        node.state.number_of_siblings = count;
        node.state.number_of_sibling_rows = usize::from(count > 0);
        node.state.number_of_sibling_columns = count;
    }
    let node = tree.node(idx);
    if count > 0 && !node.element.is_collapsed && !node.element.is_special {
        // spacer shielding the vertical drop from the parent to the carrier
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
    let row_top = if special {
        node.state.top()
    } else {
        node.state.branch_exterior.bottom() + core.parent_child_spacing
    };
    let mut row_bottom = row_top;
    for &child in children.iter().take(count) {
        row_bottom = row_bottom.max(row_top + state.visual_tree.node(child).state.size.height);
    }
    let band = Dimensions::new(row_top, row_bottom);
    for &child in children.iter().take(count) {
        let child_node = state.visual_tree.node_mut(child);
        child_node.state.top_left.y = row_top;
        child_node.state.branch_exterior = child_node.state.rect();
        child_node.state.siblings_row_v = band;
    }
    for &child in children.iter().take(count) {
        vertical_layout(state, child)?;
        merge_branch_exterior(&mut state.visual_tree, idx, child);
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
    // popping each child frame packs it to the right of the previous branches
    for &child in children.iter().take(count) {
        horizontal_layout(state, child)?;
    }
    let mut span = Dimensions::min_max();
    for &child in children.iter().take(count) {
        let child_state = &state.visual_tree.node(child).state;
        span = span + Dimensions::new(child_state.left(), child_state.right());
    }

    let node = state.visual_tree.node(idx);
    let special = node.element.is_special;
    if !special {
        let dx = match core.parent_alignment {
            ParentAlignment::Left => node.state.left() - span.from,
            ParentAlignment::Center => node.state.center_h() - span.mid(),
            ParentAlignment::Right => node.state.right() - span.to,
        };
        move_children_only(state, level, dx);

        if let Some(&spacer) = state.visual_tree.node(idx).children.get(count) {
            let node_state = &state.visual_tree.node(idx).state;
            let left = node_state.center_h() - core.parent_connector_shield / 2.0;
            let top = node_state.bottom();
            let row_top = state.visual_tree.node(children[0]).state.top();
            {
                let spacer_node = state.visual_tree.node_mut(spacer);
                spacer_node.state.top_left = Point::new(left, top);
                spacer_node.state.size =
                    Size::new(core.parent_connector_shield, (row_top - top).max(0.0));
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
    let drop_x = node.state.center_h();
    let bottom = node.state.bottom();
    let children = node.children.clone();
    let row_top = state.visual_tree.node(children[0]).state.top();
    let carrier_y = row_top - core.child_connector_hook_length;

    let mut segments = Vec::with_capacity(count + 2);
    segments.push(Edge::new(
        Point::new(drop_x, bottom),
        Point::new(drop_x, carrier_y),
    ));
    if count > 1 {
        let first = state.visual_tree.node(children[0]).state.center_h();
        let last = state.visual_tree.node(children[count - 1]).state.center_h();
        segments.push(Edge::new(
            Point::new(first, carrier_y),
            Point::new(last, carrier_y),
        ));
    }
    for &child in children.iter().take(count) {
        let child_state = &state.visual_tree.node(child).state;
        let x = child_state.center_h();
        segments.push(Edge::new(
            Point::new(x, carrier_y),
            Point::new(x, child_state.top()),
        ));
    }
    state.visual_tree.node_mut(idx).state.connector = Some(Connector { segments });
    Ok(())
}
