use crate::error::{LayoutError, Result};
use crate::geometry::{Edge, Point, Size};
use crate::layout::algorithm::{merge_branch_exterior, move_children_only, require_branch_level};
use crate::layout::fishbone::{Group, group_band, place_group_horizontal, place_group_rows};
use crate::layout::state::LayoutState;
use crate::layout::strategy::{ParentAlignment, StrategyCore};
use crate::tree::{Connector, NodeIndex};

pub(super) fn pre_process(
    core: &StrategyCore,
    state: &mut LayoutState,
    idx: NodeIndex,
) -> Result<()> {
    if core.parent_alignment != ParentAlignment::Center {
        return Err(LayoutError::UnsupportedAlignment {
            strategy: "fishbone-assistants",
            alignment: core.parent_alignment,
        });
    }
    let count = state.visual_tree.node(idx).children.len();
    {
        let node = state.visual_tree.node_mut(idx);
        node.state.number_of_siblings = count;
        node.state.number_of_sibling_rows = count.div_ceil(2);
        node.state.number_of_sibling_columns = 2.min(count);
    }
    if count == 0 || state.visual_tree.node(idx).element.is_collapsed {
        return Ok(());
    }
    // the carrier the assistants hang upon
    state.visual_tree.append_special_child(idx);
    // when the owner has no regular children its own carrier never exists,
    // so the drop lane below the assistants needs a protector of its own
    let owner_has_children = state
        .visual_tree
        .node(idx)
        .parent
        .is_some_and(|owner| !state.visual_tree.node(owner).children.is_empty());
    if !owner_has_children {
        state.visual_tree.append_special_child(idx);
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
        // the exterior was seeded from the owner before this pass
        let node = state.visual_tree.node_mut(idx);
        node.state.branch_exterior = node.state.rect();
    }
    let count = state.visual_tree.node(idx).state.number_of_siblings;
    if count == 0 {
        return Ok(());
    }
    let group = Group::single(count);
    let first_top = state.visual_tree.node(idx).state.bottom() + core.parent_child_spacing;
    place_group_rows(core, state, idx, &group, first_top)
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
    let count = state.visual_tree.node(idx).state.number_of_siblings;
    if count == 0 {
        return Ok(());
    }
    let group = Group::single(count);
    let band = group_band(state, idx, &group);
    let children = state.visual_tree.node(idx).children.clone();
    let carrier_spacer = children.get(count).copied();
    let carrier_x =
        place_group_horizontal(core, state, level, idx, &group, carrier_spacer, band)?;

    // center the carrier on the owner
    let dx = state.visual_tree.node(idx).state.center_h()
        - (carrier_x + core.sibling_spacing / 2.0);
    move_children_only(state, level, dx);
    if let Some(spacer) = carrier_spacer {
        state.merge_spacer(spacer);
    }

    if let Some(&protector) = children.get(count + 1) {
        let node_state = &state.visual_tree.node(idx).state;
        let left = node_state.center_h() - core.parent_connector_shield / 2.0;
        let top = node_state.bottom();
        {
            let spacer_node = state.visual_tree.node_mut(protector);
            spacer_node.state.top_left = Point::new(left, top);
            spacer_node.state.size =
                Size::new(core.parent_connector_shield, (band.to - top).max(0.0));
            spacer_node.state.branch_exterior = spacer_node.state.rect();
        }
        state.merge_spacer(protector);
    }

    let all = state.visual_tree.node(idx).children.clone();
    for child in all {
        merge_branch_exterior(&mut state.visual_tree, idx, child);
    }
    Ok(())
}

pub(super) fn route_connectors(
    _core: &StrategyCore,
    state: &mut LayoutState,
    idx: NodeIndex,
) -> Result<()> {
    let node = state.visual_tree.node(idx);
    let count = node.state.number_of_siblings;
    if count == 0 {
        return Ok(());
    }
    let children = node.children.clone();
    let carrier_x = node.state.center_h();
    let bottom = node.state.bottom();
    let group = Group::single(count);
    let lowest_left = children[group.child_at(group.max_on_left - 1)];
    let lowest_y = state.visual_tree.node(lowest_left).state.center_v();

    // hooks are emitted for the real assistants only, never the spacers
    let mut segments = Vec::with_capacity(count + 1);
    segments.push(Edge::new(
        Point::new(carrier_x, bottom),
        Point::new(carrier_x, lowest_y),
    ));
    for view in 0..group.count {
        let member = children[group.child_at(view)];
        let member_state = &state.visual_tree.node(member).state;
        let hook_y = member_state.center_v();
        let inner_x = if group.is_left_slot(view) {
            member_state.right()
        } else {
            member_state.left()
        };
        segments.push(Edge::new(
            Point::new(carrier_x, hook_y),
            Point::new(inner_x, hook_y),
        ));
    }
    state.visual_tree.node_mut(idx).state.connector = Some(Connector { segments });
    Ok(())
}
