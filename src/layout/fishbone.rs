use crate::error::{LayoutError, Result};
use crate::geometry::{Dimensions, Edge, Point, Size};
use crate::layout::algorithm::{
    align_horizontal_centers, horizontal_layout, horizontal_layout_assistants,
    merge_branch_exterior, move_children_only, require_branch_level, shift_children,
    vertical_layout, vertical_layout_assistants,
};
use crate::layout::state::LayoutState;
use crate::layout::strategy::{ParentAlignment, StrategyCore};
use crate::layout::linear;
use crate::tree::{Connector, NodeIndex};

/// Distributes `siblings` children row by row over `groups` fishbone groups.
///
/// Rows are `2 * groups` wide; inside a group the left slot comes before the
/// right one, so a group's members are found at `from_index`, stride
/// `2 * groups`, alternating left/right. A group receives two children per
/// full row plus one trailing child when a partial row ends exactly on its
/// left slot.
#[derive(Debug, Clone, Copy)]
pub(super) struct GroupIterator {
    siblings: usize,
    groups: usize,
}

#[derive(Debug, Clone, Copy)]
pub(super) struct Group {
    pub index: usize,
    pub from_index: usize,
    pub count: usize,
    /// The left pillar is filled first: `ceil(count / 2)`.
    pub max_on_left: usize,
    stride: usize,
}

impl GroupIterator {
    pub(super) fn new(siblings: usize, groups: usize) -> Self {
        Self { siblings, groups }
    }

    fn count_in_group(&self, group: usize) -> usize {
        let per_row = self.groups * 2;
        let up_to_this_group = group * 2 + 2;
        let mut count = 0;
        let mut first_in_row = 0;
        while first_in_row < self.siblings {
            let in_this_row = (self.siblings - first_in_row).min(per_row);
            if in_this_row >= up_to_this_group {
                count += 2;
            } else if in_this_row + 1 == up_to_this_group {
                count += 1;
            }
            first_in_row += per_row;
        }
        count
    }

    pub(super) fn groups(&self) -> Vec<Group> {
        let mut result = Vec::with_capacity(self.groups);
        for index in 0..self.groups {
            let count = self.count_in_group(index);
            if count == 0 {
                continue;
            }
            result.push(Group {
                index,
                from_index: index * 2,
                count,
                max_on_left: count.div_ceil(2),
                stride: self.groups * 2,
            });
        }
        result
    }
}

impl Group {
    /// Original child index for a view slot: slots below `max_on_left` walk
    /// the left pillar, the rest the right pillar.
    pub(super) fn child_at(&self, view: usize) -> usize {
        if view < self.max_on_left {
            self.from_index + view * self.stride
        } else {
            self.from_index + 1 + (view - self.max_on_left) * self.stride
        }
    }

    pub(super) fn is_left_slot(&self, view: usize) -> bool {
        view < self.max_on_left
    }

    /// A single two-pillar group over the first `count` children, as used by
    /// the assistants strategy.
    pub(super) fn single(count: usize) -> Self {
        Self {
            index: 0,
            from_index: 0,
            count,
            max_on_left: count.div_ceil(2),
            stride: 2,
        }
    }
}

pub(super) fn pre_process(
    core: &StrategyCore,
    max_groups: usize,
    state: &mut LayoutState,
    idx: NodeIndex,
) -> Result<()> {
    if max_groups == 0 {
        return Err(LayoutError::InvalidGroupCount);
    }
    if core.parent_alignment != ParentAlignment::Center {
        return Err(LayoutError::UnsupportedAlignment {
            strategy: "fishbone",
            alignment: core.parent_alignment,
        });
    }
    let count = state.visual_tree.node(idx).children.len();
    if count <= max_groups * 2 {
        return linear::pre_process(core, state, idx);
    }
    {
        let node = state.visual_tree.node_mut(idx);
        node.state.number_of_siblings = count;
        node.state.number_of_sibling_rows = count.div_ceil(max_groups * 2);
        node.state.number_of_sibling_columns = max_groups;
    }
    let node = state.visual_tree.node(idx);
    if !node.element.is_collapsed && !node.element.is_special {
        // in order: the parent drop, one vertical carrier per group, and the
        // horizontal carrier when there is more than one group
        state.visual_tree.append_special_child(idx);
        for _ in 0..max_groups {
            state.visual_tree.append_special_child(idx);
        }
        if max_groups >= 2 {
            state.visual_tree.append_special_child(idx);
        }
    }
    Ok(())
}

/// Places the rows of one group: view slot `i` pairs with `i + max_on_left`,
/// the shorter box of each pair centered against the taller one.
pub(super) fn place_group_rows(
    core: &StrategyCore,
    state: &mut LayoutState,
    parent: NodeIndex,
    group: &Group,
    first_top: f64,
) -> Result<()> {
    let children = state.visual_tree.node(parent).children.clone();
    let mut row_top = first_top;
    for i in 0..group.max_on_left {
        let left = children[group.child_at(i)];
        let right = (i + group.max_on_left < group.count)
            .then(|| children[group.child_at(i + group.max_on_left)]);
        let mut row_height = state.visual_tree.node(left).state.size.height;
        if let Some(right) = right {
            row_height = row_height.max(state.visual_tree.node(right).state.size.height);
        }
        let band = Dimensions::new(row_top, row_top + row_height);
        let mut next_top = band.to;
        for member in [Some(left), right].into_iter().flatten() {
            {
                let node = state.visual_tree.node_mut(member);
                let height = node.state.size.height;
                node.state.top_left.y = row_top + (row_height - height) / 2.0;
                node.state.branch_exterior = node.state.rect();
                node.state.siblings_row_v = band;
            }
            vertical_layout(state, member)?;
            let branch = merge_branch_exterior(&mut state.visual_tree, parent, member);
            next_top = next_top.max(branch.bottom());
        }
        row_top = next_top + core.parent_child_spacing;
    }
    Ok(())
}

/// Vertical band covered by the group's rows.
pub(super) fn group_band(state: &LayoutState, parent: NodeIndex, group: &Group) -> Dimensions {
    let node = state.visual_tree.node(parent);
    let mut band = Dimensions::min_max();
    for view in 0..group.count {
        let member = node.children[group.child_at(view)];
        band = band + state.visual_tree.node(member).state.siblings_row_v;
    }
    band
}

/// Horizontal pass over one group: aligns the left pillar, parks the carrier
/// spacer against its widest branch, then aligns the right pillar flush with
/// the carrier. Returns the carrier spacer's left X.
pub(super) fn place_group_horizontal(
    core: &StrategyCore,
    state: &mut LayoutState,
    level: usize,
    parent: NodeIndex,
    group: &Group,
    carrier_spacer: Option<NodeIndex>,
    spacer_span: Dimensions,
) -> Result<f64> {
    let children = state.visual_tree.node(parent).children.clone();
    let members: Vec<NodeIndex> = (0..group.count)
        .map(|view| children[group.child_at(view)])
        .collect();
    for &member in &members {
        horizontal_layout(state, member)?;
    }
    let lefts = &members[..group.max_on_left];
    let rights = &members[group.max_on_left..];

    align_horizontal_centers(state, level, lefts);
    let mut carrier_x = f64::NEG_INFINITY;
    for &left in lefts {
        carrier_x = carrier_x.max(state.visual_tree.node(left).state.branch_exterior.right());
    }

    if let Some(spacer) = carrier_spacer {
        {
            let node = state.visual_tree.node_mut(spacer);
            node.state.top_left = Point::new(carrier_x, spacer_span.from);
            node.state.size = Size::new(core.sibling_spacing, spacer_span.len().max(0.0));
            node.state.branch_exterior = node.state.rect();
        }
        state.merge_spacer(spacer);
    }

    if !rights.is_empty() {
        align_horizontal_centers(state, level, rights);
        let mut min_left = f64::INFINITY;
        for &right in rights {
            min_left = min_left.min(state.visual_tree.node(right).state.branch_exterior.left());
        }
        let dx = carrier_x + core.sibling_spacing - min_left;
        shift_children(state, level, rights, dx);
    }
    Ok(carrier_x)
}

pub(super) fn apply_vertical_layout(
    core: &StrategyCore,
    max_groups: usize,
    state: &mut LayoutState,
    level: usize,
) -> Result<()> {
    let idx = state.level_root(level);
    let count = state.visual_tree.node(idx).state.number_of_siblings;
    if count <= max_groups * 2 {
        return linear::apply_vertical_layout(core, state, level);
    }
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

    let node = state.visual_tree.node(idx);
    let first_top = if node.element.is_special {
        node.state.top()
    } else {
        // one spacing for the parent drop, one between carrier and first row
        node.state.branch_exterior.bottom() + 2.0 * core.parent_child_spacing
    };
    for group in GroupIterator::new(count, max_groups).groups() {
        place_group_rows(core, state, idx, &group, first_top)?;
    }
    Ok(())
}

pub(super) fn apply_horizontal_layout(
    core: &StrategyCore,
    max_groups: usize,
    state: &mut LayoutState,
    level: usize,
) -> Result<()> {
    let idx = state.level_root(level);
    let count = state.visual_tree.node(idx).state.number_of_siblings;
    if count <= max_groups * 2 {
        return linear::apply_horizontal_layout(core, state, level);
    }
    require_branch_level(&state.visual_tree, idx)?;
    {
        let node = state.visual_tree.node_mut(idx);
        node.state.branch_exterior = node.state.rect();
    }
    if state.visual_tree.node(idx).element.is_collapsed {
        return Ok(());
    }
    horizontal_layout_assistants(state, idx)?;

    let groups = GroupIterator::new(count, max_groups).groups();
    let children = state.visual_tree.node(idx).children.clone();
    let mut carrier_centers = Vec::with_capacity(groups.len());
    for group in &groups {
        let band = group_band(state, idx, group);
        let spacer = children.get(count + 1 + group.index).copied();
        let spacer_span = Dimensions::new(band.from - core.parent_child_spacing, band.to);
        let carrier_x =
            place_group_horizontal(core, state, level, idx, group, spacer, spacer_span)?;
        carrier_centers.push(carrier_x + core.sibling_spacing / 2.0);
    }

    let node = state.visual_tree.node(idx);
    if !node.element.is_special && !carrier_centers.is_empty() {
        let mid = (carrier_centers[0] + carrier_centers[carrier_centers.len() - 1]) / 2.0;
        let dx = node.state.center_h() - mid;
        move_children_only(state, level, dx);
        for center in &mut carrier_centers {
            *center += dx;
        }

        let carrier_level = carrier_level_of(state, idx, count, core);
        if let Some(&drop) = children.get(count) {
            let node_state = &state.visual_tree.node(idx).state;
            let left = node_state.center_h() - core.parent_connector_shield / 2.0;
            let top = node_state.bottom();
            {
                let spacer_node = state.visual_tree.node_mut(drop);
                spacer_node.state.top_left = Point::new(left, top);
                spacer_node.state.size = Size::new(
                    core.parent_connector_shield,
                    (carrier_level - top).max(0.0),
                );
                spacer_node.state.branch_exterior = spacer_node.state.rect();
            }
            state.merge_spacer(drop);
        }
        if groups.len() > 1
            && let Some(&horizontal_carrier) = children.get(count + 1 + max_groups)
        {
            let left = carrier_centers[0];
            let width = carrier_centers[carrier_centers.len() - 1] - left;
            {
                let spacer_node = state.visual_tree.node_mut(horizontal_carrier);
                spacer_node.state.top_left = Point::new(left, carrier_level);
                spacer_node.state.size = Size::new(width, core.parent_child_spacing);
                spacer_node.state.branch_exterior = spacer_node.state.rect();
            }
            state.merge_spacer(horizontal_carrier);
        }
        // the centering shift reloaded the boundary, dropping the carriers
        for group in &groups {
            if let Some(&spacer) = children.get(count + 1 + group.index) {
                state.merge_spacer(spacer);
            }
        }
    }

    let all = state.visual_tree.node(idx).children.clone();
    for child in all {
        merge_branch_exterior(&mut state.visual_tree, idx, child);
    }
    Ok(())
}

/// Y of the horizontal carrier: one parent-child spacing above the first row.
fn carrier_level_of(
    state: &LayoutState,
    idx: NodeIndex,
    count: usize,
    core: &StrategyCore,
) -> f64 {
    let node = state.visual_tree.node(idx);
    let mut first_top = f64::INFINITY;
    for &child in node.children.iter().take(count) {
        first_top = first_top.min(state.visual_tree.node(child).state.siblings_row_v.from);
    }
    first_top - core.parent_child_spacing
}

pub(super) fn route_connectors(
    core: &StrategyCore,
    max_groups: usize,
    state: &mut LayoutState,
    idx: NodeIndex,
) -> Result<()> {
    let node = state.visual_tree.node(idx);
    let count = node.state.number_of_siblings;
    if count == 0 || node.element.is_collapsed {
        return Ok(());
    }
    if count <= max_groups * 2 {
        return linear::route_connectors(core, state, idx);
    }
    let children = node.children.clone();
    let drop_x = node.state.center_h();
    let bottom = node.state.bottom();
    let carrier_level = carrier_level_of(state, idx, count, core);
    let groups = GroupIterator::new(count, max_groups).groups();

    let carrier_x = |state: &LayoutState, group: &Group| -> Option<f64> {
        children
            .get(count + 1 + group.index)
            .map(|&spacer| state.visual_tree.node(spacer).state.center_h())
    };

    let mut segments = Vec::with_capacity(count + groups.len() + 2);
    segments.push(Edge::new(
        Point::new(drop_x, bottom),
        Point::new(drop_x, carrier_level),
    ));
    if groups.len() > 1
        && let (Some(first), Some(last)) = (
            carrier_x(state, &groups[0]),
            carrier_x(state, &groups[groups.len() - 1]),
        )
    {
        segments.push(Edge::new(
            Point::new(first, carrier_level),
            Point::new(last, carrier_level),
        ));
    }
    for group in &groups {
        let Some(carrier) = carrier_x(state, group) else {
            continue;
        };
        let lowest_left = children[group.child_at(group.max_on_left - 1)];
        let lowest_y = state.visual_tree.node(lowest_left).state.center_v();
        segments.push(Edge::new(
            Point::new(carrier, carrier_level),
            Point::new(carrier, lowest_y),
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
                Point::new(carrier, hook_y),
                Point::new(inner_x, hook_y),
            ));
        }
    }
    state.visual_tree.node_mut(idx).state.connector = Some(Connector { segments });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counts(siblings: usize, groups: usize) -> Vec<usize> {
        GroupIterator::new(siblings, groups)
            .groups()
            .iter()
            .map(|g| g.count)
            .collect()
    }

    #[test]
    fn four_children_one_group_alternate_pillars() {
        let groups = GroupIterator::new(4, 1).groups();
        assert_eq!(groups.len(), 1);
        let group = groups[0];
        assert_eq!(group.count, 4);
        assert_eq!(group.max_on_left, 2);
        // left pillar: children 0 and 2; right pillar: children 1 and 3
        assert_eq!(group.child_at(0), 0);
        assert_eq!(group.child_at(1), 2);
        assert_eq!(group.child_at(2), 1);
        assert_eq!(group.child_at(3), 3);
        assert!(group.is_left_slot(1));
        assert!(!group.is_left_slot(2));
    }

    #[test]
    fn full_rows_give_two_per_group() {
        assert_eq!(counts(10, 3), vec![4, 4, 2]);
        assert_eq!(counts(12, 3), vec![4, 4, 4]);
    }

    #[test]
    fn partial_row_trailing_child_lands_on_a_left_slot() {
        // rows of four: [0,1,2,3], [4,5,6] - group 1 gets the lone 6 on its left
        assert_eq!(counts(7, 2), vec![4, 3]);
        let groups = GroupIterator::new(7, 2).groups();
        let second = groups[1];
        assert_eq!(second.from_index, 2);
        assert_eq!(second.max_on_left, 2);
        assert_eq!(second.child_at(0), 2);
        assert_eq!(second.child_at(1), 6);
        assert_eq!(second.child_at(2), 3);
    }

    #[test]
    fn empty_groups_are_dropped() {
        // a single partial row: the trailing fifth child sits on group 2's left slot
        assert_eq!(counts(5, 3), vec![2, 2, 1]);

        // two children only reach group 0; the other groups vanish
        let groups = GroupIterator::new(2, 3).groups();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].count, 2);
    }

    #[test]
    fn odd_group_fills_left_first() {
        let group = Group::single(5);
        assert_eq!(group.max_on_left, 3);
        assert_eq!(group.child_at(0), 0);
        assert_eq!(group.child_at(1), 2);
        assert_eq!(group.child_at(2), 4);
        assert_eq!(group.child_at(3), 1);
        assert_eq!(group.child_at(4), 3);
    }
}
