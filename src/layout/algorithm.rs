use crate::error::{LayoutError, Result};
use crate::geometry::{Dimensions, Rect};
use crate::layout::state::{LayoutState, Operation};
use crate::layout::strategy::LayoutStrategy;
use crate::tree::{BoxTree, NodeIndex, visit_parent_first};

/// Runs the full layout: build the visual tree, propagate visibility,
/// resolve strategies, run the vertical and horizontal passes, and route
/// connectors. Any fault aborts the whole run.
pub fn apply(state: &mut LayoutState) -> Result<()> {
    state.set_operation(Operation::Preparing);

    let system_root_id = state
        .diagram
        .boxes
        .system_root_id()
        .ok_or(LayoutError::SystemRootMissing)?;
    let settings = &state.diagram.layout_settings;
    for id in [
        &settings.default_layout_strategy_id,
        &settings.default_assistant_layout_strategy_id,
    ] {
        if !settings.layout_strategies.contains_key(id) {
            return Err(LayoutError::StrategyNotFound(id.clone()));
        }
    }
    let margin = settings.box_vertical_margin;

    state.visual_tree = BoxTree::build(&state.diagram.boxes);
    if state.visual_tree.roots.len() != 1 {
        return Err(LayoutError::MultipleRoots(state.visual_tree.roots.len()));
    }
    let root = state.visual_tree.roots[0];
    if state.visual_tree.node(root).element.id != system_root_id {
        return Err(LayoutError::RootMismatch);
    }

    state.visual_tree.update_hierarchy_stats();
    state.attach_boundary_pool(state.visual_tree.depth, margin);
    apply_size_lookup(state);
    propagate_affects_layout(&mut state.visual_tree, root);
    tracing::debug!(
        nodes = state.visual_tree.len(),
        depth = state.visual_tree.depth,
        "visual tree prepared"
    );

    state.set_operation(Operation::PreprocessVisualTree);
    preprocess(state, root)?;

    state.set_operation(Operation::VerticalLayout);
    vertical_layout(state, root)?;

    state.set_operation(Operation::HorizontalLayout);
    horizontal_layout(state, root)?;

    state.set_operation(Operation::ConnectorsLayout);
    route_connectors_pass(state, root)?;

    state.set_operation(Operation::Completed);
    Ok(())
}

fn apply_size_lookup(state: &mut LayoutState) {
    let Some(lookup) = state.size_lookup.take() else {
        return;
    };
    for idx in 0..state.visual_tree.len() {
        let node = state.visual_tree.node_mut(idx);
        if let Some(data_id) = node.element.data_id.clone() {
            node.element.size = lookup(&data_id);
        }
    }
    state.size_lookup = Some(lookup);
}

/// A node affects layout iff it has no parent, or its parent affects layout
/// and is not collapsed. Propagated top-down once per run.
fn propagate_affects_layout(tree: &mut BoxTree, root: NodeIndex) {
    visit_parent_first(
        tree,
        root,
        &mut |tree, idx| {
            let affects = match tree.node(idx).parent {
                Some(parent) => {
                    let parent = tree.node(parent);
                    parent.element.affects_layout && !parent.element.is_collapsed
                }
                None => true,
            };
            tree.node_mut(idx).element.affects_layout = affects;
            true
        },
        &mut |_, _| {},
    );
}

/// Parent-first pass assigning each node its effective strategy, resetting
/// its layout state and letting the strategy inject spacers. Descends only
/// into non-collapsed nodes that have anything below them.
fn preprocess(state: &mut LayoutState, idx: NodeIndex) -> Result<()> {
    let strategy = resolve_strategy(state, idx)?;
    {
        let node = state.visual_tree.node_mut(idx);
        let size = node.element.size;
        node.state.reset(size);
        node.state.effective_strategy = Some(strategy.clone());
    }
    strategy.pre_process(state, idx)?;

    let node = state.visual_tree.node(idx);
    let descend = !node.element.is_collapsed
        && (!node.children.is_empty() || node.assistants_root.is_some());
    if descend {
        let assistants_root = node.assistants_root;
        let children = node.children.clone();
        if let Some(assistants_root) = assistants_root {
            preprocess(state, assistants_root)?;
        }
        for child in children {
            preprocess(state, child)?;
        }
    }
    Ok(())
}

/// Walks up from the node looking for a strategy override, falling back to
/// the configured default. Assistants roots consult the assistant override
/// chain and the assistant default instead.
fn resolve_strategy(state: &LayoutState, idx: NodeIndex) -> Result<LayoutStrategy> {
    let tree = &state.visual_tree;
    let settings = &state.diagram.layout_settings;
    let for_assistants = tree.node(idx).is_assistants_root;
    let mut cursor = Some(idx);
    let mut found: Option<&str> = None;
    while let Some(current) = cursor {
        let element = &tree.node(current).element;
        let candidate = if for_assistants {
            element.assistant_layout_strategy_id.as_deref()
        } else {
            element.layout_strategy_id.as_deref()
        };
        if let Some(id) = candidate {
            found = Some(id);
            break;
        }
        cursor = tree.node(current).parent;
    }
    let id = found.unwrap_or(if for_assistants {
        &settings.default_assistant_layout_strategy_id
    } else {
        &settings.default_layout_strategy_id
    });
    settings
        .layout_strategies
        .get(id)
        .cloned()
        .ok_or_else(|| LayoutError::StrategyNotFound(id.to_string()))
}

/// Re-entrant vertical recursion: pushes a frame, runs the branch root's
/// strategy (which calls back in here for each child), pops.
pub(super) fn vertical_layout(state: &mut LayoutState, idx: NodeIndex) -> Result<()> {
    run_branch(state, idx, |strategy, state, level| {
        strategy.apply_vertical_layout(state, level)
    })
}

/// Re-entrant horizontal recursion; popping the frame packs the branch
/// against its already-placed siblings.
pub(super) fn horizontal_layout(state: &mut LayoutState, idx: NodeIndex) -> Result<()> {
    run_branch(state, idx, |strategy, state, level| {
        strategy.apply_horizontal_layout(state, level)
    })
}

fn run_branch(
    state: &mut LayoutState,
    idx: NodeIndex,
    pass: impl Fn(&LayoutStrategy, &mut LayoutState, usize) -> Result<()>,
) -> Result<()> {
    if !state.visual_tree.node(idx).element.affects_layout {
        return Err(LayoutError::HiddenBranch);
    }
    let strategy = state
        .visual_tree
        .node(idx)
        .state
        .effective_strategy
        .clone()
        .ok_or(LayoutError::StrategyUnresolved)?;
    let level = state.push_layout_level(idx)?;
    let result = pass(&strategy, state, level);
    state.pop_layout_level();
    result
}

/// Seeds the assistants root's exterior from its owner, lays the assistants
/// subtree out vertically and folds its exterior back into the owner's.
pub(super) fn vertical_layout_assistants(state: &mut LayoutState, owner: NodeIndex) -> Result<()> {
    let Some(assistants_root) = state.visual_tree.node(owner).assistants_root else {
        return Ok(());
    };
    let rect = state.visual_tree.node(owner).state.rect();
    {
        let node = state.visual_tree.node_mut(assistants_root);
        node.state.top_left = rect.top_left;
        node.state.size = rect.size;
        node.state.branch_exterior = rect;
    }
    vertical_layout(state, assistants_root)?;
    merge_branch_exterior(&mut state.visual_tree, owner, assistants_root);
    Ok(())
}

pub(super) fn horizontal_layout_assistants(
    state: &mut LayoutState,
    owner: NodeIndex,
) -> Result<()> {
    let Some(assistants_root) = state.visual_tree.node(owner).assistants_root else {
        return Ok(());
    };
    horizontal_layout(state, assistants_root)?;
    merge_branch_exterior(&mut state.visual_tree, owner, assistants_root);
    Ok(())
}

/// Folds `source`'s branch exterior into `target`'s; returns the merged-in
/// exterior.
pub(super) fn merge_branch_exterior(
    tree: &mut BoxTree,
    target: NodeIndex,
    source: NodeIndex,
) -> Rect {
    let branch = tree.node(source).state.branch_exterior;
    let node = tree.node_mut(target);
    node.state.branch_exterior = node.state.branch_exterior + branch;
    branch
}

/// Strategies at level zero only make sense on the synthetic system root.
pub(super) fn require_branch_level(tree: &BoxTree, idx: NodeIndex) -> Result<()> {
    let node = tree.node(idx);
    if node.level == 0 && !node.element.is_special {
        return Err(LayoutError::StrategyOnRoot);
    }
    Ok(())
}

/// Parent-first connector pass. Collapsed subtrees are skipped entirely;
/// special nodes route nothing unless they are assistants roots.
fn route_connectors_pass(state: &mut LayoutState, idx: NodeIndex) -> Result<()> {
    let node = state.visual_tree.node(idx);
    if !node.element.affects_layout || node.element.is_collapsed {
        return Ok(());
    }
    let skip = node.element.is_special && !node.is_assistants_root;
    if !skip {
        let strategy = node
            .state
            .effective_strategy
            .clone()
            .ok_or(LayoutError::StrategyUnresolved)?;
        strategy.route_connectors(state, idx)?;
    }
    let node = state.visual_tree.node(idx);
    let assistants_root = node.assistants_root;
    let children = node.children.clone();
    if let Some(assistants_root) = assistants_root {
        route_connectors_pass(state, assistants_root)?;
    }
    for child in children {
        route_connectors_pass(state, child)?;
    }
    Ok(())
}

/// Shifts a whole subtree (rects and branch exteriors) by `dx` without
/// touching any boundary.
pub fn move_one_child(tree: &mut BoxTree, root: NodeIndex, dx: f64) {
    if dx.abs() <= f64::EPSILON {
        return;
    }
    let mut stack = vec![root];
    while let Some(idx) = stack.pop() {
        let node = tree.node_mut(idx);
        node.state.top_left.x += dx;
        node.state.branch_exterior = node.state.branch_exterior.offset_h(dx);
        if let Some(assistants_root) = node.assistants_root {
            stack.push(assistants_root);
        }
        stack.extend(node.children.iter().copied());
    }
}

/// Shifts every child branch of the level's root, then rebuilds the level
/// boundary.
pub fn move_children_only(state: &mut LayoutState, level: usize, dx: f64) {
    if dx.abs() <= f64::EPSILON {
        return;
    }
    let root = state.level_root(level);
    let children = state.visual_tree.node(root).children.clone();
    for child in children {
        move_one_child(&mut state.visual_tree, child, dx);
    }
    state.reload_boundary(level);
}

/// Shifts the level's root together with all its descendants, then rebuilds
/// the level boundary.
pub fn move_branch(state: &mut LayoutState, level: usize, dx: f64) {
    if dx.abs() <= f64::EPSILON {
        return;
    }
    let root = state.level_root(level);
    move_one_child(&mut state.visual_tree, root, dx);
    state.reload_boundary(level);
}

/// Shifts an explicit set of child branches and rebuilds the level boundary.
pub(super) fn shift_children(state: &mut LayoutState, level: usize, nodes: &[NodeIndex], dx: f64) {
    if dx.abs() <= f64::EPSILON {
        return;
    }
    for &idx in nodes {
        move_one_child(&mut state.visual_tree, idx, dx);
    }
    state.reload_boundary(level);
}

/// Aligns the horizontal centers of the subset to the rightmost center among
/// them (children only ever move right). Returns the post-alignment x-span
/// of the subset's boxes and rebuilds the level boundary.
pub fn align_horizontal_centers(
    state: &mut LayoutState,
    level: usize,
    subset: &[NodeIndex],
) -> Dimensions {
    if subset.is_empty() {
        return Dimensions::min_max();
    }
    let mut target = f64::NEG_INFINITY;
    for &idx in subset {
        target = target.max(state.visual_tree.node(idx).state.center_h());
    }
    let mut moved = false;
    for &idx in subset {
        let dx = target - state.visual_tree.node(idx).state.center_h();
        if dx > f64::EPSILON {
            move_one_child(&mut state.visual_tree, idx, dx);
            moved = true;
        }
    }
    let mut span = Dimensions::min_max();
    for &idx in subset {
        let state_ref = &state.visual_tree.node(idx).state;
        span = span + Dimensions::new(state_ref.left(), state_ref.right());
    }
    if moved {
        state.reload_boundary(level);
    }
    span
}

/// Smallest rect enclosing every layout-affecting, non-special box; zero for
/// an empty tree. Drives viewport sizing.
pub fn compute_branch_visual_bounding_rect(tree: &BoxTree) -> Rect {
    let mut result: Option<Rect> = None;
    for (_, node) in tree.iter() {
        if !node.element.affects_layout || node.element.is_special {
            continue;
        }
        let rect = node.state.rect();
        result = Some(match result {
            Some(acc) => acc + rect,
            None => rect,
        });
    }
    result.unwrap_or_default()
}
