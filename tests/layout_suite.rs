use std::cell::RefCell;
use std::rc::Rc;

use orgchart_layout::{
    BoxContainer, BoxId, Connector, Diagram, DiagramLayoutSettings, Edge, LayoutError,
    LayoutState, LayoutStrategy, NodeIndex, Operation, ParentAlignment, Point, Rect, Size,
    StrategyCore, apply, compute_branch_visual_bounding_rect,
};

const BOX: Size = Size::new(40.0, 20.0);

fn core(alignment: ParentAlignment) -> StrategyCore {
    StrategyCore {
        parent_child_spacing: 10.0,
        sibling_spacing: 5.0,
        parent_connector_shield: 8.0,
        child_connector_hook_length: 5.0,
        parent_alignment: alignment,
    }
}

fn test_settings(default_id: &str) -> DiagramLayoutSettings {
    let mut settings = DiagramLayoutSettings::default();
    settings.branch_spacing = 30.0;
    settings.layout_strategies.insert(
        "column".to_string(),
        LayoutStrategy::SingleColumn {
            core: core(ParentAlignment::Left),
        },
    );
    settings.layout_strategies.insert(
        "column-right".to_string(),
        LayoutStrategy::SingleColumn {
            core: core(ParentAlignment::Right),
        },
    );
    settings.layout_strategies.insert(
        "row".to_string(),
        LayoutStrategy::Linear {
            core: core(ParentAlignment::Center),
        },
    );
    settings.layout_strategies.insert(
        "bone".to_string(),
        LayoutStrategy::MultiLineFishbone {
            core: core(ParentAlignment::Center),
            max_groups: 1,
        },
    );
    settings.layout_strategies.insert(
        "bone3".to_string(),
        LayoutStrategy::MultiLineFishbone {
            core: core(ParentAlignment::Center),
            max_groups: 3,
        },
    );
    settings.layout_strategies.insert(
        "aide".to_string(),
        LayoutStrategy::FishboneAssistants {
            core: core(ParentAlignment::Center),
        },
    );
    settings.default_layout_strategy_id = default_id.to_string();
    settings.default_assistant_layout_strategy_id = "aide".to_string();
    settings
}

fn state_for(container: BoxContainer, default_id: &str) -> LayoutState {
    LayoutState::new(Diagram {
        boxes: container,
        layout_settings: test_settings(default_id),
    })
}

fn run_layout(container: BoxContainer, default_id: &str) -> LayoutState {
    let mut state = state_for(container, default_id);
    apply(&mut state).expect("layout failed");
    assert_eq!(state.operation(), Operation::Completed);
    state
}

fn node_of(state: &LayoutState, id: BoxId) -> NodeIndex {
    state.visual_tree.node_for_box(id).expect("box not in tree")
}

fn rect_of(state: &LayoutState, id: BoxId) -> Rect {
    state.visual_tree.node(node_of(state, id)).state.rect()
}

fn connector_of(state: &LayoutState, id: BoxId) -> Option<Connector> {
    state
        .visual_tree
        .node(node_of(state, id))
        .state
        .connector
        .clone()
}

fn assistants_connector_of(state: &LayoutState, owner: BoxId) -> Option<Connector> {
    let assistants_root = state
        .visual_tree
        .node(node_of(state, owner))
        .assistants_root?;
    state
        .visual_tree
        .node(assistants_root)
        .state
        .connector
        .clone()
}

/// Rects of the special (spacer) children injected under the given box.
fn spacer_rects_of(state: &LayoutState, id: BoxId) -> Vec<Rect> {
    let node = state.visual_tree.node(node_of(state, id));
    node.children
        .iter()
        .map(|&child| state.visual_tree.node(child))
        .filter(|child| child.element.is_special)
        .map(|child| child.state.rect())
        .collect()
}

fn seg(x1: f64, y1: f64, x2: f64, y2: f64) -> Edge {
    Edge::new(Point::new(x1, y1), Point::new(x2, y2))
}

fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < 1e-9,
        "expected {expected}, got {actual}"
    );
}

#[test]
fn root_only_produces_bare_geometry() {
    let mut container = BoxContainer::with_system_root();
    let root = container.add(1, BOX);
    let state = run_layout(container, "column");
    assert_eq!(rect_of(&state, root), Rect::from_coords(0.0, 0.0, 40.0, 20.0));
    for (_, node) in state.visual_tree.iter() {
        assert!(node.state.connector.is_none());
    }
    assert_eq!(
        compute_branch_visual_bounding_rect(&state.visual_tree),
        Rect::from_coords(0.0, 0.0, 40.0, 20.0)
    );
}

#[test]
fn single_child_hangs_right_of_the_carrier() {
    let mut container = BoxContainer::with_system_root();
    let root = container.add(1, BOX);
    let child = container.add(root, BOX);
    let state = run_layout(container, "column");

    assert_eq!(rect_of(&state, root), Rect::from_coords(0.0, 0.0, 40.0, 20.0));
    assert_eq!(rect_of(&state, child), Rect::from_coords(24.0, 30.0, 40.0, 20.0));

    let connector = connector_of(&state, root).expect("root connector");
    assert_eq!(
        connector.segments,
        vec![seg(20.0, 20.0, 20.0, 40.0), seg(20.0, 40.0, 24.0, 40.0)]
    );
}

#[test]
fn four_children_stack_into_one_column() {
    let mut container = BoxContainer::with_system_root();
    let root = container.add(1, BOX);
    let children: Vec<BoxId> = (0..4).map(|_| container.add(root, BOX)).collect();
    let state = run_layout(container, "column");

    for (i, &child) in children.iter().enumerate() {
        let rect = rect_of(&state, child);
        assert_close(rect.left(), 24.0);
        assert_close(rect.top(), 30.0 + 30.0 * i as f64);
    }

    let spacers = spacer_rects_of(&state, root);
    assert_eq!(spacers.len(), 1);
    assert_eq!(spacers[0], Rect::from_coords(16.0, 20.0, 8.0, 120.0));

    // carrier runs from the parent's bottom to the last child's center
    let connector = connector_of(&state, root).expect("root connector");
    assert_eq!(connector.segments[0], seg(20.0, 20.0, 20.0, 130.0));
    assert_eq!(connector.segments.len(), 5);

    // spacers are invisible to the viewport
    assert_eq!(
        compute_branch_visual_bounding_rect(&state.visual_tree),
        Rect::from_coords(0.0, 0.0, 64.0, 140.0)
    );
}

#[test]
fn right_alignment_mirrors_the_column() {
    let mut container = BoxContainer::with_system_root();
    let root = container.add(1, BOX);
    let child = container.add(root, BOX);
    let state = run_layout(container, "column-right");
    // right edge parks at center - shield/2
    let rect = rect_of(&state, child);
    assert_close(rect.right(), 16.0);
    let connector = connector_of(&state, root).expect("root connector");
    assert_eq!(connector.segments[1], seg(20.0, 40.0, 16.0, 40.0));
}

#[test]
fn fishbone_alternates_pillars_and_centers_the_carrier() {
    let mut container = BoxContainer::with_system_root();
    let root = container.add(1, BOX);
    let children: Vec<BoxId> = (0..4).map(|_| container.add(root, BOX)).collect();
    let state = run_layout(container, "bone");

    // left pillar: children 0 and 2; right pillar: children 1 and 3
    for &child in &[children[0], children[2]] {
        assert_close(rect_of(&state, child).left(), -22.5);
    }
    for &child in &[children[1], children[3]] {
        assert_close(rect_of(&state, child).left(), 22.5);
    }
    // rows pair across the carrier
    assert_close(rect_of(&state, children[0]).top(), 40.0);
    assert_close(rect_of(&state, children[1]).top(), 40.0);
    assert_close(rect_of(&state, children[2]).top(), 70.0);
    assert_close(rect_of(&state, children[3]).top(), 70.0);

    // one parent drop plus one vertical carrier, no horizontal carrier
    let spacers = spacer_rects_of(&state, root);
    assert_eq!(spacers.len(), 2);
    let carrier = spacers
        .iter()
        .find(|rect| rect.size.width == 5.0)
        .expect("vertical carrier spacer");
    assert_close(carrier.center_h(), 20.0);
    assert_eq!(*carrier, Rect::from_coords(17.5, 30.0, 5.0, 60.0));

    let connector = connector_of(&state, root).expect("root connector");
    assert_eq!(connector.segments[0], seg(20.0, 20.0, 20.0, 30.0));
    assert!(connector.segments.contains(&seg(20.0, 30.0, 20.0, 80.0)));
    assert!(connector.segments.contains(&seg(20.0, 50.0, 17.5, 50.0)));
    assert!(connector.segments.contains(&seg(20.0, 50.0, 22.5, 50.0)));

    let bounding = compute_branch_visual_bounding_rect(&state.visual_tree);
    assert_eq!(bounding, Rect::from_coords(-22.5, 0.0, 85.0, 90.0));
}

#[test]
fn fishbone_with_many_children_fills_groups_row_by_row() {
    let mut container = BoxContainer::with_system_root();
    let root = container.add(1, BOX);
    let children: Vec<BoxId> = (0..10).map(|_| container.add(root, BOX)).collect();
    let state = run_layout(container, "bone3");

    // three vertical carriers, one drop, one horizontal carrier
    let spacers = spacer_rects_of(&state, root);
    assert_eq!(spacers.len(), 5);

    // row membership: children 0..6 form row one, 6..10 row two
    for &child in &children[..6] {
        assert_close(rect_of(&state, child).top(), 40.0);
    }
    for &child in &children[6..] {
        assert_close(rect_of(&state, child).top(), 70.0);
    }

    // groups sit left to right in index order without overlap
    let group0 = rect_of(&state, children[0]);
    let group1 = rect_of(&state, children[2]);
    let group2 = rect_of(&state, children[4]);
    assert!(group0.left() < group1.left());
    assert!(group1.left() < group2.left());
}

#[test]
fn assistant_hangs_off_a_dedicated_carrier() {
    let mut container = BoxContainer::with_system_root();
    let root = container.add(1, BOX);
    let assistant = container.add(root, BOX);
    container.get_mut(assistant).unwrap().is_assistant = true;
    let state = run_layout(container, "column");

    // single assistant fills the left pillar, centered on the owner
    assert_eq!(
        rect_of(&state, assistant),
        Rect::from_coords(-22.5, 30.0, 40.0, 20.0)
    );

    // carrier spacer plus the protector, since the owner has no children
    let assistants_root = state
        .visual_tree
        .node(node_of(&state, root))
        .assistants_root
        .expect("assistants root");
    let ar_box = state.visual_tree.node(assistants_root).element.id;
    let spacers = spacer_rects_of(&state, ar_box);
    assert_eq!(spacers.len(), 2);
    assert!(spacers.contains(&Rect::from_coords(16.0, 20.0, 8.0, 30.0)));

    let connector = assistants_connector_of(&state, root).expect("assistants connector");
    assert_eq!(
        connector.segments,
        vec![seg(20.0, 20.0, 20.0, 40.0), seg(20.0, 40.0, 17.5, 40.0)]
    );
}

#[test]
fn assistants_precede_regular_children_vertically() {
    let mut container = BoxContainer::with_system_root();
    let root = container.add(1, BOX);
    let assistant = container.add(root, BOX);
    container.get_mut(assistant).unwrap().is_assistant = true;
    let child = container.add(root, BOX);
    let state = run_layout(container, "column");

    let assistant_rect = rect_of(&state, assistant);
    let child_rect = rect_of(&state, child);
    assert_close(assistant_rect.top(), 30.0);
    // the regular child clears the whole assistants band
    assert_close(child_rect.top(), assistant_rect.bottom() + 10.0);

    // no protector: the owner's own carrier shields the drop lane
    let assistants_root = state
        .visual_tree
        .node(node_of(&state, root))
        .assistants_root
        .unwrap();
    let ar_box = state.visual_tree.node(assistants_root).element.id;
    assert_eq!(spacer_rects_of(&state, ar_box).len(), 1);
}

#[test]
fn collapsed_root_keeps_children_unplaced() {
    let mut container = BoxContainer::with_system_root();
    let root = container.add(1, BOX);
    let a = container.add(root, BOX);
    let b = container.add(root, BOX);
    container.get_mut(root).unwrap().is_collapsed = true;
    let state = run_layout(container, "column");

    assert_eq!(rect_of(&state, a).top_left, Point::new(0.0, 0.0));
    assert_eq!(rect_of(&state, b).top_left, Point::new(0.0, 0.0));
    assert!(connector_of(&state, root).is_none());
    assert_eq!(
        compute_branch_visual_bounding_rect(&state.visual_tree),
        Rect::from_coords(0.0, 0.0, 40.0, 20.0)
    );
    // no spacers were injected under the collapsed box
    assert!(spacer_rects_of(&state, root).is_empty());
}

#[test]
fn empty_tree_has_a_zero_bounding_rect() {
    let container = BoxContainer::with_system_root();
    let state = run_layout(container, "column");
    let bounding = compute_branch_visual_bounding_rect(&state.visual_tree);
    assert_eq!(bounding.size, Size::default());
    for (_, node) in state.visual_tree.iter() {
        assert!(node.state.connector.is_none());
    }
}

#[test]
fn orphan_boxes_reattach_under_the_system_root() {
    let mut container = BoxContainer::with_system_root();
    let orphan = container.add(99, BOX);
    let state = run_layout(container, "column");
    assert_eq!(rect_of(&state, orphan), Rect::from_coords(0.0, 0.0, 40.0, 20.0));
}

#[test]
fn fishbone_pair_falls_back_to_the_linear_row() {
    let mut bone_container = BoxContainer::with_system_root();
    let root = bone_container.add(1, BOX);
    let a = bone_container.add(root, BOX);
    let b = bone_container.add(root, BOX);
    let row_container = bone_container.clone();

    let bone = run_layout(bone_container, "bone");
    let row = run_layout(row_container, "row");
    for id in [root, a, b] {
        assert_eq!(rect_of(&bone, id), rect_of(&row, id));
    }
    assert_eq!(connector_of(&bone, root), connector_of(&row, root));
}

#[test]
fn linear_row_respects_branch_spacing_between_subtrees() {
    let mut container = BoxContainer::with_system_root();
    let root = container.add(1, BOX);
    let a = container.add(root, BOX);
    let b = container.add(root, BOX);
    container.add(a, BOX);
    container.add(b, BOX);
    let state = run_layout(container, "row");

    let left = state.visual_tree.node(node_of(&state, a)).state.branch_exterior;
    let right = state.visual_tree.node(node_of(&state, b)).state.branch_exterior;
    let gap = right.left() - left.right();
    assert!(gap >= 30.0 - 1e-9, "branch gap {gap} below branch spacing");

    // the row is centered on the parent
    let row_span_mid = (rect_of(&state, a).left() + rect_of(&state, b).right()) / 2.0;
    assert_close(row_span_mid, rect_of(&state, root).center_h());
}

#[test]
fn branch_exteriors_contain_every_descendant() {
    let mut container = BoxContainer::with_system_root();
    let root = container.add(1, BOX);
    let assistant = container.add(root, BOX);
    container.get_mut(assistant).unwrap().is_assistant = true;
    for _ in 0..2 {
        let mid = container.add(root, BOX);
        for _ in 0..3 {
            container.add(mid, BOX);
        }
    }
    let state = run_layout(container, "column");

    fn check(state: &LayoutState, idx: NodeIndex) {
        let node = state.visual_tree.node(idx);
        if !node.element.affects_layout {
            return;
        }
        let exterior = node.state.branch_exterior;
        let mut descendants = node.children.clone();
        descendants.extend(node.assistants_root);
        for child in descendants {
            let child_node = state.visual_tree.node(child);
            if child_node.element.affects_layout {
                assert!(
                    exterior.contains_rect(&child_node.state.rect()),
                    "box {} escapes the exterior of box {}",
                    child_node.element.id,
                    node.element.id
                );
                assert!(exterior.contains_rect(&child_node.state.branch_exterior));
            }
            check(state, child);
        }
    }
    check(&state, state.visual_tree.roots[0]);
}

#[test]
fn every_connector_segment_is_axis_aligned() {
    let mut container = BoxContainer::with_system_root();
    let root = container.add(1, BOX);
    let assistant = container.add(root, BOX);
    container.get_mut(assistant).unwrap().is_assistant = true;
    for _ in 0..7 {
        let mid = container.add(root, BOX);
        container.add(mid, BOX);
    }
    let state = run_layout(container, "bone3");

    let mut seen = 0;
    for (_, node) in state.visual_tree.iter() {
        if let Some(connector) = &node.state.connector {
            for segment in &connector.segments {
                assert!(segment.is_axis_aligned(), "skewed segment {segment:?}");
                seen += 1;
            }
        }
    }
    assert!(seen > 0);
}

#[test]
fn children_sit_below_their_parent_with_spacing() {
    let mut container = BoxContainer::with_system_root();
    let root = container.add(1, BOX);
    for _ in 0..3 {
        let mid = container.add(root, BOX);
        container.add(mid, BOX);
    }
    let state = run_layout(container, "row");

    for (_, node) in state.visual_tree.iter() {
        let Some(parent) = node.parent else { continue };
        let parent_node = state.visual_tree.node(parent);
        if node.element.is_special
            || node.element.is_assistant
            || parent_node.element.is_special
            || !node.element.affects_layout
        {
            continue;
        }
        assert!(
            node.state.top() >= parent_node.state.bottom() + 10.0 - 1e-9,
            "box {} overlaps its parent vertically",
            node.element.id
        );
    }
}

#[test]
fn layout_is_deterministic_across_runs() {
    let build = || {
        let mut container = BoxContainer::with_system_root();
        let root = container.add(1, BOX);
        let assistant = container.add(root, BOX);
        container.get_mut(assistant).unwrap().is_assistant = true;
        for _ in 0..5 {
            let mid = container.add(root, BOX);
            container.add(mid, Size::new(60.0, 24.0));
        }
        container
    };
    let first = run_layout(build(), "bone3");
    let second = run_layout(build(), "bone3");
    let dump_a =
        serde_json::to_string(&orgchart_layout::LayoutDump::from_state(&first)).unwrap();
    let dump_b =
        serde_json::to_string(&orgchart_layout::LayoutDump::from_state(&second)).unwrap();
    assert_eq!(dump_a, dump_b);
}

#[test]
fn reapplying_after_reset_reproduces_the_geometry() {
    let mut container = BoxContainer::with_system_root();
    let root = container.add(1, BOX);
    for _ in 0..4 {
        container.add(root, BOX);
    }
    let mut state = state_for(container, "bone");
    apply(&mut state).unwrap();
    let before =
        serde_json::to_string(&orgchart_layout::LayoutDump::from_state(&state)).unwrap();

    state.reset_box_positions();
    apply(&mut state).unwrap();
    let after =
        serde_json::to_string(&orgchart_layout::LayoutDump::from_state(&state)).unwrap();
    assert_eq!(before, after);
}

#[test]
fn size_lookup_sets_data_bound_sizes() {
    let mut container = BoxContainer::with_system_root();
    let root = container.add(1, Size::default());
    container.get_mut(root).unwrap().data_id = Some("ceo".to_string());
    let mut state = state_for(container, "column");
    state.size_lookup = Some(Box::new(|data_id| {
        assert_eq!(data_id, "ceo");
        Size::new(120.0, 44.0)
    }));
    apply(&mut state).unwrap();
    assert_eq!(rect_of(&state, root).size, Size::new(120.0, 44.0));
}

#[test]
fn operation_hook_sees_every_phase_in_order() {
    let mut container = BoxContainer::with_system_root();
    container.add(1, BOX);
    let mut state = state_for(container, "column");
    let phases = Rc::new(RefCell::new(Vec::new()));
    let sink = phases.clone();
    state.operation_changed = Some(Box::new(move |operation| {
        sink.borrow_mut().push(operation);
    }));
    apply(&mut state).unwrap();
    assert_eq!(
        *phases.borrow(),
        vec![
            Operation::Preparing,
            Operation::PreprocessVisualTree,
            Operation::VerticalLayout,
            Operation::HorizontalLayout,
            Operation::ConnectorsLayout,
            Operation::Completed,
        ]
    );
}

#[test]
fn boundary_hook_fires_during_horizontal_layout() {
    let mut container = BoxContainer::with_system_root();
    let root = container.add(1, BOX);
    container.add(root, BOX);
    let mut state = state_for(container, "column");
    let count = Rc::new(RefCell::new(0usize));
    let sink = count.clone();
    state.boundary_changed = Some(Box::new(move |_, _| {
        *sink.borrow_mut() += 1;
    }));
    apply(&mut state).unwrap();
    assert!(*count.borrow() > 0);
}

#[test]
fn missing_system_root_is_rejected() {
    let mut container = BoxContainer::new();
    container.add(-1, BOX);
    let mut state = state_for(container, "column");
    assert!(matches!(
        apply(&mut state),
        Err(LayoutError::SystemRootMissing)
    ));
}

#[test]
fn a_second_parentless_box_is_rejected() {
    let mut container = BoxContainer::with_system_root();
    container.add(-1, BOX);
    let mut state = state_for(container, "column");
    assert!(matches!(
        apply(&mut state),
        Err(LayoutError::MultipleRoots(2))
    ));
}

#[test]
fn unregistered_default_strategy_is_rejected() {
    let mut container = BoxContainer::with_system_root();
    container.add(1, BOX);
    let mut state = state_for(container, "no-such-strategy");
    assert!(matches!(
        apply(&mut state),
        Err(LayoutError::StrategyNotFound(_))
    ));
}

#[test]
fn single_column_rejects_center_alignment() {
    let mut container = BoxContainer::with_system_root();
    container.add(1, BOX);
    let mut settings = test_settings("column");
    settings.layout_strategies.insert(
        "column".to_string(),
        LayoutStrategy::SingleColumn {
            core: core(ParentAlignment::Center),
        },
    );
    let mut state = LayoutState::new(Diagram {
        boxes: container,
        layout_settings: settings,
    });
    assert!(matches!(
        apply(&mut state),
        Err(LayoutError::UnsupportedAlignment { .. })
    ));
}

#[test]
fn fishbone_rejects_off_center_alignment() {
    let mut container = BoxContainer::with_system_root();
    container.add(1, BOX);
    let mut settings = test_settings("skewed");
    settings.layout_strategies.insert(
        "skewed".to_string(),
        LayoutStrategy::MultiLineFishbone {
            core: core(ParentAlignment::Left),
            max_groups: 2,
        },
    );
    let mut state = LayoutState::new(Diagram {
        boxes: container,
        layout_settings: settings,
    });
    assert!(matches!(
        apply(&mut state),
        Err(LayoutError::UnsupportedAlignment { .. })
    ));
}

#[test]
fn fishbone_rejects_a_zero_group_count() {
    let mut container = BoxContainer::with_system_root();
    container.add(1, BOX);
    let mut settings = test_settings("empty-bone");
    settings.layout_strategies.insert(
        "empty-bone".to_string(),
        LayoutStrategy::MultiLineFishbone {
            core: core(ParentAlignment::Center),
            max_groups: 0,
        },
    );
    let mut state = LayoutState::new(Diagram {
        boxes: container,
        layout_settings: settings,
    });
    assert!(matches!(
        apply(&mut state),
        Err(LayoutError::InvalidGroupCount)
    ));
}

#[test]
fn per_box_strategy_overrides_win_over_the_default() {
    let mut container = BoxContainer::with_system_root();
    let root = container.add(1, BOX);
    container.get_mut(root).unwrap().layout_strategy_id = Some("column".to_string());
    let child = container.add(root, BOX);
    // default is the row layout, but the override walks down the branch
    let state = run_layout(container, "row");
    assert_eq!(rect_of(&state, child), Rect::from_coords(24.0, 30.0, 40.0, 20.0));
}
