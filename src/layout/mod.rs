mod anchors;
mod label_placement;
mod offsets;
mod packer;
mod routing;
pub(crate) mod types;
mod visibility;

pub use anchors::{AnchorOverrides, assign_anchors, candidate_anchors, nearest_anchor};
pub use label_placement::{corridor, label_width, place_labels};
pub use offsets::{apply_offsets, nudge_subtree};
pub use packer::{channel_gap, columns_for, pack};
pub use routing::{
    RouteEnd, compress_path, path_crossings, route, route_edge, route_edges,
    segment_intersects_rect,
};
pub use types::*;
pub use visibility::{
    FocusMode, base_visible, breadcrumb, connection_expansion, connection_required, external_stubs, focus_ids,
    visible_set,
};

use crate::config::LayoutConfig;
use crate::ir::{Diagram, DiagramIndex, Edge};
use crate::state::ViewState;
use std::collections::BTreeMap;

/// Run every stage for one view: pack, offset, subset, assign anchors, place
/// labels, route.
pub fn compute_view(diagram: &Diagram, index: &DiagramIndex, state: &ViewState, config: &LayoutConfig) -> ViewLayout {
    let canonical = pack(diagram, index, &state.expanded, config);
    let placed = apply_offsets(&canonical, &state.node_offsets, index, config);
    let visible = visible_set(diagram, index, &state.expanded, &state.focus);
    let rects: BTreeMap<String, Rect> = placed
        .into_iter()
        .filter(|(id, _)| visible.contains(id))
        .collect();

    let shown = shown_edges(diagram, state);
    let external = match &state.focus {
        FocusMode::Focus { node, revealed } => {
            external_stubs(&shown, index, &focus_ids(index, node, revealed), &rects)
        }
        _ => Vec::new(),
    };
    let edges = routable_edges(&shown, index, &rects);
    let anchors = assign_anchors(&edges, &rects, &state.overrides);

    let mut layout = ViewLayout {
        rects,
        anchors,
        external,
        visible,
        ..ViewLayout::default()
    };
    reflow_edges(diagram, index, state, &mut layout, config);
    log::trace!(
        "view: {} rects, {} edges routed, {} external",
        layout.rects.len(),
        layout.routes.len(),
        layout.external.len()
    );
    layout
}

/// Recompute labels, routes and scene bounds from whatever anchors `layout`
/// currently holds. Used for animation frames, where only anchors move.
pub fn reflow_edges(
    diagram: &Diagram,
    index: &DiagramIndex,
    state: &ViewState,
    layout: &mut ViewLayout,
    config: &LayoutConfig,
) {
    let shown = shown_edges(diagram, state);
    let edges = routable_edges(&shown, index, &layout.rects);
    layout.labels = place_labels(&edges, &layout.anchors, &layout.rects, &state.label_offsets, config);
    layout.routes = route_edges(&edges, &layout.anchors, &layout.labels, &layout.rects, config);
    layout.bounds = scene_bounds(layout);
}

/// Edges passing the type filter, in list order.
fn shown_edges<'d>(diagram: &'d Diagram, state: &ViewState) -> Vec<&'d Edge> {
    diagram
        .edges
        .iter()
        .filter(|edge| state.shows_type(edge.type_key()))
        .collect()
}

/// Edges with both endpoints drawn. Edges naming unknown nodes never are.
fn routable_edges<'d>(shown: &[&'d Edge], index: &DiagramIndex, rects: &BTreeMap<String, Rect>) -> Vec<&'d Edge> {
    shown
        .iter()
        .copied()
        .filter(|edge| {
            if !(index.contains(&edge.source) && index.contains(&edge.target)) {
                log::debug!("edge {} references an unknown node; dropped", edge.id);
                return false;
            }
            rects.contains_key(&edge.source) && rects.contains_key(&edge.target)
        })
        .collect()
}

fn scene_bounds(layout: &ViewLayout) -> Option<Bounds> {
    layout
        .rects
        .values()
        .map(Rect::bounds)
        .chain(layout.labels.values().copied())
        .reduce(|acc, b| acc.union(&b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::Node;

    fn diagram() -> Diagram {
        Diagram {
            nodes: vec![
                Node::with_children("x", "X", vec![Node::leaf("a", "A"), Node::leaf("b", "B")]),
                Node::leaf("y", "Y"),
            ],
            edges: vec![
                Edge::new("INT-1", "a", "b", "Internal"),
                Edge::new("INT-2", "a", "y", "Outbound"),
                Edge::new("INT-3", "a", "ghost", "Broken"),
            ],
        }
    }

    #[test]
    fn pipeline_routes_every_drawable_edge() {
        let diagram = diagram();
        let index = DiagramIndex::new(&diagram.nodes);
        let state = ViewState::with_expanded(["x"]);
        let layout = compute_view(&diagram, &index, &state, &LayoutConfig::default());
        assert_eq!(layout.rects.len(), 4);
        assert_eq!(layout.routes.keys().collect::<Vec<_>>(), vec!["INT-1", "INT-2"]);
        assert_eq!(layout.labels.len(), 2);
        assert!(layout.bounds.is_some());
    }

    #[test]
    fn type_filter_hides_edges_but_keeps_blocks_still() {
        let mut diagram = diagram();
        diagram.edges[1].interface_type = Some("Power".into());
        let index = DiagramIndex::new(&diagram.nodes);
        let mut state = ViewState::with_expanded(["x"]);
        let config = LayoutConfig::default();
        let all = compute_view(&diagram, &index, &state, &config);
        state.type_filter = Some(["Power".to_string()].into());
        let filtered = compute_view(&diagram, &index, &state, &config);
        assert_eq!(filtered.rects, all.rects);
        assert_eq!(filtered.routes.keys().collect::<Vec<_>>(), vec!["INT-2"]);
    }

    #[test]
    fn focus_mode_stubs_outbound_edges() {
        let diagram = diagram();
        let index = DiagramIndex::new(&diagram.nodes);
        let mut state = ViewState::with_expanded(["x"]);
        state.focus = FocusMode::Focus {
            node: "x".into(),
            revealed: Default::default(),
        };
        let layout = compute_view(&diagram, &index, &state, &LayoutConfig::default());
        assert!(!layout.visible.contains("y"));
        assert_eq!(layout.external.len(), 1);
        assert_eq!(layout.external[0].edge_id, "INT-2");
        assert!(!layout.routes.contains_key("INT-2"));
    }
}
