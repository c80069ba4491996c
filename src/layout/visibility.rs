use super::types::{ExternalStub, Point, Rect, Segment};
use crate::ir::{Diagram, DiagramIndex, Edge};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

// ── External stub geometry ──────────────────────────────────────────
/// Horizontal run out of the inside block before the stub turns.
const STUB_RUN: f32 = 20.0;
const STUB_DROP: f32 = 20.0;
/// Total horizontal reach of the stub from the block edge.
const STUB_REACH: f32 = 50.0;
/// Stub leaves the block this far down its left side.
const STUB_HEIGHT_FRACTION: f32 = 0.75;

/// Neighbourhood restriction. The two focus flavours never coexist.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "camelCase")]
pub enum FocusMode {
    #[default]
    All,
    /// A subtree plus whatever outside nodes the user has revealed. Edges
    /// leaving the set show up as stubs.
    #[serde(rename_all = "camelCase")]
    Focus {
        node: String,
        #[serde(default)]
        revealed: BTreeSet<String>,
    },
    /// A subtree plus every node it talks to, with exactly the containers
    /// needed to show them expanded. `saved_expansion` is restored on exit.
    #[serde(rename_all = "camelCase")]
    ConnectionFocus {
        node: String,
        saved_expansion: BTreeSet<String>,
    },
}

impl FocusMode {
    pub fn focus_node(&self) -> Option<&str> {
        match self {
            FocusMode::All => None,
            FocusMode::Focus { node, .. } | FocusMode::ConnectionFocus { node, .. } => Some(node),
        }
    }
}

/// Nodes whose ancestors are all expanded.
pub fn base_visible(index: &DiagramIndex, expanded: &BTreeSet<String>) -> BTreeSet<String> {
    index
        .preorder()
        .iter()
        .filter(|id| index.ancestors(id).iter().all(|a| expanded.contains(a)))
        .cloned()
        .collect()
}

/// The focus node, its descendants and any revealed ids, regardless of
/// expansion.
pub fn focus_ids(index: &DiagramIndex, node: &str, revealed: &BTreeSet<String>) -> BTreeSet<String> {
    let mut ids: BTreeSet<String> = index.descendants(node).iter().cloned().collect();
    ids.insert(node.to_string());
    ids.extend(revealed.iter().filter(|id| index.contains(id)).cloned());
    ids
}

/// Everything connection-focus pulls in for `node`: the subtree, every
/// endpoint of an edge touching it, and all of their ancestors.
pub fn connection_required(edges: &[Edge], index: &DiagramIndex, node: &str) -> BTreeSet<String> {
    let mut required: BTreeSet<String> = index.descendants(node).iter().cloned().collect();
    required.insert(node.to_string());
    let mut partners = Vec::new();
    for edge in edges {
        if !(index.contains(&edge.source) && index.contains(&edge.target)) {
            continue;
        }
        if required.contains(&edge.source) || required.contains(&edge.target) {
            partners.push(edge.source.clone());
            partners.push(edge.target.clone());
        }
    }
    required.extend(partners);
    let ancestors: Vec<String> = required.iter().flat_map(|id| index.ancestors(id)).collect();
    required.extend(ancestors);
    required
}

/// Expansion set for connection-focus: every ancestor of a required node plus
/// the containers inside the focused subtree.
pub fn connection_expansion(required: &BTreeSet<String>, index: &DiagramIndex, node: &str) -> BTreeSet<String> {
    let mut expanded: BTreeSet<String> = required
        .iter()
        .flat_map(|id| index.ancestors(id))
        .collect();
    for id in std::iter::once(node).chain(index.descendants(node).iter().map(String::as_str)) {
        if index.has_children(id) {
            expanded.insert(id.to_string());
        }
    }
    expanded
}

/// Ids drawn for the current mode and expansion.
pub fn visible_set(
    diagram: &Diagram,
    index: &DiagramIndex,
    expanded: &BTreeSet<String>,
    mode: &FocusMode,
) -> BTreeSet<String> {
    let base = base_visible(index, expanded);
    match mode {
        FocusMode::All => base,
        FocusMode::Focus { node, revealed } => focus_ids(index, node, revealed)
            .intersection(&base)
            .cloned()
            .collect(),
        FocusMode::ConnectionFocus { node, .. } => connection_required(&diagram.edges, index, node)
            .intersection(&base)
            .cloned()
            .collect(),
    }
}

/// Edges with exactly one endpoint inside the focus set, drawn as short stubs
/// off the inside block (or its nearest visible ancestor).
pub fn external_stubs(
    edges: &[&Edge],
    index: &DiagramIndex,
    focus: &BTreeSet<String>,
    rects: &BTreeMap<String, Rect>,
) -> Vec<ExternalStub> {
    let mut out = Vec::new();
    for edge in edges {
        if !(index.contains(&edge.source) && index.contains(&edge.target)) {
            continue;
        }
        let (inside, outside) = match (focus.contains(&edge.source), focus.contains(&edge.target)) {
            (true, false) => (&edge.source, &edge.target),
            (false, true) => (&edge.target, &edge.source),
            _ => continue,
        };
        let drawn = std::iter::once(inside.clone())
            .chain(index.ancestors(inside))
            .find(|id| rects.contains_key(id));
        let Some(rect) = drawn.as_ref().and_then(|id| rects.get(id)) else {
            continue;
        };
        out.push(ExternalStub {
            edge_id: edge.id.clone(),
            inside: inside.clone(),
            outside: outside.clone(),
            path: stub_path(rect),
        });
    }
    out
}

fn stub_path(rect: &Rect) -> Vec<Segment> {
    let start = Point::new(rect.x, rect.y + rect.h * STUB_HEIGHT_FRACTION);
    let turn = Point::new(start.x - STUB_RUN, start.y);
    let drop = Point::new(turn.x, start.y + STUB_DROP);
    let end = Point::new(start.x - STUB_REACH, drop.y);
    vec![
        Segment::new(start, turn),
        Segment::new(turn, drop),
        Segment::new(drop, end),
    ]
}

/// Ancestor chain from the root down to `focus`, inclusive.
pub fn breadcrumb(index: &DiagramIndex, focus: &str) -> Vec<String> {
    if !index.contains(focus) {
        return Vec::new();
    }
    let mut chain = index.ancestors(focus);
    chain.reverse();
    chain.push(focus.to_string());
    chain
}
