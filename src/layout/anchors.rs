use super::types::{ANCHOR_IDS, Anchor, AnchorAssignment, AnchorId, Point, Rect, Role};
use crate::ir::Edge;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};

/// Manual anchor picks, keyed by edge id then endpoint role.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnchorOverrides(BTreeMap<String, BTreeMap<Role, AnchorId>>);

impl AnchorOverrides {
    pub fn get(&self, edge: &str, role: Role) -> Option<AnchorId> {
        self.0.get(edge).and_then(|roles| roles.get(&role)).copied()
    }

    pub fn set(&mut self, edge: &str, role: Role, anchor: AnchorId) {
        self.0.entry(edge.to_string()).or_default().insert(role, anchor);
    }

    pub fn clear(&mut self, edge: &str, role: Role) {
        if let Some(roles) = self.0.get_mut(edge) {
            roles.remove(&role);
            if roles.is_empty() {
                self.0.remove(edge);
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// The twelve perimeter slots of `rect`, in tie-break order.
pub fn candidate_anchors(rect: &Rect) -> [Anchor; 12] {
    ANCHOR_IDS.map(|id| {
        let p = id.point_on(rect);
        Anchor { id, cx: p.x, cy: p.y }
    })
}

/// Candidate on `rect` nearest to `toward`, skipping `taken` ids. Earlier
/// candidates win ties.
pub fn nearest_anchor(rect: &Rect, toward: Point, taken: Option<&HashSet<AnchorId>>) -> Option<Anchor> {
    let mut best: Option<(Anchor, f32)> = None;
    for anchor in candidate_anchors(rect) {
        if taken.is_some_and(|taken| taken.contains(&anchor.id)) {
            continue;
        }
        let d = anchor.point().distance(toward);
        if best.is_none_or(|(_, best_d)| d < best_d) {
            best = Some((anchor, d));
        }
    }
    best.map(|(anchor, _)| anchor)
}

/// Greedy per-pass anchor assignment. Edge order decides who claims a slot
/// first; overrides are reserved up front so greedy edges route around them.
pub fn assign_anchors(
    edges: &[&Edge],
    rects: &BTreeMap<String, Rect>,
    overrides: &AnchorOverrides,
) -> BTreeMap<String, AnchorAssignment> {
    let mut claimed: HashMap<String, HashSet<AnchorId>> = HashMap::new();
    for edge in edges {
        if !(rects.contains_key(&edge.source) && rects.contains_key(&edge.target)) {
            continue;
        }
        for (role, node) in [(Role::Source, &edge.source), (Role::Target, &edge.target)] {
            if let Some(id) = overrides.get(&edge.id, role) {
                claimed.entry(node.clone()).or_default().insert(id);
            }
        }
    }

    let mut out = BTreeMap::new();
    for edge in edges {
        let (Some(source), Some(target)) = (rects.get(&edge.source), rects.get(&edge.target)) else {
            log::debug!("edge {} has no visible endpoint pair; skipped", edge.id);
            continue;
        };
        let mut pick = |role: Role, node: &str, rect: &Rect, other: &Rect| -> Option<Anchor> {
            if let Some(id) = overrides.get(&edge.id, role) {
                let p = id.point_on(rect);
                return Some(Anchor { id, cx: p.x, cy: p.y });
            }
            let toward = other.center();
            let taken = claimed.entry(node.to_string()).or_default();
            let anchor = match nearest_anchor(rect, toward, Some(&*taken)) {
                Some(anchor) => anchor,
                None => {
                    log::debug!("all anchors on {node} claimed; edge {} shares one", edge.id);
                    nearest_anchor(rect, toward, None)?
                }
            };
            taken.insert(anchor.id);
            Some(anchor)
        };
        let (Some(s), Some(t)) = (
            pick(Role::Source, &edge.source, source, target),
            pick(Role::Target, &edge.target, target, source),
        ) else {
            continue;
        };
        out.insert(edge.id.clone(), AnchorAssignment { source: s, target: t });
    }
    out
}
