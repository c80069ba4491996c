use super::types::{Offset, Rect};
use crate::config::LayoutConfig;
use crate::ir::DiagramIndex;
use std::collections::BTreeMap;

/// Shift every rect by its node's drag offset, then refit expanded containers
/// around their children, deepest first.
pub fn apply_offsets(
    canonical: &BTreeMap<String, Rect>,
    node_offsets: &BTreeMap<String, Offset>,
    index: &DiagramIndex,
    config: &LayoutConfig,
) -> BTreeMap<String, Rect> {
    if node_offsets.values().all(Offset::is_zero) {
        return canonical.clone();
    }
    let mut rects: BTreeMap<String, Rect> = canonical
        .iter()
        .map(|(id, rect)| {
            let offset = node_offsets.get(id).copied().unwrap_or_default();
            (id.clone(), rect.translate(offset.dx, offset.dy))
        })
        .collect();

    let mut containers: Vec<&String> = canonical
        .iter()
        .filter(|(_, rect)| rect.is_container())
        .map(|(id, _)| id)
        .collect();
    containers.sort_by(|a, b| index.depth(b).cmp(&index.depth(a)).then_with(|| a.cmp(b)));

    for id in containers {
        let children: Vec<Rect> = index
            .children(id)
            .iter()
            .filter_map(|child| rects.get(child).copied())
            .collect();
        let Some(fitted) = refit(&children, config) else {
            continue;
        };
        if let Some(rect) = rects.get_mut(id) {
            rect.x = fitted.x;
            rect.y = fitted.y;
            rect.w = fitted.w;
            rect.h = fitted.h;
        }
    }
    rects
}

/// Tight box around `children` plus padding and the header band.
fn refit(children: &[Rect], config: &LayoutConfig) -> Option<Rect> {
    let first = children.first()?;
    let mut bounds = first.bounds();
    for child in &children[1..] {
        bounds = bounds.union(&child.bounds());
    }
    let pad = config.padding;
    Some(Rect::leaf(
        bounds.x - pad,
        bounds.y - pad - config.header,
        bounds.w + pad * 2.0,
        bounds.h + pad * 2.0 + config.header,
    ))
}

/// Add `delta` to `id` and every descendant so the subtree moves rigidly.
pub fn nudge_subtree(offsets: &mut BTreeMap<String, Offset>, index: &DiagramIndex, id: &str, delta: Offset) {
    if delta.is_zero() {
        return;
    }
    *offsets.entry(id.to_string()).or_default() += delta;
    for child in index.descendants(id) {
        *offsets.entry(child.clone()).or_default() += delta;
    }
}
