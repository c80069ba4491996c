use super::types::{AnchorAssignment, Bounds, Offset, Rect};
use crate::config::LayoutConfig;
use crate::ir::Edge;
use std::collections::{BTreeMap, HashMap, HashSet};

/// Pill width for an interface name.
pub fn label_width(name: &str, config: &LayoutConfig) -> f32 {
    let chars = name.chars().count() as f32;
    (chars * config.char_width + config.label_padding).max(config.label_min_width)
}

/// Open interval between the facing sides of two rects along one axis, or
/// `None` when they overlap on that axis.
pub fn corridor(source: &Rect, target: &Rect, horizontal: bool) -> Option<(f32, f32)> {
    let (s0, s1, t0, t1) = if horizontal {
        (source.x, source.right(), target.x, target.right())
    } else {
        (source.y, source.bottom(), target.y, target.bottom())
    };
    if s1 <= t0 {
        Some((s1, t0))
    } else if t1 <= s0 {
        Some((t1, s0))
    } else {
        None
    }
}

fn clamp_into(label: Bounds, corridor: Option<(f32, f32)>, horizontal: bool) -> Bounds {
    let Some((lo, hi)) = corridor else {
        return label;
    };
    let mut out = label;
    if horizontal {
        if hi - lo >= label.w {
            out.x = label.x.clamp(lo, hi - label.w);
        }
    } else if hi - lo >= label.h {
        out.y = label.y.clamp(lo, hi - label.h);
    }
    out
}

/// Spatial index for fast overlap queries during label placement.
struct ObstacleGrid {
    cell: f32,
    /// Maps grid cell (ix, iy) to indices into the obstacle list.
    cells: HashMap<(i32, i32), Vec<usize>>,
}

impl ObstacleGrid {
    fn new(cell: f32, boxes: &[Bounds]) -> Self {
        let mut grid = Self {
            cell: cell.max(16.0),
            cells: HashMap::new(),
        };
        for (i, b) in boxes.iter().enumerate() {
            grid.insert(i, b);
        }
        grid
    }

    fn span(&self, b: &Bounds) -> (i32, i32, i32, i32) {
        (
            (b.x / self.cell).floor() as i32,
            (b.y / self.cell).floor() as i32,
            (b.right() / self.cell).floor() as i32,
            (b.bottom() / self.cell).floor() as i32,
        )
    }

    fn insert(&mut self, idx: usize, b: &Bounds) {
        let (x0, y0, x1, y1) = self.span(b);
        for ix in x0..=x1 {
            for iy in y0..=y1 {
                self.cells.entry((ix, iy)).or_default().push(idx);
            }
        }
    }

    /// Return indices of obstacles that could overlap with `b`.
    fn query(&self, b: &Bounds) -> impl Iterator<Item = usize> + '_ {
        let (x0, y0, x1, y1) = self.span(b);
        let mut seen = HashSet::new();
        (x0..=x1)
            .flat_map(move |ix| (y0..=y1).map(move |iy| (ix, iy)))
            .flat_map(move |key| {
                self.cells
                    .get(&key)
                    .map(|v| v.as_slice())
                    .unwrap_or(&[])
                    .iter()
                    .copied()
            })
            .filter(move |idx| seen.insert(*idx))
    }
}

struct Occupancy {
    blocks: Vec<Bounds>,
    block_grid: ObstacleGrid,
    labels: Vec<Bounds>,
    label_grid: ObstacleGrid,
}

impl Occupancy {
    fn new(rects: &BTreeMap<String, Rect>, config: &LayoutConfig) -> Self {
        let blocks: Vec<Bounds> = rects
            .values()
            .filter(|rect| !rect.is_container())
            .map(|rect| rect.bounds().inflate(config.label_block_margin))
            .collect();
        let block_grid = ObstacleGrid::new(config.grid * 4.0, &blocks);
        Self {
            blocks,
            block_grid,
            labels: Vec::new(),
            label_grid: ObstacleGrid::new(config.grid * 4.0, &[]),
        }
    }

    fn collides(&self, candidate: &Bounds) -> bool {
        self.block_grid
            .query(candidate)
            .any(|idx| self.blocks[idx].overlaps(candidate))
            || self
                .label_grid
                .query(candidate)
                .any(|idx| self.labels[idx].overlaps(candidate))
    }

    fn claim(&mut self, placed: Bounds, spacing: f32) {
        let padded = placed.inflate(spacing);
        self.label_grid.insert(self.labels.len(), &padded);
        self.labels.push(padded);
    }
}

/// Place one pill per routed edge, in edge order. Earlier edges win tight
/// corridors.
pub fn place_labels(
    edges: &[&Edge],
    anchors: &BTreeMap<String, AnchorAssignment>,
    rects: &BTreeMap<String, Rect>,
    offsets: &BTreeMap<String, Offset>,
    config: &LayoutConfig,
) -> BTreeMap<String, Bounds> {
    let mut occupancy = Occupancy::new(rects, config);
    let mut out = BTreeMap::new();

    for edge in edges {
        let (Some(assignment), Some(source), Some(target)) = (
            anchors.get(&edge.id),
            rects.get(&edge.source),
            rects.get(&edge.target),
        ) else {
            continue;
        };
        let w = label_width(&edge.name, config);
        let h = config.label_height;
        let mid = assignment.source.point().midpoint(assignment.target.point());
        let natural = Bounds::new(mid.x - w / 2.0, mid.y - h / 2.0, w, h);

        let dx = assignment.target.cx - assignment.source.cx;
        let dy = assignment.target.cy - assignment.source.cy;
        let horizontal = dx.abs() >= dy.abs();
        let gap = corridor(source, target, horizontal);

        let mut base = clamp_into(natural, gap, horizontal);
        if let Some(offset) = offsets.get(&edge.id) {
            base.x += offset.dx;
            base.y += offset.dy;
            base = clamp_into(base, gap, horizontal);
        }

        let placed = resolve_collision(base, horizontal, &occupancy, config);
        occupancy.claim(placed, config.label_spacing);
        out.insert(edge.id.clone(), placed);
    }
    out
}

/// Step perpendicular to the clamp axis, alternating sides, until a free slot
/// turns up. Keeps the last candidate when the search runs out.
fn resolve_collision(base: Bounds, horizontal: bool, occupancy: &Occupancy, config: &LayoutConfig) -> Bounds {
    if !occupancy.collides(&base) {
        return base;
    }
    let mut last = base;
    for step in 1..=config.label_search_steps {
        for sign in [1.0f32, -1.0] {
            let shift = sign * step as f32 * config.grid;
            let candidate = if horizontal {
                Bounds { y: base.y + shift, ..base }
            } else {
                Bounds { x: base.x + shift, ..base }
            };
            if !occupancy.collides(&candidate) {
                return candidate;
            }
            last = candidate;
        }
    }
    log::debug!(
        "label search exhausted after {} steps; keeping overlapping slot at ({}, {})",
        config.label_search_steps,
        last.x,
        last.y
    );
    last
}
