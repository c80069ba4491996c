use super::label_placement::label_width;
use super::types::Rect;
use crate::config::LayoutConfig;
use crate::ir::{Diagram, DiagramIndex, Edge};
use std::collections::{BTreeMap, BTreeSet, HashMap};

// ── Channel sizing ──────────────────────────────────────────────────
/// Gap between blocks with no edge running between them, in grid units.
const EMPTY_CHANNEL_UNITS: f32 = 2.0;
/// Floor for any channel that carries at least one edge, in grid units.
const EDGE_CHANNEL_MIN_UNITS: f32 = 6.0;
/// Clearance added on top of the widest label overhang, in grid units.
const EDGE_CHANNEL_CLEARANCE_UNITS: f32 = 4.0;

/// Column count for a container with `children` direct children.
pub fn columns_for(children: usize) -> usize {
    match children {
        0 | 1 => 1,
        2..=4 => 2,
        5..=9 => 3,
        _ => 4,
    }
}

/// Width of the channel between two blocks linked by `count` edges whose
/// widest label spans `extent` along the channel's axis.
pub fn channel_gap(count: usize, extent: f32, minimum: f32, config: &LayoutConfig) -> f32 {
    let grid = config.grid;
    if count == 0 {
        return EMPTY_CHANNEL_UNITS * grid;
    }
    let overhang = config.snap_up((extent - minimum).max(0.0));
    (overhang + EDGE_CHANNEL_CLEARANCE_UNITS * grid).max(EDGE_CHANNEL_MIN_UNITS * grid)
}

/// Offsets of every column and row inside a container's content box.
#[derive(Debug, Clone)]
struct ChildGrid {
    cols: usize,
    col_x: Vec<f32>,
    row_y: Vec<f32>,
    width: f32,
    height: f32,
}

struct Packer<'a> {
    edges: &'a [Edge],
    index: &'a DiagramIndex,
    expanded: &'a BTreeSet<String>,
    config: &'a LayoutConfig,
    sizes: HashMap<String, (f32, f32)>,
    grids: HashMap<String, ChildGrid>,
}

/// Pack every node whose ancestors are all expanded into canonical rects.
///
/// Gap sizing looks at every edge in the diagram, filtered or not, so toggling
/// a type filter never moves a block.
pub fn pack(
    diagram: &Diagram,
    index: &DiagramIndex,
    expanded: &BTreeSet<String>,
    config: &LayoutConfig,
) -> BTreeMap<String, Rect> {
    let mut packer = Packer {
        edges: &diagram.edges,
        index,
        expanded,
        config,
        sizes: HashMap::new(),
        grids: HashMap::new(),
    };
    let roots = index.roots();
    let mut out = BTreeMap::new();
    if roots.is_empty() {
        return out;
    }
    for root in roots {
        packer.measure(root);
    }

    let mut x = config.origin;
    for (i, root) in roots.iter().enumerate() {
        packer.place(root, x, config.origin, &mut out);
        let (w, _) = packer.size(root);
        x += w;
        if let Some(next) = roots.get(i + 1) {
            x += packer.gap_between(&[(root.as_str(), next.as_str())], true);
        }
    }
    log::trace!(
        "packed {} rects ({} containers expanded)",
        out.len(),
        packer.grids.len()
    );
    out
}

impl<'a> Packer<'a> {
    fn is_expanded(&self, id: &str) -> bool {
        self.expanded.contains(id) && self.index.has_children(id)
    }

    fn size(&self, id: &str) -> (f32, f32) {
        self.sizes
            .get(id)
            .copied()
            .unwrap_or_else(|| self.leaf_size(id))
    }

    fn leaf_size(&self, id: &str) -> (f32, f32) {
        let extra = if self.index.has_children(id) {
            self.config.collapsed_extra
        } else {
            0.0
        };
        (
            self.config.snap_up(self.config.base_width + extra),
            self.config.snap_up(self.config.base_height),
        )
    }

    fn measure(&mut self, id: &str) -> (f32, f32) {
        if let Some(size) = self.sizes.get(id) {
            return *size;
        }
        let size = if self.is_expanded(id) {
            let grid = self.measure_children(id);
            let pad = self.config.padding;
            let size = (
                grid.width + pad * 2.0,
                grid.height + self.config.header + pad * 2.0,
            );
            self.grids.insert(id.to_string(), grid);
            size
        } else {
            self.leaf_size(id)
        };
        self.sizes.insert(id.to_string(), size);
        size
    }

    fn measure_children(&mut self, id: &str) -> ChildGrid {
        let index = self.index;
        let children = index.children(id);
        let cols = columns_for(children.len());
        let rows = children.len().div_ceil(cols);

        let mut column_widths = vec![0.0f32; cols];
        let mut row_heights = vec![0.0f32; rows];
        for (i, child) in children.iter().enumerate() {
            let (w, h) = self.measure(child);
            column_widths[i % cols] = column_widths[i % cols].max(w);
            row_heights[i / cols] = row_heights[i / cols].max(h);
        }
        let cell = |row: usize, col: usize| children.get(row * cols + col).map(String::as_str);

        let mut col_x = Vec::with_capacity(cols);
        let mut x = 0.0;
        for col in 0..cols {
            col_x.push(x);
            x += column_widths[col];
            if col + 1 < cols {
                let mut pairs = Vec::new();
                for row in 0..rows {
                    let Some(left) = cell(row, col) else {
                        continue;
                    };
                    for other in row.saturating_sub(1)..=(row + 1).min(rows - 1) {
                        if let Some(right) = cell(other, col + 1) {
                            pairs.push((left, right));
                        }
                    }
                }
                x += self.gap_between(&pairs, true);
            }
        }

        let mut row_y = Vec::with_capacity(rows);
        let mut y = 0.0;
        for row in 0..rows {
            row_y.push(y);
            y += row_heights[row];
            if row + 1 < rows {
                let mut pairs = Vec::new();
                for col in 0..cols {
                    let Some(upper) = cell(row, col) else {
                        continue;
                    };
                    for other in col.saturating_sub(1)..=(col + 1).min(cols - 1) {
                        if let Some(lower) = cell(row + 1, other) {
                            pairs.push((upper, lower));
                        }
                    }
                }
                y += self.gap_between(&pairs, false);
            }
        }

        ChildGrid {
            cols,
            col_x,
            row_y,
            width: x,
            height: y,
        }
    }

    /// Gap for a column boundary (`horizontal`) or a row boundary, sized by the
    /// busiest pair of neighbouring subtrees across it.
    fn gap_between(&self, pairs: &[(&str, &str)], horizontal: bool) -> f32 {
        let mut count = 0usize;
        let mut widest = 0.0f32;
        for &(a, b) in pairs {
            let mut linking = 0usize;
            for edge in self.edges_between(a, b) {
                linking += 1;
                widest = widest.max(label_width(&edge.name, self.config));
            }
            count = count.max(linking);
        }
        let config = self.config;
        if horizontal {
            channel_gap(count, widest, config.label_min_width, config)
        } else {
            channel_gap(count, config.label_height, config.label_height, config)
        }
    }

    fn edges_between<'s>(&'s self, a: &'s str, b: &'s str) -> impl Iterator<Item = &'a Edge> + 's {
        let within = move |root: &str, id: &str| self.index.in_subtree(root, id);
        self.edges.iter().filter(move |edge| {
            (within(a, &edge.source) && within(b, &edge.target))
                || (within(b, &edge.source) && within(a, &edge.target))
        })
    }

    fn place(&self, id: &str, x: f32, y: f32, out: &mut BTreeMap<String, Rect>) {
        let (w, h) = self.size(id);
        let x = self.config.snap(x);
        let y = self.config.snap(y);
        out.insert(
            id.to_string(),
            Rect {
                x,
                y,
                w,
                h,
                expanded: self.is_expanded(id),
                has_children: self.index.has_children(id),
            },
        );
        let Some(grid) = self.grids.get(id) else {
            return;
        };
        let left = x + self.config.padding;
        let top = y + self.config.header + self.config.padding;
        for (i, child) in self.index.children(id).iter().enumerate() {
            self.place(
                child,
                left + grid.col_x[i % grid.cols],
                top + grid.row_y[i / grid.cols],
                out,
            );
        }
    }
}
