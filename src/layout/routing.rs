use super::types::{AnchorAssignment, Bounds, EdgeRoute, Point, Rect, Segment, Side};
use crate::config::LayoutConfig;
use crate::ir::Edge;
use std::collections::BTreeMap;

/// One end of a half-route. `exit` is `None` for a free point such as a label
/// center.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RouteEnd {
    pub point: Point,
    pub exit: Option<Side>,
}

impl RouteEnd {
    pub fn anchored(point: Point, exit: Side) -> Self {
        Self {
            point,
            exit: Some(exit),
        }
    }

    pub fn free(point: Point) -> Self {
        Self { point, exit: None }
    }

    fn flipped(self) -> Self {
        Self {
            point: flip(self.point),
            exit: self.exit.map(flip_side),
        }
    }
}

/// Orthogonal path from `start` to `end` that tries to stay clear of
/// `obstacles`. Never fails: when no clear channel exists within the search
/// bound the path with the fewest crossings is returned.
pub fn route(start: RouteEnd, end: RouteEnd, obstacles: &[Rect], config: &LayoutConfig) -> Vec<Segment> {
    if start.exit.is_none() && end.exit.is_some() {
        let mut segments = route(end, start, obstacles, config);
        segments.reverse();
        for segment in &mut segments {
            std::mem::swap(&mut segment.from, &mut segment.to);
        }
        return segments;
    }

    let blocks: Vec<Bounds> = obstacles
        .iter()
        .map(|rect| rect.bounds().inflate(-config.router_margin))
        .collect();
    let vertical = |e: RouteEnd| e.exit.map(Side::exits_vertically);
    let points = match (vertical(start), vertical(end)) {
        (Some(true), Some(false)) | (Some(false), Some(true)) => {
            elbow(start, end, &blocks).unwrap_or_else(|| vhv(start, end, &blocks, config))
        }
        (Some(true), _) => vhv(start, end, &blocks, config),
        (Some(false), _) => hvh(start, end, &blocks, config),
        (None, _) => {
            let dx = (end.point.x - start.point.x).abs();
            let dy = (end.point.y - start.point.y).abs();
            if dx >= dy {
                hvh(start, end, &blocks, config)
            } else {
                vhv(start, end, &blocks, config)
            }
        }
    };
    to_segments(&compress_path(&points))
}

/// Route both halves of an edge through its label center, avoiding every
/// solid block except the edge's own endpoints.
pub fn route_edge(
    edge: &Edge,
    assignment: &AnchorAssignment,
    label: &Bounds,
    rects: &BTreeMap<String, Rect>,
    config: &LayoutConfig,
) -> EdgeRoute {
    let obstacles: Vec<Rect> = rects
        .iter()
        .filter(|(id, rect)| !rect.is_container() && **id != edge.source && **id != edge.target)
        .map(|(_, rect)| *rect)
        .collect();
    let center = label.center();
    let source = RouteEnd::anchored(assignment.source.point(), assignment.source.id.side);
    let target = RouteEnd::anchored(assignment.target.point(), assignment.target.id.side);
    EdgeRoute {
        source_leg: route(source, RouteEnd::free(center), &obstacles, config),
        target_leg: route(RouteEnd::free(center), target, &obstacles, config),
    }
}

pub fn route_edges(
    edges: &[&Edge],
    anchors: &BTreeMap<String, AnchorAssignment>,
    labels: &BTreeMap<String, Bounds>,
    rects: &BTreeMap<String, Rect>,
    config: &LayoutConfig,
) -> BTreeMap<String, EdgeRoute> {
    let mut out = BTreeMap::new();
    for edge in edges {
        let (Some(assignment), Some(label)) = (anchors.get(&edge.id), labels.get(&edge.id)) else {
            continue;
        };
        out.insert(edge.id.clone(), route_edge(edge, assignment, label, rects, config));
    }
    out
}

// ── Path construction ───────────────────────────────────────────────

fn flip(p: Point) -> Point {
    Point::new(p.y, p.x)
}

fn flip_side(side: Side) -> Side {
    match side {
        Side::Top => Side::Left,
        Side::Bottom => Side::Right,
        Side::Left => Side::Top,
        Side::Right => Side::Bottom,
    }
}

fn flip_bounds(b: &Bounds) -> Bounds {
    Bounds::new(b.y, b.x, b.h, b.w)
}

/// Horizontal-vertical-horizontal: the vertical construction on transposed
/// coordinates.
fn hvh(start: RouteEnd, end: RouteEnd, blocks: &[Bounds], config: &LayoutConfig) -> Vec<Point> {
    let flipped: Vec<Bounds> = blocks.iter().map(flip_bounds).collect();
    vhv(start.flipped(), end.flipped(), &flipped, config)
        .into_iter()
        .map(flip)
        .collect()
}

/// Two-segment elbow leaving `start` along its exit axis. `None` if blocked.
fn elbow(start: RouteEnd, end: RouteEnd, blocks: &[Bounds]) -> Option<Vec<Point>> {
    let (a, b) = (start.point, end.point);
    let corner = if start.exit.is_some_and(Side::exits_vertically) {
        Point::new(a.x, b.y)
    } else {
        Point::new(b.x, a.y)
    };
    let path = vec![a, corner, b];
    (path_crossings(&path, blocks) == 0).then_some(path)
}

/// 0, +1, -1, +2, -2, ... grid steps.
fn search_offsets(steps: usize, grid: f32) -> impl Iterator<Item = f32> {
    std::iter::once(0.0).chain((1..=steps).flat_map(move |k| {
        let d = k as f32 * grid;
        [d, -d]
    }))
}

/// Vertical-horizontal-vertical with a searched crossbar and at most one leg
/// detour.
fn vhv(start: RouteEnd, end: RouteEnd, blocks: &[Bounds], config: &LayoutConfig) -> Vec<Point> {
    let (a, b) = (start.point, end.point);
    let mid = (a.y + b.y) / 2.0;

    let mut best: Option<(usize, Vec<Point>)> = None;
    for offset in search_offsets(config.router_search_steps, config.grid) {
        let y = mid + offset;
        let path = vec![a, Point::new(a.x, y), Point::new(b.x, y), b];
        let crossings = path_crossings(&path, blocks);
        if best.as_ref().is_none_or(|(fewest, _)| crossings < *fewest) {
            best = Some((crossings, path));
        }
        if crossings == 0 {
            break;
        }
    }
    let Some((crossings, path)) = best else {
        return vec![a, b];
    };
    if crossings == 0 {
        return path;
    }

    let bar = path[1].y;
    let leg_blocked = |from: Point, to: Point| path_crossings(&[from, to], blocks) > 0;
    if leg_blocked(a, path[1])
        && let Some(detoured) = detour(start, bar, b, blocks, config)
    {
        return detoured;
    }
    if leg_blocked(path[2], b)
        && let Some(mut detoured) = detour(end, bar, a, blocks, config)
    {
        detoured.reverse();
        return detoured;
    }
    log::debug!(
        "no clear channel between ({}, {}) and ({}, {}); accepting {} crossings",
        a.x,
        a.y,
        b.x,
        b.y,
        crossings
    );
    path
}

/// Exit stub from `end`, jog sideways to a clear channel, then run to the
/// crossbar at `bar` and on to `other`.
fn detour(end: RouteEnd, bar: f32, other: Point, blocks: &[Bounds], config: &LayoutConfig) -> Option<Vec<Point>> {
    let side = end.exit.filter(|side| side.exits_vertically())?;
    let a = end.point;
    let stub = a.y + side.outward().1 * config.grid;
    for offset in search_offsets(config.router_search_steps, config.grid).skip(1) {
        let x = a.x + offset;
        let jog = [Point::new(a.x, stub), Point::new(x, stub), Point::new(x, bar)];
        if path_crossings(&jog, blocks) > 0 {
            continue;
        }
        let mut path = vec![a];
        path.extend(jog);
        path.push(Point::new(other.x, bar));
        path.push(other);
        return Some(path);
    }
    None
}

// ── Geometry helpers ────────────────────────────────────────────────

/// Drop repeated points and interior points on a straight run.
pub fn compress_path(points: &[Point]) -> Vec<Point> {
    let same = |p: Point, q: Point| (p.x - q.x).abs() <= 1e-4 && (p.y - q.y).abs() <= 1e-4;
    let mut out: Vec<Point> = Vec::with_capacity(points.len());
    for &point in points {
        if out.last().is_some_and(|&last| same(last, point)) {
            continue;
        }
        if out.len() >= 2 {
            let prev = out[out.len() - 2];
            let curr = out[out.len() - 1];
            let straight_x = (prev.x - curr.x).abs() <= 1e-4 && (curr.x - point.x).abs() <= 1e-4;
            let straight_y = (prev.y - curr.y).abs() <= 1e-4 && (curr.y - point.y).abs() <= 1e-4;
            if straight_x || straight_y {
                out.pop();
            }
        }
        out.push(point);
    }
    out
}

fn to_segments(points: &[Point]) -> Vec<Segment> {
    points
        .windows(2)
        .map(|pair| Segment::new(pair[0], pair[1]))
        .collect()
}

/// Number of (segment, block) pairs that touch.
pub fn path_crossings(points: &[Point], blocks: &[Bounds]) -> usize {
    points
        .windows(2)
        .map(|pair| {
            blocks
                .iter()
                .filter(|block| segment_intersects_rect(pair[0], pair[1], block))
                .count()
        })
        .sum()
}

pub fn segment_intersects_rect(a: Point, b: Point, rect: &Bounds) -> bool {
    let min_x = a.x.min(b.x);
    let max_x = a.x.max(b.x);
    let min_y = a.y.min(b.y);
    let max_y = a.y.max(b.y);
    if max_x < rect.x || min_x > rect.right() || max_y < rect.y || min_y > rect.bottom() {
        return false;
    }
    let inside = |p: Point| p.x >= rect.x && p.x <= rect.right() && p.y >= rect.y && p.y <= rect.bottom();
    if inside(a) || inside(b) {
        return true;
    }
    let corners = [
        Point::new(rect.x, rect.y),
        Point::new(rect.right(), rect.y),
        Point::new(rect.right(), rect.bottom()),
        Point::new(rect.x, rect.bottom()),
    ];
    (0..4).any(|i| segments_intersect(a, b, corners[i], corners[(i + 1) % 4]))
}

pub fn segments_intersect(a: Point, b: Point, c: Point, d: Point) -> bool {
    fn orient(a: Point, b: Point, c: Point) -> f32 {
        (b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x)
    }
    fn on_segment(a: Point, b: Point, c: Point) -> bool {
        c.x >= a.x.min(b.x) - 1e-6
            && c.x <= a.x.max(b.x) + 1e-6
            && c.y >= a.y.min(b.y) - 1e-6
            && c.y <= a.y.max(b.y) + 1e-6
    }
    let o1 = orient(a, b, c);
    let o2 = orient(a, b, d);
    let o3 = orient(c, d, a);
    let o4 = orient(c, d, b);
    if (o1 > 0.0 && o2 < 0.0 || o1 < 0.0 && o2 > 0.0) && (o3 > 0.0 && o4 < 0.0 || o3 < 0.0 && o4 > 0.0) {
        return true;
    }
    (o1.abs() <= 1e-6 && on_segment(a, b, c))
        || (o2.abs() <= 1e-6 && on_segment(a, b, d))
        || (o3.abs() <= 1e-6 && on_segment(c, d, a))
        || (o4.abs() <= 1e-6 && on_segment(c, d, b))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blocks(rects: &[Rect], config: &LayoutConfig) -> Vec<Bounds> {
        rects
            .iter()
            .map(|r| r.bounds().inflate(-config.router_margin))
            .collect()
    }

    fn points(segments: &[Segment]) -> Vec<Point> {
        let mut out: Vec<Point> = segments.iter().map(|s| s.from).collect();
        if let Some(last) = segments.last() {
            out.push(last.to);
        }
        out
    }

    fn bend_count(segments: &[Segment]) -> usize {
        segments
            .windows(2)
            .filter(|pair| pair[0].is_horizontal() != pair[1].is_horizontal())
            .count()
    }

    fn assert_orthogonal(segments: &[Segment]) {
        for s in segments {
            assert!(s.is_horizontal() || s.is_vertical(), "diagonal segment {s:?}");
        }
    }

    #[test]
    fn straight_run_to_label_is_one_segment() {
        let config = LayoutConfig::default();
        let segments = route(
            RouteEnd::anchored(Point::new(252.0, 84.0), Side::Right),
            RouteEnd::free(Point::new(336.0, 84.0)),
            &[],
            &config,
        );
        assert_eq!(segments, vec![Segment::new(Point::new(252.0, 84.0), Point::new(336.0, 84.0))]);
    }

    #[test]
    fn vertical_ends_get_three_segments_through_midpoint() {
        let config = LayoutConfig::default();
        let segments = route(
            RouteEnd::anchored(Point::new(100.0, 112.0), Side::Bottom),
            RouteEnd::anchored(Point::new(300.0, 300.0), Side::Top),
            &[],
            &config,
        );
        assert_eq!(segments.len(), 3);
        assert_eq!(segments[1].from.y, 206.0);
        assert_orthogonal(&segments);
    }

    #[test]
    fn crossbar_steps_around_obstacle() {
        let config = LayoutConfig::default();
        let wall = [Rect::leaf(150.0, 230.0, 100.0, 60.0)];
        let segments = route(
            RouteEnd::anchored(Point::new(100.0, 112.0), Side::Bottom),
            RouteEnd::anchored(Point::new(300.0, 400.0), Side::Top),
            &wall,
            &config,
        );
        assert_eq!(segments.len(), 3);
        assert_eq!(segments[1].from.y, 228.0);
        assert_eq!(path_crossings(&points(&segments), &blocks(&wall, &config)), 0);
    }

    #[test]
    fn blocked_leg_takes_a_detour() {
        let config = LayoutConfig::default();
        let pillar = [Rect::leaf(60.0, 140.0, 80.0, 960.0)];
        let segments = route(
            RouteEnd::anchored(Point::new(100.0, 112.0), Side::Bottom),
            RouteEnd::anchored(Point::new(600.0, 1200.0), Side::Top),
            &pillar,
            &config,
        );
        assert_eq!(segments.len(), 5);
        assert_eq!(segments[0].to, Point::new(100.0, 140.0));
        assert_eq!(segments[1].to.x, 156.0);
        assert_eq!(path_crossings(&points(&segments), &blocks(&pillar, &config)), 0);
        assert_orthogonal(&segments);
    }

    #[test]
    fn mixed_ends_use_an_elbow() {
        let config = LayoutConfig::default();
        let segments = route(
            RouteEnd::anchored(Point::new(100.0, 112.0), Side::Bottom),
            RouteEnd::anchored(Point::new(300.0, 300.0), Side::Left),
            &[],
            &config,
        );
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].to, Point::new(100.0, 300.0));
        assert_eq!(bend_count(&segments), 1);
    }

    #[test]
    fn blocked_elbow_corner_falls_back_to_crossbar() {
        let config = LayoutConfig::default();
        let corner = [Rect::leaf(60.0, 260.0, 80.0, 80.0)];
        let segments = route(
            RouteEnd::anchored(Point::new(100.0, 112.0), Side::Bottom),
            RouteEnd::anchored(Point::new(300.0, 300.0), Side::Left),
            &corner,
            &config,
        );
        assert_eq!(segments.len(), 3);
        assert_eq!(segments[1].from, Point::new(100.0, 206.0));
        assert_eq!(segments[1].to, Point::new(300.0, 206.0));
        assert_eq!(path_crossings(&points(&segments), &blocks(&corner, &config)), 0);
    }

    #[test]
    fn no_clear_channel_still_joins_both_ends() {
        let config = LayoutConfig::default();
        let wall = [Rect::leaf(-2000.0, 150.0, 4000.0, 2000.0)];
        let start = Point::new(100.0, 112.0);
        let end = Point::new(300.0, 3000.0);
        let segments = route(
            RouteEnd::anchored(start, Side::Bottom),
            RouteEnd::anchored(end, Side::Top),
            &wall,
            &config,
        );
        assert!(!segments.is_empty() && segments.len() <= 5);
        assert_eq!(segments.first().map(|s| s.from), Some(start));
        assert_eq!(segments.last().map(|s| s.to), Some(end));
        for pair in segments.windows(2) {
            assert_eq!(pair[0].to, pair[1].from);
        }
        assert_orthogonal(&segments);
    }

    #[test]
    fn free_start_is_routed_from_the_anchored_end() {
        let config = LayoutConfig::default();
        let label = Point::new(336.0, 140.0);
        let segments = route(
            RouteEnd::free(label),
            RouteEnd::anchored(Point::new(420.0, 84.0), Side::Left),
            &[],
            &config,
        );
        assert_eq!(segments.first().map(|s| s.from), Some(label));
        assert_eq!(segments.last().map(|s| s.to), Some(Point::new(420.0, 84.0)));
        assert_orthogonal(&segments);
    }

    #[test]
    fn flush_path_is_not_a_crossing() {
        let config = LayoutConfig::default();
        let block = blocks(&[Rect::leaf(0.0, 0.0, 100.0, 100.0)], &config);
        let along_edge = [Point::new(-50.0, 100.0), Point::new(150.0, 100.0)];
        let through = [Point::new(-50.0, 50.0), Point::new(150.0, 50.0)];
        assert_eq!(path_crossings(&along_edge, &block), 0);
        assert_eq!(path_crossings(&through, &block), 1);
    }

    #[test]
    fn compress_path_removes_duplicates_and_collinear_points() {
        let pts = [
            Point::new(0.0, 0.0),
            Point::new(0.0, 0.0),
            Point::new(0.0, 10.0),
            Point::new(0.0, 20.0),
            Point::new(30.0, 20.0),
        ];
        assert_eq!(
            compress_path(&pts),
            vec![Point::new(0.0, 0.0), Point::new(0.0, 20.0), Point::new(30.0, 20.0)]
        );
    }
}
