use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance(self, other: Point) -> f32 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    pub fn midpoint(self, other: Point) -> Point {
        Point::new((self.x + other.x) / 2.0, (self.y + other.y) / 2.0)
    }
}

/// A block rectangle. Produced by the packer, so every field is a multiple of
/// the layout grid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
    pub expanded: bool,
    pub has_children: bool,
}

impl Rect {
    pub fn leaf(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self {
            x,
            y,
            w,
            h,
            expanded: false,
            has_children: false,
        }
    }

    pub fn right(&self) -> f32 {
        self.x + self.w
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.h
    }

    pub fn center(&self) -> Point {
        Point::new(self.x + self.w / 2.0, self.y + self.h / 2.0)
    }

    /// Expanded containers are drawn as frames; everything else is a solid block.
    pub fn is_container(&self) -> bool {
        self.expanded && self.has_children
    }

    pub fn translate(&self, dx: f32, dy: f32) -> Rect {
        Rect {
            x: self.x + dx,
            y: self.y + dy,
            ..*self
        }
    }

    pub fn bounds(&self) -> Bounds {
        Bounds::new(self.x, self.y, self.w, self.h)
    }

    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.x && point.x <= self.right() && point.y >= self.y && point.y <= self.bottom()
    }

    pub fn overlaps(&self, other: &Rect) -> bool {
        self.bounds().overlaps(&other.bounds())
    }
}

/// Plain float box used for labels, obstacles and scene extents.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Bounds {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl Bounds {
    pub const fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self { x, y, w, h }
    }

    pub fn right(&self) -> f32 {
        self.x + self.w
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.h
    }

    pub fn center(&self) -> Point {
        Point::new(self.x + self.w / 2.0, self.y + self.h / 2.0)
    }

    pub fn overlaps(&self, other: &Bounds) -> bool {
        self.x < other.right() && self.right() > other.x && self.y < other.bottom() && self.bottom() > other.y
    }

    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.x && point.x <= self.right() && point.y >= self.y && point.y <= self.bottom()
    }

    pub fn inflate(&self, pad: f32) -> Bounds {
        Bounds::new(self.x - pad, self.y - pad, self.w + pad * 2.0, self.h + pad * 2.0)
    }

    pub fn union(&self, other: &Bounds) -> Bounds {
        let x0 = self.x.min(other.x);
        let y0 = self.y.min(other.y);
        let x1 = self.right().max(other.right());
        let y1 = self.bottom().max(other.bottom());
        Bounds::new(x0, y0, x1 - x0, y1 - y0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Top,
    Bottom,
    Left,
    Right,
}

impl Side {
    /// Top and bottom anchors leave the block vertically.
    pub fn exits_vertically(self) -> bool {
        matches!(self, Side::Top | Side::Bottom)
    }

    /// Unit step pointing away from the block.
    pub fn outward(self) -> (f32, f32) {
        match self {
            Side::Top => (0.0, -1.0),
            Side::Bottom => (0.0, 1.0),
            Side::Left => (-1.0, 0.0),
            Side::Right => (1.0, 0.0),
        }
    }
}

/// Position of an anchor along its side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stop {
    Near,
    Center,
    Far,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AnchorId {
    pub side: Side,
    pub stop: Stop,
}

impl AnchorId {
    pub const fn new(side: Side, stop: Stop) -> Self {
        Self { side, stop }
    }

    /// Fraction along the side: quarters on top/bottom, 30/50/70 on the sides.
    pub fn fraction(self) -> f32 {
        match (self.side.exits_vertically(), self.stop) {
            (true, Stop::Near) => 0.25,
            (true, Stop::Far) => 0.75,
            (false, Stop::Near) => 0.3,
            (false, Stop::Far) => 0.7,
            (_, Stop::Center) => 0.5,
        }
    }

    pub fn point_on(self, rect: &Rect) -> Point {
        let t = self.fraction();
        match self.side {
            Side::Top => Point::new(rect.x + rect.w * t, rect.y),
            Side::Bottom => Point::new(rect.x + rect.w * t, rect.bottom()),
            Side::Left => Point::new(rect.x, rect.y + rect.h * t),
            Side::Right => Point::new(rect.right(), rect.y + rect.h * t),
        }
    }
}

impl fmt::Display for AnchorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let side = match self.side {
            Side::Top => "top",
            Side::Bottom => "bottom",
            Side::Left => "left",
            Side::Right => "right",
        };
        let stop = match self.stop {
            Stop::Near => "near",
            Stop::Center => "center",
            Stop::Far => "far",
        };
        write!(f, "{side}-{stop}")
    }
}

/// Candidate order doubles as the nearest-anchor tie-break.
pub const ANCHOR_IDS: [AnchorId; 12] = [
    AnchorId::new(Side::Top, Stop::Center),
    AnchorId::new(Side::Top, Stop::Near),
    AnchorId::new(Side::Top, Stop::Far),
    AnchorId::new(Side::Left, Stop::Center),
    AnchorId::new(Side::Right, Stop::Center),
    AnchorId::new(Side::Bottom, Stop::Center),
    AnchorId::new(Side::Bottom, Stop::Near),
    AnchorId::new(Side::Bottom, Stop::Far),
    AnchorId::new(Side::Left, Stop::Near),
    AnchorId::new(Side::Right, Stop::Near),
    AnchorId::new(Side::Left, Stop::Far),
    AnchorId::new(Side::Right, Stop::Far),
];

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Anchor {
    pub id: AnchorId,
    pub cx: f32,
    pub cy: f32,
}

impl Anchor {
    pub fn point(&self) -> Point {
        Point::new(self.cx, self.cy)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnchorAssignment {
    pub source: Anchor,
    pub target: Anchor,
}

impl AnchorAssignment {
    pub fn same_ids(&self, other: &AnchorAssignment) -> bool {
        self.source.id == other.source.id && self.target.id == other.target.id
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Source,
    Target,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Offset {
    pub dx: f32,
    pub dy: f32,
}

impl Offset {
    pub const ZERO: Offset = Offset { dx: 0.0, dy: 0.0 };

    pub const fn new(dx: f32, dy: f32) -> Self {
        Self { dx, dy }
    }

    pub fn is_zero(&self) -> bool {
        self.dx == 0.0 && self.dy == 0.0
    }
}

impl std::ops::Add for Offset {
    type Output = Offset;

    fn add(self, rhs: Offset) -> Offset {
        Offset::new(self.dx + rhs.dx, self.dy + rhs.dy)
    }
}

impl std::ops::AddAssign for Offset {
    fn add_assign(&mut self, rhs: Offset) {
        self.dx += rhs.dx;
        self.dy += rhs.dy;
    }
}

/// Straight, axis-aligned piece of a routed path.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub from: Point,
    pub to: Point,
}

impl Segment {
    pub const fn new(from: Point, to: Point) -> Self {
        Self { from, to }
    }

    pub fn is_horizontal(&self) -> bool {
        (self.from.y - self.to.y).abs() <= 1e-4
    }

    pub fn is_vertical(&self) -> bool {
        (self.from.x - self.to.x).abs() <= 1e-4
    }

    pub fn length(&self) -> f32 {
        self.from.distance(self.to)
    }
}

/// Both halves of an edge: source anchor to label center, label center to
/// target anchor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeRoute {
    pub source_leg: Vec<Segment>,
    pub target_leg: Vec<Segment>,
}

impl EdgeRoute {
    pub fn segments(&self) -> impl Iterator<Item = &Segment> {
        self.source_leg.iter().chain(self.target_leg.iter())
    }
}

/// Boundary stub for an edge leaving the focused subtree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalStub {
    pub edge_id: String,
    pub inside: String,
    pub outside: String,
    pub path: Vec<Segment>,
}

/// Everything the engine hands to a rendering surface for one pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ViewLayout {
    pub rects: BTreeMap<String, Rect>,
    pub anchors: BTreeMap<String, AnchorAssignment>,
    pub labels: BTreeMap<String, Bounds>,
    pub routes: BTreeMap<String, EdgeRoute>,
    pub external: Vec<ExternalStub>,
    pub visible: BTreeSet<String>,
    pub bounds: Option<Bounds>,
}

impl ViewLayout {
    /// Smallest visible rect containing `point`, skipping `exclude`.
    pub fn hit_test(&self, point: Point, exclude: Option<&str>) -> Option<&str> {
        let mut best: Option<(&str, f32)> = None;
        for (id, rect) in &self.rects {
            if Some(id.as_str()) == exclude || !rect.contains(point) {
                continue;
            }
            let area = rect.w * rect.h;
            if best.is_none_or(|(_, best_area)| area < best_area) {
                best = Some((id.as_str(), area));
            }
        }
        best.map(|(id, _)| id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anchor_ids_are_unique() {
        let set: BTreeSet<AnchorId> = ANCHOR_IDS.iter().copied().collect();
        assert_eq!(set.len(), ANCHOR_IDS.len());
    }

    #[test]
    fn anchor_points_sit_on_the_perimeter() {
        let rect = Rect::leaf(0.0, 0.0, 200.0, 100.0);
        assert_eq!(AnchorId::new(Side::Top, Stop::Near).point_on(&rect), Point::new(50.0, 0.0));
        assert_eq!(AnchorId::new(Side::Bottom, Stop::Far).point_on(&rect), Point::new(150.0, 100.0));
        assert_eq!(AnchorId::new(Side::Left, Stop::Near).point_on(&rect), Point::new(0.0, 30.0));
        assert_eq!(AnchorId::new(Side::Right, Stop::Far).point_on(&rect), Point::new(200.0, 70.0));
    }

    #[test]
    fn hit_test_prefers_smallest_rect() {
        let mut layout = ViewLayout::default();
        layout.rects.insert("outer".into(), Rect::leaf(0.0, 0.0, 400.0, 400.0));
        layout.rects.insert("inner".into(), Rect::leaf(100.0, 100.0, 50.0, 50.0));
        assert_eq!(layout.hit_test(Point::new(120.0, 120.0), None), Some("inner"));
        assert_eq!(layout.hit_test(Point::new(120.0, 120.0), Some("inner")), Some("outer"));
        assert_eq!(layout.hit_test(Point::new(900.0, 0.0), None), None);
    }
}
