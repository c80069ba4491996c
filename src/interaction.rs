use crate::config::{Config, snap_to};
use crate::ir::{Diagram, DiagramIndex};
use crate::layout::{
    AnchorId, FocusMode, Offset, Point, Role, ViewLayout, connection_expansion, connection_required, nearest_anchor,
    nudge_subtree,
};
use crate::state::ViewState;
use std::collections::BTreeSet;

/// Turns raw pointer motion into grid-sized commits. Deltas accumulate in
/// engine units; only the change in the snapped total is handed out, so a
/// slow drag neither drifts nor jitters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DragAccumulator {
    grid: f32,
    raw: Offset,
    applied: Offset,
}

impl DragAccumulator {
    pub fn new(grid: f32) -> Self {
        Self {
            grid,
            ..Self::default()
        }
    }

    /// Feed a screen-space delta at `zoom`; returns the increment to commit.
    pub fn feed(&mut self, dx: f32, dy: f32, zoom: f32) -> Offset {
        let zoom = if zoom > 0.0 { zoom } else { 1.0 };
        self.raw += Offset::new(dx / zoom, dy / zoom);
        let snapped = Offset::new(snap_to(self.raw.dx, self.grid), snap_to(self.raw.dy, self.grid));
        let delta = Offset::new(snapped.dx - self.applied.dx, snapped.dy - self.applied.dy);
        self.applied = snapped;
        delta
    }

    /// Everything committed so far.
    pub fn committed(&self) -> Offset {
        self.applied
    }
}

/// The one pointer interaction in progress.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Gesture {
    #[default]
    Idle,
    NodeDrag {
        node: String,
        last: Point,
        drag: DragAccumulator,
    },
    LabelDrag {
        edge: String,
        last: Point,
        drag: DragAccumulator,
    },
    /// Engine-space pointer; nothing is committed until release.
    AnchorDrag {
        edge: String,
        role: Role,
        pointer: Point,
    },
    Pan {
        last: Point,
    },
    Connect {
        source: String,
        pointer: Point,
    },
}

impl Gesture {
    pub fn is_idle(&self) -> bool {
        matches!(self, Gesture::Idle)
    }
}

/// What a pointer-down landed on.
#[derive(Debug, Clone, PartialEq)]
pub enum PointerTarget {
    Canvas,
    Node(String),
    Label(String),
    Anchor { edge: String, role: Role },
    /// Connection handle on a block; starts a connect gesture.
    Port(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ViewEvent {
    ToggleExpand(String),
    SetFocus(Option<String>),
    ToggleReveal(String),
    EnterConnectionFocus(String),
    ExitConnectionFocus,
    PointerDown { target: PointerTarget, screen: Point },
    PointerMove { screen: Point },
    PointerUp { screen: Point },
    Wheel { screen: Point, delta_y: f32 },
    ZoomBy { screen: Point, amount: f32 },
    SetTypeFilter(Option<BTreeSet<String>>),
    ClearOffsets,
    SetAnchorOverride { edge: String, role: Role, anchor: AnchorId },
    ClearAnchorOverride { edge: String, role: Role },
}

/// Requests the engine hands back to its host instead of acting on.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// A connect gesture ended over `target`; the host decides whether to
    /// create the edge.
    RequestEdge { source: String, target: String },
}

/// Read-only inputs the reducer consults.
pub struct Context<'a> {
    pub diagram: &'a Diagram,
    pub index: &'a DiagramIndex,
    pub layout: &'a ViewLayout,
    pub config: &'a Config,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub state: ViewState,
    pub effect: Option<Effect>,
    /// Geometry inputs changed; the view must be recomputed.
    pub relayout: bool,
    /// Pending animation frames must be dropped.
    pub cancel_animation: bool,
}

impl Transition {
    fn unchanged(state: &ViewState) -> Self {
        Self::new(state.clone())
    }

    fn new(state: ViewState) -> Self {
        Self {
            state,
            effect: None,
            relayout: false,
            cancel_animation: false,
        }
    }

    fn relayout(mut self) -> Self {
        self.relayout = true;
        self
    }
}

/// Pure state transition for one input event.
pub fn reduce(state: &ViewState, event: &ViewEvent, cx: &Context<'_>) -> Transition {
    let mut next = state.clone();
    match event {
        ViewEvent::ToggleExpand(id) => {
            if !cx.index.has_children(id) {
                return Transition::unchanged(state);
            }
            if !next.expanded.remove(id) {
                next.expanded.insert(id.clone());
            }
            let clear = cx.config.interaction.clear_offsets_on_toggle;
            if clear {
                next.clear_offsets();
            }
            let mut t = Transition::new(next).relayout();
            t.cancel_animation = clear;
            t
        }
        ViewEvent::SetFocus(focus) => {
            leave_connection_focus(&mut next);
            next.focus = match focus {
                Some(id) if cx.index.contains(id) => FocusMode::Focus {
                    node: id.clone(),
                    revealed: BTreeSet::new(),
                },
                Some(id) => {
                    log::debug!("focus on unknown node {id} ignored");
                    return Transition::unchanged(state);
                }
                None => FocusMode::All,
            };
            Transition::new(next).relayout()
        }
        ViewEvent::ToggleReveal(id) => {
            let FocusMode::Focus { revealed, .. } = &mut next.focus else {
                return Transition::unchanged(state);
            };
            if !revealed.remove(id) {
                revealed.insert(id.clone());
            }
            Transition::new(next).relayout()
        }
        ViewEvent::EnterConnectionFocus(id) => {
            if !cx.index.contains(id) {
                return Transition::unchanged(state);
            }
            leave_connection_focus(&mut next);
            let saved_expansion = next.expanded.clone();
            let required = connection_required(&cx.diagram.edges, cx.index, id);
            next.expanded = connection_expansion(&required, cx.index, id);
            next.focus = FocusMode::ConnectionFocus {
                node: id.clone(),
                saved_expansion,
            };
            Transition::new(next).relayout()
        }
        ViewEvent::ExitConnectionFocus => {
            if !leave_connection_focus(&mut next) {
                return Transition::unchanged(state);
            }
            next.focus = FocusMode::All;
            Transition::new(next).relayout()
        }
        ViewEvent::PointerDown { target, screen } => {
            if !state.gesture.is_idle() {
                return Transition::unchanged(state);
            }
            let grid = cx.config.layout.grid;
            let engine = state.viewport.to_engine(*screen);
            next.gesture = match target {
                PointerTarget::Canvas => Gesture::Pan { last: *screen },
                PointerTarget::Node(node) => Gesture::NodeDrag {
                    node: node.clone(),
                    last: *screen,
                    drag: DragAccumulator::new(grid),
                },
                PointerTarget::Label(edge) => Gesture::LabelDrag {
                    edge: edge.clone(),
                    last: *screen,
                    drag: DragAccumulator::new(grid),
                },
                PointerTarget::Anchor { edge, role } => Gesture::AnchorDrag {
                    edge: edge.clone(),
                    role: *role,
                    pointer: engine,
                },
                PointerTarget::Port(node) => Gesture::Connect {
                    source: node.clone(),
                    pointer: engine,
                },
            };
            Transition::new(next)
        }
        ViewEvent::PointerMove { screen } => pointer_move(next, *screen, cx),
        ViewEvent::PointerUp { screen } => pointer_up(next, *screen, cx),
        ViewEvent::Wheel { screen, delta_y } => {
            next.viewport.wheel(*screen, *delta_y, &cx.config.interaction);
            Transition::new(next)
        }
        ViewEvent::ZoomBy { screen, amount } => {
            next.viewport.zoom_at(*screen, *amount, &cx.config.interaction);
            Transition::new(next)
        }
        ViewEvent::SetTypeFilter(filter) => {
            next.type_filter = filter.clone();
            Transition::new(next).relayout()
        }
        ViewEvent::ClearOffsets => {
            next.clear_offsets();
            let mut t = Transition::new(next).relayout();
            t.cancel_animation = true;
            t
        }
        ViewEvent::SetAnchorOverride { edge, role, anchor } => {
            next.overrides.set(edge, *role, *anchor);
            Transition::new(next).relayout()
        }
        ViewEvent::ClearAnchorOverride { edge, role } => {
            next.overrides.clear(edge, *role);
            Transition::new(next).relayout()
        }
    }
}

/// Restore the pre-connection-focus expansion. Returns whether the mode was
/// active.
fn leave_connection_focus(state: &mut ViewState) -> bool {
    let FocusMode::ConnectionFocus { saved_expansion, .. } = &mut state.focus else {
        return false;
    };
    state.expanded = std::mem::take(saved_expansion);
    state.focus = FocusMode::All;
    true
}

fn pointer_move(mut next: ViewState, screen: Point, cx: &Context<'_>) -> Transition {
    let zoom = next.viewport.zoom;
    let engine = next.viewport.to_engine(screen);
    let mut relayout = false;
    match &mut next.gesture {
        Gesture::Idle => {}
        Gesture::NodeDrag { node, last, drag } => {
            let delta = drag.feed(screen.x - last.x, screen.y - last.y, zoom);
            *last = screen;
            if !delta.is_zero() {
                let node = node.clone();
                nudge_subtree(&mut next.node_offsets, cx.index, &node, delta);
                relayout = true;
            }
        }
        Gesture::LabelDrag { edge, last, drag } => {
            let delta = drag.feed(screen.x - last.x, screen.y - last.y, zoom);
            *last = screen;
            if !delta.is_zero() {
                *next.label_offsets.entry(edge.clone()).or_default() += delta;
                relayout = true;
            }
        }
        Gesture::AnchorDrag { pointer, .. } | Gesture::Connect { pointer, .. } => {
            *pointer = engine;
        }
        Gesture::Pan { last } => {
            let (dx, dy) = (screen.x - last.x, screen.y - last.y);
            *last = screen;
            next.viewport.pan = Point::new(next.viewport.pan.x + dx, next.viewport.pan.y + dy);
        }
    }
    let t = Transition::new(next);
    if relayout { t.relayout() } else { t }
}

fn pointer_up(mut next: ViewState, screen: Point, cx: &Context<'_>) -> Transition {
    let engine = next.viewport.to_engine(screen);
    let gesture = std::mem::take(&mut next.gesture);
    match gesture {
        Gesture::AnchorDrag { edge, role, .. } => {
            let Some(anchor) = release_anchor(&edge, role, engine, cx) else {
                return Transition::new(next);
            };
            next.overrides.set(&edge, role, anchor);
            Transition::new(next).relayout()
        }
        Gesture::Connect { source, .. } => {
            let target = cx.layout.hit_test(engine, Some(source.as_str())).map(str::to_string);
            let mut t = Transition::new(next);
            t.effect = target.map(|target| Effect::RequestEdge { source, target });
            t
        }
        _ => Transition::new(next),
    }
}

/// Nearest candidate on the endpoint's own block, if the pointer was released
/// on or within one grid unit of it.
fn release_anchor(edge: &str, role: Role, pointer: Point, cx: &Context<'_>) -> Option<AnchorId> {
    let edge = cx.diagram.edges.iter().find(|e| e.id == edge)?;
    let node = match role {
        Role::Source => &edge.source,
        Role::Target => &edge.target,
    };
    let rect = cx.layout.rects.get(node)?;
    if !rect.bounds().inflate(cx.config.layout.grid).contains(pointer) {
        log::debug!("anchor drag for {} released away from {node}; discarded", edge.id);
        return None;
    }
    nearest_anchor(rect, pointer, None).map(|anchor| anchor.id)
}
