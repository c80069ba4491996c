use crate::animation::{AnchorAnimator, Clock, FrameToken, SystemClock};
use crate::config::Config;
use crate::interaction::{Context, Effect, ViewEvent, reduce};
use crate::ir::{Diagram, DiagramIndex, Edge, ModelError};
use crate::layout::{Offset, ViewLayout, compute_view, reflow_edges};
use crate::state::ViewState;

/// Result of feeding one event to a [`Session`].
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    pub effect: Option<Effect>,
    /// Schedule a frame with this token to play the anchor run it started.
    pub frame: Option<FrameToken>,
}

/// One open diagram: the model, its view state, the last computed layout and
/// the anchor animator. Every mutation goes through [`Session::dispatch`] or
/// [`Session::add_edge`].
pub struct Session<C: Clock = SystemClock> {
    diagram: Diagram,
    index: DiagramIndex,
    config: Config,
    state: ViewState,
    layout: ViewLayout,
    animator: AnchorAnimator,
    clock: C,
}

impl Session<SystemClock> {
    pub fn open(diagram: Diagram, config: Config) -> Result<Self, ModelError> {
        Self::with_clock(diagram, config, SystemClock::default())
    }
}

impl<C: Clock> Session<C> {
    pub fn with_clock(diagram: Diagram, config: Config, clock: C) -> Result<Self, ModelError> {
        diagram.validate()?;
        let index = DiagramIndex::new(&diagram.nodes);
        let mut state = ViewState::default();
        state.viewport.zoom = config.interaction.initial_zoom;
        let layout = compute_view(&diagram, &index, &state, &config.layout);
        let mut animator = AnchorAnimator::new(config.animation.duration_ms);
        animator.reset(layout.anchors.clone());
        Ok(Self {
            diagram,
            index,
            config,
            state,
            layout,
            animator,
            clock,
        })
    }

    pub fn diagram(&self) -> &Diagram {
        &self.diagram
    }

    pub fn index(&self) -> &DiagramIndex {
        &self.index
    }

    pub fn state(&self) -> &ViewState {
        &self.state
    }

    /// Settled layout, with anchors at their final positions.
    pub fn layout(&self) -> &ViewLayout {
        &self.layout
    }

    pub fn is_animating(&self) -> bool {
        self.animator.is_animating()
    }

    pub fn dispatch(&mut self, event: ViewEvent) -> Outcome {
        let cx = Context {
            diagram: &self.diagram,
            index: &self.index,
            layout: &self.layout,
            config: &self.config,
        };
        let transition = reduce(&self.state, &event, &cx);
        self.state = transition.state;
        if transition.cancel_animation {
            self.animator.cancel();
        }
        let frame = if transition.relayout {
            self.relayout()
        } else {
            None
        };
        Outcome {
            effect: transition.effect,
            frame,
        }
    }

    fn relayout(&mut self) -> Option<FrameToken> {
        self.layout = compute_view(&self.diagram, &self.index, &self.state, &self.config.layout);
        self.animator
            .retarget(self.layout.anchors.clone(), self.clock.now_ms())
    }

    /// Append an edge created by the host (usually after an
    /// [`Effect::RequestEdge`]). Returns its id and the frame token of any
    /// anchor run the new edge set off.
    pub fn add_edge(
        &mut self,
        source: &str,
        target: &str,
        name: &str,
        interface_type: Option<String>,
    ) -> Result<(String, Option<FrameToken>), ModelError> {
        for id in [source, target] {
            if !self.index.contains(id) {
                return Err(ModelError::UnknownNode(id.to_string()));
            }
        }
        let id = self.diagram.next_edge_id("INT");
        let mut edge = Edge::new(&id, source, target, name);
        edge.interface_type = interface_type;
        self.diagram.edges.push(edge);
        log::debug!("added edge {id} ({source} -> {target})");
        let frame = self.relayout();
        Ok((id, frame))
    }

    /// Layout as presented right now: the settled layout with anchors, labels
    /// and routes following any anchor run in progress.
    pub fn frame(&self) -> ViewLayout {
        self.present(self.clock.now_ms())
    }

    fn present(&self, now: f64) -> ViewLayout {
        let mut view = self.layout.clone();
        if !self.animator.is_animating() {
            return view;
        }
        view.anchors = self.animator.sample(now);
        reflow_edges(&self.diagram, &self.index, &self.state, &mut view, &self.config.layout);
        view
    }

    /// Service a scheduled frame. Stale tokens (superseded or cancelled runs)
    /// return `None` and must not be drawn.
    pub fn on_frame(&mut self, token: FrameToken) -> Option<(ViewLayout, Option<FrameToken>)> {
        let now = self.clock.now_ms();
        let (anchors, next) = self.animator.on_frame(token, now)?;
        let mut view = self.layout.clone();
        if next.is_some() {
            view.anchors = anchors;
            reflow_edges(&self.diagram, &self.index, &self.state, &mut view, &self.config.layout);
        }
        Some((view, next))
    }

    /// Copy of the persistable view state.
    pub fn snapshot(&self) -> ViewState {
        let mut state = self.state.clone();
        state.gesture = Default::default();
        state
    }

    /// Replace the view state wholesale and jump to its layout. Offsets from
    /// outside the engine are snapped back onto the grid.
    pub fn restore(&mut self, state: ViewState) {
        self.state = state;
        self.state.gesture = Default::default();
        let layout = &self.config.layout;
        for offset in self
            .state
            .node_offsets
            .values_mut()
            .chain(self.state.label_offsets.values_mut())
        {
            *offset = Offset::new(layout.snap(offset.dx), layout.snap(offset.dy));
        }
        self.layout = compute_view(&self.diagram, &self.index, &self.state, &self.config.layout);
        self.animator.reset(self.layout.anchors.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animation::ManualClock;
    use crate::interaction::PointerTarget;
    use crate::ir::Node;
    use crate::layout::{AnchorId, Point, Role, Side, Stop};

    fn diagram() -> Diagram {
        Diagram {
            nodes: vec![
                Node::with_children("x", "X", vec![Node::leaf("a", "A"), Node::leaf("b", "B")]),
                Node::leaf("y", "Y"),
            ],
            edges: vec![Edge::new("INT-1", "a", "y", "Data")],
        }
    }

    #[test]
    fn expand_toggle_starts_an_anchor_run() {
        let clock = ManualClock::new(0.0);
        let mut session = Session::with_clock(diagram(), Config::default(), &clock).expect("valid diagram");
        assert!(session.layout().anchors.is_empty());

        session.dispatch(ViewEvent::ToggleExpand("x".into()));
        assert!(session.layout().anchors.contains_key("INT-1"));

        let overridden = AnchorId::new(Side::Bottom, Stop::Far);
        let outcome = session.dispatch(ViewEvent::SetAnchorOverride {
            edge: "INT-1".into(),
            role: Role::Target,
            anchor: overridden,
        });
        let token = outcome.frame.expect("anchor id changed");
        assert!(session.is_animating());

        clock.set(100.0);
        let (mid, next) = session.on_frame(token).expect("live token");
        assert_eq!(next, Some(token));
        assert_ne!(mid.anchors["INT-1"].target.point(), session.layout().anchors["INT-1"].target.point());

        clock.set(250.0);
        let (done, next) = session.on_frame(token).expect("live token");
        assert_eq!(next, None);
        assert_eq!(done, *session.layout());
        assert!(session.on_frame(token).is_none());
    }

    #[test]
    fn clearing_offsets_drops_pending_frames() {
        let clock = ManualClock::new(0.0);
        let mut session = Session::with_clock(diagram(), Config::default(), &clock).expect("valid diagram");
        session.dispatch(ViewEvent::ToggleExpand("x".into()));
        let token = session
            .dispatch(ViewEvent::SetAnchorOverride {
                edge: "INT-1".into(),
                role: Role::Source,
                anchor: AnchorId::new(Side::Top, Stop::Near),
            })
            .frame
            .expect("run started");
        session.dispatch(ViewEvent::ClearOffsets);
        assert!(session.on_frame(token).is_none());
    }

    #[test]
    fn add_edge_assigns_next_id_and_rejects_unknown_nodes() {
        let mut session = Session::open(diagram(), Config::default()).expect("valid diagram");
        let (id, frame) = session.add_edge("b", "y", "Power", None).expect("known nodes");
        assert_eq!(id, "INT-2");
        assert_eq!(frame.is_some(), session.is_animating());
        assert!(matches!(
            session.add_edge("b", "nope", "Bad", None),
            Err(ModelError::UnknownNode(node)) if node == "nope"
        ));
    }

    #[test]
    fn connect_gesture_surfaces_request() {
        let mut session = Session::open(diagram(), Config::default()).expect("valid diagram");
        session.restore(ViewState::with_expanded(["x"]));
        let zoom = session.state().viewport.zoom;
        let target = session.layout().rects["y"].center();
        let screen = Point::new(target.x * zoom, target.y * zoom);
        session.dispatch(ViewEvent::PointerDown {
            target: PointerTarget::Port("a".into()),
            screen: Point::default(),
        });
        let outcome = session.dispatch(ViewEvent::PointerUp { screen });
        assert_eq!(
            outcome.effect,
            Some(Effect::RequestEdge {
                source: "a".into(),
                target: "y".into()
            })
        );
    }

    #[test]
    fn snapshot_restore_round_trips() {
        let mut session = Session::open(diagram(), Config::default()).expect("valid diagram");
        session.dispatch(ViewEvent::ToggleExpand("x".into()));
        session.dispatch(ViewEvent::SetFocus(Some("x".into())));
        let snapshot = session.snapshot();
        let before = session.layout().clone();

        session.dispatch(ViewEvent::SetFocus(None));
        session.dispatch(ViewEvent::ToggleExpand("x".into()));
        assert_ne!(*session.layout(), before);

        let json = serde_json::to_string(&snapshot).expect("serializes");
        session.restore(serde_json::from_str(&json).expect("parses"));
        assert_eq!(*session.layout(), before);
        assert_eq!(session.snapshot(), snapshot);
    }

    #[test]
    fn restore_snaps_off_grid_offsets() {
        let mut session = Session::open(diagram(), Config::default()).expect("valid diagram");
        let mut state = ViewState::with_expanded(["x"]);
        state.node_offsets.insert("y".into(), Offset::new(30.0, 40.0));
        state.label_offsets.insert("INT-1".into(), Offset::new(13.0, 50.0));
        session.restore(state);
        assert_eq!(session.state().node_offsets["y"], Offset::new(28.0, 28.0));
        assert_eq!(session.state().label_offsets["INT-1"], Offset::new(0.0, 56.0));
        for (id, rect) in &session.layout().rects {
            assert_eq!(rect.x % 28.0, 0.0, "{id}");
            assert_eq!(rect.y % 28.0, 0.0, "{id}");
        }
    }

    #[test]
    fn label_drag_commits_grid_steps() {
        let mut session = Session::open(diagram(), Config::default()).expect("valid diagram");
        session.restore(ViewState::with_expanded(["x"]));
        let zoom = session.state().viewport.zoom;
        session.dispatch(ViewEvent::PointerDown {
            target: PointerTarget::Label("INT-1".into()),
            screen: Point::default(),
        });
        session.dispatch(ViewEvent::PointerMove {
            screen: Point::new(0.0, 60.0 * zoom),
        });
        session.dispatch(ViewEvent::PointerUp {
            screen: Point::new(0.0, 60.0 * zoom),
        });
        assert_eq!(session.state().label_offsets["INT-1"], Offset::new(0.0, 56.0));
    }
}
