use crate::config::InteractionConfig;
use crate::interaction::Gesture;
use crate::layout::{AnchorOverrides, FocusMode, Offset, Point};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Screen transform: `screen = engine * zoom + pan`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub pan: Point,
    pub zoom: f32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(InteractionConfig::default().initial_zoom)
    }
}

impl Viewport {
    pub fn new(zoom: f32) -> Self {
        Self {
            pan: Point::default(),
            zoom,
        }
    }

    pub fn to_engine(&self, screen: Point) -> Point {
        Point::new((screen.x - self.pan.x) / self.zoom, (screen.y - self.pan.y) / self.zoom)
    }

    pub fn to_screen(&self, engine: Point) -> Point {
        Point::new(engine.x * self.zoom + self.pan.x, engine.y * self.zoom + self.pan.y)
    }

    /// Change zoom by `amount`, keeping the engine point under `cursor` fixed
    /// on screen.
    pub fn zoom_at(&mut self, cursor: Point, amount: f32, config: &InteractionConfig) {
        let zoom = (self.zoom + amount).clamp(config.min_zoom, config.max_zoom);
        let ratio = zoom / self.zoom;
        self.pan = Point::new(
            cursor.x - (cursor.x - self.pan.x) * ratio,
            cursor.y - (cursor.y - self.pan.y) * ratio,
        );
        self.zoom = zoom;
    }

    /// Mouse wheel: positive `delta_y` zooms out.
    pub fn wheel(&mut self, cursor: Point, delta_y: f32, config: &InteractionConfig) {
        self.zoom_at(cursor, -delta_y * config.wheel_factor, config);
    }
}

/// Everything a user can change about how a diagram is shown. Serializes
/// verbatim for a surrounding view store; the in-flight gesture is not part
/// of it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ViewState {
    pub expanded: BTreeSet<String>,
    pub focus: FocusMode,
    pub node_offsets: BTreeMap<String, Offset>,
    pub label_offsets: BTreeMap<String, Offset>,
    pub overrides: AnchorOverrides,
    /// Interface types to show. `None` shows every edge.
    pub type_filter: Option<BTreeSet<String>>,
    pub viewport: Viewport,
    #[serde(skip)]
    pub gesture: Gesture,
}

impl ViewState {
    pub fn with_expanded<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            expanded: ids.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn clear_offsets(&mut self) {
        self.node_offsets.clear();
        self.label_offsets.clear();
    }

    /// Whether `type_key` passes the active type filter.
    pub fn shows_type(&self, type_key: &str) -> bool {
        self.type_filter
            .as_ref()
            .is_none_or(|types| types.contains(type_key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zoom_keeps_cursor_point_fixed() {
        let config = InteractionConfig::default();
        let mut viewport = Viewport::new(1.0);
        viewport.pan = Point::new(40.0, -20.0);
        let cursor = Point::new(300.0, 200.0);
        let before = viewport.to_engine(cursor);
        viewport.wheel(cursor, -500.0, &config);
        assert!((viewport.zoom - 1.5).abs() < 1e-6);
        let after = viewport.to_engine(cursor);
        assert!((before.x - after.x).abs() < 1e-3 && (before.y - after.y).abs() < 1e-3);
    }

    #[test]
    fn zoom_is_clamped() {
        let config = InteractionConfig::default();
        let mut viewport = Viewport::default();
        viewport.zoom_at(Point::default(), -10.0, &config);
        assert_eq!(viewport.zoom, config.min_zoom);
        viewport.zoom_at(Point::default(), 10.0, &config);
        assert_eq!(viewport.zoom, config.max_zoom);
    }

    #[test]
    fn view_state_round_trips_without_gesture() {
        let mut state = ViewState::with_expanded(["lv", "s1"]);
        state.type_filter = Some(["Data".to_string()].into());
        state.label_offsets.insert("INT-1".into(), Offset::new(28.0, 0.0));
        let json = serde_json::to_string(&state).expect("serializes");
        let back: ViewState = serde_json::from_str(&json).expect("parses");
        assert_eq!(back, state);
        assert!(state.shows_type("Data"));
        assert!(!state.shows_type(""));
    }
}
