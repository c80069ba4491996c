use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutConfig {
    /// Base unit every block coordinate and size is a multiple of.
    pub grid: f32,
    pub base_width: f32,
    pub base_height: f32,
    /// Extra width for a collapsed block that still has children.
    pub collapsed_extra: f32,
    /// Padding between a container's border and its children.
    pub padding: f32,
    /// Header band on top of an expanded container.
    pub header: f32,
    /// Top-left corner of the first root block.
    pub origin: f32,
    pub label_height: f32,
    pub label_min_width: f32,
    pub char_width: f32,
    pub label_padding: f32,
    /// Outward margin around blocks when testing label collisions.
    pub label_block_margin: f32,
    /// Inter-label padding when testing label collisions.
    pub label_spacing: f32,
    pub label_search_steps: usize,
    pub router_search_steps: usize,
    /// Inward margin so a path running flush along a block edge is not a crossing.
    pub router_margin: f32,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            grid: 28.0,
            base_width: 196.0,
            base_height: 56.0,
            collapsed_extra: 28.0,
            padding: 28.0,
            header: 56.0,
            origin: 56.0,
            label_height: 24.0,
            label_min_width: 80.0,
            char_width: 6.4,
            label_padding: 24.0,
            label_block_margin: 8.0,
            label_spacing: 4.0,
            label_search_steps: 16,
            router_search_steps: 12,
            router_margin: 2.0,
        }
    }
}

impl LayoutConfig {
    pub fn snap(&self, value: f32) -> f32 {
        snap_to(value, self.grid)
    }

    pub fn snap_up(&self, value: f32) -> f32 {
        if self.grid <= 0.0 {
            return value;
        }
        (value / self.grid).ceil() * self.grid
    }

    /// Re-align every block dimension to the grid. Loaded config files may
    /// carry arbitrary numbers; the packer relies on these being multiples.
    fn normalize(&mut self) {
        self.grid = self.grid.round().max(1.0);
        self.base_width = self.snap_up(self.base_width.max(self.grid));
        self.base_height = self.snap_up(self.base_height.max(self.grid));
        self.collapsed_extra = self.snap_up(self.collapsed_extra.max(0.0));
        self.padding = self.snap_up(self.padding.max(0.0));
        self.header = self.snap_up(self.header.max(0.0));
        self.origin = self.snap(self.origin);
    }
}

pub fn snap_to(value: f32, grid: f32) -> f32 {
    if grid <= 0.0 {
        return value;
    }
    (value / grid).round() * grid
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnimationConfig {
    pub duration_ms: f64,
}

impl Default for AnimationConfig {
    fn default() -> Self {
        Self { duration_ms: 200.0 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InteractionConfig {
    pub min_zoom: f32,
    pub max_zoom: f32,
    pub wheel_factor: f32,
    pub initial_zoom: f32,
    /// Expanding or collapsing a block drops every drag and label offset.
    pub clear_offsets_on_toggle: bool,
}

impl Default for InteractionConfig {
    fn default() -> Self {
        Self {
            min_zoom: 0.15,
            max_zoom: 3.0,
            wheel_factor: 0.001,
            initial_zoom: 0.6,
            clear_offsets_on_toggle: true,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    pub layout: LayoutConfig,
    pub animation: AnimationConfig,
    pub interaction: InteractionConfig,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct LayoutConfigFile {
    grid: Option<f32>,
    base_width: Option<f32>,
    base_height: Option<f32>,
    collapsed_extra: Option<f32>,
    padding: Option<f32>,
    header: Option<f32>,
    origin: Option<f32>,
    label_height: Option<f32>,
    label_min_width: Option<f32>,
    char_width: Option<f32>,
    label_padding: Option<f32>,
    label_block_margin: Option<f32>,
    label_spacing: Option<f32>,
    label_search_steps: Option<usize>,
    router_search_steps: Option<usize>,
    router_margin: Option<f32>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct AnimationConfigFile {
    duration_ms: Option<f64>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct InteractionConfigFile {
    min_zoom: Option<f32>,
    max_zoom: Option<f32>,
    wheel_factor: Option<f32>,
    initial_zoom: Option<f32>,
    clear_offsets_on_toggle: Option<bool>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct ConfigFile {
    layout: Option<LayoutConfigFile>,
    animation: Option<AnimationConfigFile>,
    interaction: Option<InteractionConfigFile>,
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let Some(path) = path else {
        return Ok(Config::default());
    };
    let contents = std::fs::read_to_string(path)?;
    parse_config(&contents)
}

/// Parse a JSON or JSON5 config document and merge it over the defaults.
pub fn parse_config(contents: &str) -> anyhow::Result<Config> {
    let mut config = Config::default();
    let parsed: ConfigFile = json5::from_str(contents)?;

    if let Some(file) = parsed.layout {
        let layout = &mut config.layout;
        if let Some(v) = file.grid {
            layout.grid = v;
        }
        if let Some(v) = file.base_width {
            layout.base_width = v;
        }
        if let Some(v) = file.base_height {
            layout.base_height = v;
        }
        if let Some(v) = file.collapsed_extra {
            layout.collapsed_extra = v;
        }
        if let Some(v) = file.padding {
            layout.padding = v;
        }
        if let Some(v) = file.header {
            layout.header = v;
        }
        if let Some(v) = file.origin {
            layout.origin = v;
        }
        if let Some(v) = file.label_height {
            layout.label_height = v;
        }
        if let Some(v) = file.label_min_width {
            layout.label_min_width = v;
        }
        if let Some(v) = file.char_width {
            layout.char_width = v;
        }
        if let Some(v) = file.label_padding {
            layout.label_padding = v;
        }
        if let Some(v) = file.label_block_margin {
            layout.label_block_margin = v;
        }
        if let Some(v) = file.label_spacing {
            layout.label_spacing = v;
        }
        if let Some(v) = file.label_search_steps {
            layout.label_search_steps = v;
        }
        if let Some(v) = file.router_search_steps {
            layout.router_search_steps = v;
        }
        if let Some(v) = file.router_margin {
            layout.router_margin = v;
        }
    }
    config.layout.normalize();

    if let Some(file) = parsed.animation
        && let Some(v) = file.duration_ms
    {
        config.animation.duration_ms = v.max(0.0);
    }

    if let Some(file) = parsed.interaction {
        let interaction = &mut config.interaction;
        if let Some(v) = file.min_zoom {
            interaction.min_zoom = v;
        }
        if let Some(v) = file.max_zoom {
            interaction.max_zoom = v;
        }
        if let Some(v) = file.wheel_factor {
            interaction.wheel_factor = v;
        }
        if let Some(v) = file.initial_zoom {
            interaction.initial_zoom = v;
        }
        if let Some(v) = file.clear_offsets_on_toggle {
            interaction.clear_offsets_on_toggle = v;
        }
        if interaction.max_zoom < interaction.min_zoom {
            std::mem::swap(&mut interaction.min_zoom, &mut interaction.max_zoom);
        }
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_grid_aligned() {
        let cfg = LayoutConfig::default();
        for value in [
            cfg.base_width,
            cfg.base_height,
            cfg.collapsed_extra,
            cfg.padding,
            cfg.header,
            cfg.origin,
        ] {
            assert_eq!(value % cfg.grid, 0.0, "{value} is off-grid");
        }
    }

    #[test]
    fn parse_config_merges_partial_overrides() {
        let config = parse_config(
            r#"{
                // comments are allowed
                layout: { baseWidth: 200, labelSearchSteps: 8 },
                animation: { durationMs: 120 },
            }"#,
        )
        .expect("config should parse");
        // 200 is re-snapped up to the next grid multiple.
        assert_eq!(config.layout.base_width, 224.0);
        assert_eq!(config.layout.label_search_steps, 8);
        assert_eq!(config.layout.base_height, 56.0);
        assert_eq!(config.animation.duration_ms, 120.0);
        assert!(config.interaction.clear_offsets_on_toggle);
    }

    #[test]
    fn parse_config_rejects_garbage() {
        assert!(parse_config("not a config").is_err());
    }

    #[test]
    fn snap_rounds_to_nearest_multiple() {
        let cfg = LayoutConfig::default();
        assert_eq!(cfg.snap(13.0), 0.0);
        assert_eq!(cfg.snap(15.0), 28.0);
        assert_eq!(cfg.snap(-15.0), -28.0);
        assert_eq!(cfg.snap_up(1.0), 28.0);
    }
}
