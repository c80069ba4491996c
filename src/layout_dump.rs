use crate::ir::{Diagram, DiagramIndex};
use crate::layout::{Segment, ViewLayout, breadcrumb};
use crate::state::ViewState;
use serde::Serialize;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

/// Flattened, renderer-friendly view of one layout pass.
#[derive(Debug, Serialize)]
pub struct LayoutDump {
    pub width: f32,
    pub height: f32,
    pub breadcrumb: Vec<String>,
    pub nodes: Vec<NodeDump>,
    pub edges: Vec<EdgeDump>,
    pub external: Vec<StubDump>,
}

#[derive(Debug, Serialize)]
pub struct NodeDump {
    pub id: String,
    pub name: String,
    pub parent: Option<String>,
    pub depth: usize,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub expanded: bool,
    pub container: bool,
}

#[derive(Debug, Serialize)]
pub struct EdgeDump {
    pub id: String,
    pub source: String,
    pub target: String,
    pub name: String,
    pub interface_type: Option<String>,
    pub source_anchor: String,
    pub target_anchor: String,
    pub label: [f32; 4],
    pub points: Vec<[f32; 2]>,
}

#[derive(Debug, Serialize)]
pub struct StubDump {
    pub edge: String,
    pub inside: String,
    pub outside: String,
    pub points: Vec<[f32; 2]>,
}

impl LayoutDump {
    pub fn from_view(layout: &ViewLayout, diagram: &Diagram, index: &DiagramIndex, state: &ViewState) -> Self {
        // Preorder keeps parents ahead of their children for painters.
        let nodes = index
            .preorder()
            .iter()
            .filter_map(|id| {
                let rect = layout.rects.get(id)?;
                Some(NodeDump {
                    id: id.clone(),
                    name: index.name(id).unwrap_or_default().to_string(),
                    parent: index.parent(id).map(str::to_string),
                    depth: index.depth(id),
                    x: rect.x,
                    y: rect.y,
                    width: rect.w,
                    height: rect.h,
                    expanded: rect.expanded,
                    container: rect.is_container(),
                })
            })
            .collect();

        let edges = diagram
            .edges
            .iter()
            .filter_map(|edge| {
                let route = layout.routes.get(&edge.id)?;
                let anchors = layout.anchors.get(&edge.id)?;
                let label = layout.labels.get(&edge.id)?;
                let segments: Vec<Segment> = route.segments().copied().collect();
                Some(EdgeDump {
                    id: edge.id.clone(),
                    source: edge.source.clone(),
                    target: edge.target.clone(),
                    name: edge.name.clone(),
                    interface_type: edge.interface_type.clone(),
                    source_anchor: anchors.source.id.to_string(),
                    target_anchor: anchors.target.id.to_string(),
                    label: [label.x, label.y, label.w, label.h],
                    points: polyline(&segments),
                })
            })
            .collect();

        let external = layout
            .external
            .iter()
            .map(|stub| StubDump {
                edge: stub.edge_id.clone(),
                inside: stub.inside.clone(),
                outside: stub.outside.clone(),
                points: polyline(&stub.path),
            })
            .collect();

        let (width, height) = layout
            .bounds
            .map(|b| (b.right(), b.bottom()))
            .unwrap_or((0.0, 0.0));

        LayoutDump {
            width,
            height,
            breadcrumb: state
                .focus
                .focus_node()
                .map(|node| breadcrumb(index, node))
                .unwrap_or_default(),
            nodes,
            edges,
            external,
        }
    }
}

/// Joined points of consecutive segments.
fn polyline(segments: &[Segment]) -> Vec<[f32; 2]> {
    let mut points = Vec::with_capacity(segments.len() + 1);
    for (i, segment) in segments.iter().enumerate() {
        if i == 0 || points.last() != Some(&[segment.from.x, segment.from.y]) {
            points.push([segment.from.x, segment.from.y]);
        }
        points.push([segment.to.x, segment.to.y]);
    }
    points
}

/// Write the dump as pretty JSON to `path`, or stdout when `path` is `None`
/// or `-`.
pub fn write_layout_dump(path: Option<&Path>, dump: &LayoutDump) -> anyhow::Result<()> {
    match path {
        Some(path) if path != Path::new("-") => {
            let writer = BufWriter::new(File::create(path)?);
            serde_json::to_writer_pretty(writer, dump)?;
        }
        _ => {
            let mut stdout = io::stdout().lock();
            serde_json::to_writer_pretty(&mut stdout, dump)?;
            writeln!(stdout)?;
        }
    }
    Ok(())
}
