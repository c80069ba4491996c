use blockview::config::{Config, LayoutConfig};
use blockview::interaction::{PointerTarget, ViewEvent};
use blockview::ir::{Diagram, DiagramIndex, Edge, Node};
use blockview::layout::{Point, compute_view, pack};
use blockview::session::Session;
use blockview::state::ViewState;
use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::collections::BTreeSet;
use std::hint::black_box;

/// `systems` roots, each with `width` leaf children, plus `extra_edges`
/// interfaces spread across subsystems.
fn synthetic_diagram(systems: usize, width: usize, extra_edges: usize) -> Diagram {
    let mut nodes = Vec::with_capacity(systems);
    for s in 0..systems {
        let children = (0..width)
            .map(|c| Node::leaf(&format!("S{s}-{c}"), &format!("Subsystem {s}.{c}")))
            .collect();
        nodes.push(Node::with_children(&format!("S{s}"), &format!("System {s}"), children));
    }
    let mut edges = Vec::new();
    for s in 0..systems {
        for c in 0..width.saturating_sub(1) {
            let id = format!("INT-{}", edges.len() + 1);
            edges.push(Edge::new(&id, &format!("S{s}-{c}"), &format!("S{s}-{}", c + 1), "Bus"));
        }
    }
    let total = systems * width;
    for i in 0..extra_edges.min(total * total) {
        let (a, b) = (i % total, (i * 7 + 3) % total);
        if a == b {
            continue;
        }
        let id = format!("INT-{}", edges.len() + 1);
        edges.push(Edge::new(
            &id,
            &format!("S{}-{}", a / width, a % width),
            &format!("S{}-{}", b / width, b % width),
            "Cross-system telemetry",
        ));
    }
    Diagram { nodes, edges }
}

fn fixture() -> Diagram {
    let raw = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/launch_vehicle.json"));
    Diagram::from_json(raw).expect("fixture parses")
}

fn expand_all(index: &DiagramIndex) -> BTreeSet<String> {
    index.containers()
}

fn bench_pack(c: &mut Criterion) {
    let mut group = c.benchmark_group("pack");
    let config = LayoutConfig::default();
    for (systems, width, extra) in [(4usize, 4usize, 8usize), (8, 9, 40), (12, 12, 120)] {
        let diagram = synthetic_diagram(systems, width, extra);
        let index = DiagramIndex::new(&diagram.nodes);
        let expanded = expand_all(&index);
        let name = format!("{systems}x{width}_{extra}");
        group.bench_with_input(BenchmarkId::from_parameter(name), &diagram, |b, diagram| {
            b.iter(|| {
                let rects = pack(black_box(diagram), &index, &expanded, &config);
                black_box(rects.len());
            });
        });
    }
    group.finish();
}

fn bench_compute_view(c: &mut Criterion) {
    let mut group = c.benchmark_group("compute_view");
    let config = LayoutConfig::default();

    let diagram = fixture();
    let index = DiagramIndex::new(&diagram.nodes);
    let state = ViewState::with_expanded(expand_all(&index));
    group.bench_function("launch_vehicle", |b| {
        b.iter(|| {
            let layout = compute_view(black_box(&diagram), &index, &state, &config);
            black_box(layout.routes.len());
        });
    });

    for (systems, width, extra) in [(4usize, 4usize, 8usize), (8, 9, 40), (12, 12, 120)] {
        let diagram = synthetic_diagram(systems, width, extra);
        let index = DiagramIndex::new(&diagram.nodes);
        let state = ViewState::with_expanded(expand_all(&index));
        let name = format!("{systems}x{width}_{extra}");
        group.bench_with_input(BenchmarkId::from_parameter(name), &diagram, |b, diagram| {
            b.iter(|| {
                let layout = compute_view(black_box(diagram), &index, &state, &config);
                black_box(layout.routes.len());
            });
        });
    }
    group.finish();
}

fn bench_drag(c: &mut Criterion) {
    let mut group = c.benchmark_group("interactive_drag");
    let diagram = synthetic_diagram(8, 9, 40);
    group.bench_function("node_drag_8x9", |b| {
        b.iter_batched(
            || {
                let mut session = Session::open(diagram.clone(), Config::default()).expect("valid diagram");
                let expanded = session.index().containers();
                session.restore(ViewState::with_expanded(expanded));
                session.dispatch(ViewEvent::PointerDown {
                    target: PointerTarget::Node("S0".into()),
                    screen: Point::new(0.0, 0.0),
                });
                session
            },
            |mut session| {
                for step in 1..=20 {
                    let screen = Point::new(step as f32 * 10.0, step as f32 * 4.0);
                    session.dispatch(ViewEvent::PointerMove { screen });
                }
                black_box(session.layout().rects.len());
            },
            criterion::BatchSize::SmallInput,
        );
    });
    group.finish();
}

criterion_group!(benches, bench_pack, bench_compute_view, bench_drag);
criterion_main!(benches);
