use std::f64::consts::PI;

use topo_core::geometry::{Point2, Point3};
use topo_core::primitive::{
    BlockDefinition, Drawing, Line, Polyline, PolylineVertex, Primitive, Spline,
};
use topo_engine::engine::demo_drawing;
use topo_engine::errors::SkipReason;
use topo_engine::graph::NodeMerge;
use topo_engine::polygon::signed_area;
use topo_engine::sampler::{Sampled, SamplingOptions, sample_primitive};
use topo_engine::{AreaSource, EngineOptions, StrategyKind, TopologyEngine};

fn engine() -> TopologyEngine {
    TopologyEngine::new(EngineOptions::default()).expect("默认参数应当合法")
}

fn square(drawing: &mut Drawing, x: f64, y: f64, size: f64) {
    drawing.add_polyline(
        [
            Point2::new(x, y),
            Point2::new(x + size, y),
            Point2::new(x + size, y + size),
            Point2::new(x, y + size),
        ],
        true,
    );
}

#[test]
fn repeated_runs_are_identical() {
    let engine = engine();
    let drawing = demo_drawing();
    let first = engine.area_report(&drawing).expect("首次计算失败");
    let second = engine.area_report(&drawing).expect("再次计算失败");
    assert_eq!(first, second);

    let first = engine.extrusion(&drawing).expect("首次挤出失败");
    let second = engine.extrusion(&drawing).expect("再次挤出失败");
    assert_eq!(first, second);
}

#[test]
fn single_circle_fast_path_matches_graph_pass() {
    let mut drawing = Drawing::new();
    drawing.add_circle(Point2::new(3.0, -2.0), 12.0);

    let fast = engine().area_report(&drawing).expect("快速路径失败");
    assert_eq!(fast.source, AreaSource::FastPath);
    assert!((fast.total_area - PI * 144.0).abs() < 1e-9);

    let forced = TopologyEngine::new(EngineOptions {
        force_graph_pass: true,
        ..EngineOptions::default()
    })
    .expect("参数合法");
    let graph = forced.area_report(&drawing).expect("图遍历失败");
    assert_eq!(graph.source, AreaSource::GraphFace);
    assert!((graph.total_area - fast.total_area).abs() < 1e-9);
}

#[test]
fn every_contour_is_counter_clockwise() {
    let mut drawing = demo_drawing();
    // 顺时针方向的闭合多段线
    drawing.add_polyline(
        [
            Point2::new(200.0, 0.0),
            Point2::new(200.0, 50.0),
            Point2::new(250.0, 50.0),
            Point2::new(250.0, 0.0),
        ],
        true,
    );
    let engine = engine();
    let report = engine.area_report(&drawing).expect("面积计算失败");
    assert!(!report.nesting.is_empty());
    for contour in &report.nesting.contours {
        assert!(contour.signed_area > 0.0);
        assert!(signed_area(&contour.points) > 0.0);
    }

    let extrusion = engine.extrusion(&drawing).expect("挤出失败");
    for shape in &extrusion.shapes {
        assert!(signed_area(&shape.outer.points) > 0.0);
        for hole in &shape.holes {
            assert!(signed_area(&hole.points) > 0.0);
        }
    }
}

#[test]
fn square_circle_island_nest_in_alternating_depths() {
    // 岛取 10×10：20×20 的正方形面积（400）大于半径 10 的圆（约 314），按面积排序会排到圆之前
    let mut drawing = Drawing::new();
    square(&mut drawing, 0.0, 0.0, 100.0);
    drawing.add_circle(Point2::new(50.0, 50.0), 10.0);
    square(&mut drawing, 45.0, 45.0, 10.0);

    let report = engine().area_report(&drawing).expect("面积计算失败");
    let depths: Vec<usize> = report
        .nesting
        .contours
        .iter()
        .map(|contour| contour.depth)
        .collect();
    assert_eq!(depths, vec![0, 1, 2]);
    assert!((report.total_area - 10_000.0).abs() < 1e-9);

    let extrusion = engine().extrusion(&drawing).expect("挤出失败");
    assert_eq!(extrusion.shapes.len(), 2);
    assert_eq!(extrusion.shapes[0].holes.len(), 1);
    assert!(extrusion.shapes[1].holes.is_empty());
}

#[test]
fn traversed_square_circle_island_nest_in_alternating_depths() {
    // 外框由四条直线、圆由两段半圆弧组成，轮廓全部来自面遍历
    let mut drawing = Drawing::new();
    drawing.add_line(Point2::new(0.0, 0.0), Point2::new(100.0, 0.0));
    drawing.add_line(Point2::new(100.0, 0.0), Point2::new(100.0, 100.0));
    drawing.add_line(Point2::new(100.0, 100.0), Point2::new(0.0, 100.0));
    drawing.add_line(Point2::new(0.0, 100.0), Point2::new(0.0, 0.0));
    drawing.add_arc(Point2::new(50.0, 50.0), 10.0, 0.0, PI);
    drawing.add_arc(Point2::new(50.0, 50.0), 10.0, PI, 0.0);
    square(&mut drawing, 45.0, 45.0, 10.0);

    let report = engine().area_report(&drawing).expect("面积计算失败");
    assert_eq!(report.source, AreaSource::GraphFace);
    let depths: Vec<usize> = report
        .nesting
        .contours
        .iter()
        .map(|contour| contour.depth)
        .collect();
    assert_eq!(depths, vec![0, 1, 2]);
    assert!((report.total_area - 10_000.0).abs() < 1e-9);

    let extrusion = engine().extrusion(&drawing).expect("挤出失败");
    let holes: Vec<usize> = extrusion.shapes.iter().map(|shape| shape.holes.len()).collect();
    assert_eq!(holes, vec![1, 0]);
}

#[test]
fn circle_below_tolerance_survives_forced_graph_pass() {
    let mut drawing = Drawing::new();
    drawing.add_circle(Point2::new(0.0, 0.0), 0.2);

    let fast = engine().area_report(&drawing).expect("快速路径失败");
    assert_eq!(fast.source, AreaSource::FastPath);

    let forced = TopologyEngine::new(EngineOptions {
        force_graph_pass: true,
        ..EngineOptions::default()
    })
    .expect("参数合法");
    let graph = forced.area_report(&drawing).expect("图遍历失败");
    assert_eq!(graph.source, AreaSource::GraphFace);
    assert!((graph.total_area - PI * 0.04).abs() < 1e-12);
    assert!((graph.total_area - fast.total_area).abs() < 1e-12);
}

#[test]
fn small_hole_inside_line_square_is_kept_by_both_outputs() {
    let mut drawing = Drawing::new();
    drawing.add_line(Point2::new(0.0, 0.0), Point2::new(10.0, 0.0));
    drawing.add_line(Point2::new(10.0, 0.0), Point2::new(10.0, 10.0));
    drawing.add_line(Point2::new(10.0, 10.0), Point2::new(0.0, 10.0));
    drawing.add_line(Point2::new(0.0, 10.0), Point2::new(0.0, 0.0));
    drawing.add_circle(Point2::new(5.0, 5.0), 0.2);

    let report = engine().area_report(&drawing).expect("面积计算失败");
    let depths: Vec<usize> = report
        .nesting
        .contours
        .iter()
        .map(|contour| contour.depth)
        .collect();
    assert_eq!(depths, vec![0, 1]);
    assert!((report.total_area - 100.0).abs() < 1e-9);

    let extrusion = engine().extrusion(&drawing).expect("挤出失败");
    assert_eq!(extrusion.shapes.len(), 1);
    assert_eq!(extrusion.shapes[0].holes.len(), 1);
}

#[test]
fn stray_open_stroke_switches_to_outer_only_area() {
    let mut drawing = Drawing::new();
    for index in 0..10 {
        drawing.add_circle(Point2::new(index as f64 * 10.0, 0.0), 2.0);
    }
    let fast = engine().area_report(&drawing).expect("面积计算失败");
    assert_eq!(fast.source, AreaSource::FastPath);
    assert!((fast.total_area - 10.0 * PI * 4.0).abs() < 1e-9);

    // 一条无关的直线让计算改走面遍历，只保留最大的外轮廓
    drawing.add_line(Point2::new(200.0, 0.0), Point2::new(210.0, 0.0));
    let graph = engine().area_report(&drawing).expect("面积计算失败");
    assert_eq!(graph.source, AreaSource::GraphFace);
    assert_eq!(graph.nesting.len(), 10);
    assert!((graph.total_area - PI * 4.0).abs() < 1e-9);
}

#[test]
fn clamped_spline_starts_and_ends_on_control_points() {
    let control = vec![
        Point2::new(0.0, 0.0),
        Point2::new(2.0, 6.0),
        Point2::new(7.0, 7.0),
        Point2::new(9.0, 1.0),
        Point2::new(12.0, 3.0),
        Point2::new(15.0, 0.0),
    ];
    let spline = Primitive::Spline(Spline {
        degree: 3,
        control_points: control.clone(),
        knots: vec![0.0, 0.0, 0.0, 0.0, 1.0, 2.0, 3.0, 3.0, 3.0, 3.0],
        weights: Vec::new(),
        fit_points: Vec::new(),
        is_closed: false,
    });
    let Ok(Sampled::Open(points)) = sample_primitive(&spline, &SamplingOptions::default()) else {
        panic!("样条应当采样为开放折线");
    };
    assert_eq!(points.len(), 61);
    assert!(points[0].distance(control[0]) < 1e-9);
    assert!(points[60].distance(control[5]) < 1e-9);
}

#[test]
fn bulged_polyline_keeps_vertex_positions() {
    let start = Point2::new(-3.0, 2.0);
    let end = Point2::new(5.0, 8.0);
    for bulge in [0.5, -0.5, 1.0] {
        let polyline = Primitive::Polyline(Polyline {
            vertices: vec![
                PolylineVertex::with_bulge(start, bulge),
                PolylineVertex::new(end),
            ],
            is_closed: false,
        });
        let Ok(Sampled::Open(points)) = sample_primitive(&polyline, &SamplingOptions::default())
        else {
            panic!("多段线应当采样为开放折线");
        };
        let first = points[0];
        let last = points[points.len() - 1];
        assert!(first.distance(start) < 1e-9, "bulge {bulge}");
        assert!(last.distance(end) < 1e-9, "bulge {bulge}");
        assert!((first.distance(last) - 10.0).abs() < 1e-9, "bulge {bulge}");
    }
}

#[test]
fn malformed_line_is_skipped_and_circles_still_count() {
    let mut drawing = Drawing::new();
    let bad = drawing.add_primitive(Primitive::Line(Line {
        start: Point3::new(f64::NAN, 0.0, 0.0),
        end: Point3::new(10.0, 0.0, 0.0),
    }));
    for index in 0..10 {
        drawing.add_circle(Point2::new(index as f64 * 10.0, 0.0), 2.0);
    }

    let report = engine().area_report(&drawing).expect("单个坏图元不应中断计算");
    assert_eq!(report.diagnostics.len(), 1);
    assert_eq!(report.diagnostics[0].primitive, bad);
    assert_eq!(
        report.diagnostics[0].reason,
        SkipReason::NonFinite { field: "start" }
    );
    assert_eq!(report.source, AreaSource::FastPath);
    assert!((report.total_area - 10.0 * PI * 4.0).abs() < 1e-9);
}

#[test]
fn t_junction_is_reported_as_divergence() {
    let mut drawing = Drawing::new();
    for (a, b) in [
        ((0.0, 0.0), (5.0, 0.0)),
        ((5.0, 0.0), (10.0, 0.0)),
        ((10.0, 0.0), (10.0, 10.0)),
        ((10.0, 10.0), (5.0, 10.0)),
        ((5.0, 10.0), (0.0, 10.0)),
        ((0.0, 10.0), (0.0, 0.0)),
        ((5.0, 0.0), (5.0, 10.0)),
    ] {
        drawing.add_line(Point2::new(a.0, a.1), Point2::new(b.0, b.1));
    }
    let divergence = engine().cross_check(&drawing).expect("交叉校验失败");
    assert!(divergence.diverges(1e-6));
    assert_eq!(divergence.graph_contours, 2);
    assert_eq!(divergence.chain_contours, 1);

    let chain_engine = TopologyEngine::new(EngineOptions {
        area_strategy: StrategyKind::Chain,
        ..EngineOptions::default()
    })
    .expect("参数合法");
    let report = chain_engine.area_report(&drawing).expect("面积计算失败");
    assert_eq!(report.source, AreaSource::ChainPolygon);
    assert!((report.total_area - 100.0).abs() < 1e-9);
    assert_eq!(report.unused_segments, 1);
}

#[test]
fn inserts_expand_into_translated_copies() {
    let mut drawing = Drawing::new();
    drawing.add_block_definition(BlockDefinition {
        name: "TILE".into(),
        primitives: vec![Primitive::Polyline(Polyline {
            vertices: vec![
                PolylineVertex::new(Point2::new(0.0, 0.0)),
                PolylineVertex::new(Point2::new(4.0, 0.0)),
                PolylineVertex::new(Point2::new(4.0, 4.0)),
                PolylineVertex::new(Point2::new(0.0, 4.0)),
            ],
            is_closed: true,
        })],
    });
    drawing.add_insert("TILE", Point2::new(0.0, 0.0));
    drawing.add_insert("TILE", Point2::new(10.0, 0.0));
    drawing.add_insert("MISSING", Point2::new(20.0, 0.0));

    let report = engine().area_report(&drawing).expect("面积计算失败");
    assert_eq!(report.closed_primitives, 2);
    assert!((report.total_area - 32.0).abs() < 1e-9);
    assert_eq!(report.diagnostics.len(), 1);
    assert_eq!(
        report.diagnostics[0].reason,
        SkipReason::UnknownBlock("MISSING".into())
    );
}

#[test]
fn clustered_merge_does_not_depend_on_input_order() {
    // 端点间留有小于容差的缝隙
    let lines = [
        ((0.0, 0.0), (10.0, 0.1)),
        ((10.2, 0.0), (10.0, 10.0)),
        ((10.1, 10.3), (0.0, 10.0)),
        ((0.0, 10.2), (0.3, 0.1)),
    ];
    let build = |order: &[usize]| {
        let mut drawing = Drawing::new();
        for index in order {
            let (a, b) = lines[*index];
            drawing.add_line(Point2::new(a.0, a.1), Point2::new(b.0, b.1));
        }
        drawing
    };

    let engine = TopologyEngine::new(EngineOptions {
        node_merge: NodeMerge::Clustered,
        ..EngineOptions::default()
    })
    .expect("参数合法");
    let forward = engine.total_area(&build(&[0, 1, 2, 3])).expect("面积计算失败");
    let shuffled = engine.total_area(&build(&[2, 0, 3, 1])).expect("面积计算失败");
    assert!(forward > 95.0 && forward < 105.0);
    assert!((forward - shuffled).abs() < 1e-9);
}
