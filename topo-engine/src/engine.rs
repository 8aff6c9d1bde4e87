//! 拓扑引擎入口：块展开、线段提取、轮廓拼接、嵌套与面积汇总。

use topo_core::geometry::{Point2, Vector2};
use topo_core::primitive::{BlockDefinition, Circle, Drawing, Primitive, PolylineVertex};
use tracing::{debug, info};

use crate::DEFAULT_TOLERANCE;
use crate::blocks::expand_inserts;
use crate::errors::{Diagnostic, EngineError};
use crate::graph::NodeMerge;
use crate::nesting::{ContourRing, Shape, resolve_nesting};
use crate::report::{AreaReport, AreaSource, fast_path_total, outer_total};
use crate::sampler::SamplingOptions;
use crate::segment::{Extraction, Segment, extract_segments};
use crate::strategy::{ContourInput, Divergence, StrategyKind, cross_check};

/// 引擎参数。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineOptions {
    /// 端点合并与链式闭合的距离容差。
    pub tolerance: f64,
    pub sampling: SamplingOptions,
    pub node_merge: NodeMerge,
    /// 面积计算使用的拼接策略。
    pub area_strategy: StrategyKind,
    /// 挤出形状使用的拼接策略。
    pub extrusion_strategy: StrategyKind,
    pub max_insert_depth: usize,
    /// 展开后的图元数量上限，`None` 表示不限制。
    pub max_primitives: Option<usize>,
    /// 即使没有开放线段也走完整的拼接路径。
    pub force_graph_pass: bool,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            tolerance: DEFAULT_TOLERANCE,
            sampling: SamplingOptions::default(),
            node_merge: NodeMerge::default(),
            area_strategy: StrategyKind::Graph,
            extrusion_strategy: StrategyKind::Chain,
            max_insert_depth: 16,
            max_primitives: None,
            force_graph_pass: false,
        }
    }
}

impl EngineOptions {
    pub fn validate(&self) -> Result<(), EngineError> {
        if !self.tolerance.is_finite() || self.tolerance <= 0.0 {
            return Err(EngineError::InvalidTolerance(self.tolerance));
        }
        let sampling = &self.sampling;
        let checks = [
            ("circle_segments", 3, sampling.circle_segments),
            ("arc_min_segments", 1, sampling.arc_min_segments),
            ("spline_min_samples", 2, sampling.spline_min_samples),
            (
                "spline_samples_per_control_point",
                1,
                sampling.spline_samples_per_control_point,
            ),
            ("fit_segments_per_span", 1, sampling.fit_segments_per_span),
        ];
        for (name, min, value) in checks {
            if value < min {
                return Err(EngineError::InvalidSampling { name, min, value });
            }
        }
        Ok(())
    }
}

/// 挤出结果：带孔形状加上没能闭合的开放线段。
#[derive(Debug, Clone, PartialEq)]
pub struct ExtrusionOutput {
    pub shapes: Vec<Shape>,
    pub open_segments: Vec<Segment>,
    pub diagnostics: Vec<Diagnostic>,
}

/// 无状态的拓扑引擎，每次调用都是对输入的纯函数。
#[derive(Debug, Clone)]
pub struct TopologyEngine {
    options: EngineOptions,
}

impl TopologyEngine {
    pub fn new(options: EngineOptions) -> Result<Self, EngineError> {
        options.validate()?;
        Ok(Self { options })
    }

    #[inline]
    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    /// 计算外边界面积；没有闭合几何时为 0。
    pub fn total_area(&self, drawing: &Drawing) -> Result<f64, EngineError> {
        Ok(self.area_report(drawing)?.total_area)
    }

    pub fn area_report(&self, drawing: &Drawing) -> Result<AreaReport, EngineError> {
        let extraction = self.prepare(drawing)?;

        let (nesting, source, unused) =
            if !extraction.has_open_geometry() && !self.options.force_graph_pass {
                let rings = extraction
                    .closed
                    .iter()
                    .map(|closed| ContourRing {
                        points: closed.outline.ring.clone(),
                        exact_area: closed.exact_area(),
                        source: Some(closed.source),
                    })
                    .collect();
                (resolve_nesting(rings), AreaSource::FastPath, 0)
            } else {
                let strategy = self.options.area_strategy.strategy();
                let output = strategy.assemble(&self.contour_input(&extraction));
                let source = match self.options.area_strategy {
                    StrategyKind::Graph => AreaSource::GraphFace,
                    StrategyKind::Chain => AreaSource::ChainPolygon,
                };
                (resolve_nesting(output.contours), source, output.unused.len())
            };

        let (total_area, source) = if nesting.is_empty() {
            (0.0, AreaSource::None)
        } else if source == AreaSource::FastPath {
            (fast_path_total(&nesting), source)
        } else {
            (outer_total(&nesting), source)
        };

        info!(
            total_area,
            %source,
            contours = nesting.len(),
            skipped = extraction.diagnostics.len(),
            "面积计算完成"
        );
        Ok(AreaReport {
            total_area,
            source,
            closed_primitives: extraction.closed.len(),
            open_segments: extraction.open.len(),
            degenerate_segments: extraction.degenerate,
            unused_segments: unused,
            diagnostics: extraction.diagnostics,
            nesting,
        })
    }

    /// 组装挤出用的带孔形状。
    pub fn extrusion(&self, drawing: &Drawing) -> Result<ExtrusionOutput, EngineError> {
        let extraction = self.prepare(drawing)?;
        let strategy = self.options.extrusion_strategy.strategy();
        let output = strategy.assemble(&self.contour_input(&extraction));
        let shapes = resolve_nesting(output.contours).shapes();
        let open_segments: Vec<Segment> = output
            .unused
            .iter()
            .map(|index| extraction.open[*index].clone())
            .collect();

        info!(
            strategy = strategy.name(),
            shapes = shapes.len(),
            open = open_segments.len(),
            "挤出形状组装完成"
        );
        Ok(ExtrusionOutput {
            shapes,
            open_segments,
            diagnostics: extraction.diagnostics,
        })
    }

    /// 用两种拼接策略处理同一图纸并比较结果。
    pub fn cross_check(&self, drawing: &Drawing) -> Result<Divergence, EngineError> {
        let extraction = self.prepare(drawing)?;
        Ok(cross_check(&self.contour_input(&extraction)))
    }

    fn contour_input<'a>(&self, extraction: &'a Extraction) -> ContourInput<'a> {
        ContourInput {
            open: &extraction.open,
            closed: &extraction.closed,
            tolerance: self.options.tolerance,
            node_merge: self.options.node_merge,
        }
    }

    fn prepare(&self, drawing: &Drawing) -> Result<Extraction, EngineError> {
        let expansion = expand_inserts(drawing, self.options.max_insert_depth);
        if let Some(limit) = self.options.max_primitives {
            let count = expansion.primitives.len();
            if count > limit {
                return Err(EngineError::TooManyPrimitives { count, limit });
            }
        }
        debug!(
            input = drawing.len(),
            expanded = expansion.primitives.len(),
            "块参照展开完成"
        );

        let mut extraction = extract_segments(
            &expansion.primitives,
            &self.options.sampling,
            self.options.tolerance,
        );
        let mut diagnostics = expansion.diagnostics;
        diagnostics.append(&mut extraction.diagnostics);
        diagnostics.sort_by_key(|diagnostic| diagnostic.primitive);
        extraction.diagnostics = diagnostics;
        Ok(extraction)
    }
}

/// 示例图纸：直线、圆弧和凸度多段线拼成的底板外轮廓，中间一个圆孔，
/// 两个安装孔来自块参照，另有一段不闭合的圆弧。
pub fn demo_drawing() -> Drawing {
    use std::f64::consts::{FRAC_PI_2, PI};

    let mut drawing = Drawing::new();
    drawing.add_line(Point2::new(0.0, 0.0), Point2::new(120.0, 0.0));
    drawing.add_arc(Point2::new(120.0, 20.0), 20.0, -FRAC_PI_2, 0.0);
    drawing.add_line(Point2::new(140.0, 20.0), Point2::new(140.0, 80.0));
    drawing.add_polyline_with_vertices(
        [
            PolylineVertex::with_bulge(Point2::new(140.0, 80.0), 0.0),
            PolylineVertex::with_bulge(Point2::new(100.0, 80.0), 0.5),
            PolylineVertex::new(Point2::new(40.0, 80.0)),
            PolylineVertex::new(Point2::new(0.0, 80.0)),
        ],
        false,
    );
    drawing.add_line(Point2::new(0.0, 80.0), Point2::new(0.0, 0.0));
    drawing.add_circle(Point2::new(70.0, 40.0), 15.0);
    drawing.add_arc(Point2::new(20.0, 60.0), 5.0, 0.0, PI);

    drawing.add_block_definition(BlockDefinition {
        name: "MOUNT_HOLE".into(),
        primitives: vec![Primitive::Circle(Circle {
            center: Point2::new(0.0, 0.0),
            radius: 4.0,
        })],
    });
    for offset in [Vector2::new(15.0, 15.0), Vector2::new(125.0, 65.0)] {
        drawing.add_insert("MOUNT_HOLE", Point2::new(0.0, 0.0).translate(offset));
    }
    drawing
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_tolerance_is_rejected() {
        for tolerance in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            let options = EngineOptions {
                tolerance,
                ..EngineOptions::default()
            };
            assert!(matches!(
                TopologyEngine::new(options),
                Err(EngineError::InvalidTolerance(_))
            ));
        }
    }

    #[test]
    fn invalid_sampling_is_rejected() {
        let options = EngineOptions {
            sampling: SamplingOptions {
                circle_segments: 2,
                ..SamplingOptions::default()
            },
            ..EngineOptions::default()
        };
        match TopologyEngine::new(options) {
            Err(EngineError::InvalidSampling { name, .. }) => assert_eq!(name, "circle_segments"),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn primitive_cap_is_enforced_after_expansion() {
        let engine = TopologyEngine::new(EngineOptions {
            max_primitives: Some(2),
            ..EngineOptions::default()
        })
        .expect("engine");
        let mut drawing = Drawing::new();
        for index in 0..3 {
            drawing.add_circle(Point2::new(index as f64 * 10.0, 0.0), 1.0);
        }
        assert!(matches!(
            engine.total_area(&drawing),
            Err(EngineError::TooManyPrimitives { count: 3, limit: 2 })
        ));
    }

    #[test]
    fn empty_drawing_has_zero_area() {
        let engine = TopologyEngine::new(EngineOptions::default()).expect("engine");
        let report = engine.area_report(&Drawing::new()).expect("report");
        assert_eq!(report.total_area, 0.0);
        assert_eq!(report.source, AreaSource::None);
    }

    #[test]
    fn demo_drawing_closes_its_outline() {
        let engine = TopologyEngine::new(EngineOptions::default()).expect("engine");
        let drawing = demo_drawing();
        let report = engine.area_report(&drawing).expect("report");
        assert_eq!(report.source, AreaSource::GraphFace);
        assert!(report.diagnostics.is_empty());
        // 140×80 外框减去右下角倒圆，加上顶边向外凸出的弓形
        assert!(report.total_area > 140.0 * 80.0 - 100.0);
        assert!(report.total_area < 140.0 * 80.0 + 1000.0);

        let extrusion = engine.extrusion(&drawing).expect("extrusion");
        assert_eq!(extrusion.shapes.len(), 1);
        assert_eq!(extrusion.shapes[0].holes.len(), 3);
        assert_eq!(extrusion.open_segments.len(), 1);
    }
}
