//! 轮廓拼接策略。
//!
//! 同一批线段有两种恢复闭合轮廓的方式：
//!
//! * [`GraphTraversal`]：构建平面图并遍历全部面，能正确处理 T 形交点与共享边，
//!   面积计算（[`TopologyEngine::area_report`](crate::TopologyEngine::area_report)）默认使用它；
//! * [`GreedyChain`]：按顺序首尾相接，速度快且保留原始走向，挤出形状
//!   （[`TopologyEngine::extrusion`](crate::TopologyEngine::extrusion)）默认使用它。
//!
//! 两者在简单图纸上结果一致，[`cross_check`] 用来找出它们不一致的图纸。

use std::fmt;

use topo_core::primitive::PrimitiveId;
use tracing::{debug, info};

use crate::chain::assemble_chains;
use crate::faces::traverse_faces;
use crate::graph::{NodeMerge, PlanarGraph};
use crate::nesting::{ContourRing, classify_faces, resolve_nesting};
use crate::segment::{ClosedPrimitive, Segment};

/// 策略输入：开放线段与直接闭合的图元。
#[derive(Debug, Clone, Copy)]
pub struct ContourInput<'a> {
    pub open: &'a [Segment],
    pub closed: &'a [ClosedPrimitive],
    pub tolerance: f64,
    pub node_merge: NodeMerge,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StrategyOutput {
    pub contours: Vec<ContourRing>,
    /// 没有进入任何轮廓的开放线段下标。
    pub unused: Vec<usize>,
}

pub trait ContourStrategy {
    fn name(&self) -> &'static str;

    fn assemble(&self, input: &ContourInput<'_>) -> StrategyOutput;
}

/// 平面图面遍历。直接闭合的图元拆成两段半弧后一并参与建图。
#[derive(Debug, Clone, Copy, Default)]
pub struct GraphTraversal;

impl ContourStrategy for GraphTraversal {
    fn name(&self) -> &'static str {
        "graph"
    }

    fn assemble(&self, input: &ContourInput<'_>) -> StrategyOutput {
        let mut segments: Vec<Segment> = input.open.to_vec();
        // 直径小于容差的闭合图元拆开后两端会合并成同一节点，不进图，直接作为轮廓
        let mut direct = Vec::new();
        for (index, closed) in input.closed.iter().enumerate() {
            let Some(segment) = closed.to_segment(index) else {
                continue;
            };
            let halves = segment.split_closed();
            if halves[0].start.is_near(halves[0].end, input.tolerance) {
                direct.push(ContourRing {
                    points: closed.outline.ring.clone(),
                    exact_area: closed.exact_area(),
                    source: Some(closed.source),
                });
            } else {
                segments.extend(halves);
            }
        }

        let mut graph = PlanarGraph::build(&segments, input.tolerance, input.node_merge);
        let faces = traverse_faces(&mut graph);

        let exact_areas: Vec<Option<f64>> =
            input.closed.iter().map(ClosedPrimitive::exact_area).collect();
        let sources: Vec<PrimitiveId> = input.closed.iter().map(|closed| closed.source).collect();
        let mut contours = classify_faces(&faces, &exact_areas, &sources);
        contours.extend(direct);

        // 开放线段只要有一条边落在保留下来的面上就算被使用
        let mut used = vec![false; input.open.len()];
        for face in faces.iter().filter(|face| face.signed_area > 0.0) {
            for edge in &face.edges {
                let segment = graph.edge(*edge).segment;
                if segment < used.len() {
                    used[segment] = true;
                }
            }
        }
        let unused = (0..input.open.len()).filter(|index| !used[*index]).collect();

        debug!(
            strategy = self.name(),
            faces = faces.len(),
            contours = contours.len(),
            "面遍历策略完成"
        );
        StrategyOutput { contours, unused }
    }
}

/// 贪心链式拼接。直接闭合的图元原样作为轮廓。
#[derive(Debug, Clone, Copy, Default)]
pub struct GreedyChain;

impl ContourStrategy for GreedyChain {
    fn name(&self) -> &'static str {
        "chain"
    }

    fn assemble(&self, input: &ContourInput<'_>) -> StrategyOutput {
        let outcome = assemble_chains(input.open, input.tolerance);
        let mut contours: Vec<ContourRing> = outcome
            .chains
            .into_iter()
            .map(|chain| ContourRing::new(chain.points))
            .collect();
        contours.extend(input.closed.iter().map(|closed| ContourRing {
            points: closed.outline.ring.clone(),
            exact_area: closed.exact_area(),
            source: Some(closed.source),
        }));
        debug!(
            strategy = self.name(),
            contours = contours.len(),
            unused = outcome.unused.len(),
            "链式拼接策略完成"
        );
        StrategyOutput {
            contours,
            unused: outcome.unused,
        }
    }
}

/// 可配置的策略选择。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StrategyKind {
    #[default]
    Graph,
    Chain,
}

impl StrategyKind {
    pub fn strategy(self) -> &'static dyn ContourStrategy {
        match self {
            StrategyKind::Graph => &GraphTraversal,
            StrategyKind::Chain => &GreedyChain,
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.strategy().name())
    }
}

/// 两种策略在同一输入上的结果对比。
#[derive(Debug, Clone, PartialEq)]
pub struct Divergence {
    pub graph_area: f64,
    pub chain_area: f64,
    pub graph_contours: usize,
    pub chain_contours: usize,
    pub graph_unused: usize,
    pub chain_unused: usize,
}

impl Divergence {
    /// 外边界面积差超过 `area_tolerance` 或轮廓数量不同即视为不一致。
    pub fn diverges(&self, area_tolerance: f64) -> bool {
        (self.graph_area - self.chain_area).abs() > area_tolerance
            || self.graph_contours != self.chain_contours
    }
}

/// 用两种策略分别求外边界面积与轮廓数量。
pub fn cross_check(input: &ContourInput<'_>) -> Divergence {
    let outer_area = |output: &StrategyOutput| {
        let count = output.contours.len();
        let area = resolve_nesting(output.contours.clone())
            .outer()
            .map(|contour| contour.area())
            .unwrap_or(0.0);
        (area, count)
    };

    let graph = GraphTraversal.assemble(input);
    let chain = GreedyChain.assemble(input);
    let (graph_area, graph_contours) = outer_area(&graph);
    let (chain_area, chain_contours) = outer_area(&chain);
    let divergence = Divergence {
        graph_area,
        chain_area,
        graph_contours,
        chain_contours,
        graph_unused: graph.unused.len(),
        chain_unused: chain.unused.len(),
    };
    if divergence.diverges(1e-6) {
        info!(?divergence, "两种拼接策略结果不一致");
    }
    divergence
}
