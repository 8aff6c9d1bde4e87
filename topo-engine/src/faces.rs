//! 面遍历：沿"左手"规则走遍所有有向边，恢复平面图的全部面。

use topo_core::geometry::Point2;
use tracing::{debug, warn};

use crate::graph::PlanarGraph;
use crate::polygon::signed_area;

/// 平面图中的一个面。有界面按逆时针方向给出，外部无界面为顺时针。
#[derive(Debug, Clone, PartialEq)]
pub struct Face {
    pub points: Vec<Point2>,
    pub edges: Vec<usize>,
    pub signed_area: f64,
    /// 面上所有边都来自同一个直接闭合图元时，记录它在闭合图元列表中的下标。
    pub closed_source: Option<usize>,
}

impl Face {
    #[inline]
    pub fn area(&self) -> f64 {
        self.signed_area.abs()
    }
}

/// 从每条未访问的边出发走出一个面。少于三个点的面被丢弃。
pub fn traverse_faces(graph: &mut PlanarGraph) -> Vec<Face> {
    graph.reset_visited();
    let edge_count = graph.edge_count();
    let mut faces = Vec::new();
    let mut truncated = 0usize;

    for start in 0..edge_count {
        if graph.edge(start).visited {
            continue;
        }
        let mut points = Vec::new();
        let mut edges = Vec::new();
        let mut current = start;
        let mut closed = false;
        for _ in 0..=edge_count {
            graph.mark_visited(current);
            edges.push(current);
            let edge_points = &graph.edge(current).points;
            points.extend_from_slice(&edge_points[..edge_points.len() - 1]);
            current = graph.next_in_face(current);
            if current == start {
                closed = true;
                break;
            }
            if graph.edge(current).visited {
                break;
            }
        }
        if !closed {
            truncated += 1;
            continue;
        }
        if points.len() < 3 {
            continue;
        }

        let closed_source = single_closed_source(graph, &edges);
        faces.push(Face {
            signed_area: signed_area(&points),
            points,
            edges,
            closed_source,
        });
    }

    if truncated > 0 {
        warn!(truncated, "部分面遍历未能回到起点，已丢弃");
    }
    debug!(faces = faces.len(), "面遍历完成");
    faces
}

fn single_closed_source(graph: &PlanarGraph, edges: &[usize]) -> Option<usize> {
    let first = graph.edge(*edges.first()?).origin.closed_index?;
    edges
        .iter()
        .all(|edge| graph.edge(*edge).origin.closed_index == Some(first))
        .then_some(first)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::NodeMerge;
    use crate::segment::{Segment, SegmentOrigin};

    fn line(x0: f64, y0: f64, x1: f64, y1: f64) -> Segment {
        Segment::open(
            vec![Point2::new(x0, y0), Point2::new(x1, y1)],
            SegmentOrigin::default(),
        )
        .expect("segment")
    }

    #[test]
    fn square_yields_inner_and_outer_faces() {
        let segments = vec![
            line(0.0, 0.0, 10.0, 0.0),
            line(10.0, 10.0, 10.0, 0.0),
            line(10.0, 10.0, 0.0, 10.0),
            line(0.0, 0.0, 0.0, 10.0),
        ];
        let mut graph = PlanarGraph::build(&segments, 0.5, NodeMerge::Clustered);
        let faces = traverse_faces(&mut graph);
        assert_eq!(faces.len(), 2);
        let mut areas: Vec<f64> = faces.iter().map(|face| face.signed_area).collect();
        areas.sort_by(f64::total_cmp);
        assert!((areas[0] + 100.0).abs() < 1e-9);
        assert!((areas[1] - 100.0).abs() < 1e-9);
        assert!(graph.edges().iter().all(|edge| edge.visited));
    }

    #[test]
    fn divided_square_yields_two_rooms() {
        let segments = vec![
            line(0.0, 0.0, 5.0, 0.0),
            line(5.0, 0.0, 10.0, 0.0),
            line(10.0, 0.0, 10.0, 10.0),
            line(10.0, 10.0, 5.0, 10.0),
            line(5.0, 10.0, 0.0, 10.0),
            line(0.0, 10.0, 0.0, 0.0),
            line(5.0, 0.0, 5.0, 10.0),
        ];
        let mut graph = PlanarGraph::build(&segments, 0.5, NodeMerge::Clustered);
        let faces = traverse_faces(&mut graph);
        let positive: Vec<f64> = faces
            .iter()
            .map(|face| face.signed_area)
            .filter(|area| *area > 0.0)
            .collect();
        assert_eq!(positive.len(), 2);
        assert!(positive.iter().all(|area| (area - 50.0).abs() < 1e-9));
    }

    #[test]
    fn dangling_line_produces_no_face() {
        let segments = vec![line(0.0, 0.0, 10.0, 0.0)];
        let mut graph = PlanarGraph::build(&segments, 0.5, NodeMerge::Clustered);
        assert!(traverse_faces(&mut graph).is_empty());
    }
}
