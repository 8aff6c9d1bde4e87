//! 平面图构建：端点合并为节点，每条线段生成一对互为反向的有向边。

use rstar::RTree;
use rstar::primitives::GeomWithData;
use topo_core::geometry::Point2;
use tracing::debug;

use crate::segment::{Segment, SegmentOrigin};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

impl NodeId {
    #[inline]
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: NodeId,
    pub position: Point2,
}

/// 端点合并策略。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum NodeMerge {
    /// 空间索引 + 并查集，容差内的端点传递性地聚成一个节点，结果与输入顺序无关。
    #[default]
    Clustered,
    /// 按输入顺序线性扫描，端点并入第一个落在容差内的已有节点。
    FirstMatch,
}

/// 有向边。`2k` 与 `2k + 1` 互为反向边。
#[derive(Debug, Clone, PartialEq)]
pub struct DirectedEdge {
    pub from: NodeId,
    pub to: NodeId,
    pub points: Vec<Point2>,
    /// 离开 `from` 的方向角，取值 (-π, π]。
    pub angle: f64,
    pub visited: bool,
    pub origin: SegmentOrigin,
    /// 生成该边的线段在输入列表中的下标。
    pub segment: usize,
    /// 在 `from` 节点出边列表中的位置。
    pub slot: usize,
}

#[derive(Debug, Clone, Default)]
pub struct PlanarGraph {
    nodes: Vec<Node>,
    edges: Vec<DirectedEdge>,
    outgoing: Vec<Vec<usize>>,
    self_loops: usize,
}

impl PlanarGraph {
    /// 由开放线段构建平面图。闭合线段需要先用 [`Segment::split_closed`] 拆开。
    pub fn build(segments: &[Segment], tolerance: f64, merge: NodeMerge) -> Self {
        let endpoints: Vec<Point2> = segments
            .iter()
            .flat_map(|segment| [segment.start, segment.end])
            .collect();
        let (nodes, assignment) = merge_endpoints(&endpoints, tolerance, merge);

        let mut edges = Vec::with_capacity(segments.len() * 2);
        let mut self_loops = 0;
        for (index, segment) in segments.iter().enumerate() {
            let from = assignment[2 * index];
            let to = assignment[2 * index + 1];
            if from == to {
                self_loops += 1;
                continue;
            }
            let forward = segment.points.clone();
            let mut backward = forward.clone();
            backward.reverse();
            edges.push(DirectedEdge {
                from,
                to,
                angle: departure_angle(&forward),
                points: forward,
                visited: false,
                origin: segment.origin,
                segment: index,
                slot: 0,
            });
            edges.push(DirectedEdge {
                from: to,
                to: from,
                angle: departure_angle(&backward),
                points: backward,
                visited: false,
                origin: segment.origin,
                segment: index,
                slot: 0,
            });
        }

        let mut outgoing = vec![Vec::new(); nodes.len()];
        for (index, edge) in edges.iter().enumerate() {
            outgoing[edge.from.index()].push(index);
        }
        for list in &mut outgoing {
            list.sort_by(|a, b| edges[*a].angle.total_cmp(&edges[*b].angle).then(a.cmp(b)));
            for (slot, edge) in list.iter().enumerate() {
                edges[*edge].slot = slot;
            }
        }

        debug!(
            nodes = nodes.len(),
            edges = edges.len(),
            self_loops,
            "平面图构建完成"
        );
        Self {
            nodes,
            edges,
            outgoing,
            self_loops,
        }
    }

    #[inline]
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    #[inline]
    pub fn edges(&self) -> &[DirectedEdge] {
        &self.edges
    }

    #[inline]
    pub fn edge(&self, index: usize) -> &DirectedEdge {
        &self.edges[index]
    }

    #[inline]
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    #[inline]
    pub fn self_loops(&self) -> usize {
        self.self_loops
    }

    /// 按角度逆时针排序的出边。
    #[inline]
    pub fn outgoing(&self, node: NodeId) -> &[usize] {
        &self.outgoing[node.index()]
    }

    #[inline]
    pub fn twin(edge: usize) -> usize {
        edge ^ 1
    }

    /// 同一面上的下一条边：到达节点出边列表中位于反向边之前的那一条（循环）。
    pub fn next_in_face(&self, edge: usize) -> usize {
        let arrival = self.edges[edge].to;
        let twin = Self::twin(edge);
        let list = &self.outgoing[arrival.index()];
        let slot = self.edges[twin].slot;
        list[(slot + list.len() - 1) % list.len()]
    }

    #[inline]
    pub fn mark_visited(&mut self, edge: usize) {
        self.edges[edge].visited = true;
    }

    pub fn reset_visited(&mut self) {
        for edge in &mut self.edges {
            edge.visited = false;
        }
    }
}

/// 离开首点的方向角。第二个采样点与首点重合时继续向后取点。
fn departure_angle(points: &[Point2]) -> f64 {
    let origin = points[0];
    points[1..]
        .iter()
        .find(|point| point.distance_squared(origin) > 1e-24)
        .map(|point| origin.vector_to(*point).angle())
        .unwrap_or(0.0)
}

type IndexedPoint = GeomWithData<[f64; 2], usize>;

/// 把端点合并为节点，返回节点表与每个端点所属的节点。
/// 节点按其第一个端点在输入中的顺序编号。
pub fn merge_endpoints(
    points: &[Point2],
    tolerance: f64,
    merge: NodeMerge,
) -> (Vec<Node>, Vec<NodeId>) {
    match merge {
        NodeMerge::Clustered => merge_clustered(points, tolerance),
        NodeMerge::FirstMatch => merge_first_match(points, tolerance),
    }
}

fn merge_first_match(points: &[Point2], tolerance: f64) -> (Vec<Node>, Vec<NodeId>) {
    let mut nodes: Vec<Node> = Vec::new();
    let mut assignment = Vec::with_capacity(points.len());
    for point in points {
        let existing = nodes
            .iter()
            .find(|node| node.position.is_near(*point, tolerance))
            .map(|node| node.id);
        let id = existing.unwrap_or_else(|| {
            let id = NodeId(nodes.len());
            nodes.push(Node {
                id,
                position: *point,
            });
            id
        });
        assignment.push(id);
    }
    (nodes, assignment)
}

fn merge_clustered(points: &[Point2], tolerance: f64) -> (Vec<Node>, Vec<NodeId>) {
    let tree = RTree::bulk_load(
        points
            .iter()
            .enumerate()
            .map(|(index, point)| IndexedPoint::new([point.x(), point.y()], index))
            .collect(),
    );

    let mut sets = DisjointSet::new(points.len());
    let squared = tolerance * tolerance;
    for (index, point) in points.iter().enumerate() {
        for neighbour in tree.locate_within_distance([point.x(), point.y()], squared) {
            if neighbour.data != index && points[neighbour.data].is_near(*point, tolerance) {
                sets.union(index, neighbour.data);
            }
        }
    }

    // 节点位置取簇内端点的平均值
    let mut root_to_node = vec![usize::MAX; points.len()];
    let mut sums: Vec<(glam::DVec2, usize)> = Vec::new();
    let mut assignment = Vec::with_capacity(points.len());
    for (index, point) in points.iter().enumerate() {
        let root = sets.find(index);
        if root_to_node[root] == usize::MAX {
            root_to_node[root] = sums.len();
            sums.push((glam::DVec2::ZERO, 0));
        }
        let node = root_to_node[root];
        sums[node].0 += point.as_vec2();
        sums[node].1 += 1;
        assignment.push(NodeId(node));
    }

    let nodes = sums
        .into_iter()
        .enumerate()
        .map(|(index, (sum, count))| Node {
            id: NodeId(index),
            position: Point2::from_vec(sum / count as f64),
        })
        .collect();
    (nodes, assignment)
}

/// 带路径压缩与按秩合并的并查集。
struct DisjointSet {
    parent: Vec<usize>,
    rank: Vec<u8>,
}

impl DisjointSet {
    fn new(len: usize) -> Self {
        Self {
            parent: (0..len).collect(),
            rank: vec![0; len],
        }
    }

    fn find(&mut self, mut index: usize) -> usize {
        let mut root = index;
        while self.parent[root] != root {
            root = self.parent[root];
        }
        while self.parent[index] != root {
            let next = self.parent[index];
            self.parent[index] = root;
            index = next;
        }
        root
    }

    fn union(&mut self, a: usize, b: usize) {
        let a = self.find(a);
        let b = self.find(b);
        if a == b {
            return;
        }
        match self.rank[a].cmp(&self.rank[b]) {
            std::cmp::Ordering::Less => self.parent[a] = b,
            std::cmp::Ordering::Greater => self.parent[b] = a,
            std::cmp::Ordering::Equal => {
                self.parent[b] = a;
                self.rank[a] += 1;
            }
        }
    }
}
