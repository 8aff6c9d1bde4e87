//! 轮廓分类与嵌套：按面积排序，用奇偶射线计算每个轮廓的嵌套深度并组装带孔形状。

use topo_core::geometry::Point2;
use topo_core::primitive::PrimitiveId;
use tracing::debug;

use crate::faces::Face;
use crate::polygon::{centroid, contains_point, ensure_ccw, interior_point, signed_area};

/// 面积低于该值的面视为退化（来回走过同一条悬挂边形成的零面积面）。
pub const AREA_EPSILON: f64 = 1e-9;

/// 进入嵌套计算的闭合环。
#[derive(Debug, Clone, PartialEq)]
pub struct ContourRing {
    pub points: Vec<Point2>,
    pub exact_area: Option<f64>,
    pub source: Option<PrimitiveId>,
}

impl ContourRing {
    pub fn new(points: Vec<Point2>) -> Self {
        Self {
            points,
            exact_area: None,
            source: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Contour {
    /// 逆时针方向的环。
    pub points: Vec<Point2>,
    pub signed_area: f64,
    pub centroid: Point2,
    pub interior: Point2,
    /// 偶数为实体，奇数为孔。
    pub depth: usize,
    /// 直接包含它的最小轮廓。
    pub parent: Option<usize>,
    pub exact_area: Option<f64>,
    pub source: Option<PrimitiveId>,
}

impl Contour {
    /// 存在闭式解时用精确面积，否则用采样环面积。
    #[inline]
    pub fn area(&self) -> f64 {
        self.exact_area.unwrap_or(self.signed_area.abs())
    }

    #[inline]
    pub fn is_hole(&self) -> bool {
        self.depth % 2 == 1
    }
}

/// 挤出用的形状：外轮廓及其直接包含的孔。
#[derive(Debug, Clone, PartialEq)]
pub struct Shape {
    pub outer: Contour,
    pub holes: Vec<Contour>,
}

/// 按面积降序排列的轮廓集合。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Nesting {
    pub contours: Vec<Contour>,
}

impl Nesting {
    /// 外边界：面积最大的轮廓。
    #[inline]
    pub fn outer(&self) -> Option<&Contour> {
        self.contours.first()
    }

    pub fn len(&self) -> usize {
        self.contours.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contours.is_empty()
    }

    pub fn max_depth(&self) -> usize {
        self.contours.iter().map(|contour| contour.depth).max().unwrap_or(0)
    }

    /// 每个偶数深度的轮廓组成一个形状，父轮廓为它的奇数深度轮廓作为孔。
    pub fn shapes(&self) -> Vec<Shape> {
        self.contours
            .iter()
            .enumerate()
            .filter(|(_, contour)| !contour.is_hole())
            .map(|(index, contour)| Shape {
                outer: contour.clone(),
                holes: self
                    .contours
                    .iter()
                    .filter(|hole| hole.is_hole() && hole.parent == Some(index))
                    .cloned()
                    .collect(),
            })
            .collect()
    }
}

/// 从面中挑出参与嵌套的轮廓：丢弃顺时针的外部面；若没有正面积的面，退回面积绝对值最大的面。
pub fn classify_faces(
    faces: &[Face],
    exact_areas: &[Option<f64>],
    sources: &[PrimitiveId],
) -> Vec<ContourRing> {
    let to_ring = |face: &Face| {
        let exact_area = face
            .closed_source
            .and_then(|index| exact_areas.get(index).copied().flatten());
        let source = face
            .closed_source
            .and_then(|index| sources.get(index).copied());
        ContourRing {
            points: ensure_ccw(face.points.clone()),
            exact_area,
            source,
        }
    };

    let positive: Vec<ContourRing> = faces
        .iter()
        .filter(|face| face.signed_area > AREA_EPSILON)
        .map(to_ring)
        .collect();
    if !positive.is_empty() {
        return positive;
    }

    faces
        .iter()
        .filter(|face| face.area() > AREA_EPSILON)
        .max_by(|a, b| a.area().total_cmp(&b.area()))
        .map(to_ring)
        .into_iter()
        .collect()
}

/// 计算嵌套关系。深度等于包含该轮廓内点的更大轮廓数量，父轮廓取其中面积最小者。
pub fn resolve_nesting(rings: Vec<ContourRing>) -> Nesting {
    let mut contours: Vec<Contour> = rings
        .into_iter()
        .filter(|ring| ring.points.len() >= 3)
        .map(|ring| {
            let points = ensure_ccw(ring.points);
            Contour {
                signed_area: signed_area(&points),
                centroid: centroid(&points),
                interior: interior_point(&points),
                depth: 0,
                parent: None,
                exact_area: ring.exact_area,
                source: ring.source,
                points,
            }
        })
        .collect();
    contours.sort_by(|a, b| b.area().total_cmp(&a.area()));

    for index in 0..contours.len() {
        let interior = contours[index].interior;
        let mut depth = 0;
        let mut parent = None;
        for candidate in 0..index {
            if contains_point(&contours[candidate].points, interior) {
                depth += 1;
                parent = Some(candidate);
            }
        }
        contours[index].depth = depth;
        contours[index].parent = parent;
    }

    let nesting = Nesting { contours };
    debug!(
        contours = nesting.len(),
        max_depth = nesting.max_depth(),
        "嵌套关系计算完成"
    );
    nesting
}
