//! 面积汇总。

use std::fmt;

use crate::errors::Diagnostic;
use crate::nesting::Nesting;

/// 总面积来自哪条计算路径。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AreaSource {
    /// 没有开放线段，直接汇总闭合图元。
    FastPath,
    /// 平面图面遍历得到的外边界。
    GraphFace,
    /// 链式拼接得到的外边界。
    ChainPolygon,
    /// 没有任何闭合几何。
    None,
}

impl fmt::Display for AreaSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            AreaSource::FastPath => "fast-path",
            AreaSource::GraphFace => "graph-face",
            AreaSource::ChainPolygon => "chain-polygon",
            AreaSource::None => "none",
        };
        f.write_str(label)
    }
}

/// 一次面积计算的汇总。
///
/// `total_area` 的口径随路径变化：快速路径（图纸只含闭合图元）累加所有最外层闭合图元的面积；
/// 一旦存在开放线段就改走拼接路径，只报告面积最大的那一个外轮廓。因此在十个互不相交的圆旁
/// 加一条无关的直线，总面积会从十个圆之和降为一个圆的面积。
#[derive(Debug, Clone, PartialEq)]
pub struct AreaReport {
    /// 外边界面积，始终非负；孔不扣除。
    pub total_area: f64,
    pub source: AreaSource,
    pub nesting: Nesting,
    pub closed_primitives: usize,
    pub open_segments: usize,
    pub degenerate_segments: usize,
    pub unused_segments: usize,
    pub diagnostics: Vec<Diagnostic>,
}

impl AreaReport {
    #[inline]
    pub fn has_closed_geometry(&self) -> bool {
        !self.nesting.is_empty()
    }
}

/// 快速路径：未被其他闭合图元包含的闭合图元面积之和。
pub fn fast_path_total(nesting: &Nesting) -> f64 {
    nesting
        .contours
        .iter()
        .filter(|contour| contour.depth == 0)
        .map(|contour| contour.area())
        .sum()
}

/// 外边界面积；没有轮廓时为 0。
pub fn outer_total(nesting: &Nesting) -> f64 {
    nesting.outer().map(|contour| contour.area()).unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nesting::{ContourRing, resolve_nesting};
    use topo_core::geometry::Point2;

    fn square(x: f64, y: f64, size: f64) -> ContourRing {
        ContourRing::new(vec![
            Point2::new(x, y),
            Point2::new(x + size, y),
            Point2::new(x + size, y + size),
            Point2::new(x, y + size),
        ])
    }

    #[test]
    fn fast_path_sums_only_top_level_contours() {
        let nesting = resolve_nesting(vec![
            square(0.0, 0.0, 10.0),
            square(2.0, 2.0, 2.0),
            square(20.0, 0.0, 5.0),
        ]);
        assert!((fast_path_total(&nesting) - 125.0).abs() < 1e-9);
        assert!((outer_total(&nesting) - 100.0).abs() < 1e-9);
    }

    #[test]
    fn empty_nesting_has_zero_area() {
        let nesting = Nesting::default();
        assert_eq!(fast_path_total(&nesting), 0.0);
        assert_eq!(outer_total(&nesting), 0.0);
    }
}
