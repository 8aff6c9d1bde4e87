//! 多边形基础运算：鞋带公式面积、质心、奇偶射线包含测试与内点搜索。

use topo_core::geometry::{Bounds2D, Point2};

/// 有符号面积，逆时针为正。环不需要重复首点。
pub fn signed_area(ring: &[Point2]) -> f64 {
    if ring.len() < 3 {
        return 0.0;
    }
    let mut twice_area = 0.0;
    for (index, current) in ring.iter().enumerate() {
        let next = ring[(index + 1) % ring.len()];
        twice_area += current.x() * next.y() - next.x() * current.y();
    }
    twice_area * 0.5
}

#[inline]
pub fn is_clockwise(ring: &[Point2]) -> bool {
    signed_area(ring) < 0.0
}

/// 把环调整为逆时针方向。
pub fn ensure_ccw(mut ring: Vec<Point2>) -> Vec<Point2> {
    if is_clockwise(&ring) {
        ring.reverse();
    }
    ring
}

/// 面积加权质心；面积退化时退回顶点平均值。
pub fn centroid(ring: &[Point2]) -> Point2 {
    if ring.is_empty() {
        return Point2::new(0.0, 0.0);
    }
    let area = signed_area(ring);
    if area.abs() <= f64::EPSILON {
        return vertex_average(ring);
    }
    let mut cx = 0.0;
    let mut cy = 0.0;
    for (index, current) in ring.iter().enumerate() {
        let next = ring[(index + 1) % ring.len()];
        let cross = current.x() * next.y() - next.x() * current.y();
        cx += (current.x() + next.x()) * cross;
        cy += (current.y() + next.y()) * cross;
    }
    let factor = 1.0 / (6.0 * area);
    Point2::new(cx * factor, cy * factor)
}

fn vertex_average(ring: &[Point2]) -> Point2 {
    let sum = ring
        .iter()
        .fold(glam::DVec2::ZERO, |acc, point| acc + point.as_vec2());
    Point2::from_vec(sum / ring.len() as f64)
}

/// 奇偶射线法：向 +X 方向发射水平射线统计穿越次数。
pub fn contains_point(ring: &[Point2], point: Point2) -> bool {
    if ring.len() < 3 {
        return false;
    }
    let mut inside = false;
    let mut previous = ring[ring.len() - 1];
    for &current in ring {
        let crosses = (current.y() > point.y()) != (previous.y() > point.y());
        if crosses {
            let x_at = current.x()
                + (point.y() - current.y()) * (previous.x() - current.x())
                    / (previous.y() - current.y());
            if point.x() < x_at {
                inside = !inside;
            }
        }
        previous = current;
    }
    inside
}

/// 轮廓内部的代表点。质心落在凹多边形外时，沿过包围盒中线的水平扫描线取最宽一段的中点。
pub fn interior_point(ring: &[Point2]) -> Point2 {
    let center = centroid(ring);
    if contains_point(ring, center) {
        return center;
    }
    let bounds: Bounds2D = ring.iter().copied().collect();
    if bounds.is_empty() {
        return center;
    }

    // 中线可能恰好穿过顶点，依次尝试几条略微错开的扫描线。
    for fraction in [0.5, 0.5 + 1e-3, 0.25, 0.75, 0.125, 0.875] {
        let y = bounds.min().y() + bounds.height() * fraction;
        if let Some(point) = widest_scanline_midpoint(ring, y) {
            return point;
        }
    }
    center
}

fn widest_scanline_midpoint(ring: &[Point2], y: f64) -> Option<Point2> {
    let mut crossings = Vec::new();
    let mut previous = ring[ring.len() - 1];
    for &current in ring {
        if (current.y() > y) != (previous.y() > y) {
            let x = current.x()
                + (y - current.y()) * (previous.x() - current.x()) / (previous.y() - current.y());
            crossings.push(x);
        }
        previous = current;
    }
    crossings.sort_by(f64::total_cmp);

    crossings
        .chunks_exact(2)
        .filter(|pair| pair[1] - pair[0] > f64::EPSILON)
        .max_by(|a, b| (a[1] - a[0]).total_cmp(&(b[1] - b[0])))
        .map(|pair| Point2::new((pair[0] + pair[1]) * 0.5, y))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(size: f64) -> Vec<Point2> {
        vec![
            Point2::new(0.0, 0.0),
            Point2::new(size, 0.0),
            Point2::new(size, size),
            Point2::new(0.0, size),
        ]
    }

    #[test]
    fn signed_area_follows_winding() {
        let ccw = square(4.0);
        assert!((signed_area(&ccw) - 16.0).abs() < 1e-12);
        let mut cw = ccw.clone();
        cw.reverse();
        assert!((signed_area(&cw) + 16.0).abs() < 1e-12);
        assert!(is_clockwise(&cw));
        assert!((signed_area(&ensure_ccw(cw)) - 16.0).abs() < 1e-12);
    }

    #[test]
    fn centroid_of_square_is_center() {
        let center = centroid(&square(4.0));
        assert!(center.distance(Point2::new(2.0, 2.0)) < 1e-12);
    }

    #[test]
    fn contains_point_uses_even_odd() {
        let ring = square(10.0);
        assert!(contains_point(&ring, Point2::new(5.0, 5.0)));
        assert!(!contains_point(&ring, Point2::new(15.0, 5.0)));
        assert!(!contains_point(&ring, Point2::new(-1.0, 5.0)));
    }

    #[test]
    fn interior_point_of_concave_ring_is_inside() {
        // C 形：质心落在缺口里
        let ring = vec![
            Point2::new(0.0, 0.0),
            Point2::new(10.0, 0.0),
            Point2::new(10.0, 2.0),
            Point2::new(2.0, 2.0),
            Point2::new(2.0, 8.0),
            Point2::new(10.0, 8.0),
            Point2::new(10.0, 10.0),
            Point2::new(0.0, 10.0),
        ];
        assert!(!contains_point(&ring, centroid(&ring)));
        let point = interior_point(&ring);
        assert!(contains_point(&ring, point));
    }
}
