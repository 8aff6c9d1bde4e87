//! 曲线采样：把每种图元转换为有序的二维点序列，闭合图元给出环与精确面积。

use std::f64::consts::{PI, TAU};

use glam::{DVec2, DVec3};
use topo_core::geometry::Point2;
use topo_core::primitive::{Arc, Circle, Ellipse, Polyline, Primitive, Spline};

use crate::errors::SkipReason;
use crate::polygon::signed_area;

/// 判定"扫过整圈"的角度容差（弧度）。
pub const FULL_TURN_TOLERANCE: f64 = 0.01;

const SEGMENTS_PER_HALF_TURN: f64 = 32.0;
const BULGE_MIN_SEGMENTS: usize = 8;
const BULGE_EPSILON: f64 = 1e-9;
const KNOT_EPSILON: f64 = 1e-12;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplingOptions {
    pub circle_segments: usize,
    pub arc_min_segments: usize,
    pub spline_min_samples: usize,
    pub spline_samples_per_control_point: usize,
    pub fit_segments_per_span: usize,
}

impl Default for SamplingOptions {
    fn default() -> Self {
        Self {
            circle_segments: 64,
            arc_min_segments: 32,
            spline_min_samples: 50,
            spline_samples_per_control_point: 10,
            fit_segments_per_span: 16,
        }
    }
}

/// 直接闭合图元的描述：不含重复终点的环，以及存在闭式解时的精确面积。
#[derive(Debug, Clone, PartialEq)]
pub struct ClosedOutline {
    pub ring: Vec<Point2>,
    pub exact_area: Option<f64>,
}

impl ClosedOutline {
    /// 精确面积优先，否则用采样环的鞋带公式面积。
    pub fn area(&self) -> f64 {
        self.exact_area
            .unwrap_or_else(|| signed_area(&self.ring).abs())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Sampled {
    Open(Vec<Point2>),
    Closed(ClosedOutline),
    /// 不贡献轮廓的图元（POINT）。
    Empty,
}

/// 采样单个图元。缺字段或含非有限数值的图元返回 [`SkipReason`]，由调用方跳过。
pub fn sample_primitive(
    primitive: &Primitive,
    options: &SamplingOptions,
) -> Result<Sampled, SkipReason> {
    if let Some(field) = primitive.non_finite_field() {
        return Err(SkipReason::NonFinite { field });
    }
    match primitive {
        Primitive::Line(line) => Ok(Sampled::Open(vec![line.start.xy(), line.end.xy()])),
        Primitive::Circle(circle) => sample_circle_primitive(circle, options),
        Primitive::Arc(arc) => sample_arc_primitive(arc, options),
        Primitive::Ellipse(ellipse) => sample_ellipse_primitive(ellipse, options),
        Primitive::Polyline(polyline) => sample_polyline_primitive(polyline),
        Primitive::Spline(spline) => sample_spline_primitive(spline, options),
        Primitive::Point(_) => Ok(Sampled::Empty),
        Primitive::Insert(insert) => Err(SkipReason::UnexpandedInsert(insert.block_name.clone())),
    }
}

fn require_positive_radius(radius: f64) -> Result<(), SkipReason> {
    if radius > f64::EPSILON {
        Ok(())
    } else {
        Err(SkipReason::NonPositiveRadius(radius))
    }
}

fn sample_circle_primitive(
    circle: &Circle,
    options: &SamplingOptions,
) -> Result<Sampled, SkipReason> {
    require_positive_radius(circle.radius)?;
    Ok(Sampled::Closed(ClosedOutline {
        ring: sample_circle(circle.center, circle.radius, options.circle_segments),
        exact_area: Some(PI * circle.radius * circle.radius),
    }))
}

fn sample_arc_primitive(arc: &Arc, options: &SamplingOptions) -> Result<Sampled, SkipReason> {
    require_positive_radius(arc.radius)?;
    let sweep = arc_sweep(arc.start_angle, arc.end_angle);
    if is_full_turn(sweep) {
        return Ok(Sampled::Closed(ClosedOutline {
            ring: sample_circle(arc.center, arc.radius, options.circle_segments),
            exact_area: Some(PI * arc.radius * arc.radius),
        }));
    }
    let segments = arc_segment_count(sweep, options.arc_min_segments);
    Ok(Sampled::Open(sample_arc(
        arc.center,
        arc.radius,
        arc.start_angle,
        sweep,
        segments,
    )))
}

fn sample_ellipse_primitive(
    ellipse: &Ellipse,
    options: &SamplingOptions,
) -> Result<Sampled, SkipReason> {
    let major = ellipse.major_axis.as_vec2();
    let major_length = major.length();
    if major_length <= f64::EPSILON || ellipse.ratio.abs() <= f64::EPSILON {
        return Err(SkipReason::DegenerateAxis);
    }
    let minor = DVec2::new(-major.y, major.x) * ellipse.ratio.abs();
    let center = ellipse.center.as_vec2();

    let sweep = arc_sweep(ellipse.start_parameter, ellipse.end_parameter);
    let unspecified = ellipse.start_parameter == 0.0 && ellipse.end_parameter == 0.0;
    if unspecified || is_full_turn(sweep) {
        let segments = options.circle_segments.max(3);
        let ring = (0..segments)
            .map(|i| {
                let t = TAU * i as f64 / segments as f64;
                Point2::from_vec(center + major * t.cos() + minor * t.sin())
            })
            .collect();
        let semi_minor = major_length * ellipse.ratio.abs();
        return Ok(Sampled::Closed(ClosedOutline {
            ring,
            exact_area: Some(PI * major_length * semi_minor),
        }));
    }

    let segments = arc_segment_count(sweep, options.arc_min_segments);
    let points = (0..=segments)
        .map(|i| {
            let t = ellipse.start_parameter + sweep * i as f64 / segments as f64;
            Point2::from_vec(center + major * t.cos() + minor * t.sin())
        })
        .collect();
    Ok(Sampled::Open(points))
}

fn sample_polyline_primitive(polyline: &Polyline) -> Result<Sampled, SkipReason> {
    let count = polyline.vertices.len();
    if count < 2 {
        return Err(SkipReason::TooFewVertices {
            required: 2,
            found: count,
        });
    }
    let points = sample_polyline(polyline);
    let has_bulge = polyline
        .vertices
        .iter()
        .any(|vertex| vertex.bulge.abs() > BULGE_EPSILON);
    // 两个顶点加凸度的闭合多段线是两段圆弧围成的区域，同样直接闭合。
    if polyline.is_closed && (count >= 3 || has_bulge) {
        let mut ring = points;
        ring.pop();
        if ring.len() >= 3 {
            return Ok(Sampled::Closed(ClosedOutline {
                ring,
                exact_area: None,
            }));
        }
        ring.push(ring[0]);
        return Ok(Sampled::Open(ring));
    }
    Ok(Sampled::Open(points))
}

fn sample_spline_primitive(
    spline: &Spline,
    options: &SamplingOptions,
) -> Result<Sampled, SkipReason> {
    let control_count = spline.control_points.len();
    let samples = options
        .spline_min_samples
        .max(control_count * options.spline_samples_per_control_point);

    let mut points = if knot_vector_is_valid(spline.degree, control_count, &spline.knots) {
        sample_bspline(
            spline.degree,
            &spline.knots,
            &spline.control_points,
            &spline.weights,
            samples,
        )
    } else if spline.fit_points.len() >= 2 {
        catmull_rom(
            &spline.fit_points,
            spline.is_closed,
            options.fit_segments_per_span,
        )
    } else if control_count >= 2 {
        let degree = spline.degree.clamp(1, control_count - 1);
        let knots = clamped_uniform_knots(control_count, degree);
        sample_bspline(
            degree,
            &knots,
            &spline.control_points,
            &spline.weights,
            samples,
        )
    } else {
        return Err(SkipReason::TooFewVertices {
            required: 2,
            found: control_count.max(spline.fit_points.len()),
        });
    };

    let defining_points = if control_count > 0 {
        control_count
    } else {
        spline.fit_points.len()
    };
    if spline.is_closed && defining_points >= 3 {
        if let (Some(first), Some(last)) = (points.first().copied(), points.last().copied()) {
            if first.distance(last) <= 1e-9 {
                points.pop();
            }
        }
        if points.len() >= 3 {
            return Ok(Sampled::Closed(ClosedOutline {
                ring: points,
                exact_area: None,
            }));
        }
    }
    Ok(Sampled::Open(points))
}

/// 从起始角逆时针扫到终止角的角度，落在 (0, 2π]；起止相同视为整圈。
pub fn arc_sweep(start: f64, end: f64) -> f64 {
    let sweep = (end - start).rem_euclid(TAU);
    if sweep <= 0.0 { TAU } else { sweep }
}

#[inline]
pub fn is_full_turn(sweep: f64) -> bool {
    (sweep - TAU).abs() < FULL_TURN_TOLERANCE
}

/// 开放圆弧的分段数：`max(min, ceil(|sweep| / π × 32))`。
pub fn arc_segment_count(sweep: f64, min_segments: usize) -> usize {
    let scaled = (sweep.abs() / PI * SEGMENTS_PER_HALF_TURN).ceil() as usize;
    scaled.max(min_segments).max(1)
}

/// 整圆采样为 `segments` 个点组成的环（不重复首点）。
pub fn sample_circle(center: Point2, radius: f64, segments: usize) -> Vec<Point2> {
    let segments = segments.max(3);
    (0..segments)
        .map(|i| point_on_circle(center, radius, TAU * i as f64 / segments as f64))
        .collect()
}

/// 从 `start_angle` 起扫过 `sweep`（正值逆时针）采样 `segments + 1` 个点。
pub fn sample_arc(
    center: Point2,
    radius: f64,
    start_angle: f64,
    sweep: f64,
    segments: usize,
) -> Vec<Point2> {
    let segments = segments.max(1);
    (0..=segments)
        .map(|i| point_on_circle(center, radius, start_angle + sweep * i as f64 / segments as f64))
        .collect()
}

#[inline]
fn point_on_circle(center: Point2, radius: f64, angle: f64) -> Point2 {
    Point2::from_vec(center.as_vec2() + DVec2::new(angle.cos(), angle.sin()) * radius)
}

/// 展开一段带凸度的多段线边。`bulge = tan(θ/4)`，正值逆时针。
/// 返回点列的首尾严格等于原顶点。
pub fn expand_bulge(start: Point2, end: Point2, bulge: f64) -> Vec<Point2> {
    let start_vec = start.as_vec2();
    let end_vec = end.as_vec2();
    let chord = end_vec - start_vec;
    let chord_len = chord.length();
    if bulge.abs() <= BULGE_EPSILON || chord_len <= f64::EPSILON {
        return vec![start, end];
    }

    let included = 4.0 * bulge.atan();
    let radius = chord_len * (1.0 + bulge * bulge) / (4.0 * bulge.abs());
    // 圆心沿弦的左法线偏移 (c/2)·(1-b²)/(2b)，b 为负时落到右侧。
    let left = DVec2::new(-chord.y, chord.x) / chord_len;
    let offset = chord_len * (1.0 - bulge * bulge) / (4.0 * bulge);
    let center = (start_vec + end_vec) * 0.5 + left * offset;
    let radial = start_vec - center;
    let start_angle = radial.y.atan2(radial.x);

    let segments = arc_segment_count(included, BULGE_MIN_SEGMENTS);
    let mut points = sample_arc(
        Point2::from_vec(center),
        radius,
        start_angle,
        included,
        segments,
    );
    points[0] = start;
    if let Some(last) = points.last_mut() {
        *last = end;
    }
    points
}

/// 多段线逐边展开；闭合时末点回到首顶点。
pub fn sample_polyline(polyline: &Polyline) -> Vec<Point2> {
    let vertices = &polyline.vertices;
    let Some(first) = vertices.first() else {
        return Vec::new();
    };
    let count = vertices.len();
    let edge_count = if polyline.is_closed { count } else { count - 1 };

    let mut points = vec![first.position];
    for index in 0..edge_count {
        let from = vertices[index];
        let to = vertices[(index + 1) % count];
        let edge = expand_bulge(from.position, to.position, from.bulge);
        points.extend(edge.into_iter().skip(1));
    }
    points
}

/// 节点向量可用于 De Boor 求值：长度为 `n + p + 1`、单调不减、定义域非空。
pub fn knot_vector_is_valid(degree: usize, control_count: usize, knots: &[f64]) -> bool {
    degree >= 1
        && control_count > degree
        && knots.len() == control_count + degree + 1
        && knots.windows(2).all(|pair| pair[0] <= pair[1])
        && knots[degree] < knots[control_count]
}

/// 两端钳制的均匀节点向量，用于缺失节点向量的样条。
pub fn clamped_uniform_knots(control_count: usize, degree: usize) -> Vec<f64> {
    let spans = (control_count - degree) as f64;
    (0..control_count + degree + 1)
        .map(|i| {
            if i <= degree {
                0.0
            } else if i >= control_count {
                1.0
            } else {
                (i - degree) as f64 / spans
            }
        })
        .collect()
}

/// 样条参数定义域 `[knots[p], knots[n]]`。
#[inline]
pub fn spline_domain(degree: usize, knots: &[f64], control_count: usize) -> (f64, f64) {
    (knots[degree], knots[control_count])
}

/// 二分查找满足 `knots[i] <= t < knots[i+1]` 的区间；`t` 落在定义域右端时返回最后一个非空区间。
pub fn find_span(degree: usize, knots: &[f64], control_count: usize, t: f64) -> usize {
    if t >= knots[control_count] {
        let mut span = control_count - 1;
        while span > degree && knots[span] >= knots[span + 1] {
            span -= 1;
        }
        return span;
    }
    if t <= knots[degree] {
        let mut span = degree;
        while span + 1 < control_count && knots[span + 1] <= t {
            span += 1;
        }
        return span;
    }

    let mut low = degree;
    let mut high = control_count;
    let mut mid = (low + high) / 2;
    while t < knots[mid] || t >= knots[mid + 1] {
        if t < knots[mid] {
            high = mid;
        } else {
            low = mid;
        }
        mid = (low + high) / 2;
    }
    mid
}

/// De Boor 求值。`weights` 与控制点数量一致且全部为正时按有理样条在齐次坐标下混合。
pub fn de_boor(
    degree: usize,
    knots: &[f64],
    control_points: &[Point2],
    weights: &[f64],
    t: f64,
) -> Point2 {
    let control_count = control_points.len();
    let (lo, hi) = spline_domain(degree, knots, control_count);
    let t = t.clamp(lo, hi);
    let span = find_span(degree, knots, control_count, t);
    let rational = weights.len() == control_count && weights.iter().all(|w| *w > 0.0);

    let mut d: Vec<DVec3> = (0..=degree)
        .map(|j| {
            let index = span - degree + j;
            let point = control_points[index].as_vec2();
            let weight = if rational { weights[index] } else { 1.0 };
            DVec3::new(point.x * weight, point.y * weight, weight)
        })
        .collect();

    for r in 1..=degree {
        for j in (r..=degree).rev() {
            let left = knots[j + span - degree];
            let right = knots[j + 1 + span - r];
            let denominator = right - left;
            if denominator.abs() < KNOT_EPSILON {
                continue;
            }
            let alpha = (t - left) / denominator;
            d[j] = d[j - 1] * (1.0 - alpha) + d[j] * alpha;
        }
    }

    let result = d[degree];
    if result.z.abs() > KNOT_EPSILON {
        Point2::new(result.x / result.z, result.y / result.z)
    } else {
        Point2::new(result.x, result.y)
    }
}

/// 在定义域内均匀取 `samples + 1` 个参数求值。
pub fn sample_bspline(
    degree: usize,
    knots: &[f64],
    control_points: &[Point2],
    weights: &[f64],
    samples: usize,
) -> Vec<Point2> {
    let samples = samples.max(1);
    let (lo, hi) = spline_domain(degree, knots, control_points.len());
    (0..=samples)
        .map(|i| {
            let t = lo + (hi - lo) * i as f64 / samples as f64;
            de_boor(degree, knots, control_points, weights, t)
        })
        .collect()
}

/// 向心 Catmull-Rom 曲线插值拟合点。开放曲线在两端镜像补点；闭合曲线首尾相接并回到首点。
pub fn catmull_rom(points: &[Point2], closed: bool, segments_per_span: usize) -> Vec<Point2> {
    let count = points.len();
    if count < 2 {
        return points.to_vec();
    }
    let segments = segments_per_span.max(1);
    let at = |index: isize| -> DVec2 {
        if closed {
            points[index.rem_euclid(count as isize) as usize].as_vec2()
        } else if index < 0 {
            points[0].as_vec2() * 2.0 - points[1].as_vec2()
        } else if index as usize >= count {
            points[count - 1].as_vec2() * 2.0 - points[count - 2].as_vec2()
        } else {
            points[index as usize].as_vec2()
        }
    };

    let spans = if closed { count } else { count - 1 };
    let mut result = Vec::with_capacity(spans * segments + 1);
    result.push(points[0]);
    for span in 0..spans as isize {
        let p0 = at(span - 1);
        let p1 = at(span);
        let p2 = at(span + 1);
        let p3 = at(span + 2);
        for step in 1..=segments {
            let u = step as f64 / segments as f64;
            result.push(Point2::from_vec(centripetal_point(p0, p1, p2, p3, u)));
        }
    }
    result
}

fn centripetal_point(p0: DVec2, p1: DVec2, p2: DVec2, p3: DVec2, u: f64) -> DVec2 {
    let knot = |a: DVec2, b: DVec2| a.distance(b).sqrt().max(1e-9);
    let t0 = 0.0;
    let t1 = t0 + knot(p0, p1);
    let t2 = t1 + knot(p1, p2);
    let t3 = t2 + knot(p2, p3);
    let t = t1 + (t2 - t1) * u;

    let a1 = p0 * ((t1 - t) / (t1 - t0)) + p1 * ((t - t0) / (t1 - t0));
    let a2 = p1 * ((t2 - t) / (t2 - t1)) + p2 * ((t - t1) / (t2 - t1));
    let a3 = p2 * ((t3 - t) / (t3 - t2)) + p3 * ((t - t2) / (t3 - t2));
    let b1 = a1 * ((t2 - t) / (t2 - t0)) + a2 * ((t - t0) / (t2 - t0));
    let b2 = a2 * ((t3 - t) / (t3 - t1)) + a3 * ((t - t1) / (t3 - t1));
    b1 * ((t2 - t) / (t2 - t1)) + b2 * ((t - t1) / (t2 - t1))
}
