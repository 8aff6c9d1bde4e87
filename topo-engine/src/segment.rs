//! 线段提取：把采样结果分成直接闭合的图元与待拼接的开放线段。

use topo_core::geometry::Point2;
use topo_core::primitive::{Primitive, PrimitiveId};
use tracing::{debug, warn};

use crate::errors::Diagnostic;
use crate::sampler::{ClosedOutline, Sampled, SamplingOptions, sample_primitive};

/// 线段的来源：原始图元，以及（若来自直接闭合图元）它在 [`Extraction::closed`] 中的下标。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SegmentOrigin {
    pub primitive: Option<PrimitiveId>,
    pub closed_index: Option<usize>,
}

impl SegmentOrigin {
    pub fn primitive(id: PrimitiveId) -> Self {
        Self {
            primitive: Some(id),
            closed_index: None,
        }
    }
}

/// 有序折线。`points.len() >= 2`，`start`/`end` 即首尾点。
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub points: Vec<Point2>,
    pub start: Point2,
    pub end: Point2,
    pub is_closed: bool,
    pub origin: SegmentOrigin,
}

impl Segment {
    /// 由采样点构造开放线段；点数不足两个时返回 `None`。
    pub fn open(points: Vec<Point2>, origin: SegmentOrigin) -> Option<Self> {
        let points = dedup_consecutive(points);
        if points.len() < 2 {
            return None;
        }
        let start = points[0];
        let end = points[points.len() - 1];
        Some(Self {
            points,
            start,
            end,
            is_closed: false,
            origin,
        })
    }

    /// 由闭合环构造线段。`points` 不重复首点。
    pub fn closed(ring: &[Point2], origin: SegmentOrigin) -> Option<Self> {
        let mut points = dedup_consecutive(ring.to_vec());
        if points.len() > 1 && points[0].distance_squared(points[points.len() - 1]) <= 1e-24 {
            points.pop();
        }
        if points.len() < 3 {
            return None;
        }
        let start = points[0];
        Some(Self {
            points,
            start,
            end: start,
            is_closed: true,
            origin,
        })
    }

    pub fn reversed(&self) -> Self {
        let mut points = self.points.clone();
        points.reverse();
        Self {
            start: self.end,
            end: self.start,
            points,
            is_closed: self.is_closed,
            origin: self.origin,
        }
    }

    /// 在中点处把闭合线段拆成两段半弧，使其能作为普通边进入平面图。
    pub fn split_closed(&self) -> [Segment; 2] {
        let middle = self.points.len() / 2;
        let first = self.points[..=middle].to_vec();
        let mut second = self.points[middle..].to_vec();
        second.push(self.points[0]);
        [
            Segment {
                start: first[0],
                end: first[first.len() - 1],
                points: first,
                is_closed: false,
                origin: self.origin,
            },
            Segment {
                start: second[0],
                end: second[second.len() - 1],
                points: second,
                is_closed: false,
                origin: self.origin,
            },
        ]
    }

    /// 首尾落在容差内的开放线段没有可用的拓扑意义。
    #[inline]
    pub fn is_degenerate(&self, tolerance: f64) -> bool {
        !self.is_closed && self.start.is_near(self.end, tolerance)
    }
}

fn dedup_consecutive(mut points: Vec<Point2>) -> Vec<Point2> {
    points.dedup_by(|current, previous| current.distance_squared(*previous) <= 1e-24);
    points
}

/// 直接闭合的图元。
#[derive(Debug, Clone, PartialEq)]
pub struct ClosedPrimitive {
    pub source: PrimitiveId,
    pub kind: &'static str,
    pub outline: ClosedOutline,
}

impl ClosedPrimitive {
    #[inline]
    pub fn area(&self) -> f64 {
        self.outline.area()
    }

    #[inline]
    pub fn exact_area(&self) -> Option<f64> {
        self.outline.exact_area
    }

    /// 作为闭合线段，`index` 为它在闭合图元列表中的位置。
    pub fn to_segment(&self, index: usize) -> Option<Segment> {
        Segment::closed(
            &self.outline.ring,
            SegmentOrigin {
                primitive: Some(self.source),
                closed_index: Some(index),
            },
        )
    }
}

#[derive(Debug, Default, Clone)]
pub struct Extraction {
    pub closed: Vec<ClosedPrimitive>,
    pub open: Vec<Segment>,
    pub diagnostics: Vec<Diagnostic>,
    /// 被丢弃的退化线段数量。
    pub degenerate: usize,
}

impl Extraction {
    #[inline]
    pub fn has_open_geometry(&self) -> bool {
        !self.open.is_empty()
    }
}

/// 逐个采样图元并分类。单个图元失败只记录诊断，不会中断整个过程。
pub fn extract_segments(
    primitives: &[(PrimitiveId, Primitive)],
    sampling: &SamplingOptions,
    tolerance: f64,
) -> Extraction {
    let mut extraction = Extraction::default();
    for (id, primitive) in primitives {
        match sample_primitive(primitive, sampling) {
            Ok(Sampled::Closed(outline)) => {
                extraction.closed.push(ClosedPrimitive {
                    source: *id,
                    kind: primitive.kind(),
                    outline,
                });
            }
            Ok(Sampled::Open(points)) => {
                match Segment::open(points, SegmentOrigin::primitive(*id)) {
                    Some(segment) if !segment.is_degenerate(tolerance) => {
                        extraction.open.push(segment)
                    }
                    _ => {
                        debug!(primitive = id.get(), kind = primitive.kind(), "丢弃退化线段");
                        extraction.degenerate += 1;
                    }
                }
            }
            Ok(Sampled::Empty) => {}
            Err(reason) => {
                let diagnostic = Diagnostic {
                    primitive: *id,
                    kind: primitive.kind(),
                    reason,
                };
                warn!(%diagnostic, "跳过无法采样的图元");
                extraction.diagnostics.push(diagnostic);
            }
        }
    }
    debug!(
        closed = extraction.closed.len(),
        open = extraction.open.len(),
        degenerate = extraction.degenerate,
        skipped = extraction.diagnostics.len(),
        "线段提取完成"
    );
    extraction
}
