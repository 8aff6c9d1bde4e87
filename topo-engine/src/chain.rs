//! 贪心链式拼接：按输入顺序把首尾相接的开放线段串成闭合多边形。

use topo_core::geometry::Point2;
use tracing::debug;

use crate::polygon::{ensure_ccw, signed_area};
use crate::segment::Segment;

/// 一条闭合链：逆时针环加上组成它的线段下标。
#[derive(Debug, Clone, PartialEq)]
pub struct ClosedChain {
    pub points: Vec<Point2>,
    pub segments: Vec<usize>,
}

impl ClosedChain {
    #[inline]
    pub fn area(&self) -> f64 {
        signed_area(&self.points).abs()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChainOutcome {
    pub chains: Vec<ClosedChain>,
    /// 没能进入任何闭合链的线段下标，按输入顺序。
    pub unused: Vec<usize>,
}

/// 依次以每条未使用的线段为起点向后拼接。每一步取第一条起点（正向）或终点（反向）
/// 落在链尾容差内的未使用线段；链尾回到起点即闭合，走入死路时释放本次尝试占用的线段。
pub fn assemble_chains(segments: &[Segment], tolerance: f64) -> ChainOutcome {
    let mut used = vec![false; segments.len()];
    let mut chains = Vec::new();

    for seed in 0..segments.len() {
        if used[seed] {
            continue;
        }
        used[seed] = true;
        let mut attempt = vec![seed];
        let mut points = segments[seed].points.clone();
        let start = segments[seed].start;
        let mut end = segments[seed].end;
        let mut closed = false;

        loop {
            if attempt.len() > 1 && end.is_near(start, tolerance) {
                closed = true;
                break;
            }
            let Some((next, reversed)) = find_continuation(segments, &used, end, tolerance) else {
                break;
            };
            used[next] = true;
            attempt.push(next);
            let piece = if reversed {
                segments[next].reversed()
            } else {
                segments[next].clone()
            };
            points.extend_from_slice(&piece.points[1..]);
            end = piece.end;
        }

        if closed {
            points.pop();
            if points.len() >= 3 {
                chains.push(ClosedChain {
                    points: ensure_ccw(points),
                    segments: attempt,
                });
                continue;
            }
        }
        for index in attempt {
            used[index] = false;
        }
    }

    let mut in_chain = vec![false; segments.len()];
    for chain in &chains {
        for index in &chain.segments {
            in_chain[*index] = true;
        }
    }
    let unused: Vec<usize> = (0..segments.len()).filter(|index| !in_chain[*index]).collect();
    debug!(
        chains = chains.len(),
        unused = unused.len(),
        "链式拼接完成"
    );
    ChainOutcome { chains, unused }
}

fn find_continuation(
    segments: &[Segment],
    used: &[bool],
    end: Point2,
    tolerance: f64,
) -> Option<(usize, bool)> {
    segments
        .iter()
        .enumerate()
        .filter(|(index, _)| !used[*index])
        .find_map(|(index, segment)| {
            if segment.start.is_near(end, tolerance) {
                Some((index, false))
            } else if segment.end.is_near(end, tolerance) {
                Some((index, true))
            } else {
                None
            }
        })
}
