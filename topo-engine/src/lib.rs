pub mod blocks;
pub mod chain;
pub mod engine;
pub mod faces;
pub mod graph;
pub mod nesting;
pub mod polygon;
pub mod report;
pub mod sampler;
pub mod segment;
pub mod strategy;

pub use engine::{EngineOptions, ExtrusionOutput, TopologyEngine};
pub use report::{AreaReport, AreaSource};
pub use strategy::{ContourStrategy, StrategyKind};

/// 默认端点合并容差（图纸单位）。
pub const DEFAULT_TOLERANCE: f64 = 0.5;

pub mod errors {
    use std::fmt;

    use thiserror::Error;
    use topo_core::primitive::PrimitiveId;

    /// 只有结构性错误才会中断一次计算；单个图元的问题见 [`SkipReason`]。
    #[derive(Debug, Error)]
    pub enum EngineError {
        #[error("tolerance must be a positive finite number, got {0}")]
        InvalidTolerance(f64),
        #[error("sampling option `{name}` must be at least {min}, got {value}")]
        InvalidSampling {
            name: &'static str,
            min: usize,
            value: usize,
        },
        #[error("drawing has {count} primitives after block expansion, limit is {limit}")]
        TooManyPrimitives { count: usize, limit: usize },
    }

    /// 图元被跳过的原因。跳过不是错误，计算会继续进行。
    #[derive(Debug, Clone, PartialEq, Error)]
    pub enum SkipReason {
        #[error("non-finite value in `{field}`")]
        NonFinite { field: &'static str },
        #[error("radius must be positive, got {0}")]
        NonPositiveRadius(f64),
        #[error("degenerate ellipse axes")]
        DegenerateAxis,
        #[error("needs at least {required} vertices, got {found}")]
        TooFewVertices { required: usize, found: usize },
        #[error("block `{0}` is not defined")]
        UnknownBlock(String),
        #[error("block `{0}` references itself")]
        RecursiveBlock(String),
        #[error("block nesting exceeds {0} levels")]
        NestingTooDeep(usize),
        #[error("INSERT of block `{0}` reached the sampler unexpanded")]
        UnexpandedInsert(String),
    }

    /// 一条跳过记录：哪个图元、什么类型、为什么。
    #[derive(Debug, Clone, PartialEq)]
    pub struct Diagnostic {
        pub primitive: PrimitiveId,
        pub kind: &'static str,
        pub reason: SkipReason,
    }

    impl fmt::Display for Diagnostic {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(
                f,
                "{} #{} skipped: {}",
                self.kind,
                self.primitive.get(),
                self.reason
            )
        }
    }
}
