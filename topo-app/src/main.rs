use std::path::PathBuf;

use topo_config::{AppConfig, ConfigError, NodeMergeMode, StrategyMode, TopologyConfig};
use topo_engine::graph::NodeMerge;
use topo_engine::sampler::SamplingOptions;
use topo_engine::{EngineOptions, StrategyKind, TopologyEngine};
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt};

mod report;

/// 本次运行要做的事情。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Area,
    Extrude,
    CrossCheck,
}

fn main() {
    let mut args = std::env::args().skip(1);
    let mut config_override: Option<PathBuf> = None;
    let mut strategy_override: Option<StrategyMode> = None;
    let mut mode = Mode::Area;
    let mut input: Option<PathBuf> = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => {
                let Some(path) = args.next() else {
                    eprintln!("`--config` 需要提供配置文件路径");
                    std::process::exit(1);
                };
                config_override = Some(PathBuf::from(path));
            }
            "--strategy" => {
                strategy_override = match args.next().as_deref() {
                    Some("graph") => Some(StrategyMode::Graph),
                    Some("chain") => Some(StrategyMode::Chain),
                    _ => {
                        eprintln!("`--strategy` 只接受 graph 或 chain");
                        std::process::exit(1);
                    }
                };
            }
            "--extrude" => mode = Mode::Extrude,
            "--cross-check" => mode = Mode::CrossCheck,
            other if other.starts_with("--") => {
                eprintln!("未知参数：{other}");
                std::process::exit(1);
            }
            path => {
                if input.replace(PathBuf::from(path)).is_some() {
                    eprintln!("只能指定一个输入文件");
                    std::process::exit(1);
                }
            }
        }
    }

    let mut config = load_configuration(config_override);
    if let Some(strategy) = strategy_override {
        config.topology.strategy = strategy;
    }
    init_logging(&config);
    info!("启动拓扑重建工具");

    let engine = match TopologyEngine::new(engine_options(&config.topology)) {
        Ok(engine) => engine,
        Err(err) => {
            error!(error = %err, "拓扑参数无效");
            std::process::exit(1);
        }
    };

    let loaded = match report::load_drawing(input.as_deref()) {
        Ok(loaded) => loaded,
        Err(err) => {
            error!(error = %err, "读取图纸失败");
            std::process::exit(1);
        }
    };

    let outcome = match mode {
        Mode::Area => engine
            .area_report(&loaded.drawing)
            .map(|area| report::print_area(&loaded, &area)),
        Mode::Extrude => engine
            .extrusion(&loaded.drawing)
            .map(|extrusion| report::print_extrusion(&loaded, &extrusion)),
        Mode::CrossCheck => engine
            .cross_check(&loaded.drawing)
            .map(|divergence| report::print_divergence(&loaded, &divergence)),
    };
    if let Err(err) = outcome {
        error!(error = %err, "拓扑计算失败");
        std::process::exit(1);
    }
}

fn engine_options(topology: &TopologyConfig) -> EngineOptions {
    EngineOptions {
        tolerance: topology.tolerance,
        sampling: SamplingOptions {
            circle_segments: topology.circle_segments,
            arc_min_segments: topology.arc_min_segments,
            spline_min_samples: topology.spline_min_samples,
            spline_samples_per_control_point: topology.spline_samples_per_control_point,
            fit_segments_per_span: topology.fit_segments_per_span,
        },
        node_merge: match topology.node_merge {
            NodeMergeMode::Clustered => NodeMerge::Clustered,
            NodeMergeMode::FirstMatch => NodeMerge::FirstMatch,
        },
        area_strategy: match topology.strategy {
            StrategyMode::Graph => StrategyKind::Graph,
            StrategyMode::Chain => StrategyKind::Chain,
        },
        max_insert_depth: topology.max_insert_depth,
        max_primitives: topology.max_primitives,
        ..EngineOptions::default()
    }
}

fn load_configuration(override_path: Option<PathBuf>) -> AppConfig {
    match override_path {
        Some(path) => AppConfig::from_file(&path).unwrap_or_else(|err| {
            warn!(path = %path.display(), error = %err, "加载指定配置失败，使用默认配置");
            AppConfig::default()
        }),
        None => match AppConfig::discover() {
            Ok(cfg) => cfg,
            Err(err) => {
                match &err {
                    ConfigError::Io { path, .. } | ConfigError::Parse { path, .. } => {
                        warn!(path = %path.display(), error = %err, "加载默认配置失败，使用内建默认值");
                    }
                    ConfigError::Context { .. } => {
                        warn!(error = %err, "加载默认配置失败，使用内建默认值");
                    }
                }
                AppConfig::default()
            }
        },
    }
}

fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_new(config.logging.level.clone()).unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt().with_env_filter(filter);
    if subscriber.try_init().is_err() {
        // 已初始化，忽略
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_maps_onto_engine_options() {
        let topology = TopologyConfig {
            tolerance: 0.1,
            node_merge: NodeMergeMode::FirstMatch,
            strategy: StrategyMode::Chain,
            max_primitives: Some(10),
            ..TopologyConfig::default()
        };
        let options = engine_options(&topology);
        assert_eq!(options.tolerance, 0.1);
        assert_eq!(options.node_merge, NodeMerge::FirstMatch);
        assert_eq!(options.area_strategy, StrategyKind::Chain);
        assert_eq!(options.extrusion_strategy, StrategyKind::Chain);
        assert_eq!(options.max_primitives, Some(10));
        assert_eq!(options.sampling, SamplingOptions::default());
    }
}
