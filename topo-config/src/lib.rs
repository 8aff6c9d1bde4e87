use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

/// 应用配置的根结构。
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub topology: TopologyConfig,
}

impl AppConfig {
    /// 从显式路径加载配置。
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// 自动发现配置文件：优先读取环境变量 `TOPO_CONFIG`，否则寻找 `./config/default.toml`。
    /// 若文件缺失，则返回默认配置。
    pub fn discover() -> Result<Self, ConfigError> {
        if let Some(path) = env::var_os("TOPO_CONFIG") {
            return Self::from_file(PathBuf::from(path));
        }

        let default_path = env::current_dir()
            .map(|dir| dir.join("config").join("default.toml"))
            .map_err(|source| ConfigError::Context {
                message: "获取当前工作目录失败".to_string(),
                source,
            })?;

        if default_path.exists() {
            Self::from_file(default_path)
        } else {
            Ok(Self::default())
        }
    }
}

/// 日志配置，支持设置默认等级。
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "LoggingConfig::default_level")]
    pub level: String,
}

impl LoggingConfig {
    fn default_level() -> String {
        "info".to_string()
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeMergeMode {
    #[default]
    Clustered,
    FirstMatch,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyMode {
    #[default]
    Graph,
    Chain,
}

/// 拓扑计算参数。缺省值与引擎内建默认值一致。
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TopologyConfig {
    pub tolerance: f64,
    pub circle_segments: usize,
    pub arc_min_segments: usize,
    pub spline_min_samples: usize,
    pub spline_samples_per_control_point: usize,
    pub fit_segments_per_span: usize,
    pub node_merge: NodeMergeMode,
    /// 面积计算使用的拼接策略。
    pub strategy: StrategyMode,
    pub max_insert_depth: usize,
    pub max_primitives: Option<usize>,
}

impl Default for TopologyConfig {
    fn default() -> Self {
        Self {
            tolerance: 0.5,
            circle_segments: 64,
            arc_min_segments: 32,
            spline_min_samples: 50,
            spline_samples_per_control_point: 10,
            fit_segments_per_span: 16,
            node_merge: NodeMergeMode::default(),
            strategy: StrategyMode::default(),
            max_insert_depth: 16,
            max_primitives: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("读取配置文件 {path:?} 失败: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("解析配置文件 {path:?} 失败: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("{message}")]
    Context {
        message: String,
        #[source]
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_match_engine_constants() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.logging.level, "info");
        assert_eq!(cfg.topology.tolerance, 0.5);
        assert_eq!(cfg.topology.circle_segments, 64);
        assert_eq!(cfg.topology.arc_min_segments, 32);
        assert_eq!(cfg.topology.node_merge, NodeMergeMode::Clustered);
        assert_eq!(cfg.topology.strategy, StrategyMode::Graph);
        assert!(cfg.topology.max_primitives.is_none());
    }

    #[test]
    fn load_from_temp_file() {
        let mut file = tempfile::NamedTempFile::new().expect("create temp file");
        writeln!(
            file,
            r#"
            [logging]
            level = "debug"

            [topology]
            tolerance = 0.05
            node_merge = "first_match"
            strategy = "chain"
            max_primitives = 5000
            "#
        )
        .unwrap();

        let cfg = AppConfig::from_file(file.path()).expect("load config");
        assert_eq!(cfg.logging.level, "debug");
        assert_eq!(cfg.topology.tolerance, 0.05);
        assert_eq!(cfg.topology.node_merge, NodeMergeMode::FirstMatch);
        assert_eq!(cfg.topology.strategy, StrategyMode::Chain);
        assert_eq!(cfg.topology.max_primitives, Some(5000));
        // 未出现的字段保持默认
        assert_eq!(cfg.topology.circle_segments, 64);
        assert_eq!(cfg.topology.max_insert_depth, 16);
    }

    #[test]
    fn invalid_strategy_is_a_parse_error() {
        let mut file = tempfile::NamedTempFile::new().expect("create temp file");
        writeln!(file, "[topology]\nstrategy = \"magic\"").unwrap();

        match AppConfig::from_file(file.path()) {
            Err(ConfigError::Parse { path, .. }) => assert_eq!(path, file.path()),
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let result = AppConfig::from_file("/definitely/not/here.toml");
        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }
}
