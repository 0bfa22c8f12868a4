use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

/// 指定配置文件路径的环境变量。
pub const CONFIG_ENV_VAR: &str = "DXFVIEW_CONFIG";

/// 应用配置的根结构。
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
    #[serde(default)]
    pub lod: LodConfig,
    #[serde(default)]
    pub parse: ParseConfig,
}

impl AppConfig {
    /// 从显式路径加载配置。
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// 自动发现配置文件：优先读取环境变量 `DXFVIEW_CONFIG`，否则寻找 `./config/default.toml`。
    /// 若文件缺失，则返回默认配置。
    pub fn discover() -> Result<Self, ConfigError> {
        if let Some(path) = env::var_os(CONFIG_ENV_VAR) {
            return Self::from_file(PathBuf::from(path));
        }

        let cwd = env::current_dir().map_err(|source| ConfigError::Context {
            message: "获取当前工作目录失败".to_string(),
            source,
        })?;
        Self::discover_in(&cwd)
    }

    /// 在给定目录下寻找 `config/default.toml`，不读取环境变量。
    pub fn discover_in(base: &Path) -> Result<Self, ConfigError> {
        let default_path = base.join("config").join("default.toml");
        if default_path.exists() {
            Self::from_file(default_path)
        } else {
            Ok(Self::default())
        }
    }

    /// 检查数值之间的约束。
    pub fn validate(&self) -> Result<(), ConfigError> {
        let limits = &self.limits;
        if limits.max_size_bytes == 0 {
            return Err(ConfigError::Invalid("limits.max_size_bytes 不能为 0".to_string()));
        }
        if limits.warning_size_bytes > limits.max_size_bytes {
            return Err(ConfigError::Invalid(format!(
                "limits.warning_size_bytes ({}) 不能大于 limits.max_size_bytes ({})",
                limits.warning_size_bytes, limits.max_size_bytes
            )));
        }
        let lod = &self.lod;
        if lod.high_quality_threshold >= lod.medium_quality_threshold {
            return Err(ConfigError::Invalid(format!(
                "lod.high_quality_threshold ({}) 必须小于 lod.medium_quality_threshold ({})",
                lod.high_quality_threshold, lod.medium_quality_threshold
            )));
        }
        Ok(())
    }
}

/// 日志配置，支持设置默认等级。
#[derive(Debug, Clone, PartialEq, Deserialize)]
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

/// 文件大小限制与后台解析阈值（字节）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    pub max_size_bytes: u64,
    pub warning_size_bytes: u64,
    /// 超过该大小的文件交给后台任务解析。
    pub worker_threshold_bytes: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_size_bytes: 20 * 1024 * 1024,
            warning_size_bytes: 5 * 1024 * 1024,
            worker_threshold_bytes: 2 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LodConfig {
    pub high_quality_segments: usize,
    pub medium_quality_segments: usize,
    pub low_quality_segments: usize,
    pub high_quality_threshold: usize,
    pub medium_quality_threshold: usize,
}

impl Default for LodConfig {
    fn default() -> Self {
        Self {
            high_quality_segments: 64,
            medium_quality_segments: 32,
            low_quality_segments: 16,
            high_quality_threshold: 1_000,
            medium_quality_threshold: 5_000,
        }
    }
}

/// 默认解析选项，命令行参数可以覆盖。
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ParseConfig {
    pub max_entities: Option<usize>,
    pub layer_filter: Vec<String>,
    pub precision: Option<u32>,
    pub simplify: bool,
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
    #[error("配置无效: {0}")]
    Invalid(String),
    #[error("{message}")]
    Context {
        message: String,
        #[source]
        source: std::io::Error,
    },
}
