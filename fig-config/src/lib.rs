use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use fig_core::entity::DEFAULT_DEPTH;
pub use fig_core::entity::MAX_DEPTH;

/// 指定配置文件路径的环境变量。
pub const CONFIG_ENV: &str = "FIGCORE_CONFIG";

/// 应用配置的根结构。
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub editor: EditorConfig,
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

    /// 自动发现配置文件：优先读取环境变量 `FIGCORE_CONFIG`，否则寻找 `./config/default.toml`。
    /// 若文件缺失，则返回默认配置。
    pub fn discover() -> Result<Self, ConfigError> {
        if let Some(path) = env::var_os(CONFIG_ENV) {
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

/// 编辑器行为。
#[derive(Debug, Clone, Deserialize)]
pub struct EditorConfig {
    /// 每次修改后核对深度计数表与文档树。
    #[serde(default = "EditorConfig::default_verify_depths")]
    pub verify_depths: bool,
    /// 新建图元的深度，取值 0..=999。
    #[serde(default = "EditorConfig::default_depth")]
    pub default_depth: u16,
}

impl EditorConfig {
    fn default_verify_depths() -> bool {
        true
    }

    fn default_depth() -> u16 {
        DEFAULT_DEPTH
    }

    /// 超出范围的深度被截断到最大值。
    pub fn clamped_depth(&self) -> u16 {
        self.default_depth.min(MAX_DEPTH)
    }
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            verify_depths: Self::default_verify_depths(),
            default_depth: Self::default_depth(),
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
