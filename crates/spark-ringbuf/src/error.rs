//! # error 模块说明
//!
//! ## 角色定位（Why）
//! - 集中声明环形缓冲、配置解析与日志安装三类错误，调用方可以只依赖本模块完成分支处理；
//! - 每个变体都提供稳定的 `code()`，便于在日志与告警中做维度聚合。
//!
//! ## 设计要求（What）
//! - 所有错误类型派生 `thiserror::Error`，与 `std::error::Error` 生态兼容；
//! - 核心缓冲仅存在“空缓冲读取”一种错误，它属于信息性信号，调用方据此等待更多数据，
//!   绝不应升级为 panic。

use thiserror::Error;

/// 环形缓冲操作结果别名。
pub type Result<T, E = RingBufferError> = core::result::Result<T, E>;

/// 环形缓冲核心错误域。
///
/// # 教案式说明
/// - **意图 (Why)**：`write`、`retrieve`、`peek_all` 等操作均为全函数，唯一可能失败的是
///   “缓冲为空时向非空目标切片拷贝”，单独建模以免调用方误把它当作致命错误。
/// - **契约 (What)**：变体满足 `Send + Sync + 'static`，可跨线程传递；`code()` 返回值在版本间保持稳定。
#[derive(Clone, Copy, Debug, Error, Eq, PartialEq)]
pub enum RingBufferError {
    /// 缓冲中没有可读数据。
    #[error("ring buffer is empty")]
    Empty,
}

impl RingBufferError {
    /// 返回稳定错误码。
    pub fn code(&self) -> &'static str {
        match self {
            RingBufferError::Empty => "ringbuf.empty",
        }
    }
}

/// 配置解析与校验错误。
///
/// - **意图 (Why)**：区分“文本无法解析”和“字段取值非法”，前者通常是部署问题，后者是参数问题；
/// - **契约 (What)**：`Invalid` 携带字段路径（如 `pool.max_retained_capacity`）与人类可读原因。
#[derive(Debug, Error)]
pub enum ConfigError {
    /// TOML 文本解析失败，或包含未知字段。
    #[error("failed to parse ring buffer configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// 字段取值违反约束。
    #[error("invalid configuration value for `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl ConfigError {
    /// 返回稳定错误码。
    pub fn code(&self) -> &'static str {
        match self {
            ConfigError::Parse(_) => "config.parse",
            ConfigError::Invalid { .. } => "config.invalid",
        }
    }
}

/// 日志订阅器安装错误。
#[derive(Debug, Error)]
pub enum LogInstallError {
    /// `level` 无法解析为 `EnvFilter` 指令。
    #[error("invalid log filter directive `{directive}`: {source}")]
    InvalidFilter {
        directive: String,
        #[source]
        source: tracing_subscriber::filter::ParseError,
    },

    /// 滚动日志文件无法创建或打开（目录不可建、路径被普通文件占用、权限不足等）。
    #[error("failed to open log file `{path}`: {source}")]
    OpenFile {
        path: String,
        #[source]
        source: tracing_appender::rolling::InitError,
    },

    /// 进程内已存在全局 `tracing` Subscriber。
    #[error("a global tracing subscriber has already been installed")]
    AlreadyInstalled,
}

impl LogInstallError {
    /// 返回稳定错误码。
    pub fn code(&self) -> &'static str {
        match self {
            LogInstallError::InvalidFilter { .. } => "log.invalid_filter",
            LogInstallError::OpenFile { .. } => "log.open_file",
            LogInstallError::AlreadyInstalled => "log.already_installed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_codes_are_stable() {
        assert_eq!(RingBufferError::Empty.code(), "ringbuf.empty");
        assert_eq!(RingBufferError::Empty.to_string(), "ring buffer is empty");
        let invalid = ConfigError::Invalid {
            field: "pool.max_idle",
            reason: "must be positive".to_owned(),
        };
        assert_eq!(invalid.code(), "config.invalid");
        assert!(invalid.to_string().contains("pool.max_idle"));
        assert_eq!(LogInstallError::AlreadyInstalled.code(), "log.already_installed");
    }
}
