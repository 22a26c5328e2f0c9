//! 日志订阅器安装入口。
//!
//! # 模块定位（Why）
//! - 缓冲与池通过 `tracing` 事件报告扩容、丢弃、收缩等行为，本身不关心事件去向；
//! - 宿主进程若没有自己的订阅器，可调用 [`install`] 按 [`LogConfig`] 一次性装配 `fmt + EnvFilter`。
//!
//! # 契约说明（What）
//! - `RUST_LOG` 存在时优先于 `LogConfig::level`；
//! - 文件输出经 `tracing_appender::rolling` 按周期切分，仅保留最近 `max_log_files` 个文件；
//! - 进程内已存在全局订阅器时返回 [`LogInstallError::AlreadyInstalled`]，不会覆盖外部配置。

use std::path::Path;

use tracing::dispatcher;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt};

use crate::{
    config::{DEFAULT_LOG_FILE, LogConfig, LogOutput, LogRotation},
    error::LogInstallError,
};

/// 按配置安装全局 `tracing` 订阅器。
pub fn install(config: &LogConfig) -> Result<(), LogInstallError> {
    if dispatcher::has_been_set() {
        return Err(LogInstallError::AlreadyInstalled);
    }
    let filter = build_env_filter(&config.level)?;
    let registry = tracing_subscriber::registry().with(filter);

    let result = match config.output {
        LogOutput::Console => tracing::subscriber::set_global_default(
            registry.with(tracing_subscriber::fmt::layer().with_target(true)),
        ),
        LogOutput::File => {
            let appender = rolling_appender(config)?;
            tracing::subscriber::set_global_default(
                registry.with(
                    tracing_subscriber::fmt::layer()
                        .with_ansi(false)
                        .with_writer(appender),
                ),
            )
        }
    };
    result.map_err(|_| LogInstallError::AlreadyInstalled)
}

/// 按 `file_path` 拆出目录与文件名前缀，构造滚动文件写入器。
///
/// 目录不存在时由 appender 创建；目录不可建或首个文件无法打开时返回 [`LogInstallError::OpenFile`]。
fn rolling_appender(config: &LogConfig) -> Result<RollingFileAppender, LogInstallError> {
    let path = Path::new(&config.file_path);
    let directory = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let prefix = match path.file_name() {
        Some(name) => name.to_string_lossy().into_owned(),
        None => DEFAULT_LOG_FILE.trim_start_matches("./").to_owned(),
    };

    RollingFileAppender::builder()
        .rotation(rotation_of(config.rotation))
        .filename_prefix(prefix)
        .max_log_files(config.max_log_files)
        .build(directory)
        .map_err(|source| LogInstallError::OpenFile {
            path: config.file_path.clone(),
            source,
        })
}

fn rotation_of(rotation: LogRotation) -> Rotation {
    match rotation {
        LogRotation::Minutely => Rotation::MINUTELY,
        LogRotation::Hourly => Rotation::HOURLY,
        LogRotation::Daily => Rotation::DAILY,
        LogRotation::Never => Rotation::NEVER,
    }
}

/// 构造过滤器：环境变量优先，否则解析配置中的指令。
pub fn build_env_filter(level: &str) -> Result<EnvFilter, LogInstallError> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(level).map_err(|source| LogInstallError::InvalidFilter {
        directive: level.to_owned(),
        source,
    })
}
