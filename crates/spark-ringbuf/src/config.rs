//! 缓冲、缓冲池与日志的强类型配置。
//!
//! # 模块定位（Why）
//! - 连接数量与报文尺寸因部署而异，初始容量、扩容策略、池的保留上限都需要由运维侧调整；
//! - 以 `serde` 反序列化 TOML，缺省字段落回默认值，未知字段直接拒绝，避免拼写错误被静默吞掉。
//!
//! # 文档结构（How）
//! ```toml
//! [buffer]
//! initial_capacity = 4096
//! growth = "double"
//!
//! [pool]
//! max_idle = 1024
//! max_retained_capacity = 1048576
//!
//! [pool.buffer]
//! initial_capacity = 8192
//!
//! [log]
//! level = "info"
//! output = "file"
//! file_path = "./logs/spark-ringbuf.log"
//! rotation = "daily"
//! max_log_files = 10
//! ```

use serde::Deserialize;

use crate::error::ConfigError;

/// 缓冲默认初始容量（字节）。
pub const DEFAULT_INITIAL_CAPACITY: usize = 4096;
/// 池默认保留的空闲缓冲数量。
pub const DEFAULT_MAX_IDLE: usize = 1024;
/// 池默认可回收的单个缓冲容量上限（字节）。
pub const DEFAULT_MAX_RETAINED_CAPACITY: usize = 1024 * 1024;
/// 文件输出的默认路径。
pub const DEFAULT_LOG_FILE: &str = "./spark-ringbuf.log";
/// 文件输出默认保留的日志文件数量（含当前写入的文件）。
pub const DEFAULT_MAX_LOG_FILES: usize = 10;

/// 可用空间不足时的扩容策略。
///
/// - `Exact`：仅补足缺口，新容量为 `capacity + deficit`，内存占用最紧凑，但连续小写入会反复搬移；
/// - `Double`：新容量取 `max(capacity + deficit, 2 * capacity)`，追加的摊还成本为 O(1)。
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum GrowthPolicy {
    Exact,
    #[default]
    Double,
}

impl GrowthPolicy {
    /// 计算容纳 `deficit` 个额外字节所需的新容量。
    pub fn next_capacity(self, capacity: usize, deficit: usize) -> usize {
        let required = capacity.saturating_add(deficit);
        match self {
            GrowthPolicy::Exact => required,
            GrowthPolicy::Double => required.max(capacity.saturating_mul(2)),
        }
    }
}

/// 单个环形缓冲的配置。
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct RingBufferConfig {
    /// 新建缓冲时预分配的字节数，允许为 0。
    pub initial_capacity: usize,
    pub growth: GrowthPolicy,
}

impl Default for RingBufferConfig {
    fn default() -> Self {
        Self {
            initial_capacity: DEFAULT_INITIAL_CAPACITY,
            growth: GrowthPolicy::default(),
        }
    }
}

/// 缓冲池配置。
///
/// # 契约说明（What）
/// - `buffer`：池内新分配缓冲使用的参数；
/// - `max_idle`：自由链表最多保留的缓冲数量，为 0 时池不保留任何缓冲；
/// - `max_retained_capacity`：归还时容量超过该值的缓冲直接释放，防止个别大报文把峰值内存长期钉在池里。
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct PoolConfig {
    pub buffer: RingBufferConfig,
    pub max_idle: usize,
    pub max_retained_capacity: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            buffer: RingBufferConfig::default(),
            max_idle: DEFAULT_MAX_IDLE,
            max_retained_capacity: DEFAULT_MAX_RETAINED_CAPACITY,
        }
    }
}

impl PoolConfig {
    /// 校验字段间约束。
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_retained_capacity < self.buffer.initial_capacity {
            return Err(ConfigError::Invalid {
                field: "pool.max_retained_capacity",
                reason: format!(
                    "{} is smaller than pool.buffer.initial_capacity ({}), no buffer could ever be retained",
                    self.max_retained_capacity, self.buffer.initial_capacity
                ),
            });
        }
        Ok(())
    }
}

/// 日志输出目标。
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum LogOutput {
    #[default]
    Console,
    File,
}

/// 文件输出的滚动周期。
///
/// 除 `Never` 外，实际文件名为 `file_path` 追加日期后缀，例如 `spark-ringbuf.log.2026-10-18`。
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum LogRotation {
    Minutely,
    Hourly,
    #[default]
    Daily,
    /// 始终写入同一个文件，`max_log_files` 不再生效。
    Never,
}

/// 日志配置，由 [`crate::observability::install`] 消费。
///
/// # 契约说明（What）
/// - `level`：`EnvFilter` 指令，例如 `"info"` 或 `"spark_ringbuf=debug"`；设置 `RUST_LOG` 时以环境变量为准；
/// - `file_path`、`rotation`、`max_log_files` 仅在 `output = "file"` 时生效：
///   文件按 `rotation` 周期切分，超过 `max_log_files` 的最旧文件在切分时删除，日志目录不会无限增长。
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct LogConfig {
    pub level: String,
    pub output: LogOutput,
    pub file_path: String,
    pub rotation: LogRotation,
    pub max_log_files: usize,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            output: LogOutput::default(),
            file_path: DEFAULT_LOG_FILE.to_owned(),
            rotation: LogRotation::default(),
            max_log_files: DEFAULT_MAX_LOG_FILES,
        }
    }
}

/// 顶层配置文档。
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub buffer: RingBufferConfig,
    pub pool: PoolConfig,
    pub log: LogConfig,
}

impl Settings {
    /// 从 TOML 文本解析并校验配置。
    ///
    /// # 契约说明（What）
    /// - 缺省字段使用默认值，空文本等价于 [`Settings::default`]；
    /// - 未知字段返回 [`ConfigError::Parse`]，约束冲突返回 [`ConfigError::Invalid`]。
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let settings: Settings = toml::from_str(raw)?;
        settings.validate()?;
        Ok(settings)
    }

    /// 校验全部子配置。
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.pool.validate()?;
        if self.log.level.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "log.level",
                reason: "filter directive must not be empty".to_owned(),
            });
        }
        if self.log.output == LogOutput::File && self.log.file_path.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "log.file_path",
                reason: "file output requires a path".to_owned(),
            });
        }
        if self.log.output == LogOutput::File && self.log.max_log_files == 0 {
            return Err(ConfigError::Invalid {
                field: "log.max_log_files",
                reason: "file output must keep at least one log file".to_owned(),
            });
        }
        Ok(())
    }
}
