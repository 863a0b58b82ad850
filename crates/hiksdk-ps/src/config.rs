use crate::ps::TailPolicy;
use crate::{DemuxError, Result};
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// 环境变量前缀，例如 `HIKSDK_PS_QUEUE_CAPACITY=1000`
pub const ENV_PREFIX: &str = "HIKSDK_PS";

/// 输出队列容量上限（包）
pub const MAX_QUEUE_CAPACITY: usize = 1 << 20;

/// 缓冲区预分配上限（字节）
pub const MAX_INITIAL_BUFFER_CAPACITY: usize = 64 * 1024 * 1024;

/// PS 解封装器配置
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct DemuxerConfig {
    /// 缓冲区上限（字节），超过后清空缓冲区
    pub max_buffer_size: usize,

    /// 输出队列容量（包）
    pub queue_capacity: usize,

    /// 缓冲区预分配大小（字节）
    pub initial_buffer_capacity: usize,

    /// 末尾未闭合包的处理策略
    pub tail_policy: TailPolicy,
}

impl Default for DemuxerConfig {
    fn default() -> Self {
        Self {
            max_buffer_size: 10 * 1024 * 1024,
            queue_capacity: 500,
            initial_buffer_capacity: 1024 * 1024,
            tail_policy: TailPolicy::Flush,
        }
    }
}

impl DemuxerConfig {
    /// 从 TOML 文件加载，缺省字段使用默认值，环境变量优先
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let path_str = path
            .to_str()
            .ok_or_else(|| DemuxError::InvalidConfig(format!("Invalid config path: {:?}", path)))?;

        let config = Config::builder()
            .add_source(File::new(path_str, FileFormat::Toml))
            .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()?;

        let config: Self = config.try_deserialize()?;
        config.validate()?;

        Ok(config)
    }

    /// 验证配置
    pub fn validate(&self) -> Result<()> {
        if self.queue_capacity == 0 {
            return Err(DemuxError::InvalidConfig(
                "queue_capacity must be greater than 0".to_string(),
            ));
        }

        if self.queue_capacity > MAX_QUEUE_CAPACITY {
            return Err(DemuxError::InvalidConfig(format!(
                "queue_capacity ({}) cannot be greater than {}",
                self.queue_capacity, MAX_QUEUE_CAPACITY
            )));
        }

        if self.max_buffer_size < crate::ps::START_CODE_LEN {
            return Err(DemuxError::InvalidConfig(format!(
                "max_buffer_size ({}) must be at least {} bytes",
                self.max_buffer_size,
                crate::ps::START_CODE_LEN
            )));
        }

        if self.initial_buffer_capacity > self.max_buffer_size {
            return Err(DemuxError::InvalidConfig(format!(
                "initial_buffer_capacity ({}) cannot be greater than max_buffer_size ({})",
                self.initial_buffer_capacity, self.max_buffer_size
            )));
        }

        if self.initial_buffer_capacity > MAX_INITIAL_BUFFER_CAPACITY {
            return Err(DemuxError::InvalidConfig(format!(
                "initial_buffer_capacity ({}) cannot be greater than {}",
                self.initial_buffer_capacity, MAX_INITIAL_BUFFER_CAPACITY
            )));
        }

        Ok(())
    }
}
