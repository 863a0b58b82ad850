use thiserror::Error;

#[derive(Error, Debug)]
pub enum DemuxError {
    #[error("PS buffer overflow: {size} bytes exceeds limit of {limit} bytes")]
    Overflow { size: usize, limit: usize },

    #[error("Demuxer is not running")]
    NotRunning,

    #[error("Demuxer is already running")]
    AlreadyRunning,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Unknown receiver handle: {0}")]
    UnknownHandle(u64),

    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),
}

pub type Result<T> = std::result::Result<T, DemuxError>;
