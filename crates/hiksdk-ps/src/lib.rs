// hiksdk-ps: 设备实时流的 PS 重组引擎
//
// 架构设计：
// - ps/: 起始码识别、切分与重组
// - queue: 有界输出队列，满则丢弃，从不阻塞生产端
// - receiver/registry: 供原生回调线程使用的封装与句柄表

pub mod config;
pub mod error;
pub mod metrics;
pub mod ps;
pub mod queue;
pub mod reader;
pub mod receiver;
pub mod registry;

// 重新导出常用类型
pub use config::DemuxerConfig;
pub use error::{DemuxError, Result};
pub use metrics::{DemuxMetrics, MetricsSnapshot};
pub use ps::{split, PsDemuxer, PsPacket, StartCode, TailPolicy};
pub use queue::{PacketReceiver, PublishOutcome};
pub use reader::PacketReader;
pub use receiver::StreamReceiver;
pub use registry::{Handle, HandleRegistry};
