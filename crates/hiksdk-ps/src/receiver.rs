// 数据接收器
// 供原生回调线程使用的线程安全封装

use crate::config::DemuxerConfig;
use crate::metrics::DemuxMetrics;
use crate::ps::PsDemuxer;
use crate::queue::PacketReceiver;
use crate::Result;
use parking_lot::Mutex;

/// 线程安全的 PS 数据接收器
///
/// `submit` 与 `stop` 在同一把锁下串行执行：进行中的 `submit` 完成后 `stop` 才生效，
/// `stop` 之后的 `submit` 返回 [`crate::DemuxError::NotRunning`]。
pub struct StreamReceiver {
    demuxer: Mutex<PsDemuxer>,
    metrics: DemuxMetrics,
}

impl StreamReceiver {
    pub fn new() -> Result<Self> {
        Ok(Self::with_metrics(DemuxMetrics::new()?))
    }

    pub fn with_metrics(metrics: DemuxMetrics) -> Self {
        Self {
            demuxer: Mutex::new(PsDemuxer::with_metrics(metrics.clone())),
            metrics,
        }
    }

    pub fn start(&self, config: &DemuxerConfig) -> Result<PacketReceiver> {
        self.demuxer.lock().start(config)
    }

    pub fn stop(&self) {
        self.demuxer.lock().stop();
    }

    /// 输入设备回调收到的原始数据
    pub fn submit(&self, data: &[u8]) -> Result<usize> {
        self.demuxer.lock().submit(data)
    }

    pub fn is_running(&self) -> bool {
        self.demuxer.lock().is_running()
    }

    pub fn buffered_len(&self) -> usize {
        self.demuxer.lock().buffered().len()
    }

    pub fn metrics(&self) -> &DemuxMetrics {
        &self.metrics
    }
}
