use prometheus::{Encoder, IntCounter, IntGauge, Registry, TextEncoder};
use serde::Serialize;

/// 解封装指标
///
/// 每个实例持有独立的 `Registry`，跨越 start/stop 周期累计。
#[derive(Clone)]
pub struct DemuxMetrics {
    bytes_received: IntCounter,
    bytes_discarded: IntCounter,
    packets_enqueued: IntCounter,
    packets_dropped: IntCounter,
    buffer_overflows: IntCounter,
    buffered_bytes: IntGauge,

    registry: Registry,
}

/// 指标快照
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub bytes_received: u64,
    pub bytes_discarded: u64,
    pub packets_enqueued: u64,
    pub packets_dropped: u64,
    pub buffer_overflows: u64,
    pub buffered_bytes: i64,
}

impl DemuxMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let bytes_received = IntCounter::new(
            "ps_bytes_received_total",
            "Total number of raw bytes submitted to the demuxer",
        )?;
        registry.register(Box::new(bytes_received.clone()))?;

        let bytes_discarded = IntCounter::new(
            "ps_bytes_discarded_total",
            "Total number of bytes discarded while resynchronizing or on overflow",
        )?;
        registry.register(Box::new(bytes_discarded.clone()))?;

        let packets_enqueued = IntCounter::new(
            "ps_packets_enqueued_total",
            "Total number of PS packets handed to the output queue",
        )?;
        registry.register(Box::new(packets_enqueued.clone()))?;

        let packets_dropped = IntCounter::new(
            "ps_packets_dropped_total",
            "Total number of PS packets dropped because the output queue was full or closed",
        )?;
        registry.register(Box::new(packets_dropped.clone()))?;

        let buffer_overflows = IntCounter::new(
            "ps_buffer_overflows_total",
            "Total number of accumulation buffer overflows",
        )?;
        registry.register(Box::new(buffer_overflows.clone()))?;

        let buffered_bytes = IntGauge::new(
            "ps_buffered_bytes",
            "Bytes currently held in the accumulation buffer",
        )?;
        registry.register(Box::new(buffered_bytes.clone()))?;

        Ok(Self {
            bytes_received,
            bytes_discarded,
            packets_enqueued,
            packets_dropped,
            buffer_overflows,
            buffered_bytes,
            registry,
        })
    }

    pub(crate) fn record_received(&self, bytes: usize) {
        self.bytes_received.inc_by(bytes as u64);
    }

    pub(crate) fn record_discarded(&self, bytes: usize) {
        if bytes > 0 {
            self.bytes_discarded.inc_by(bytes as u64);
        }
    }

    pub(crate) fn record_enqueued(&self) {
        self.packets_enqueued.inc();
    }

    pub(crate) fn record_dropped(&self) {
        self.packets_dropped.inc();
    }

    pub(crate) fn record_overflow(&self) {
        self.buffer_overflows.inc();
    }

    pub(crate) fn set_buffered(&self, bytes: usize) {
        self.buffered_bytes.set(bytes as i64);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            bytes_received: self.bytes_received.get(),
            bytes_discarded: self.bytes_discarded.get(),
            packets_enqueued: self.packets_enqueued.get(),
            packets_dropped: self.packets_dropped.get(),
            buffer_overflows: self.buffer_overflows.get(),
            buffered_bytes: self.buffered_bytes.get(),
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// 导出 Prometheus 文本格式
    pub fn encode_text(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;

        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}
