// PS 流重组器
// 接收任意切分的原始数据，按起始码重组为完整的 PS 包

use super::packet::PsPacket;
use super::splitter::{Cut, Splitter, RESYNC_KEEP};
use crate::config::DemuxerConfig;
use crate::metrics::DemuxMetrics;
use crate::queue::{PacketQueue, PacketReceiver, PublishOutcome};
use crate::{DemuxError, Result};
use bytes::{Buf, BytesMut};
use std::mem;

/// 运行中的会话状态
struct Session {
    /// 累积缓冲区，只保存尚未归属到完整包的字节
    buffer: BytesMut,

    /// 输出队列生产端
    queue: PacketQueue,

    splitter: Splitter,

    /// 未闭合包的续扫位置，之前的字节已确认不含下一个起始码
    scan_from: usize,

    max_buffer_size: usize,
}

enum State {
    Idle,
    Running(Session),
}

/// PS 解封装器
///
/// 状态机：`Idle --start()--> Running --stop()--> Idle`。
/// 本身不加锁，跨线程使用见 [`crate::StreamReceiver`]。
pub struct PsDemuxer {
    state: State,
    metrics: DemuxMetrics,
}

impl PsDemuxer {
    pub fn new() -> Result<Self> {
        Ok(Self::with_metrics(DemuxMetrics::new()?))
    }

    pub fn with_metrics(metrics: DemuxMetrics) -> Self {
        Self {
            state: State::Idle,
            metrics,
        }
    }

    /// 启动解封装器，返回输出队列的消费端
    pub fn start(&mut self, config: &DemuxerConfig) -> Result<PacketReceiver> {
        if self.is_running() {
            return Err(DemuxError::AlreadyRunning);
        }
        config.validate()?;

        let (queue, rx) = PacketQueue::bounded(config.queue_capacity);
        self.state = State::Running(Session {
            buffer: BytesMut::with_capacity(config.initial_buffer_capacity),
            queue,
            splitter: Splitter::new(config.tail_policy),
            scan_from: 0,
            max_buffer_size: config.max_buffer_size,
        });
        self.metrics.set_buffered(0);

        tracing::info!(
            "PS demuxer started (queue_capacity={}, max_buffer_size={}, tail_policy={:?})",
            config.queue_capacity,
            config.max_buffer_size,
            config.tail_policy
        );

        Ok(rx)
    }

    /// 停止解封装器
    ///
    /// 关闭输出队列（已入队的包仍可取出）并丢弃缓冲区。重复调用无副作用。
    pub fn stop(&mut self) {
        let State::Running(session) = mem::replace(&mut self.state, State::Idle) else {
            return;
        };

        let pending = session.buffer.len();
        self.metrics.record_discarded(pending);
        self.metrics.set_buffered(0);

        tracing::info!("PS demuxer stopped ({} buffered bytes discarded)", pending);
    }

    /// 输入原始数据
    ///
    /// 返回本次调用中成功入队的包数量。缓冲区超过上限时清空并返回
    /// [`DemuxError::Overflow`]，后续数据会重新同步。
    pub fn submit(&mut self, data: &[u8]) -> Result<usize> {
        let State::Running(session) = &mut self.state else {
            return Err(DemuxError::NotRunning);
        };

        if data.is_empty() {
            return Ok(0);
        }

        self.metrics.record_received(data.len());

        let size = session.buffer.len() + data.len();
        if size > session.max_buffer_size {
            tracing::warn!(
                "PS buffer too large ({} bytes, limit {}), clearing buffer",
                size,
                session.max_buffer_size
            );
            self.metrics.record_discarded(size);
            self.metrics.record_overflow();
            self.metrics.set_buffered(0);
            session.buffer.clear();
            session.scan_from = 0;

            return Err(DemuxError::Overflow {
                size,
                limit: session.max_buffer_size,
            });
        }

        session.buffer.extend_from_slice(data);

        let mut enqueued = 0;
        loop {
            let cut = session
                .splitter
                .locate_from(&session.buffer, session.scan_from);
            self.metrics.record_discarded(cut.discarded());

            let Cut::Packet { code, start, end } = cut else {
                session.buffer.advance(cut.remainder_from());
                session.scan_from = match cut {
                    Cut::Open { .. } => session.buffer.len().saturating_sub(RESYNC_KEEP),
                    _ => 0,
                };
                break;
            };

            session.scan_from = 0;

            session.buffer.advance(start);
            let packet = PsPacket::new(code, session.buffer.split_to(end - start).freeze());

            tracing::trace!("PS packet {} ({} bytes)", code, packet.len());

            if publish_to(&session.queue, &self.metrics, packet) == PublishOutcome::Enqueued {
                enqueued += 1;
            }
        }

        self.metrics.set_buffered(session.buffer.len());

        tracing::debug!(
            "PS submit: {} bytes in, {} packets enqueued, {} bytes buffered",
            data.len(),
            enqueued,
            session.buffer.len()
        );

        Ok(enqueued)
    }

    /// 将包放入输出队列，队列满时丢弃，从不阻塞
    pub fn publish(&self, packet: PsPacket) -> PublishOutcome {
        match &self.state {
            State::Running(session) => publish_to(&session.queue, &self.metrics, packet),
            State::Idle => {
                self.metrics.record_dropped();
                PublishOutcome::Dropped
            }
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self.state, State::Running(_))
    }

    /// 缓冲区中尚未输出的字节
    pub fn buffered(&self) -> &[u8] {
        match &self.state {
            State::Running(session) => &session.buffer,
            State::Idle => &[],
        }
    }

    /// 输出队列中排队的包数量
    pub fn queued(&self) -> usize {
        match &self.state {
            State::Running(session) => session.queue.len(),
            State::Idle => 0,
        }
    }

    pub fn metrics(&self) -> &DemuxMetrics {
        &self.metrics
    }
}

fn publish_to(queue: &PacketQueue, metrics: &DemuxMetrics, packet: PsPacket) -> PublishOutcome {
    let outcome = queue.publish(packet);
    match outcome {
        PublishOutcome::Enqueued => metrics.record_enqueued(),
        PublishOutcome::Dropped => metrics.record_dropped(),
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ps::{StartCode, TailPolicy};
    use bytes::Bytes;

    fn running(config: DemuxerConfig) -> (PsDemuxer, PacketReceiver) {
        let mut demuxer = PsDemuxer::new().unwrap();
        let rx = demuxer.start(&config).unwrap();
        (demuxer, rx)
    }

    fn hold() -> DemuxerConfig {
        DemuxerConfig {
            tail_policy: TailPolicy::Hold,
            ..Default::default()
        }
    }

    fn packets(rx: &mut PacketReceiver) -> Vec<Vec<u8>> {
        rx.drain().into_iter().map(|p| p.data().to_vec()).collect()
    }

    const SCENARIO: [u8; 12] = [
        0x00, 0x00, 0x01, 0xBA, 0x01, 0x02, 0x00, 0x00, 0x01, 0xE0, 0x03, 0x04,
    ];

    #[test]
    fn test_scenario_flush_emits_tail() {
        let (mut demuxer, mut rx) = running(DemuxerConfig::default());

        assert_eq!(demuxer.submit(&SCENARIO).unwrap(), 2);
        assert_eq!(
            packets(&mut rx),
            vec![SCENARIO[..6].to_vec(), SCENARIO[6..].to_vec()]
        );
        assert!(demuxer.buffered().is_empty());
    }

    #[test]
    fn test_scenario_hold_retains_tail() {
        let (mut demuxer, mut rx) = running(hold());

        assert_eq!(demuxer.submit(&SCENARIO).unwrap(), 1);
        assert_eq!(packets(&mut rx), vec![SCENARIO[..6].to_vec()]);
        assert_eq!(demuxer.buffered(), &SCENARIO[6..]);

        // 下一个起始码到达后输出保留的包
        assert_eq!(demuxer.submit(&[0x00, 0x00, 0x01, 0xBA]).unwrap(), 1);
        assert_eq!(packets(&mut rx), vec![SCENARIO[6..].to_vec()]);
        assert_eq!(demuxer.buffered(), &[0x00, 0x00, 0x01, 0xBA]);
    }

    #[test]
    fn test_hold_resumes_scan_of_open_packet() {
        let (mut demuxer, mut rx) = running(hold());

        demuxer.submit(&[0x00, 0x00, 0x01, 0xE0]).unwrap();
        for _ in 0..16 {
            demuxer.submit(&[0x42; 1024]).unwrap();
        }

        // 续扫位置跟随缓冲区末尾，每次只扫描新到达的数据
        let State::Running(session) = &demuxer.state else {
            panic!("demuxer not running");
        };
        assert_eq!(session.buffer.len(), 4 + 16 * 1024);
        assert_eq!(session.scan_from, session.buffer.len() - RESYNC_KEEP);

        // 跨越两次输入的起始码仍能闭合该包
        demuxer.submit(&[0x42, 0x00, 0x00]).unwrap();
        assert_eq!(demuxer.submit(&[0x01, 0xC0, 0x07]).unwrap(), 1);

        let received = rx.try_recv().unwrap();
        assert_eq!(received.start_code(), StartCode::Video0);
        assert_eq!(received.len(), 4 + 16 * 1024 + 1);
        assert_eq!(demuxer.buffered(), &[0x00, 0x00, 0x01, 0xC0, 0x07]);

        let State::Running(session) = &demuxer.state else {
            panic!("demuxer not running");
        };
        assert_eq!(session.scan_from, 2);
    }

    #[test]
    fn test_no_start_code_keeps_last_three_bytes() {
        let (mut demuxer, mut rx) = running(DemuxerConfig::default());

        assert_eq!(demuxer.submit(&[0xFF; 5]).unwrap(), 0);
        assert_eq!(demuxer.buffered(), &[0xFF, 0xFF, 0xFF]);
        assert!(rx.try_recv().is_err());
        assert_eq!(demuxer.metrics().snapshot().bytes_discarded, 2);
    }

    #[test]
    fn test_start_code_split_across_chunks() {
        let (mut demuxer, mut rx) = running(DemuxerConfig::default());

        assert_eq!(demuxer.submit(&[0x77, 0x00, 0x00]).unwrap(), 0);
        assert_eq!(demuxer.submit(&[0x01, 0xC0, 0x09]).unwrap(), 1);

        let received = rx.try_recv().unwrap();
        assert_eq!(received.start_code(), StartCode::Audio);
        assert_eq!(received.data().as_ref(), &[0x00, 0x00, 0x01, 0xC0, 0x09]);
    }

    #[test]
    fn test_empty_input_is_noop() {
        let (mut demuxer, _rx) = running(DemuxerConfig::default());
        assert_eq!(demuxer.submit(&[]).unwrap(), 0);
        assert_eq!(demuxer.metrics().snapshot().bytes_received, 0);
    }

    #[test]
    fn test_submit_requires_running() {
        let mut demuxer = PsDemuxer::new().unwrap();
        assert!(matches!(
            demuxer.submit(&SCENARIO),
            Err(DemuxError::NotRunning)
        ));

        let _rx = demuxer.start(&DemuxerConfig::default()).unwrap();
        demuxer.stop();
        assert!(matches!(demuxer.submit(&[]), Err(DemuxError::NotRunning)));
    }

    #[test]
    fn test_start_twice_fails() {
        let (mut demuxer, _rx) = running(DemuxerConfig::default());
        assert!(matches!(
            demuxer.start(&DemuxerConfig::default()),
            Err(DemuxError::AlreadyRunning)
        ));
    }

    #[test]
    fn test_start_rejects_invalid_config() {
        let mut demuxer = PsDemuxer::new().unwrap();
        let config = DemuxerConfig {
            queue_capacity: 0,
            ..Default::default()
        };
        assert!(matches!(
            demuxer.start(&config),
            Err(DemuxError::InvalidConfig(_))
        ));
        assert!(!demuxer.is_running());

        // 超大容量在创建队列前被拒绝
        let config = DemuxerConfig {
            queue_capacity: usize::MAX / 2,
            ..Default::default()
        };
        assert!(matches!(
            demuxer.start(&config),
            Err(DemuxError::InvalidConfig(_))
        ));

        let config = DemuxerConfig {
            max_buffer_size: usize::MAX,
            initial_buffer_capacity: usize::MAX / 2,
            ..Default::default()
        };
        assert!(matches!(
            demuxer.start(&config),
            Err(DemuxError::InvalidConfig(_))
        ));
        assert!(!demuxer.is_running());
    }

    #[test]
    fn test_stop_is_idempotent_and_restartable() {
        let (mut demuxer, mut rx) = running(hold());
        demuxer.submit(&SCENARIO).unwrap();

        demuxer.stop();
        demuxer.stop();
        assert!(!demuxer.is_running());
        assert!(demuxer.buffered().is_empty());

        // 已入队的包仍可取出，然后队列关闭
        assert!(rx.try_recv().is_ok());
        assert!(rx.blocking_recv().is_none());

        let mut rx = demuxer.start(&DemuxerConfig::default()).unwrap();
        assert_eq!(demuxer.submit(&SCENARIO).unwrap(), 2);
        assert_eq!(packets(&mut rx).len(), 2);
        assert_eq!(demuxer.metrics().snapshot().packets_enqueued, 3);
    }

    #[test]
    fn test_overflow_clears_buffer_and_recovers() {
        let config = DemuxerConfig {
            max_buffer_size: 16,
            initial_buffer_capacity: 16,
            tail_policy: TailPolicy::Hold,
            ..Default::default()
        };
        let (mut demuxer, mut rx) = running(config);

        // 未闭合的包持续增长
        demuxer.submit(&[0x00, 0x00, 0x01, 0xE0]).unwrap();
        demuxer.submit(&[0xAA; 10]).unwrap();
        assert_eq!(demuxer.buffered().len(), 14);

        match demuxer.submit(&[0xAA; 3]) {
            Err(DemuxError::Overflow { size, limit }) => {
                assert_eq!(size, 17);
                assert_eq!(limit, 16);
            }
            other => panic!("expected overflow, got {:?}", other),
        }
        assert!(demuxer.buffered().is_empty());
        assert_eq!(demuxer.metrics().snapshot().buffer_overflows, 1);

        // 之后正常工作
        assert_eq!(demuxer.submit(&SCENARIO).unwrap(), 1);
        assert_eq!(packets(&mut rx), vec![SCENARIO[..6].to_vec()]);
    }

    #[test]
    fn test_oversized_single_chunk() {
        let config = DemuxerConfig {
            max_buffer_size: 8,
            initial_buffer_capacity: 0,
            ..Default::default()
        };
        let (mut demuxer, _rx) = running(config);
        assert!(matches!(
            demuxer.submit(&[0u8; 9]),
            Err(DemuxError::Overflow { size: 9, limit: 8 })
        ));
        assert!(demuxer.submit(&[0u8; 8]).is_ok());
    }

    #[test]
    fn test_backpressure_drops_when_full() {
        let config = DemuxerConfig {
            queue_capacity: 2,
            ..Default::default()
        };
        let (mut demuxer, mut rx) = running(config);

        let mut stream = Vec::new();
        for code in [StartCode::PackHeader, StartCode::Video0, StartCode::Audio] {
            stream.extend_from_slice(&code.to_bytes());
            stream.push(0x10);
        }

        assert_eq!(demuxer.submit(&stream).unwrap(), 2);
        assert_eq!(demuxer.queued(), 2);

        let extra = PsPacket::new(
            StartCode::PrivateStream,
            Bytes::from_static(&[0x00, 0x00, 0x01, 0xBD]),
        );
        assert_eq!(demuxer.publish(extra), PublishOutcome::Dropped);

        let snapshot = demuxer.metrics().snapshot();
        assert_eq!(snapshot.packets_enqueued, 2);
        assert_eq!(snapshot.packets_dropped, 2);

        let codes: Vec<_> = rx.drain().iter().map(|p| p.start_code()).collect();
        assert_eq!(codes, vec![StartCode::PackHeader, StartCode::Video0]);
    }

    #[test]
    fn test_publish_when_idle_is_dropped() {
        let demuxer = PsDemuxer::new().unwrap();
        let packet = PsPacket::new(
            StartCode::PackHeader,
            Bytes::from_static(&[0x00, 0x00, 0x01, 0xBA]),
        );
        assert_eq!(demuxer.publish(packet), PublishOutcome::Dropped);
    }

    #[test]
    fn test_packets_preserve_submission_order() {
        let (mut demuxer, mut rx) = running(hold());
        let codes = [
            StartCode::PackHeader,
            StartCode::SystemHeader,
            StartCode::ProgramStreamMap,
            StartCode::Video0,
            StartCode::Video1,
            StartCode::Video2,
            StartCode::Audio,
            StartCode::PrivateStream,
            StartCode::PackHeader,
        ];
        for (i, code) in codes.iter().enumerate() {
            let mut chunk = code.to_bytes().to_vec();
            chunk.extend(std::iter::repeat(i as u8 + 1).take(i + 1));
            demuxer.submit(&chunk).unwrap();
        }

        let received: Vec<_> = rx.drain().iter().map(|p| p.start_code()).collect();
        assert_eq!(received, &codes[..codes.len() - 1]);
    }
}
