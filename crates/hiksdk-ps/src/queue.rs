// 输出队列
// 解封装器与消费者之间唯一的共享结构：有界、非阻塞入队

use crate::ps::PsPacket;
use crate::reader::PacketReader;
use tokio::sync::mpsc::{self, error::TryRecvError, error::TrySendError};

/// 入队结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    /// 成功入队
    Enqueued,

    /// 队列已满或已关闭，包被丢弃
    Dropped,
}

/// 生产端
#[derive(Debug)]
pub(crate) struct PacketQueue {
    tx: mpsc::Sender<PsPacket>,
}

impl PacketQueue {
    pub(crate) fn bounded(capacity: usize) -> (Self, PacketReceiver) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, PacketReceiver { rx })
    }

    /// 非阻塞入队，满则丢弃
    pub(crate) fn publish(&self, packet: PsPacket) -> PublishOutcome {
        match self.tx.try_send(packet) {
            Ok(()) => PublishOutcome::Enqueued,
            Err(TrySendError::Full(packet)) => {
                tracing::warn!(
                    "PS queue full ({}/{}), dropping {} packet of {} bytes",
                    self.len(),
                    self.tx.max_capacity(),
                    packet.start_code().name(),
                    packet.len()
                );
                PublishOutcome::Dropped
            }
            Err(TrySendError::Closed(packet)) => {
                tracing::debug!(
                    "PS queue consumer gone, dropping {} packet of {} bytes",
                    packet.start_code().name(),
                    packet.len()
                );
                PublishOutcome::Dropped
            }
        }
    }

    /// 当前排队的包数量
    pub(crate) fn len(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }
}

/// 消费端
///
/// 所有生产端关闭后，仍可取完队列中剩余的包，之后返回 `None`。
#[derive(Debug)]
pub struct PacketReceiver {
    rx: mpsc::Receiver<PsPacket>,
}

impl PacketReceiver {
    /// 异步等待下一个包
    pub async fn recv(&mut self) -> Option<PsPacket> {
        self.rx.recv().await
    }

    /// 阻塞等待下一个包，不能在异步上下文中调用
    pub fn blocking_recv(&mut self) -> Option<PsPacket> {
        self.rx.blocking_recv()
    }

    /// 轮询
    pub fn try_recv(&mut self) -> Result<PsPacket, TryRecvError> {
        self.rx.try_recv()
    }

    /// 取出当前已排队的全部包
    pub fn drain(&mut self) -> Vec<PsPacket> {
        let mut packets = Vec::new();
        while let Ok(packet) = self.rx.try_recv() {
            packets.push(packet);
        }
        packets
    }

    /// 关闭接收端，之后的入队都会被丢弃
    pub fn close(&mut self) {
        self.rx.close();
    }

    pub fn into_reader(self) -> PacketReader {
        PacketReader::new(self)
    }
}
