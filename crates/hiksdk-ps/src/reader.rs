// 将输出队列适配为 std::io::Read
// 便于将重新分包后的 PS 流直接写入文件或管道

use crate::queue::PacketReceiver;
use bytes::{Buf, Bytes};
use std::io::{self, Read};

/// 阻塞式 PS 字节流读取器
///
/// 队列关闭且取空后返回 EOF。调用方缓冲区小于包长时，剩余字节留待下次读取。
///
/// `read` 内部使用 [`PacketReceiver::blocking_recv`]，只能在普通线程中调用；
/// 在 tokio 运行时内调用会 panic，异步上下文请改用 [`PacketReceiver::recv`]，
/// 或放到 `tokio::task::spawn_blocking` 中读取。
pub struct PacketReader {
    rx: PacketReceiver,
    pending: Bytes,
}

impl PacketReader {
    pub fn new(rx: PacketReceiver) -> Self {
        Self {
            rx,
            pending: Bytes::new(),
        }
    }

    pub fn into_inner(self) -> PacketReceiver {
        self.rx
    }
}

impl Read for PacketReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        while self.pending.is_empty() {
            match self.rx.blocking_recv() {
                Some(packet) => self.pending = packet.into_bytes(),
                None => return Ok(0),
            }
        }

        let n = buf.len().min(self.pending.len());
        buf[..n].copy_from_slice(&self.pending[..n]);
        self.pending.advance(n);

        Ok(n)
    }
}
