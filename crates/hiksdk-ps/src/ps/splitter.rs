// PS 同步与切分
// 在缓冲区中定位起始码，切出完整的 PS 包

use super::packet::{StartCode, START_CODE_LEN};
use serde::{Deserialize, Serialize};

/// 无同步点时保留的尾部字节数（起始码可能跨越两次输入）
pub const RESYNC_KEEP: usize = START_CODE_LEN - 1;

/// 末尾未闭合包的处理策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TailPolicy {
    /// 没有后续起始码时立即输出剩余全部数据（与现有下游的分包边界一致）
    #[default]
    Flush,

    /// 等待下一个起始码再输出
    Hold,
}

/// 一次切分的结果，以缓冲区偏移表示
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cut {
    /// 数据不足 4 字节，无法判断
    Pending,

    /// 没有同步点，只保留 `keep_from` 之后的字节
    Resync { keep_from: usize },

    /// 完整包 `[start, end)`，`end` 之后为剩余数据
    Packet {
        code: StartCode,
        start: usize,
        end: usize,
    },

    /// 包已开始但未闭合，保留 `start` 之后的字节
    Open { code: StartCode, start: usize },
}

impl Cut {
    /// 剩余数据在原缓冲区中的起点
    pub fn remainder_from(&self) -> usize {
        match *self {
            Cut::Pending => 0,
            Cut::Resync { keep_from } => keep_from,
            Cut::Packet { end, .. } => end,
            Cut::Open { start, .. } => start,
        }
    }

    /// 被跳过的前导字节数
    pub fn discarded(&self) -> usize {
        match *self {
            Cut::Pending => 0,
            Cut::Resync { keep_from } => keep_from,
            Cut::Packet { start, .. } | Cut::Open { start, .. } => start,
        }
    }
}

/// PS 切分器
#[derive(Debug, Clone, Copy, Default)]
pub struct Splitter {
    policy: TailPolicy,
}

impl Splitter {
    pub fn new(policy: TailPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> TailPolicy {
        self.policy
    }

    /// 定位下一个包的边界
    pub fn locate(&self, buffer: &[u8]) -> Cut {
        self.locate_from(buffer, 0)
    }

    /// 同 [`Splitter::locate`]，但下一个起始码只从 `resume` 开始查找
    ///
    /// `resume` 之前的位置必须已确认不含起始码，通常是上一次
    /// [`Cut::Open`] 之后的 `buffer.len() - 3`。
    pub fn locate_from(&self, buffer: &[u8], resume: usize) -> Cut {
        if buffer.len() < START_CODE_LEN {
            return Cut::Pending;
        }

        let Some(start) = StartCode::find(buffer, 0) else {
            return Cut::Resync {
                keep_from: buffer.len() - RESYNC_KEEP,
            };
        };

        let Some(code) = StartCode::at(buffer, start) else {
            return Cut::Pending;
        };

        match StartCode::find(buffer, (start + START_CODE_LEN).max(resume)) {
            Some(next) => Cut::Packet {
                code,
                start,
                end: next,
            },
            None => match self.policy {
                TailPolicy::Flush => Cut::Packet {
                    code,
                    start,
                    end: buffer.len(),
                },
                TailPolicy::Hold => Cut::Open { code, start },
            },
        }
    }

    /// 切出一个包，返回 `(包, 剩余数据)`
    pub fn split<'a>(&self, buffer: &'a [u8]) -> (Option<&'a [u8]>, &'a [u8]) {
        let cut = self.locate(buffer);
        let packet = match cut {
            Cut::Packet { start, end, .. } => Some(&buffer[start..end]),
            _ => None,
        };
        (packet, &buffer[cut.remainder_from()..])
    }
}

/// 使用默认策略（[`TailPolicy::Flush`]）切分
pub fn split(buffer: &[u8]) -> (Option<&[u8]>, &[u8]) {
    Splitter::default().split(buffer)
}
