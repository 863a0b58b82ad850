// PS 数据包与起始码
// MPEG-PS (Program Stream) 结构标记

use bytes::Bytes;
use std::fmt;

/// 起始码前缀
pub const PS_START_CODE_PREFIX: [u8; 3] = [0x00, 0x00, 0x01];

/// 起始码长度（前缀 + 流 ID）
pub const START_CODE_LEN: usize = 4;

/// 可识别的 PS 起始码
///
/// 只接受精确枚举的流 ID，不做范围匹配。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StartCode {
    /// Pack Header (0x000001BA)
    PackHeader,

    /// System Header (0x000001BB)
    SystemHeader,

    /// Program Stream Map (0x000001BC)
    ProgramStreamMap,

    /// Private Stream 1 (0x000001BD)
    PrivateStream,

    /// Audio Stream (0x000001C0)
    Audio,

    /// Video Stream 0 (0x000001E0)
    Video0,

    /// Video Stream 1 (0x000001E1)
    Video1,

    /// Video Stream 2 (0x000001E2)
    Video2,
}

impl StartCode {
    pub const ALL: [StartCode; 8] = [
        StartCode::PackHeader,
        StartCode::SystemHeader,
        StartCode::ProgramStreamMap,
        StartCode::PrivateStream,
        StartCode::Audio,
        StartCode::Video0,
        StartCode::Video1,
        StartCode::Video2,
    ];

    pub fn from_stream_id(stream_id: u8) -> Option<Self> {
        match stream_id {
            0xBA => Some(Self::PackHeader),
            0xBB => Some(Self::SystemHeader),
            0xBC => Some(Self::ProgramStreamMap),
            0xBD => Some(Self::PrivateStream),
            0xC0 => Some(Self::Audio),
            0xE0 => Some(Self::Video0),
            0xE1 => Some(Self::Video1),
            0xE2 => Some(Self::Video2),
            _ => None,
        }
    }

    /// 从 4 字节大端值解析
    pub fn from_u32(code: u32) -> Option<Self> {
        if code >> 8 != 0x000001 {
            return None;
        }
        Self::from_stream_id((code & 0xFF) as u8)
    }

    pub fn stream_id(self) -> u8 {
        match self {
            Self::PackHeader => 0xBA,
            Self::SystemHeader => 0xBB,
            Self::ProgramStreamMap => 0xBC,
            Self::PrivateStream => 0xBD,
            Self::Audio => 0xC0,
            Self::Video0 => 0xE0,
            Self::Video1 => 0xE1,
            Self::Video2 => 0xE2,
        }
    }

    pub fn as_u32(self) -> u32 {
        0x0000_0100 | self.stream_id() as u32
    }

    pub fn to_bytes(self) -> [u8; START_CODE_LEN] {
        self.as_u32().to_be_bytes()
    }

    pub fn is_video(self) -> bool {
        matches!(self, Self::Video0 | Self::Video1 | Self::Video2)
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::PackHeader => "pack_header",
            Self::SystemHeader => "system_header",
            Self::ProgramStreamMap => "program_stream_map",
            Self::PrivateStream => "private_stream",
            Self::Audio => "audio",
            Self::Video0 => "video0",
            Self::Video1 => "video1",
            Self::Video2 => "video2",
        }
    }

    /// 检查 `data[pos..]` 是否以可识别的起始码开头
    pub fn at(data: &[u8], pos: usize) -> Option<Self> {
        let window = data.get(pos..pos.checked_add(START_CODE_LEN)?)?;
        if window[..3] != PS_START_CODE_PREFIX {
            return None;
        }
        Self::from_stream_id(window[3])
    }

    /// 从 `from` 开始查找下一个可识别的起始码
    pub fn find(data: &[u8], from: usize) -> Option<usize> {
        if data.len() < START_CODE_LEN {
            return None;
        }

        (from..=data.len() - START_CODE_LEN).find(|&i| Self::at(data, i).is_some())
    }
}

impl fmt::Display for StartCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(0x{:08X})", self.name(), self.as_u32())
    }
}

/// PS 数据包
///
/// 从一个起始码（含）到下一个起始码（不含）的完整字节序列。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PsPacket {
    start_code: StartCode,
    data: Bytes,
}

impl PsPacket {
    /// `data` 必须以 `start_code` 开头
    pub(crate) fn new(start_code: StartCode, data: Bytes) -> Self {
        debug_assert_eq!(StartCode::at(&data, 0), Some(start_code));
        Self { start_code, data }
    }

    pub fn start_code(&self) -> StartCode {
        self.start_code
    }

    pub fn data(&self) -> &Bytes {
        &self.data
    }

    pub fn into_bytes(self) -> Bytes {
        self.data
    }

    /// 起始码之后的负载
    pub fn payload(&self) -> &[u8] {
        &self.data[START_CODE_LEN..]
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl AsRef<[u8]> for PsPacket {
    fn as_ref(&self) -> &[u8] {
        &self.data
    }
}
