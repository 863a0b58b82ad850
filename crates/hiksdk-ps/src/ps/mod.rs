// PS 流重组层
// Program Stream (MPEG-PS) 同步、切分与输出

pub mod demuxer;
pub mod packet;
pub mod splitter;

pub use demuxer::PsDemuxer;
pub use packet::{PsPacket, StartCode, PS_START_CODE_PREFIX, START_CODE_LEN};
pub use splitter::{split, Cut, Splitter, TailPolicy};
