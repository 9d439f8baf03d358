//! Journal record layout 日志记录布局
//!
//! head{crc, len, seq} + payload; crc covers len, seq and payload.
//! 头{crc, len, seq} + 负载；crc 覆盖 len、seq 与负载。

use ostore_comm::OpSeq;
use zerocopy::{
  FromBytes, Immutable, IntoBytes, KnownLayout,
  byteorder::little_endian::{U32, U64},
};

pub const HEAD_SIZE: usize = size_of::<RecordHead>();

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct RecordHead {
  pub crc: U32,
  pub len: U32,
  pub seq: U64,
}

impl RecordHead {
  #[inline]
  pub fn seq(&self) -> OpSeq {
    OpSeq::new(self.seq.get())
  }
}

/// Build one framed record / 构造一条带帧记录
pub fn frame(seq: OpSeq, payload: &[u8]) -> Vec<u8> {
  let mut head = RecordHead {
    crc: U32::new(0),
    len: U32::new(payload.len() as u32),
    seq: U64::new(seq.0),
  };
  let mut hasher = crc32fast::Hasher::new();
  hasher.update(&head.as_bytes()[4..]);
  hasher.update(payload);
  head.crc = U32::new(hasher.finalize());

  let mut buf = Vec::with_capacity(HEAD_SIZE + payload.len());
  buf.extend_from_slice(head.as_bytes());
  buf.extend_from_slice(payload);
  buf
}

/// Parse the record at `buf`, verifying the checksum
/// 解析并校验 `buf` 处的记录
pub fn parse(buf: &[u8]) -> Option<(RecordHead, &[u8])> {
  if buf.len() < HEAD_SIZE {
    return None;
  }
  let head = RecordHead::read_from_bytes(&buf[..HEAD_SIZE]).ok()?;
  let len = head.len.get() as usize;
  if buf.len() < HEAD_SIZE + len {
    return None;
  }

  let payload = &buf[HEAD_SIZE..HEAD_SIZE + len];
  let mut hasher = crc32fast::Hasher::new();
  hasher.update(&buf[4..HEAD_SIZE]);
  hasher.update(payload);
  if hasher.finalize() != head.crc.get() {
    return None;
  }
  Some((head, payload))
}
