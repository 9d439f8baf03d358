//! Core type system 核心类型系统
//! NewType pattern prevents primitive type misuse NewType 模式防止原生类型混用

use bitcode::{Decode, Encode};
use serde::{Deserialize, Serialize};

/// 64-bit collection ID (generated from collection name hash)
/// 64 位集合 ID（由集合名哈希生成）
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Encode, Decode,
)]
#[repr(transparent)]
pub struct CollId(pub u64);

impl CollId {
  #[inline]
  pub const fn new(id: u64) -> Self {
    Self(id)
  }

  /// Generate CollId from binary name 从二进制名称生成 CollId
  #[inline]
  pub fn from_name(name: &[u8]) -> Self {
    Self(gxhash::gxhash64(name, 0))
  }
}

/// 64-bit object ID (generated from object name hash)
/// 64 位对象 ID（由对象名哈希生成）
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Encode, Decode,
)]
#[repr(transparent)]
pub struct ObjId(pub u64);

impl ObjId {
  #[inline]
  pub const fn new(id: u64) -> Self {
    Self(id)
  }

  /// Generate ObjId from binary name 从二进制名称生成 ObjId
  #[inline]
  pub fn from_name(name: &[u8]) -> Self {
    Self(gxhash::gxhash64(name, 1))
  }
}

/// Op sequence number, assigned once at admission
/// Op 序列号，准入时分配一次
#[derive(
  Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
  Encode, Decode,
)]
#[repr(transparent)]
pub struct OpSeq(pub u64);

impl OpSeq {
  pub const ZERO: Self = Self(0);

  #[inline]
  pub const fn new(seq: u64) -> Self {
    Self(seq)
  }

  #[inline]
  pub const fn next(&self) -> Self {
    Self(self.0 + 1)
  }
}

/// 64-bit second timestamp
/// 64 位秒级时间戳
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Encode, Decode,
)]
#[repr(transparent)]
pub struct Timestamp(pub u64);

impl Timestamp {
  #[inline]
  pub const fn new(ts: u64) -> Self {
    Self(ts)
  }

  /// Get current timestamp in seconds (fast, ~10ns) 获取当前秒级时间戳（快速，约10ns）
  #[inline]
  pub fn now() -> Self {
    Self(coarsetime::Clock::now_since_epoch().as_secs())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_from_name() {
    // Same name always maps to the same id 相同名称始终映射到相同 id
    assert_eq!(CollId::from_name(b"meta"), CollId::from_name(b"meta"));
    assert_eq!(ObjId::from_name(b"obj.0"), ObjId::from_name(b"obj.0"));
    assert_ne!(CollId::from_name(b"meta"), CollId::from_name(b"data"));
    assert_ne!(ObjId::from_name(b"obj.0"), ObjId::from_name(b"obj.1"));

    // Collection and object seeds differ, no cross-space collision
    // 集合与对象种子不同，空间之间不相撞
    assert_ne!(CollId::from_name(b"meta").0, ObjId::from_name(b"meta").0);
  }
}
