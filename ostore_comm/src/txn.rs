//! Transaction data model 事务数据模型
//!
//! A Transaction is an immutable ordered batch of primitive mutations,
//! atomic from the caller's perspective.
//! 事务是不可变的原语变更有序批次，对调用方而言是原子的。

use bitcode::{Decode, Encode};
use serde::{Deserialize, Serialize};

use crate::{CollId, ObjId, StoreError, StoreResult};

/// Primitive storage mutation, applied by the Volume
/// 由 Volume 应用的存储变更原语
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Encode, Decode)]
pub enum PrimitiveOp {
  Touch {
    cid: CollId,
    oid: ObjId,
  },
  Write {
    cid: CollId,
    oid: ObjId,
    off: u64,
    data: Vec<u8>,
  },
  Zero {
    cid: CollId,
    oid: ObjId,
    off: u64,
    len: u64,
  },
  Truncate {
    cid: CollId,
    oid: ObjId,
    size: u64,
  },
  Clone {
    cid: CollId,
    src: ObjId,
    dst: ObjId,
  },
  CloneRange {
    cid: CollId,
    src: ObjId,
    dst: ObjId,
    off: u64,
    len: u64,
  },
  Remove {
    cid: CollId,
    oid: ObjId,
  },
  SetAttr {
    cid: CollId,
    oid: ObjId,
    name: String,
    value: Vec<u8>,
  },
  RmAttr {
    cid: CollId,
    oid: ObjId,
    name: String,
  },
  MkColl {
    cid: CollId,
  },
  RmColl {
    cid: CollId,
  },
  /// Add object from another collection (hard-link semantics)
  /// 从另一集合添加对象（硬链接语义）
  CollAdd {
    dst: CollId,
    src: CollId,
    oid: ObjId,
  },
  CollRemove {
    cid: CollId,
    oid: ObjId,
  },
}

impl PrimitiveOp {
  /// Payload bytes carried by this op, used for admission throttling
  /// 本原语携带的负载字节数，用于准入限流
  #[inline]
  pub fn byte_size(&self) -> u64 {
    match self {
      Self::Write { data, .. } => data.len() as u64,
      Self::SetAttr { value, .. } => value.len() as u64,
      _ => 0,
    }
  }
}

/// Ordered batch of primitive ops, immutable once submitted
/// 原语有序批次，提交后不可变
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Encode, Decode)]
pub struct Transaction {
  ops: Vec<PrimitiveOp>,
}

impl Transaction {
  #[inline]
  pub fn new(ops: Vec<PrimitiveOp>) -> Self {
    Self { ops }
  }

  #[inline]
  pub fn ops(&self) -> &[PrimitiveOp] {
    &self.ops
  }

  #[inline]
  pub fn op_count(&self) -> u64 {
    self.ops.len() as u64
  }

  #[inline]
  pub fn byte_size(&self) -> u64 {
    self.ops.iter().map(PrimitiveOp::byte_size).sum()
  }
}

/// Encode a transaction batch for journaling
/// 编码事务批次用于日志
#[inline]
pub fn encode_batch(txns: &[Transaction]) -> Vec<u8> {
  bitcode::encode(txns)
}

/// Decode a journaled transaction batch
/// 解码日志中的事务批次
pub fn decode_batch(bytes: &[u8]) -> StoreResult<Vec<Transaction>> {
  bitcode::decode(bytes).map_err(|e| StoreError::Serialize(e.to_string().into()))
}
