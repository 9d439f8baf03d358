//! Volume collaborator / Volume 协作者
//!
//! Applies one primitive mutation against physical storage. Tolerant
//! outcomes (removing an absent object, clearing an absent attribute)
//! are normalized to success at this boundary; everything else surfaces
//! as an error for the executor to report.
//! 对物理存储应用单个变更原语。容忍的结果（删除不存在的对象、清除不存在的属性）
//! 在此边界归一化为成功；其余错误上报给执行器。

#![cfg_attr(docsrs, feature(doc_cfg))]

mod attr;
mod dir;
mod error;
mod mem;

use ostore_comm::{CollId, ObjId, PrimitiveOp};

pub use attr::{AttrStore, EmuAttrs, EmuMembers, MemberStore};
pub use dir::{DirMembers, DirVolume, NativeAttrs};
pub use error::{Result, VolError};
pub use mem::MemVolume;

/// Applies primitive operations against physical storage
/// 对物理存储应用操作原语
pub trait Volume: Send + Sync {
  fn apply(&self, op: &PrimitiveOp) -> Result<()>;

  /// Force everything applied so far durable
  /// 将已应用内容全部落盘
  fn sync(&self) -> Result<()>;

  fn read(&self, cid: CollId, oid: ObjId, off: u64, len: u64) -> Result<Vec<u8>>;

  fn exists(&self, cid: CollId, oid: ObjId) -> bool;

  fn getattr(&self, cid: CollId, oid: ObjId, name: &str) -> Result<Option<Vec<u8>>>;
}
