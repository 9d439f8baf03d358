//! Volume error types
//! Volume 错误类型

use ostore_comm::{CollId, ObjId};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, VolError>;

#[derive(Error, Debug)]
pub enum VolError {
  #[error("io: {0}")]
  Io(#[from] std::io::Error),

  #[error("no such collection: {0:?}")]
  NoColl(CollId),

  #[error("no such object: {0:?}/{1:?}")]
  NoObject(CollId, ObjId),

  #[error("collection not empty: {0:?}")]
  NotEmpty(CollId),

  /// Offset + length does not fit the address space
  /// 偏移加长度超出地址空间
  #[error("bad range: off {off} len {len}")]
  BadRange { off: u64, len: u64 },
}

impl VolError {
  /// Fatal errors halt admission; logical failures only fail the op
  /// 致命错误停止准入；逻辑失败仅使该 op 失败
  #[inline]
  pub fn is_fatal(&self) -> bool {
    matches!(self, Self::Io(_))
  }
}
