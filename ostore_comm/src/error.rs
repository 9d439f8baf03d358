//! Unified error handling 统一错误处理

use hipstr::HipStr;
use thiserror::Error;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Error, Debug)]
pub enum StoreError {
  #[error("IO: {0}")]
  Io(#[from] std::io::Error),

  #[error("serialize: {0}")]
  Serialize(HipStr<'static>),

  /// Store is shutting down, op was not created
  /// 存储正在关闭，op 未创建
  #[error("store shutting down")]
  Shutdown,

  /// Store hit a fatal durability/apply failure, admission halted
  /// 存储遇到致命持久化/应用失败，准入已停止
  #[error("store halted after fatal failure")]
  Halted,

  #[error("internal: {0}")]
  Internal(HipStr<'static>),
}
