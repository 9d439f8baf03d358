//! Error types for the durability log
//! 持久化日志错误类型

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
  #[error("io: {0}")]
  Io(#[from] std::io::Error),

  /// Corruption before the log tail; replay cannot trust what follows
  /// 日志尾部之前的损坏；其后内容不可信
  #[error("corrupt record in segment {seg:#x} at offset {off}")]
  Corrupt { seg: u64, off: u64 },
}
