//! # ostore_wal - Durability Log
//! 持久化日志
//!
//! Segmented append-only journal. A batch is appended ahead of execution
//! and acknowledged durable after sync; a checkpoint trims whole
//! segments below the commit sequence, bounding replay cost.
//! 分段追加日志。批次先于执行追加，sync 后确认持久；
//! 检查点裁剪提交序列之下的整段，限定回放成本。

#![cfg_attr(docsrs, feature(doc_cfg))]

mod error;
mod record;
mod wal;

pub use error::{Error, Result};
pub use record::{HEAD_SIZE, RecordHead};
pub use wal::Wal;

/// Position of one record inside the log
/// 日志中一条记录的位置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogPos {
  pub wal_id: u64,
  pub offset: u64,
}
