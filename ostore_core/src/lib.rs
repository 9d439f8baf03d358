//! Transaction pipeline / 事务管线
//!
//! Admission assigns each batch a sequence number and throttles on
//! outstanding work, workers apply batches against the Volume in
//! parallel, a journal thread makes them durable, and a checkpointer
//! periodically syncs the Volume and advances the commit sequence.
//! Completions always fire in sequence order.
//! 准入为每个批次分配序列号并按未决量限流，工作线程并行将批次
//! 应用到 Volume，日志线程使其持久，检查点线程周期性同步 Volume
//! 并推进提交序列。完成回调始终按序列号顺序触发。

#![cfg_attr(docsrs, feature(doc_cfg))]

mod ckp;
mod journal;
mod op;
mod pipe;
mod store;
mod worker;

pub use journal::{DurLog, LogFactory};
pub use op::{Done, Outcome};
pub use ostore_comm::{StoreConfig, StoreError, StoreResult};
pub use store::Store;
