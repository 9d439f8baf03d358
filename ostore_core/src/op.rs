//! In-flight op / 在途 op

use ostore_comm::{OpSeq, Transaction};

/// How an op ended / op 的结局
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
  /// Every primitive applied / 全部原语已应用
  Applied,
  /// Apply stopped at a failing primitive; earlier ones stay applied
  /// 应用在失败原语处停止；之前的保持已应用
  Failed,
}

/// Completion callback / 完成回调
pub type Done = Box<dyn FnOnce(Outcome) + Send + 'static>;

/// One admitted transaction batch with its callbacks and throttle cost
/// 一个已准入的事务批次，含回调与限流开销
pub(crate) struct Op {
  pub seq: OpSeq,
  pub txns: Vec<Transaction>,
  pub onreadable: Option<Done>,
  pub ondisk: Option<Done>,
  pub bytes: u64,
  pub ops: u64,
}
