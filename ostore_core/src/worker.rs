//! Executor worker / 执行工作线程
//!
//! Pulls ops off the queue and applies their primitives to the
//! Volume outside the pipeline lock. A non-fatal primitive failure
//! fails just that op; an I/O failure halts admission.
//! 从队列取 op，在管线锁外将原语应用到 Volume。非致命原语失败
//! 仅使该 op 失败；I/O 失败则停止准入。

use std::sync::Arc;

use log::{error, warn};
use ostore_vol::Volume;

use crate::{op::Outcome, pipe::Pipe};

pub(crate) fn worker_loop(pipe: Arc<Pipe>, vol: Arc<dyn Volume>) {
  while let Some(op) = pipe.next_op() {
    let mut outcome = Outcome::Applied;
    'apply: for txn in &op.txns {
      for prim in txn.ops() {
        if let Err(e) = vol.apply(prim) {
          if e.is_fatal() {
            error!("fatal apply failure at op {}: {e}", op.seq.0);
            pipe.halt();
          } else {
            warn!("apply failed at op {}: {e}", op.seq.0);
          }
          outcome = Outcome::Failed;
          break 'apply;
        }
      }
    }
    pipe.finish(op, outcome);
  }
}
