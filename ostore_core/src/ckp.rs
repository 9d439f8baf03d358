//! Checkpointer thread / 检查点线程
//!
//! Every interval, or on demand, takes the visible watermark as the
//! target, syncs the Volume, persists the control record, then lets
//! the journal drop segments below the new commit. One cycle is a
//! small state machine so a crash between steps never claims more
//! than what is really durable.
//! 每个周期或按需，以可见水位为目标，同步 Volume、持久化控制
//! 记录，再让日志丢弃新提交之下的段。一次循环是小状态机，步骤
//! 间崩溃不会声称超出实际持久的内容。

use std::{
  path::PathBuf,
  sync::{
    Arc,
    mpsc::{Receiver, RecvTimeoutError, Sender},
  },
  time::Duration,
};

use log::{error, info};
use ostore_vol::Volume;

use crate::{
  journal::JournalMsg,
  op::{Done, Outcome},
  pipe::Pipe,
};

pub(crate) enum CkpMsg {
  /// Run a cycle now; the callback fires when it is done
  /// 立即执行一次循环；完成后触发回调
  Sync(Option<Done>),
  Shutdown,
}

struct Ckp {
  pipe: Arc<Pipe>,
  vol: Arc<dyn Volume>,
  journal: Sender<JournalMsg>,
  dir: PathBuf,
  rt: compio::runtime::Runtime,
}

impl Ckp {
  /// One checkpoint cycle: sync, persist, trim. True when everything
  /// visible at entry is now committed.
  /// 一次检查点循环：同步、持久化、裁剪。入口时可见的内容均已
  /// 提交则返回 true。
  fn cycle(&self) -> bool {
    let target = self.pipe.visible();
    if target <= self.pipe.committed() {
      return true;
    }

    if let Err(e) = self.vol.sync() {
      error!("checkpoint: volume sync failed: {e}");
      self.pipe.halt();
      return false;
    }
    if let Err(e) = self.rt.block_on(ostore_ckp::save(&self.dir, target)) {
      error!("checkpoint: control record write failed: {e}");
      self.pipe.halt();
      return false;
    }

    self.pipe.set_committed(target);
    let _ = self.journal.send(JournalMsg::Trim(target));
    info!("checkpoint at op {}", target.0);
    true
  }
}

pub(crate) fn ckp_loop(
  rx: Receiver<CkpMsg>,
  pipe: Arc<Pipe>,
  vol: Arc<dyn Volume>,
  journal: Sender<JournalMsg>,
  dir: PathBuf,
  interval: Duration,
) {
  let rt = match compio::runtime::Runtime::new() {
    Ok(rt) => rt,
    Err(e) => {
      error!("checkpointer runtime: {e}");
      pipe.halt();
      return;
    }
  };
  let ckp = Ckp {
    pipe,
    vol,
    journal,
    dir,
    rt,
  };

  loop {
    let (waiter, stop) = match rx.recv_timeout(interval) {
      Ok(CkpMsg::Sync(w)) => (w, false),
      Ok(CkpMsg::Shutdown) => (None, true),
      Err(RecvTimeoutError::Timeout) => (None, false),
      Err(RecvTimeoutError::Disconnected) => (None, true),
    };

    // A final cycle runs even on the way out, so a clean shutdown
    // leaves commit == visible and an empty journal to replay.
    // 退出前也执行最后一次循环，正常关闭后 commit == visible，
    // 重放时日志为空。
    let ok = ckp.cycle();
    if let Some(w) = waiter {
      w(if ok { Outcome::Applied } else { Outcome::Failed });
    }
    if stop {
      break;
    }
  }
}
