//! Journal thread / 日志线程
//!
//! Owns the durability log: replays it into the Volume on open,
//! then appends admitted batches, groups syncs, and reports the
//! durable watermark back to the pipeline. The WAL-backed log lives
//! entirely on this thread together with its compio runtime.
//! 拥有持久化日志：打开时回放进 Volume，随后追加已准入批次、
//! 合并同步，并向管线回报持久水位。基于 WAL 的日志与其 compio
//! 运行时完全驻留在本线程。

use std::{
  io,
  path::PathBuf,
  sync::{Arc, mpsc::Receiver},
};

use log::{error, warn};
use ostore_comm::{OpSeq, decode_batch};
use ostore_vol::Volume;
use ostore_wal::Wal;

use crate::pipe::Pipe;

/// Append-only durability log, one record per op
/// 仅追加的持久化日志，每 op 一条记录
pub trait DurLog {
  fn append(&mut self, seq: OpSeq, payload: &[u8]) -> io::Result<()>;

  /// Records appended so far become durable / 已追加记录落盘
  fn sync(&mut self) -> io::Result<()>;

  /// Records below `below` are checkpointed and may go away
  /// `below` 之前的记录已检查点，可以删除
  fn trim(&mut self, below: OpSeq);
}

/// Builds the log on the journal thread, feeding every surviving
/// record through the replay callback first.
/// 在日志线程上构建日志，先把每条存留记录送入回放回调。
pub type LogFactory = Box<
  dyn FnOnce(&mut dyn FnMut(OpSeq, &[u8])) -> io::Result<(Box<dyn DurLog>, OpSeq)> + Send,
>;

pub(crate) enum JournalMsg {
  Append { seq: OpSeq, payload: Vec<u8> },
  Trim(OpSeq),
  Shutdown,
}

struct WalLog {
  rt: compio::runtime::Runtime,
  wal: Wal,
}

impl DurLog for WalLog {
  fn append(&mut self, seq: OpSeq, payload: &[u8]) -> io::Result<()> {
    let Self { rt, wal } = self;
    rt.block_on(wal.append(seq, payload))
      .map(|_| ())
      .map_err(io::Error::other)
  }

  fn sync(&mut self) -> io::Result<()> {
    let Self { rt, wal } = self;
    rt.block_on(wal.sync()).map_err(io::Error::other)
  }

  fn trim(&mut self, below: OpSeq) {
    self.wal.trim(below);
  }
}

/// Log factory for the on-disk WAL, replaying records with seq > `after`
/// 磁盘 WAL 的日志工厂，回放 seq > `after` 的记录
pub(crate) fn wal_factory(dir: PathBuf, max_size: u64, after: OpSeq) -> LogFactory {
  Box::new(move |replay| {
    let rt = compio::runtime::Runtime::new()?;
    let (wal, max) = rt
      .block_on(Wal::open(dir, max_size, after, |seq, payload| {
        replay(seq, payload)
      }))
      .map_err(io::Error::other)?;
    Ok((Box::new(WalLog { rt, wal }) as Box<dyn DurLog>, max))
  })
}

fn append_one(log: &mut Box<dyn DurLog>, seq: OpSeq, payload: &[u8]) -> bool {
  if let Err(e) = log.append(seq, payload) {
    error!("journal append at op {} failed: {e}", seq.0);
    return false;
  }
  true
}

/// Replay one journaled batch into the Volume. Apply errors are
/// tolerated here: the op already completed before the crash, and
/// replay is idempotent over surviving state.
/// 将一条日志批次回放进 Volume。此处容忍应用错误：崩溃前该 op
/// 已完成，回放对存留状态是幂等的。
fn replay_batch(vol: &dyn Volume, seq: OpSeq, payload: &[u8]) {
  let txns = match decode_batch(payload) {
    Ok(txns) => txns,
    Err(e) => {
      warn!("replay decode at op {} failed: {e}", seq.0);
      return;
    }
  };
  for txn in &txns {
    for prim in txn.ops() {
      if let Err(e) = vol.apply(prim) {
        warn!("replay apply at op {} failed: {e}", seq.0);
      }
    }
  }
}

pub(crate) fn journal_loop(
  rx: Receiver<JournalMsg>,
  factory: LogFactory,
  pipe: Arc<Pipe>,
  vol: Arc<dyn Volume>,
  init_tx: oneshot::Sender<io::Result<OpSeq>>,
) {
  let built = factory(&mut |seq, payload| replay_batch(vol.as_ref(), seq, payload));
  let (mut log, max) = match built {
    Ok(v) => v,
    Err(e) => {
      let _ = init_tx.send(Err(e));
      return;
    }
  };
  let _ = init_tx.send(Ok(max));

  // After a failure the log state is unknown, so no append may be
  // acked again; only Shutdown ends the loop.
  // 失败后日志状态未知，不再确认任何追加；仅 Shutdown 结束循环。
  let mut failed = false;
  let mut next_msg = None;

  loop {
    let Some(msg) = next_msg.take().or_else(|| rx.recv().ok()) else {
      break;
    };
    match msg {
      JournalMsg::Append { seq, payload } => {
        if failed {
          continue;
        }
        let mut last = seq;
        let mut ok = append_one(&mut log, seq, &payload);
        // Group commit: drain whatever queued behind this append
        // 组提交：把排在本次追加之后的都并入
        while ok {
          match rx.try_recv() {
            Ok(JournalMsg::Append { seq, payload }) => {
              ok = append_one(&mut log, seq, &payload);
              if ok {
                last = seq;
              }
            }
            Ok(other) => {
              next_msg = Some(other);
              break;
            }
            Err(_) => break,
          }
        }
        if ok {
          if let Err(e) = log.sync() {
            error!("journal sync failed: {e}");
            ok = false;
          }
        }
        if ok {
          pipe.log_durable(last);
        } else {
          failed = true;
          pipe.halt();
        }
      }
      JournalMsg::Trim(below) => {
        if !failed {
          log.trim(below);
        }
      }
      JournalMsg::Shutdown => break,
    }
  }
}
