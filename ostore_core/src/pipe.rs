//! Pipeline state: queue, throttle, ordered completion delivery
//! 管线状态：队列、限流、有序完成投递
//!
//! One mutex covers the queue, the throttle counters and every
//! watermark, so admission, dequeue and delivery all see one
//! consistent picture. Callbacks fire with the lock released; a
//! single-drainer flag per callback kind keeps them in seq order
//! even when several threads finish at once.
//! 一把互斥锁覆盖队列、限流计数与全部水位，准入、出队与投递
//! 看到同一份一致状态。回调在释放锁后触发；每类回调一个
//! 单排水者标志，多线程同时完成时仍按 seq 有序。

use std::{
  collections::{BTreeMap, VecDeque},
  sync::mpsc::Sender,
};

use ostore_comm::{OpSeq, StoreError, StoreResult, Transaction, encode_batch};
use parking_lot::{Condvar, Mutex, MutexGuard};

use crate::{
  journal::JournalMsg,
  op::{Done, Op, Outcome},
};

struct Finished {
  outcome: Outcome,
  onreadable: Option<Done>,
  ondisk: Option<Done>,
}

struct PipeState {
  queue: VecDeque<Op>,
  /// Bytes admitted but not yet dequeued / 已准入未出队的字节数
  out_bytes: u64,
  /// Primitives admitted but not yet dequeued / 已准入未出队的原语数
  out_ops: u64,
  /// Ops dequeued but not yet finished / 已出队未完成的 op 数
  inflight: usize,
  /// Last assigned seq / 最后分配的 seq
  next_seq: OpSeq,
  /// Highest seq whose onreadable fired / onreadable 已触发的最高 seq
  visible: OpSeq,
  /// Highest seq durable in the journal / 日志中已持久的最高 seq
  durable: OpSeq,
  /// Highest checkpointed seq / 已检查点的最高 seq
  committed: OpSeq,
  /// Finished out of order, waiting for their turn / 乱序完成待投递
  reorder: BTreeMap<u64, Finished>,
  /// Visible ops whose ondisk waits on the journal / 可见但等日志的 ondisk
  ondisk: BTreeMap<u64, (Outcome, Done)>,
  delivering: bool,
  disk_delivering: bool,
  shutdown: bool,
  halted: bool,
}

pub(crate) struct Pipe {
  state: Mutex<PipeState>,
  admit_cv: Condvar,
  work_cv: Condvar,
  drain_cv: Condvar,
  max_bytes: u64,
  max_ops: u64,
}

impl Pipe {
  pub fn new(max_bytes: u64, max_ops: u64, start: OpSeq) -> Self {
    Self {
      state: Mutex::new(PipeState {
        queue: VecDeque::new(),
        out_bytes: 0,
        out_ops: 0,
        inflight: 0,
        next_seq: start,
        visible: start,
        durable: start,
        committed: OpSeq::ZERO,
        reorder: BTreeMap::new(),
        ondisk: BTreeMap::new(),
        delivering: false,
        disk_delivering: false,
        shutdown: false,
        halted: false,
      }),
      admit_cv: Condvar::new(),
      work_cv: Condvar::new(),
      drain_cv: Condvar::new(),
      max_bytes,
      max_ops,
    }
  }

  /// Set the recovered watermarks before any op is admitted
  /// 在任何 op 准入前设置恢复出的水位
  pub fn init_seq(&self, start: OpSeq, committed: OpSeq) {
    let mut s = self.state.lock();
    debug_assert_eq!(s.next_seq, s.visible);
    s.next_seq = start;
    s.visible = start;
    s.durable = start;
    s.committed = committed;
  }

  /// Admit a batch: block while outstanding work is over budget,
  /// assign the next seq, enqueue, and hand the journal its record.
  /// The journal send happens under the lock, so journal order is
  /// exactly seq order.
  /// 准入批次：未决量超额时阻塞，分配下一 seq，入队，并把记录
  /// 交给日志。日志发送在锁内进行，日志顺序即 seq 顺序。
  pub fn admit(
    &self,
    txns: Vec<Transaction>,
    onreadable: Option<Done>,
    ondisk: Option<Done>,
    journal: &Sender<JournalMsg>,
  ) -> StoreResult<OpSeq> {
    let bytes: u64 = txns.iter().map(Transaction::byte_size).sum();
    let ops: u64 = txns.iter().map(Transaction::op_count).sum();
    let payload = encode_batch(&txns);

    let mut s = self.state.lock();
    loop {
      if s.shutdown {
        return Err(StoreError::Shutdown);
      }
      if s.halted {
        return Err(StoreError::Halted);
      }
      let over = s.out_bytes + bytes > self.max_bytes || s.out_ops + ops > self.max_ops;
      // An op bigger than the whole budget still gets in, alone
      // 比整个预算还大的 op 也能进入，但独占
      if !over || (s.out_bytes == 0 && s.out_ops == 0) {
        break;
      }
      self.admit_cv.wait(&mut s);
    }

    s.next_seq = s.next_seq.next();
    let seq = s.next_seq;
    s.out_bytes += bytes;
    s.out_ops += ops;
    s.queue.push_back(Op {
      seq,
      txns,
      onreadable,
      ondisk,
      bytes,
      ops,
    });
    journal
      .send(JournalMsg::Append { seq, payload })
      .map_err(|_| StoreError::Internal("journal thread gone".into()))?;
    self.work_cv.notify_one();
    Ok(seq)
  }

  /// Worker side: take the oldest queued op, releasing its throttle
  /// cost. Returns None once shut down and drained.
  /// 工作线程侧：取最旧的 op 并释放其限流开销。关闭且排空后返回 None。
  pub fn next_op(&self) -> Option<Op> {
    let mut s = self.state.lock();
    loop {
      if let Some(op) = s.queue.pop_front() {
        s.out_bytes -= op.bytes;
        s.out_ops -= op.ops;
        s.inflight += 1;
        self.admit_cv.notify_all();
        return Some(op);
      }
      if s.shutdown {
        return None;
      }
      self.work_cv.wait(&mut s);
    }
  }

  /// Record one finished op and deliver every completion whose turn
  /// has come, in seq order.
  /// 记录一个完成的 op，并按 seq 顺序投递所有轮到的完成回调。
  pub fn finish(&self, op: Op, outcome: Outcome) {
    let Op {
      seq,
      onreadable,
      ondisk,
      ..
    } = op;

    let mut s = self.state.lock();
    s.inflight -= 1;
    s.reorder.insert(
      seq.0,
      Finished {
        outcome,
        onreadable,
        ondisk,
      },
    );

    if !s.delivering {
      s.delivering = true;
      loop {
        let next = s.visible.next();
        let Some(fin) = s.reorder.remove(&next.0) else {
          break;
        };
        let Finished {
          outcome,
          onreadable,
          ondisk,
        } = fin;
        if let Some(cb) = onreadable {
          MutexGuard::unlocked(&mut s, move || cb(outcome));
        }
        s.visible = next;
        if let Some(cb) = ondisk {
          s.ondisk.insert(next.0, (outcome, cb));
        }
      }
      s.delivering = false;
    }
    self.drain_cv.notify_all();
    self.drain_ondisk(s);
  }

  /// Journal side: everything up to `seq` is on stable log storage
  /// 日志侧：`seq` 及之前的记录已落盘
  pub fn log_durable(&self, seq: OpSeq) {
    let mut s = self.state.lock();
    if seq > s.durable {
      s.durable = seq;
    }
    self.drain_ondisk(s);
  }

  /// Fire ondisk callbacks once an op is both visible and log-durable
  /// op 同时可见且日志持久后触发其 ondisk 回调
  fn drain_ondisk(&self, mut s: MutexGuard<'_, PipeState>) {
    if s.disk_delivering {
      return;
    }
    s.disk_delivering = true;
    loop {
      let limit = s.visible.min(s.durable);
      let Some(entry) = s.ondisk.first_entry() else {
        break;
      };
      if *entry.key() > limit.0 {
        break;
      }
      let (outcome, cb) = entry.remove();
      MutexGuard::unlocked(&mut s, move || cb(outcome));
    }
    s.disk_delivering = false;
  }

  /// Stop admissions after a fatal failure; in-flight ops still finish
  /// 致命失败后停止准入；在途 op 照常完成
  pub fn halt(&self) {
    let mut s = self.state.lock();
    s.halted = true;
    self.admit_cv.notify_all();
  }

  pub fn is_halted(&self) -> bool {
    self.state.lock().halted
  }

  /// Reject new admissions and let workers drain out
  /// 拒绝新准入并让工作线程排空退出
  pub fn shutdown(&self) {
    let mut s = self.state.lock();
    s.shutdown = true;
    self.admit_cv.notify_all();
    self.work_cv.notify_all();
  }

  /// Block until every admitted op has become visible
  /// 阻塞直到所有已准入 op 均已可见
  pub fn wait_drained(&self) {
    let mut s = self.state.lock();
    while s.visible < s.next_seq {
      self.drain_cv.wait(&mut s);
    }
  }

  pub fn visible(&self) -> OpSeq {
    self.state.lock().visible
  }

  pub fn committed(&self) -> OpSeq {
    self.state.lock().committed
  }

  /// Only the checkpointer advances this, and never backward
  /// 仅检查点线程推进，且永不回退
  pub fn set_committed(&self, seq: OpSeq) {
    let mut s = self.state.lock();
    debug_assert!(seq >= s.committed);
    if seq > s.committed {
      s.committed = seq;
    }
  }
}
