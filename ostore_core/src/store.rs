//! Store lifecycle and public surface / 存储生命周期与公开接口
//!
//! Open takes the directory lock, reads the commit record, replays
//! the journal past it, then starts the pipeline threads. Shutdown
//! drains the queue, runs a final checkpoint and joins everything.
//! 打开时获取目录锁、读取提交记录、回放其后的日志，再启动管线
//! 线程。关闭时排空队列、执行最后一次检查点并回收全部线程。

use std::{
  sync::{
    Arc,
    mpsc::{self, Sender},
  },
  thread::JoinHandle,
  time::Duration,
};

use log::info;
use ostore_comm::{
  CollId, ObjId, OpSeq, StoreConfig, StoreError, StoreResult, Transaction,
};
use ostore_fs::StoreLock;
use ostore_vol::Volume;

use crate::{
  ckp::{self, CkpMsg},
  journal::{self, JournalMsg, LogFactory},
  op::{Done, Outcome},
  pipe::Pipe,
};

pub struct Store {
  pipe: Arc<Pipe>,
  vol: Arc<dyn Volume>,
  journal_tx: Sender<JournalMsg>,
  ckp_tx: Sender<CkpMsg>,
  workers: Vec<JoinHandle<()>>,
  journal: Option<JoinHandle<()>>,
  ckp: Option<JoinHandle<()>>,
  _lock: StoreLock,
  down: bool,
}

impl Store {
  /// Mount the store: lock, recover, start the pipeline
  /// 挂载存储：加锁、恢复、启动管线
  pub fn open(conf: StoreConfig, vol: Arc<dyn Volume>) -> StoreResult<Self> {
    let lock = StoreLock::acquire(&conf.data_dir)?;
    let rt = compio::runtime::Runtime::new()?;
    let commit = rt
      .block_on(ostore_ckp::load(&conf.data_dir))
      .map_err(|e| StoreError::Internal(e.to_string().into()))?
      .unwrap_or(OpSeq::ZERO);
    drop(rt);

    let factory = journal::wal_factory(conf.wal_dir.clone(), conf.wal_max_size, commit);
    Self::start(conf, vol, commit, factory, lock)
  }

  /// Mount with a caller-supplied durability log; the commit sequence
  /// is whatever the caller recovered alongside it.
  /// 以调用方提供的持久化日志挂载；提交序列由调用方一并恢复。
  pub fn open_with_log(
    conf: StoreConfig,
    vol: Arc<dyn Volume>,
    commit: OpSeq,
    factory: LogFactory,
  ) -> StoreResult<Self> {
    let lock = StoreLock::acquire(&conf.data_dir)?;
    Self::start(conf, vol, commit, factory, lock)
  }

  fn start(
    conf: StoreConfig,
    vol: Arc<dyn Volume>,
    commit: OpSeq,
    factory: LogFactory,
    lock: StoreLock,
  ) -> StoreResult<Self> {
    let pipe = Arc::new(Pipe::new(
      conf.throttle_bytes,
      conf.throttle_ops,
      OpSeq::ZERO,
    ));

    let (journal_tx, journal_rx) = mpsc::channel();
    let (init_tx, init_rx) = oneshot::channel();
    let journal = std::thread::Builder::new().name("ostore-journal".into()).spawn({
      let pipe = pipe.clone();
      let vol = vol.clone();
      move || journal::journal_loop(journal_rx, factory, pipe, vol, init_tx)
    })?;
    let replayed = match init_rx
      .recv()
      .map_err(|_| StoreError::Internal("journal init lost".into()))?
    {
      Ok(max) => max,
      Err(e) => {
        let _ = journal.join();
        return Err(e.into());
      }
    };

    // Seqs restart above everything ever assigned, commit included:
    // the control record can be ahead of a trimmed journal.
    // 序列号从已分配过的最大值之上重启，含提交值：控制记录可能
    // 领先于已裁剪的日志。
    let start = replayed.max(commit);
    pipe.init_seq(start, commit);
    info!("store open: commit {} next op {}", commit.0, start.0 + 1);

    let (ckp_tx, ckp_rx) = mpsc::channel();
    let ckp = std::thread::Builder::new().name("ostore-ckp".into()).spawn({
      let pipe = pipe.clone();
      let vol = vol.clone();
      let journal_tx = journal_tx.clone();
      let dir = conf.data_dir.clone();
      let interval = Duration::from_secs(conf.ckp_interval_secs.max(1));
      move || ckp::ckp_loop(ckp_rx, pipe, vol, journal_tx, dir, interval)
    })?;

    let mut workers = Vec::with_capacity(conf.workers.max(1));
    for i in 0..conf.workers.max(1) {
      let pipe = pipe.clone();
      let vol = vol.clone();
      workers.push(
        std::thread::Builder::new()
          .name(format!("ostore-worker-{i}"))
          .spawn(move || crate::worker::worker_loop(pipe, vol))?,
      );
    }

    Ok(Self {
      pipe,
      vol,
      journal_tx,
      ckp_tx,
      workers,
      journal: Some(journal),
      ckp: Some(ckp),
      _lock: lock,
      down: false,
    })
  }

  /// Admit a transaction batch. Blocks while the throttle is over
  /// budget; returns the assigned sequence number. `onreadable`
  /// fires when effects are visible to reads, `ondisk` when the
  /// batch is also journal-durable, each in sequence order.
  /// 准入事务批次。限流超额时阻塞；返回分配的序列号。`onreadable`
  /// 在效果对读可见时触发，`ondisk` 在批次同时日志持久后触发，
  /// 均按序列号有序。
  pub fn admit(
    &self,
    txns: Vec<Transaction>,
    onreadable: Option<Done>,
    ondisk: Option<Done>,
  ) -> StoreResult<OpSeq> {
    self.pipe.admit(txns, onreadable, ondisk, &self.journal_tx)
  }

  /// Block until every admitted op is visible
  /// 阻塞直到所有已准入 op 可见
  pub fn flush(&self) {
    self.pipe.wait_drained();
  }

  /// Run a checkpoint covering everything currently visible and wait
  /// for it. Queued-but-unapplied ops are not covered; call
  /// [`Self::sync_and_flush`] for that.
  /// 执行覆盖当前全部可见内容的检查点并等待完成。仍在排队未应用
  /// 的 op 不在覆盖范围内；需要时用 [`Self::sync_and_flush`]。
  pub fn sync(&self) -> StoreResult<()> {
    let (tx, rx) = oneshot::channel();
    self.sync_with(Box::new(move |out| {
      let _ = tx.send(out);
    }))?;
    match rx.recv() {
      Ok(Outcome::Applied) => Ok(()),
      Ok(Outcome::Failed) => Err(StoreError::Halted),
      Err(_) => Err(StoreError::Internal("checkpointer gone".into())),
    }
  }

  /// Request a checkpoint; `on_safe` fires when the cycle ends
  /// 请求检查点；循环结束时触发 `on_safe`
  pub fn sync_with(&self, on_safe: Done) -> StoreResult<()> {
    self
      .ckp_tx
      .send(CkpMsg::Sync(Some(on_safe)))
      .map_err(|_| StoreError::Internal("checkpointer gone".into()))
  }

  /// Drain the queue, then checkpoint everything
  /// 排空队列后对全部内容做检查点
  pub fn sync_and_flush(&self) -> StoreResult<()> {
    self.flush();
    self.sync()
  }

  /// Highest checkpointed sequence / 已检查点的最高序列号
  pub fn committed(&self) -> OpSeq {
    self.pipe.committed()
  }

  /// True after a fatal durability or apply failure stopped admission
  /// 致命持久化或应用失败停止准入后为 true
  pub fn is_halted(&self) -> bool {
    self.pipe.is_halted()
  }

  pub fn read(&self, cid: CollId, oid: ObjId, off: u64, len: u64) -> ostore_vol::Result<Vec<u8>> {
    self.vol.read(cid, oid, off, len)
  }

  pub fn exists(&self, cid: CollId, oid: ObjId) -> bool {
    self.vol.exists(cid, oid)
  }

  pub fn getattr(&self, cid: CollId, oid: ObjId, name: &str) -> ostore_vol::Result<Option<Vec<u8>>> {
    self.vol.getattr(cid, oid, name)
  }

  pub fn volume(&self) -> &Arc<dyn Volume> {
    &self.vol
  }

  /// Unmount: reject new ops, drain, final checkpoint, join threads
  /// 卸载：拒绝新 op、排空、最后检查点、回收线程
  pub fn shutdown(&mut self) {
    if self.down {
      return;
    }
    self.down = true;

    self.pipe.shutdown();
    self.pipe.wait_drained();
    for w in self.workers.drain(..) {
      let _ = w.join();
    }

    // Checkpointer before journal: its final Trim must still land
    // 检查点线程先于日志线程：最后的 Trim 仍需送达
    let _ = self.ckp_tx.send(CkpMsg::Shutdown);
    if let Some(h) = self.ckp.take() {
      let _ = h.join();
    }
    let _ = self.journal_tx.send(JournalMsg::Shutdown);
    if let Some(h) = self.journal.take() {
      let _ = h.join();
    }
    info!("store closed at commit {}", self.pipe.committed().0);
  }
}

impl Drop for Store {
  fn drop(&mut self) {
    self.shutdown();
  }
}
