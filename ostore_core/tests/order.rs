//! Completion ordering tests
//! 完成顺序测试

use std::{
  sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
  },
  thread,
  time::Duration,
};

use ostore_comm::{CollId, ObjId, PrimitiveOp, Transaction};
use ostore_core::{Store, StoreConfig};
use ostore_vol::{MemVolume, Result, Volume};
use parking_lot::Mutex;

#[static_init::constructor(0)]
extern "C" fn _log_init() {
  log_init::init();
}

fn cid() -> CollId {
  CollId::new(1)
}

fn write(oid: u64, data: &[u8]) -> Transaction {
  Transaction::new(vec![PrimitiveOp::Write {
    cid: cid(),
    oid: ObjId::new(oid),
    off: 0,
    data: data.to_vec(),
  }])
}

/// Applies take uneven time, so parallel workers finish out of order
/// 应用耗时不均，并行工作线程乱序完成
struct Jitter {
  inner: MemVolume,
  n: AtomicUsize,
}

impl Jitter {
  fn new() -> Self {
    let inner = MemVolume::new();
    inner.apply(&PrimitiveOp::MkColl { cid: cid() }).unwrap();
    Self {
      inner,
      n: AtomicUsize::new(0),
    }
  }
}

impl Volume for Jitter {
  fn apply(&self, op: &PrimitiveOp) -> Result<()> {
    let k = self.n.fetch_add(1, Ordering::Relaxed) as u64;
    thread::sleep(Duration::from_millis(k * 7 % 5));
    self.inner.apply(op)
  }

  fn sync(&self) -> Result<()> {
    self.inner.sync()
  }

  fn read(&self, cid: CollId, oid: ObjId, off: u64, len: u64) -> Result<Vec<u8>> {
    self.inner.read(cid, oid, off, len)
  }

  fn exists(&self, cid: CollId, oid: ObjId) -> bool {
    self.inner.exists(cid, oid)
  }

  fn getattr(&self, cid: CollId, oid: ObjId, name: &str) -> Result<Option<Vec<u8>>> {
    self.inner.getattr(cid, oid, name)
  }
}

#[test]
fn test_parallel_completions_in_seq_order() {
  let dir = tempfile::tempdir().unwrap();
  let mut conf = StoreConfig::at(dir.path());
  conf.workers = 4;

  let store = Store::open(conf, Arc::new(Jitter::new())).unwrap();
  let readable = Arc::new(Mutex::new(Vec::new()));
  let disk = Arc::new(Mutex::new(Vec::new()));

  for i in 1..=64u64 {
    let readable = readable.clone();
    let disk = disk.clone();
    let seq = store
      .admit(
        vec![write(i, b"x")],
        Some(Box::new(move |_| readable.lock().push(i))),
        Some(Box::new(move |_| disk.lock().push(i))),
      )
      .unwrap();
    assert_eq!(seq.0, i);
  }

  drop(store);
  let want: Vec<u64> = (1..=64).collect();
  assert_eq!(*readable.lock(), want);
  assert_eq!(*disk.lock(), want);
}

/// A slow first op must not be overtaken by a fast second one
/// 慢的首个 op 不能被快的第二个 op 超越
struct SlowData {
  inner: MemVolume,
  slow: Vec<u8>,
}

impl Volume for SlowData {
  fn apply(&self, op: &PrimitiveOp) -> Result<()> {
    if let PrimitiveOp::Write { data, .. } = op {
      if *data == self.slow {
        thread::sleep(Duration::from_millis(100));
      }
    }
    self.inner.apply(op)
  }

  fn sync(&self) -> Result<()> {
    self.inner.sync()
  }

  fn read(&self, cid: CollId, oid: ObjId, off: u64, len: u64) -> Result<Vec<u8>> {
    self.inner.read(cid, oid, off, len)
  }

  fn exists(&self, cid: CollId, oid: ObjId) -> bool {
    self.inner.exists(cid, oid)
  }

  fn getattr(&self, cid: CollId, oid: ObjId, name: &str) -> Result<Option<Vec<u8>>> {
    self.inner.getattr(cid, oid, name)
  }
}

#[test]
fn test_slow_op_keeps_its_turn() {
  let dir = tempfile::tempdir().unwrap();
  let mut conf = StoreConfig::at(dir.path());
  conf.workers = 1;

  let inner = MemVolume::new();
  inner.apply(&PrimitiveOp::MkColl { cid: cid() }).unwrap();
  let store = Store::open(
    conf,
    Arc::new(SlowData {
      inner,
      slow: b"hello".to_vec(),
    }),
  )
  .unwrap();

  let order = Arc::new(Mutex::new(Vec::new()));
  for (i, data) in [&b"hello"[..], b"world"].iter().enumerate() {
    let order = order.clone();
    store
      .admit(
        vec![write(9, data)],
        Some(Box::new(move |_| order.lock().push(i + 1))),
        None,
      )
      .unwrap();
  }
  store.flush();

  assert_eq!(*order.lock(), vec![1, 2]);
  // Later write wins / 后写者胜
  assert_eq!(store.read(cid(), ObjId::new(9), 0, 16).unwrap(), b"world");
}
