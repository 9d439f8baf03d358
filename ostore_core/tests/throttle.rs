//! Admission throttle tests
//! 准入限流测试

use std::{
  sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
  },
  thread,
  time::Duration,
};

use ostore_comm::{CollId, ObjId, PrimitiveOp, Transaction};
use ostore_core::{Store, StoreConfig};
use ostore_vol::{MemVolume, Result, Volume};

#[static_init::constructor(0)]
extern "C" fn _log_init() {
  log_init::init();
}

fn cid() -> CollId {
  CollId::new(1)
}

fn write4k(oid: u64) -> Transaction {
  Transaction::new(vec![PrimitiveOp::Write {
    cid: cid(),
    oid: ObjId::new(oid),
    off: 0,
    data: vec![0xab; 4096],
  }])
}

/// Spins in apply while `hold` is set, pinning ops in the queue
/// `hold` 置位时在 apply 中自旋，把 op 钉在队列里
struct Gate {
  inner: MemVolume,
  hold: Arc<AtomicBool>,
}

impl Volume for Gate {
  fn apply(&self, op: &PrimitiveOp) -> Result<()> {
    while self.hold.load(Ordering::Acquire) {
      thread::sleep(Duration::from_millis(1));
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

/// 1 MiB budget takes 256 4 KiB writes; the 257th blocks until the
/// single worker dequeues one more op.
/// 1 MiB 预算容纳 256 个 4 KiB 写；第 257 个阻塞，直到唯一的
/// 工作线程再出队一个 op。
#[test]
fn test_byte_throttle_blocks_at_budget() {
  let dir = tempfile::tempdir().unwrap();
  let mut conf = StoreConfig::at(dir.path());
  conf.workers = 1;
  conf.throttle_bytes = 1 << 20;
  conf.throttle_ops = 1 << 20;

  let hold = Arc::new(AtomicBool::new(true));
  let store = Store::open(
    conf,
    Arc::new(Gate {
      inner: MemVolume::new(),
      hold: hold.clone(),
    }),
  )
  .unwrap();

  // Zero-byte gate op occupies the worker / 零字节门 op 占住工作线程
  store
    .admit(
      vec![Transaction::new(vec![
        PrimitiveOp::MkColl { cid: cid() },
        PrimitiveOp::Touch {
          cid: cid(),
          oid: ObjId::new(0),
        },
      ])],
      None,
      None,
    )
    .unwrap();

  // Exactly at budget, none of these block / 恰好满预算，均不阻塞
  for i in 1..=256u64 {
    store.admit(vec![write4k(i)], None, None).unwrap();
  }

  let admitted = AtomicBool::new(false);
  thread::scope(|s| {
    s.spawn(|| {
      store.admit(vec![write4k(257)], None, None).unwrap();
      admitted.store(true, Ordering::Release);
    });

    thread::sleep(Duration::from_millis(150));
    assert!(!admitted.load(Ordering::Acquire), "over-budget admit got in");

    hold.store(false, Ordering::Release);
  });
  assert!(admitted.load(Ordering::Acquire));

  store.flush();
  assert_eq!(store.read(cid(), ObjId::new(257), 0, 1).unwrap(), [0xab]);
}

/// An op bigger than the whole budget still gets in when nothing is
/// outstanding.
/// 超过整个预算的 op 在无未决工作时仍可进入。
#[test]
fn test_oversized_op_admitted_alone() {
  let dir = tempfile::tempdir().unwrap();
  let mut conf = StoreConfig::at(dir.path());
  conf.workers = 1;
  conf.throttle_bytes = 1024;
  conf.throttle_ops = 1 << 20;

  let vol = Arc::new(MemVolume::new());
  vol.apply(&PrimitiveOp::MkColl { cid: cid() }).unwrap();
  let store = Store::open(conf, vol).unwrap();

  let big = Transaction::new(vec![PrimitiveOp::Write {
    cid: cid(),
    oid: ObjId::new(1),
    off: 0,
    data: vec![7; 64 << 10],
  }]);
  store.admit(vec![big], None, None).unwrap();
  store.flush();
  assert_eq!(store.read(cid(), ObjId::new(1), 0, 1).unwrap(), [7]);
}
