//! Commit sequence control record / 提交序列控制记录
//!
//! One small record holding the highest op seq whose effects are durable.
//! Read once at startup, rewritten atomically on every checkpoint, so a
//! crash mid-write never leaves a torn value.
//! 保存效果已持久的最高 op seq 的小记录。启动时读取一次，
//! 每次检查点原子重写，写入途中崩溃不会留下撕裂值。

#![cfg_attr(docsrs, feature(doc_cfg))]

use std::path::{Path, PathBuf};

use ostore_comm::{OpSeq, Timestamp};
use thiserror::Error;
use zerocopy::{
  FromBytes, Immutable, IntoBytes, KnownLayout,
  byteorder::little_endian::{U32, U64},
};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
  #[error("io: {0}")]
  Io(#[from] std::io::Error),

  #[error("corrupt control record")]
  Corrupt,
}

const MAGIC: u32 = 0x4f53_434b; // "OSCK"
const FILE: &str = "commit_seq";

#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct CommitRecord {
  magic: U32,
  crc: U32,
  pub seq: U64,
  pub time: U64,
}

impl CommitRecord {
  fn new(seq: OpSeq) -> Self {
    let mut rec = Self {
      magic: U32::new(MAGIC),
      crc: U32::new(0),
      seq: U64::new(seq.0),
      time: U64::new(Timestamp::now().0),
    };
    rec.crc = U32::new(crc32fast::hash(&rec.as_bytes()[8..]));
    rec
  }

  fn check(&self) -> bool {
    self.magic.get() == MAGIC && self.crc.get() == crc32fast::hash(&self.as_bytes()[8..])
  }
}

#[inline]
fn path(dir: &Path) -> PathBuf {
  dir.join(FILE)
}

/// Load the persisted commit sequence; None on a fresh store
/// 读取持久化的提交序列；新存储返回 None
pub async fn load(dir: &Path) -> Result<Option<OpSeq>> {
  let path = path(dir);
  let len = match std::fs::metadata(&path) {
    Ok(m) => m.len(),
    Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
    Err(e) => return Err(e.into()),
  };
  if len != size_of::<CommitRecord>() as u64 {
    return Err(Error::Corrupt);
  }

  let file = ostore_fs::open_read(&path).await?;
  let data = ostore_fs::read_all(&file, len).await?;
  let rec = CommitRecord::read_from_bytes(&data).map_err(|_| Error::Corrupt)?;
  if !rec.check() {
    return Err(Error::Corrupt);
  }
  Ok(Some(OpSeq::new(rec.seq.get())))
}

/// Atomically persist a new commit sequence
/// 原子持久化新的提交序列
pub async fn save(dir: &Path, seq: OpSeq) -> Result<()> {
  std::fs::create_dir_all(dir)?;
  let rec = CommitRecord::new(seq);
  ostore_fs::atomic_write(&path(dir), rec.as_bytes().to_vec()).await?;
  Ok(())
}
