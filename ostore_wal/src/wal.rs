//! WAL segments: open/replay, append, sync, trim
//! WAL 段：打开/回放、追加、同步、裁剪

use std::path::{Path, PathBuf};

use compio::io::AsyncWriteAtExt;
use compio_fs::File;
use fast32::base32::CROCKFORD_LOWER;
use log::{info, warn};
use ostore_comm::OpSeq;

use crate::{Error, HEAD_SIZE, LogPos, Result, record};

struct Cur {
  file: File,
  id: u64,
  pos: u64,
  last: OpSeq,
  dirty: bool,
}

struct SegInfo {
  id: u64,
  last: OpSeq,
}

/// Segmented durability log / 分段持久化日志
pub struct Wal {
  dir: PathBuf,
  max_size: u64,
  cur: Option<Cur>,
  sealed: Vec<SegInfo>,
}

fn seg_path(dir: &Path, id: u64) -> PathBuf {
  dir.join(format!("{}.wal", CROCKFORD_LOWER.encode_u64(id)))
}

fn seg_id(path: &Path) -> Option<u64> {
  if path.extension()?.to_str()? != "wal" {
    return None;
  }
  let stem = path.file_stem()?.to_str()?;
  CROCKFORD_LOWER.decode_u64(stem.as_bytes()).ok()
}

impl Wal {
  /// Open the log, replaying every record with seq > `after` in order.
  /// Returns the log and the highest seq seen.
  /// 打开日志，按序回放所有 seq > `after` 的记录。返回日志与最高 seq。
  pub async fn open(
    dir: impl Into<PathBuf>,
    max_size: u64,
    after: OpSeq,
    mut replay: impl FnMut(OpSeq, &[u8]),
  ) -> Result<(Self, OpSeq)> {
    let dir = dir.into();
    std::fs::create_dir_all(&dir)?;

    let mut ids: Vec<u64> = std::fs::read_dir(&dir)?
      .filter_map(|e| seg_id(&e.ok()?.path()))
      .collect();
    ids.sort_unstable();

    let mut wal = Self {
      dir,
      max_size,
      cur: None,
      sealed: Vec::new(),
    };
    let mut max = after;

    for (i, &id) in ids.iter().enumerate() {
      let path = seg_path(&wal.dir, id);
      let len = std::fs::metadata(&path)?.len();
      let file = ostore_fs::open_read(&path).await?;
      let data = ostore_fs::read_all(&file, len).await?;
      drop(file);

      let mut off = 0usize;
      let mut last = OpSeq::ZERO;
      while let Some((head, payload)) = record::parse(&data[off..]) {
        let seq = head.seq();
        if seq > after {
          replay(seq, payload);
        }
        if seq > max {
          max = seq;
        }
        last = seq;
        off += HEAD_SIZE + payload.len();
      }

      let torn = off < data.len();
      let is_last = i + 1 == ids.len();
      if torn && !is_last {
        // Trailing segments would replay effects of a hole
        // 后续段会回放空洞之后的效果
        return Err(Error::Corrupt {
          seg: id,
          off: off as u64,
        });
      }

      if is_last {
        if torn {
          warn!("torn journal tail in segment {id:#x} at {off}, discarding");
        }
        let file = ostore_fs::open_read_write_create(&path).await?;
        wal.cur = Some(Cur {
          file,
          id,
          pos: off as u64,
          last,
          dirty: false,
        });
      } else {
        wal.sealed.push(SegInfo { id, last });
      }
    }

    info!(
      "wal open: {} segment(s), max seq {}",
      ids.len(),
      max.0
    );
    Ok((wal, max))
  }

  async fn rotate(&mut self, id: u64) -> Result<()> {
    if let Some(old) = self.cur.take() {
      if old.dirty {
        old.file.sync_all().await?;
      }
      self.sealed.push(SegInfo {
        id: old.id,
        last: old.last,
      });
    }

    let path = seg_path(&self.dir, id);
    let file = ostore_fs::open_read_write_create(&path).await?;
    // Make the new segment name itself durable
    // 使新段文件名本身持久
    std::fs::File::open(&self.dir)?.sync_all()?;

    self.cur = Some(Cur {
      file,
      id,
      pos: 0,
      last: OpSeq::ZERO,
      dirty: false,
    });
    Ok(())
  }

  /// Append one record; caller syncs before treating it as durable
  /// 追加一条记录；调用方 sync 后方视为持久
  pub async fn append(&mut self, seq: OpSeq, payload: &[u8]) -> Result<LogPos> {
    if self.cur.as_ref().is_none_or(|c| c.pos >= self.max_size) {
      self.rotate(seq.0).await?;
    }

    let cur = self.cur.as_mut().expect("rotated");
    let buf = record::frame(seq, payload);
    let off = cur.pos;
    cur.file.write_all_at(buf, off).await.0?;
    cur.pos += (HEAD_SIZE + payload.len()) as u64;
    cur.last = seq;
    cur.dirty = true;

    Ok(LogPos {
      wal_id: cur.id,
      offset: off,
    })
  }

  /// Force appended records durable
  /// 将已追加记录落盘
  pub async fn sync(&mut self) -> Result<()> {
    if let Some(cur) = &mut self.cur {
      if cur.dirty {
        cur.file.sync_all().await?;
        cur.dirty = false;
      }
    }
    Ok(())
  }

  /// Delete sealed segments wholly below the commit sequence
  /// 删除完全位于提交序列之下的已封存段
  pub fn trim(&mut self, below: OpSeq) {
    self.sealed.retain(|seg| {
      if seg.last >= below {
        return true;
      }
      let path = seg_path(&self.dir, seg.id);
      if let Err(e) = std::fs::remove_file(&path) {
        warn!("trim segment {} failed: {e}", path.display());
        return true;
      }
      false
    });
  }

  /// Segment count, current included / 段数量，含当前段
  #[inline]
  pub fn segments(&self) -> usize {
    self.sealed.len() + usize::from(self.cur.is_some())
  }
}
