//! In-memory volume / 内存卷
//!
//! Full primitive-op semantics over plain maps. Backs tests and acts as
//! the all-emulated volume.
//! 基于普通映射的完整原语语义。用于测试，也是全模拟卷。

use std::collections::HashMap;

use ostore_comm::{CollId, ObjId, PrimitiveOp};
use parking_lot::Mutex;

use crate::{AttrStore, EmuAttrs, Result, VolError, Volume};

#[derive(Default)]
struct MemState {
  colls: HashMap<CollId, HashMap<ObjId, Vec<u8>>>,
}

impl MemState {
  fn coll_mut(&mut self, cid: CollId) -> Result<&mut HashMap<ObjId, Vec<u8>>> {
    self.colls.get_mut(&cid).ok_or(VolError::NoColl(cid))
  }

  fn obj(&self, cid: CollId, oid: ObjId) -> Result<&Vec<u8>> {
    self
      .colls
      .get(&cid)
      .ok_or(VolError::NoColl(cid))?
      .get(&oid)
      .ok_or(VolError::NoObject(cid, oid))
  }

  fn write(&mut self, cid: CollId, oid: ObjId, off: u64, data: &[u8]) -> Result<()> {
    let end = range_end(off, data.len() as u64)?;
    let obj = self.coll_mut(cid)?.entry(oid).or_default();
    let (off, end) = (off as usize, end as usize);
    if obj.len() < end {
      obj.resize(end, 0);
    }
    obj[off..end].copy_from_slice(data);
    Ok(())
  }

  /// Zero a range in place, no len-sized scratch buffer
  /// 原地清零范围，不分配 len 大小的缓冲
  fn zero(&mut self, cid: CollId, oid: ObjId, off: u64, len: u64) -> Result<()> {
    let end = range_end(off, len)?;
    let obj = self.coll_mut(cid)?.entry(oid).or_default();
    let (off, end) = (off as usize, end as usize);
    if obj.len() < end {
      obj.resize(end, 0);
    }
    obj[off..end].fill(0);
    Ok(())
  }
}

/// Reject ranges that overflow or cannot be addressed
/// 拒绝溢出或无法寻址的范围
#[inline]
fn range_end(off: u64, len: u64) -> Result<u64> {
  match off.checked_add(len) {
    Some(end) if end <= isize::MAX as u64 => Ok(end),
    _ => Err(VolError::BadRange { off, len }),
  }
}

#[derive(Default)]
pub struct MemVolume {
  state: Mutex<MemState>,
  attrs: EmuAttrs,
}

impl MemVolume {
  pub fn new() -> Self {
    Self::default()
  }
}

impl Volume for MemVolume {
  fn apply(&self, op: &PrimitiveOp) -> Result<()> {
    let mut s = self.state.lock();
    match op {
      PrimitiveOp::Touch { cid, oid } => {
        s.coll_mut(*cid)?.entry(*oid).or_default();
      }
      PrimitiveOp::Write {
        cid,
        oid,
        off,
        data,
      } => {
        s.write(*cid, *oid, *off, data)?;
      }
      PrimitiveOp::Zero { cid, oid, off, len } => {
        s.zero(*cid, *oid, *off, *len)?;
      }
      PrimitiveOp::Truncate { cid, oid, size } => {
        let coll = s.coll_mut(*cid)?;
        let obj = coll.get_mut(oid).ok_or(VolError::NoObject(*cid, *oid))?;
        obj.resize(*size as usize, 0);
      }
      PrimitiveOp::Clone { cid, src, dst } => {
        let data = s.obj(*cid, *src)?.clone();
        s.coll_mut(*cid)?.insert(*dst, data);
      }
      PrimitiveOp::CloneRange {
        cid,
        src,
        dst,
        off,
        len,
      } => {
        let data = s.obj(*cid, *src)?;
        let start = (*off).min(data.len() as u64) as usize;
        let end = off.saturating_add(*len).min(data.len() as u64) as usize;
        let chunk = data[start..end].to_vec();
        s.write(*cid, *dst, *off, &chunk)?;
      }
      PrimitiveOp::Remove { cid, oid } => {
        // Absent object tolerated 容忍不存在的对象
        if let Some(coll) = s.colls.get_mut(cid) {
          coll.remove(oid);
        }
      }
      PrimitiveOp::SetAttr {
        cid,
        oid,
        name,
        value,
      } => {
        s.obj(*cid, *oid)?;
        self.attrs.set(*cid, *oid, name, value)?;
      }
      PrimitiveOp::RmAttr { cid, oid, name } => {
        self.attrs.remove(*cid, *oid, name)?;
      }
      PrimitiveOp::MkColl { cid } => {
        // Existing collection tolerated, keeps replay idempotent
        // 容忍已存在的集合，保证回放幂等
        s.colls.entry(*cid).or_default();
      }
      PrimitiveOp::RmColl { cid } => {
        if let Some(coll) = s.colls.get(cid) {
          if !coll.is_empty() {
            return Err(VolError::NotEmpty(*cid));
          }
          s.colls.remove(cid);
        }
      }
      PrimitiveOp::CollAdd { dst, src, oid } => {
        let data = s.obj(*src, *oid)?.clone();
        s.coll_mut(*dst)?.insert(*oid, data);
      }
      PrimitiveOp::CollRemove { cid, oid } => {
        if let Some(coll) = s.colls.get_mut(cid) {
          coll.remove(oid);
        }
      }
    }
    Ok(())
  }

  fn sync(&self) -> Result<()> {
    Ok(())
  }

  fn read(&self, cid: CollId, oid: ObjId, off: u64, len: u64) -> Result<Vec<u8>> {
    let s = self.state.lock();
    let data = s.obj(cid, oid)?;
    let start = off.min(data.len() as u64) as usize;
    let end = off.saturating_add(len).min(data.len() as u64) as usize;
    Ok(data[start..end].to_vec())
  }

  fn exists(&self, cid: CollId, oid: ObjId) -> bool {
    self
      .state
      .lock()
      .colls
      .get(&cid)
      .is_some_and(|c| c.contains_key(&oid))
  }

  fn getattr(&self, cid: CollId, oid: ObjId, name: &str) -> Result<Option<Vec<u8>>> {
    Ok(self.attrs.get(cid, oid, name)?)
  }
}
