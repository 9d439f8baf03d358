//! Attribute / membership capability interfaces
//! 属性 / 成员能力接口
//!
//! Two interchangeable implementations per capability, selected once at
//! volume open, never via runtime type inspection.
//! 每种能力两个可互换实现，卷打开时选定一次，绝不做运行时类型检查。

use std::{
  collections::{HashMap, HashSet},
  io,
};

use ostore_comm::{CollId, ObjId};
use parking_lot::Mutex;

/// Extended attribute capability / 扩展属性能力
pub trait AttrStore: Send + Sync {
  fn get(&self, cid: CollId, oid: ObjId, name: &str) -> io::Result<Option<Vec<u8>>>;

  fn set(&self, cid: CollId, oid: ObjId, name: &str, value: &[u8]) -> io::Result<()>;

  /// Removing an absent attribute is a no-op
  /// 删除不存在的属性是空操作
  fn remove(&self, cid: CollId, oid: ObjId, name: &str) -> io::Result<()>;
}

/// Collection membership capability / 集合成员能力
pub trait MemberStore: Send + Sync {
  fn add(&self, dst: CollId, src: CollId, oid: ObjId) -> io::Result<()>;

  /// Removing an absent member is a no-op
  /// 删除不存在的成员是空操作
  fn remove(&self, cid: CollId, oid: ObjId) -> io::Result<()>;

  fn exists(&self, cid: CollId, oid: ObjId) -> bool;
}

/// Emulated attribute store for filesystems without native xattr
/// 面向无原生 xattr 文件系统的模拟属性存储
#[derive(Default)]
pub struct EmuAttrs {
  map: Mutex<HashMap<(CollId, ObjId, String), Vec<u8>>>,
}

impl AttrStore for EmuAttrs {
  fn get(&self, cid: CollId, oid: ObjId, name: &str) -> io::Result<Option<Vec<u8>>> {
    Ok(self.map.lock().get(&(cid, oid, name.to_owned())).cloned())
  }

  fn set(&self, cid: CollId, oid: ObjId, name: &str, value: &[u8]) -> io::Result<()> {
    self
      .map
      .lock()
      .insert((cid, oid, name.to_owned()), value.to_vec());
    Ok(())
  }

  fn remove(&self, cid: CollId, oid: ObjId, name: &str) -> io::Result<()> {
    self.map.lock().remove(&(cid, oid, name.to_owned()));
    Ok(())
  }
}

/// Emulated membership index for filesystems without hard links
/// 面向无硬链接文件系统的模拟成员索引
#[derive(Default)]
pub struct EmuMembers {
  set: Mutex<HashSet<(CollId, ObjId)>>,
}

impl MemberStore for EmuMembers {
  fn add(&self, dst: CollId, _src: CollId, oid: ObjId) -> io::Result<()> {
    self.set.lock().insert((dst, oid));
    Ok(())
  }

  fn remove(&self, cid: CollId, oid: ObjId) -> io::Result<()> {
    self.set.lock().remove(&(cid, oid));
    Ok(())
  }

  fn exists(&self, cid: CollId, oid: ObjId) -> bool {
    self.set.lock().contains(&(cid, oid))
  }
}
