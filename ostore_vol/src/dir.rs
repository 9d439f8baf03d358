//! Directory-backed volume / 目录卷
//!
//! Objects live under the fan-out layout from `ostore_path`. Attribute
//! and membership capabilities are probed once at open: native xattr /
//! hard links when the filesystem supports them, emulated stores when not.
//! 对象存放于 `ostore_path` 的扇出布局。属性与成员能力在打开时探测一次：
//! 文件系统支持则用原生 xattr / 硬链接，否则用模拟存储。

use std::{
  fs,
  io,
  os::unix::fs::FileExt,
  path::{Path, PathBuf},
};

use log::info;
use ostore_comm::{CollId, ObjId, PrimitiveOp};
use ostore_flush::Flusher;

use crate::{AttrStore, EmuAttrs, EmuMembers, MemberStore, Result, VolError, Volume};

#[inline]
fn absent(e: &io::Error) -> bool {
  e.kind() == io::ErrorKind::NotFound
}

pub struct DirVolume {
  base: PathBuf,
  base_dir: fs::File,
  attrs: Box<dyn AttrStore>,
  members: Box<dyn MemberStore>,
  flusher: Option<Flusher>,
}

impl DirVolume {
  pub fn open(base: impl Into<PathBuf>) -> io::Result<Self> {
    let base = base.into();
    fs::create_dir_all(&base)?;
    let base_dir = fs::File::open(&base)?;

    let attrs: Box<dyn AttrStore> = if xattr_probe(&base) {
      info!("native xattr store");
      Box::new(NativeAttrs::new(&base))
    } else {
      info!("emulated attr store");
      Box::new(EmuAttrs::default())
    };

    let members: Box<dyn MemberStore> = if link_probe(&base)? {
      info!("hard-link member store");
      Box::new(DirMembers::new(&base))
    } else {
      info!("emulated member store");
      Box::new(EmuMembers::default())
    };

    Ok(Self {
      base,
      base_dir,
      attrs,
      members,
      flusher: None,
    })
  }

  /// Enable background writeback hints
  /// 启用后台回写提示
  pub fn with_flusher(mut self, cap: usize) -> Self {
    self.flusher = Some(Flusher::new(cap));
    self
  }

  fn obj_path(&self, cid: CollId, oid: ObjId) -> Result<PathBuf> {
    if !ostore_path::coll_dir(&self.base, cid).is_dir() {
      return Err(VolError::NoColl(cid));
    }
    Ok(ostore_path::format(&self.base, cid, oid))
  }

  fn open_write(&self, cid: CollId, oid: ObjId) -> Result<fs::File> {
    let path = self.obj_path(cid, oid)?;
    if let Some(parent) = path.parent() {
      fs::create_dir_all(parent)?;
    }
    Ok(
      fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)?,
    )
  }

  fn write(&self, cid: CollId, oid: ObjId, off: u64, data: &[u8]) -> Result<()> {
    if off.checked_add(data.len() as u64).is_none() {
      return Err(VolError::BadRange {
        off,
        len: data.len() as u64,
      });
    }
    let file = self.open_write(cid, oid)?;
    file.write_all_at(data, off)?;
    if let Some(flusher) = &self.flusher {
      flusher.hint(file.into(), off, data.len() as u64);
    }
    Ok(())
  }

  /// Zero a range in bounded chunks, never one len-sized buffer
  /// 分块清零范围，不分配 len 大小的缓冲
  fn zero(&self, cid: CollId, oid: ObjId, off: u64, len: u64) -> Result<()> {
    const CHUNK: u64 = 1 << 20;
    let end = off
      .checked_add(len)
      .ok_or(VolError::BadRange { off, len })?;
    let file = self.open_write(cid, oid)?;
    let buf = vec![0u8; len.min(CHUNK) as usize];
    let mut pos = off;
    while pos < end {
      let n = (end - pos).min(CHUNK) as usize;
      file.write_all_at(&buf[..n], pos)?;
      pos += n as u64;
    }
    Ok(())
  }
}

impl Volume for DirVolume {
  fn apply(&self, op: &PrimitiveOp) -> Result<()> {
    match op {
      PrimitiveOp::Touch { cid, oid } => {
        self.open_write(*cid, *oid)?;
      }
      PrimitiveOp::Write {
        cid,
        oid,
        off,
        data,
      } => {
        self.write(*cid, *oid, *off, data)?;
      }
      PrimitiveOp::Zero { cid, oid, off, len } => {
        self.zero(*cid, *oid, *off, *len)?;
      }
      PrimitiveOp::Truncate { cid, oid, size } => {
        let path = self.obj_path(*cid, *oid)?;
        let file = fs::OpenOptions::new()
          .write(true)
          .open(path)
          .map_err(|e| {
            if absent(&e) {
              VolError::NoObject(*cid, *oid)
            } else {
              e.into()
            }
          })?;
        file.set_len(*size)?;
      }
      PrimitiveOp::Clone { cid, src, dst } => {
        let from = self.obj_path(*cid, *src)?;
        let to = self.obj_path(*cid, *dst)?;
        if let Some(parent) = to.parent() {
          fs::create_dir_all(parent)?;
        }
        fs::copy(&from, &to).map_err(|e| {
          if absent(&e) {
            VolError::NoObject(*cid, *src)
          } else {
            e.into()
          }
        })?;
      }
      PrimitiveOp::CloneRange {
        cid,
        src,
        dst,
        off,
        len,
      } => {
        let chunk = self.read(*cid, *src, *off, *len)?;
        self.write(*cid, *dst, *off, &chunk)?;
      }
      PrimitiveOp::Remove { cid, oid } => {
        let path = ostore_path::format(&self.base, *cid, *oid);
        match fs::remove_file(path) {
          Ok(()) => {}
          // Absent object tolerated 容忍不存在的对象
          Err(e) if absent(&e) => {}
          Err(e) => return Err(e.into()),
        }
      }
      PrimitiveOp::SetAttr {
        cid,
        oid,
        name,
        value,
      } => {
        if !self.exists(*cid, *oid) {
          return Err(VolError::NoObject(*cid, *oid));
        }
        self.attrs.set(*cid, *oid, name, value)?;
      }
      PrimitiveOp::RmAttr { cid, oid, name } => {
        self.attrs.remove(*cid, *oid, name)?;
      }
      PrimitiveOp::MkColl { cid } => {
        fs::create_dir_all(ostore_path::coll_dir(&self.base, *cid))?;
      }
      PrimitiveOp::RmColl { cid } => {
        let dir = ostore_path::coll_dir(&self.base, *cid);
        if !dir.is_dir() {
          return Ok(());
        }
        if !dir_empty(&dir)? {
          return Err(VolError::NotEmpty(*cid));
        }
        fs::remove_dir_all(dir)?;
      }
      PrimitiveOp::CollAdd { dst, src, oid } => {
        self.members.add(*dst, *src, *oid).map_err(|e| {
          if absent(&e) {
            VolError::NoObject(*src, *oid)
          } else {
            e.into()
          }
        })?;
      }
      PrimitiveOp::CollRemove { cid, oid } => {
        self.members.remove(*cid, *oid)?;
      }
    }
    Ok(())
  }

  fn sync(&self) -> Result<()> {
    use std::os::fd::AsRawFd;
    ostore_fs::os::sync_fs(self.base_dir.as_raw_fd())?;
    Ok(())
  }

  fn read(&self, cid: CollId, oid: ObjId, off: u64, len: u64) -> Result<Vec<u8>> {
    let path = ostore_path::format(&self.base, cid, oid);
    let file = fs::File::open(path).map_err(|e| {
      if absent(&e) {
        VolError::NoObject(cid, oid)
      } else {
        VolError::Io(e)
      }
    })?;
    let size = file.metadata()?.len();
    let start = off.min(size);
    let end = off.saturating_add(len).min(size);
    let mut buf = vec![0; (end - start) as usize];
    file.read_exact_at(&mut buf, start)?;
    Ok(buf)
  }

  fn exists(&self, cid: CollId, oid: ObjId) -> bool {
    ostore_path::format(&self.base, cid, oid).is_file() || self.members.exists(cid, oid)
  }

  fn getattr(&self, cid: CollId, oid: ObjId, name: &str) -> Result<Option<Vec<u8>>> {
    Ok(self.attrs.get(cid, oid, name)?)
  }
}

/// True when no object file exists under the fan-out dirs
/// 扇出目录下无对象文件时为真
fn dir_empty(dir: &Path) -> io::Result<bool> {
  for d1 in fs::read_dir(dir)? {
    for d2 in fs::read_dir(d1?.path())? {
      if fs::read_dir(d2?.path())?.next().is_some() {
        return Ok(false);
      }
    }
  }
  Ok(true)
}

/// Hard-link backed membership / 硬链接成员存储
pub struct DirMembers {
  base: PathBuf,
}

impl DirMembers {
  pub fn new(base: impl Into<PathBuf>) -> Self {
    Self { base: base.into() }
  }
}

impl MemberStore for DirMembers {
  fn add(&self, dst: CollId, src: CollId, oid: ObjId) -> io::Result<()> {
    let from = ostore_path::format(&self.base, src, oid);
    let to = ostore_path::format(&self.base, dst, oid);
    if let Some(parent) = to.parent() {
      fs::create_dir_all(parent)?;
    }
    match fs::hard_link(from, to) {
      Ok(()) => Ok(()),
      // Replay idempotency 回放幂等
      Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Ok(()),
      Err(e) => Err(e),
    }
  }

  fn remove(&self, cid: CollId, oid: ObjId) -> io::Result<()> {
    match fs::remove_file(ostore_path::format(&self.base, cid, oid)) {
      Ok(()) => Ok(()),
      Err(e) if absent(&e) => Ok(()),
      Err(e) => Err(e),
    }
  }

  fn exists(&self, cid: CollId, oid: ObjId) -> bool {
    ostore_path::format(&self.base, cid, oid).is_file()
  }
}

/// Probe hard-link support once at open
/// 打开时探测一次硬链接支持
fn link_probe(base: &Path) -> io::Result<bool> {
  let a = base.join(".probe_a");
  let b = base.join(".probe_b");
  fs::File::create(&a)?;
  let ok = fs::hard_link(&a, &b).is_ok();
  let _ = fs::remove_file(&a);
  let _ = fs::remove_file(&b);
  Ok(ok)
}

/// Native xattr store (Linux) / 原生 xattr 存储（Linux）
pub struct NativeAttrs {
  base: PathBuf,
}

impl NativeAttrs {
  pub fn new(base: impl Into<PathBuf>) -> Self {
    Self { base: base.into() }
  }

  fn path(&self, cid: CollId, oid: ObjId) -> PathBuf {
    ostore_path::format(&self.base, cid, oid)
  }
}

#[cfg(target_os = "linux")]
mod xattr {
  use std::{ffi::CString, io, os::unix::ffi::OsStrExt, path::Path};

  fn cpath(path: &Path) -> io::Result<CString> {
    CString::new(path.as_os_str().as_bytes()).map_err(io::Error::other)
  }

  fn cname(name: &str) -> io::Result<CString> {
    CString::new(format!("user.{name}")).map_err(io::Error::other)
  }

  fn no_attr(e: &io::Error) -> bool {
    matches!(
      e.raw_os_error(),
      Some(libc::ENODATA) | Some(libc::ENOENT)
    )
  }

  pub fn get(path: &Path, name: &str) -> io::Result<Option<Vec<u8>>> {
    let p = cpath(path)?;
    let n = cname(name)?;
    let size = unsafe { libc::getxattr(p.as_ptr(), n.as_ptr(), std::ptr::null_mut(), 0) };
    if size < 0 {
      let e = io::Error::last_os_error();
      return if no_attr(&e) { Ok(None) } else { Err(e) };
    }

    let mut buf = vec![0u8; size as usize];
    let got = unsafe {
      libc::getxattr(
        p.as_ptr(),
        n.as_ptr(),
        buf.as_mut_ptr() as *mut libc::c_void,
        buf.len(),
      )
    };
    if got < 0 {
      let e = io::Error::last_os_error();
      return if no_attr(&e) { Ok(None) } else { Err(e) };
    }
    buf.truncate(got as usize);
    Ok(Some(buf))
  }

  pub fn set(path: &Path, name: &str, value: &[u8]) -> io::Result<()> {
    let p = cpath(path)?;
    let n = cname(name)?;
    let r = unsafe {
      libc::setxattr(
        p.as_ptr(),
        n.as_ptr(),
        value.as_ptr() as *const libc::c_void,
        value.len(),
        0,
      )
    };
    if r < 0 {
      return Err(io::Error::last_os_error());
    }
    Ok(())
  }

  pub fn remove(path: &Path, name: &str) -> io::Result<()> {
    let p = cpath(path)?;
    let n = cname(name)?;
    if unsafe { libc::removexattr(p.as_ptr(), n.as_ptr()) } < 0 {
      let e = io::Error::last_os_error();
      // Absent attribute tolerated 容忍不存在的属性
      if !no_attr(&e) {
        return Err(e);
      }
    }
    Ok(())
  }

  pub fn probe(dir: &Path) -> bool {
    set(dir, "ostore_probe", b"1").is_ok() && remove(dir, "ostore_probe").is_ok()
  }
}

#[cfg(target_os = "linux")]
impl crate::AttrStore for NativeAttrs {
  fn get(&self, cid: CollId, oid: ObjId, name: &str) -> io::Result<Option<Vec<u8>>> {
    xattr::get(&self.path(cid, oid), name)
  }

  fn set(&self, cid: CollId, oid: ObjId, name: &str, value: &[u8]) -> io::Result<()> {
    xattr::set(&self.path(cid, oid), name, value)
  }

  fn remove(&self, cid: CollId, oid: ObjId, name: &str) -> io::Result<()> {
    xattr::remove(&self.path(cid, oid), name)
  }
}

#[cfg(not(target_os = "linux"))]
impl crate::AttrStore for NativeAttrs {
  fn get(&self, _cid: CollId, _oid: ObjId, _name: &str) -> io::Result<Option<Vec<u8>>> {
    Err(io::Error::from(io::ErrorKind::Unsupported))
  }

  fn set(&self, _cid: CollId, _oid: ObjId, _name: &str, _value: &[u8]) -> io::Result<()> {
    Err(io::Error::from(io::ErrorKind::Unsupported))
  }

  fn remove(&self, _cid: CollId, _oid: ObjId, _name: &str) -> io::Result<()> {
    Err(io::Error::from(io::ErrorKind::Unsupported))
  }
}

#[cfg(target_os = "linux")]
fn xattr_probe(dir: &Path) -> bool {
  xattr::probe(dir)
}

#[cfg(not(target_os = "linux"))]
fn xattr_probe(_dir: &Path) -> bool {
  false
}
