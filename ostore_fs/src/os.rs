//! Platform specific implementations
//! 平台特定实现

use std::{io, os::fd::RawFd};

/// Ask the kernel to start writeback for a byte range, without waiting
/// 请求内核开始回写字节范围，不等待完成
#[cfg(target_os = "linux")]
pub fn writeback_begin(fd: RawFd, off: u64, len: u64) -> io::Result<()> {
  let r = unsafe {
    libc::sync_file_range(
      fd,
      off as libc::off64_t,
      len as libc::off64_t,
      libc::SYNC_FILE_RANGE_WRITE,
    )
  };
  if r < 0 {
    return Err(io::Error::last_os_error());
  }
  Ok(())
}

#[cfg(not(target_os = "linux"))]
pub fn writeback_begin(_fd: RawFd, _off: u64, _len: u64) -> io::Result<()> {
  Ok(())
}

/// Sync the whole filesystem holding fd
/// 同步 fd 所在的整个文件系统
#[cfg(target_os = "linux")]
pub fn sync_fs(fd: RawFd) -> io::Result<()> {
  if unsafe { libc::syncfs(fd) } < 0 {
    return Err(io::Error::last_os_error());
  }
  Ok(())
}

#[cfg(not(target_os = "linux"))]
pub fn sync_fs(_fd: RawFd) -> io::Result<()> {
  unsafe { libc::sync() };
  Ok(())
}
