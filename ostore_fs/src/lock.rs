//! Store directory lock 存储目录锁
//!
//! One exclusive lock per store dir keeps a second process from
//! mounting the same store.
//! 每个存储目录一个排他锁，防止第二个进程挂载同一存储。

use std::{fs, io, path::Path};

use fs4::fs_std::FileExt;

const LOCK_FILE: &str = ".lock";

/// Held for the lifetime of a mounted store; unlocks on drop
/// 在存储挂载期间持有，drop 时解锁
pub struct StoreLock {
  _file: fs::File,
}

impl StoreLock {
  /// Try to take the exclusive lock, fail fast if already held
  /// 尝试获取排他锁，已被持有则快速失败
  pub fn acquire(dir: &Path) -> io::Result<Self> {
    fs::create_dir_all(dir)?;
    let file = fs::OpenOptions::new()
      .write(true)
      .create(true)
      .truncate(false)
      .open(dir.join(LOCK_FILE))?;
    file.try_lock_exclusive()?;
    Ok(Self { _file: file })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_exclusive() {
    let dir = tempfile::tempdir().unwrap();
    let a = StoreLock::acquire(dir.path()).unwrap();
    assert!(StoreLock::acquire(dir.path()).is_err());
    drop(a);
    StoreLock::acquire(dir.path()).unwrap();
  }
}
