//! Background writeback hints / 后台回写提示
//!
//! Bounded queue of (fd, off, len) hints from recently applied writes.
//! A dedicated thread asks the OS to begin writeback without waiting,
//! smoothing the I/O burst that would otherwise land at checkpoint time.
//! Purely advisory: overflow drops the hint, a writer is never blocked.
//! 近期写入的（fd, off, len）提示有界队列。专用线程请求操作系统开始回写而不等待，
//! 平滑原本集中在检查点的 I/O 突发。纯建议性：溢出丢弃提示，绝不阻塞写入方。

#![cfg_attr(docsrs, feature(doc_cfg))]

use std::{
  os::fd::{AsRawFd, OwnedFd},
  sync::mpsc::{self, SyncSender, TrySendError},
  thread::JoinHandle,
};

use log::warn;

/// Default hint queue capacity / 默认提示队列容量
pub const DEFAULT_CAP: usize = 512;

/// One writeback hint; the flusher owns and closes the fd
/// 一条回写提示；flusher 持有并负责关闭 fd
pub struct Hint {
  pub fd: OwnedFd,
  pub off: u64,
  pub len: u64,
}

enum Msg {
  Hint(Hint),
  Stop,
}

/// Flusher handle; joins the thread on drop
/// Flusher 句柄；drop 时 join 线程
pub struct Flusher {
  tx: SyncSender<Msg>,
  handle: Option<JoinHandle<()>>,
}

fn flusher_loop(rx: mpsc::Receiver<Msg>) {
  while let Ok(msg) = rx.recv() {
    match msg {
      Msg::Hint(h) => {
        if let Err(e) = ostore_fs::os::writeback_begin(h.fd.as_raw_fd(), h.off, h.len) {
          // Advisory only, keep going
          // 仅建议性，继续
          warn!("writeback hint failed: {e}");
        }
        // fd closed here / fd 在此关闭
      }
      Msg::Stop => break,
    }
  }
}

impl Flusher {
  pub fn new(cap: usize) -> Self {
    let cap = if cap == 0 { DEFAULT_CAP } else { cap };
    let (tx, rx) = mpsc::sync_channel(cap);
    let handle = std::thread::spawn(move || flusher_loop(rx));
    Self {
      tx,
      handle: Some(handle),
    }
  }

  /// Queue a hint; returns false (and closes the fd) when full or stopped
  /// 入队提示；队列满或已停止时返回 false（并关闭 fd）
  pub fn hint(&self, fd: OwnedFd, off: u64, len: u64) -> bool {
    match self.tx.try_send(Msg::Hint(Hint { fd, off, len })) {
      Ok(()) => true,
      Err(TrySendError::Full(_)) | Err(TrySendError::Disconnected(_)) => false,
    }
  }

  /// Drain queued hints and stop the thread
  /// 排空已入队提示并停止线程
  pub fn shutdown(&mut self) {
    let _ = self.tx.send(Msg::Stop);
    if let Some(h) = self.handle.take() {
      let _ = h.join();
    }
  }
}

impl Drop for Flusher {
  fn drop(&mut self) {
    self.shutdown();
  }
}

#[cfg(test)]
mod tests {
  use std::io::Write;

  use super::*;

  #[static_init::constructor(0)]
  extern "C" fn _log_init() {
    log_init::init();
  }

  #[test]
  fn test_hint_and_shutdown() {
    let dir = tempfile::tempdir().unwrap();
    let mut flusher = Flusher::new(8);

    for i in 0..4u64 {
      let mut f = std::fs::File::create(dir.path().join(format!("f{i}"))).unwrap();
      f.write_all(b"data").unwrap();
      assert!(flusher.hint(f.into(), 0, 4));
    }

    flusher.shutdown();

    // Stopped flusher drops hints
    // 已停止的 flusher 丢弃提示
    let f = std::fs::File::create(dir.path().join("late")).unwrap();
    assert!(!flusher.hint(f.into(), 0, 0));
  }
}
