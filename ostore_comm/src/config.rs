//! Store configuration 存储配置

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
  /// Data root 数据根目录
  pub data_dir: PathBuf,
  /// Journal directory 日志目录
  pub wal_dir: PathBuf,
  /// Executor worker threads 执行工作线程数
  pub workers: usize,
  /// Max outstanding bytes before admission blocks 准入阻塞前最大未决字节数
  pub throttle_bytes: u64,
  /// Max outstanding primitive ops before admission blocks 准入阻塞前最大未决原语数
  pub throttle_ops: u64,
  /// Checkpoint interval 检查点间隔（秒）
  pub ckp_interval_secs: u64,
  /// Journal segment rotation size 日志段轮转大小
  pub wal_max_size: u64,
}

impl Default for StoreConfig {
  fn default() -> Self {
    Self {
      data_dir: PathBuf::from("/tmp/ostore"),
      wal_dir: PathBuf::from("/tmp/ostore/wal"),
      workers: 2,
      throttle_bytes: 64 << 20,
      throttle_ops: 4096,
      ckp_interval_secs: 5,
      wal_max_size: 64 << 20,
    }
  }
}

impl StoreConfig {
  /// Config rooted at one directory, journal under it
  /// 以单个目录为根的配置，日志位于其下
  pub fn at(dir: impl Into<PathBuf>) -> Self {
    let data_dir = dir.into();
    let wal_dir = data_dir.join("wal");
    Self {
      data_dir,
      wal_dir,
      ..Self::default()
    }
  }
}
