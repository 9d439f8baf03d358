//! File helper tests
//! 文件操作工具测试

#[static_init::constructor(0)]
extern "C" fn _log_init() {
  log_init::init();
}

#[compio::test]
async fn test_atomic_write() {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("rec");

  ostore_fs::atomic_write(&path, b"first".to_vec())
    .await
    .unwrap();
  assert_eq!(std::fs::read(&path).unwrap(), b"first");

  // Replace is atomic, no temp file left behind
  // 替换是原子的，不残留临时文件
  ostore_fs::atomic_write(&path, b"second".to_vec())
    .await
    .unwrap();
  assert_eq!(std::fs::read(&path).unwrap(), b"second");
  assert!(!path.with_extension("tmp").exists());
}

#[compio::test]
async fn test_read_all() {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("f");
  std::fs::write(&path, b"0123456789").unwrap();

  let file = ostore_fs::open_read(&path).await.unwrap();
  assert_eq!(ostore_fs::read_all(&file, 10).await.unwrap(), b"0123456789");

  let empty = dir.path().join("empty");
  std::fs::write(&empty, b"").unwrap();
  let file = ostore_fs::open_read(&empty).await.unwrap();
  assert!(ostore_fs::read_all(&file, 0).await.unwrap().is_empty());
}

#[compio::test]
async fn test_write_at() {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("f");

  let mut file = ostore_fs::open_write_create(&path).await.unwrap();
  ostore_fs::write_at(&mut file, b"abc".to_vec(), 2)
    .await
    .unwrap();
  file.sync_all().await.unwrap();
  assert_eq!(std::fs::read(&path).unwrap(), b"\0\0abc");
}
