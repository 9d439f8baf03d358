//! Object path mapping / 对象路径映射
//!
//! Base32 encoded layout: base/<coll>/xx/xx/xxxxxxxxx (2+2+9)
//! Base32 编码布局：base/<coll>/xx/xx/xxxxxxxxx（2+2+9）
//!
//! `parse` is the exact inverse of `format` over the full id space.
//! `parse` 在整个 id 空间上是 `format` 的精确逆。
#![cfg_attr(docsrs, feature(doc_cfg))]

use std::path::{Path, PathBuf};

use fast32::base32::CROCKFORD_LOWER;
use ostore_comm::{CollId, ObjId};

// 13 base32 chars cover the full u64 range
// 13 个 base32 字符覆盖完整 u64 范围
const PAD: usize = 13;

#[inline]
fn encode_u64(id: u64) -> String {
  let encoded = CROCKFORD_LOWER.encode_u64(id);
  format!("{encoded:0>13}")
}

fn decode_u64(s: &str) -> Option<u64> {
  if s.is_empty() || !s.bytes().all(|b| b.is_ascii_alphanumeric()) {
    return None;
  }
  let trimmed = s.trim_start_matches('0');
  if trimmed.is_empty() {
    return Some(0);
  }
  CROCKFORD_LOWER.decode_u64(trimmed.as_bytes()).ok()
}

/// Collection directory / 集合目录
#[inline]
pub fn coll_dir(base: &Path, cid: CollId) -> PathBuf {
  base.join(encode_u64(cid.0))
}

/// Encode (collection, object) to path: base/<coll>/xx/xx/rest
/// 编码（集合，对象）为路径
pub fn format(base: &Path, cid: CollId, oid: ObjId) -> PathBuf {
  let padded = encode_u64(oid.0);
  let (d1, rest) = padded.split_at(2);
  let (d2, name) = rest.split_at(2);
  coll_dir(base, cid).join(d1).join(d2).join(name)
}

/// Decode path back to (collection, object) / 解码路径为（集合，对象）
pub fn parse(path: &Path) -> Option<(CollId, ObjId)> {
  let name = path.file_name()?.to_str()?;
  let d2 = path.parent()?.file_name()?.to_str()?;
  let d1 = path.parent()?.parent()?.file_name()?.to_str()?;
  let coll = path.parent()?.parent()?.parent()?.file_name()?.to_str()?;

  if d1.len() != 2 || d2.len() != 2 || name.len() != PAD - 4 {
    return None;
  }

  let oid = decode_u64(&format!("{d1}{d2}{name}"))?;
  let cid = decode_u64(coll)?;
  Some((CollId::new(cid), ObjId::new(oid)))
}
