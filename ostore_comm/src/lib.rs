#![cfg_attr(docsrs, feature(doc_cfg))]

mod config;
mod error;
mod types;
mod txn;

pub use config::StoreConfig;
pub use error::{StoreError, StoreResult};
pub use types::{CollId, ObjId, OpSeq, Timestamp};
pub use txn::{PrimitiveOp, Transaction, decode_batch, encode_batch};
