//! 凭据存储与凭据-目标缓存

mod cache;
mod store;

pub use cache::CredentialTargetCache;
pub use store::CredentialStore;

pub use crate::models::PlainCredential;
