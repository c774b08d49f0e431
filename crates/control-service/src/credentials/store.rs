//! 凭据存储
//!
//! 用户名/密码经 AES-256-GCM 加密后存储，明文只在 [`reveal`] 调用中
//! 短暂出现。凭据按单调递增的创建序号排序，多凭据命中同一目标时
//! 取序号最小者，保证选择结果确定。
//!
//! [`reveal`]: CredentialStore::reveal

use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{info, instrument, warn};

use crate::models::{Credential, CredentialEvent, PlainCredential};
use flightwatch_shared::crypto::CredentialEncryptor;
use flightwatch_shared::error::{ControlPlaneError, Result};
use flightwatch_shared::events::{EventBus, LifecycleCategory};

/// 凭据存储
pub struct CredentialStore {
    /// 创建序号 -> 凭据，BTreeMap 保证遍历按序号升序
    entries: RwLock<BTreeMap<u64, Credential>>,
    next_id: AtomicU64,
    encryptor: CredentialEncryptor,
    bus: Arc<EventBus<CredentialEvent>>,
}

impl CredentialStore {
    pub fn new(encryptor: CredentialEncryptor, bus: Arc<EventBus<CredentialEvent>>) -> Self {
        Self {
            entries: RwLock::new(BTreeMap::new()),
            next_id: AtomicU64::new(1),
            encryptor,
            bus,
        }
    }

    /// 添加凭据
    ///
    /// 匹配表达式先编译校验，用户名/密码加密后入库；成功后发布
    /// Created 事件。
    #[instrument(skip_all, fields(match_expression = %match_expression))]
    pub fn add(&self, username: &str, password: &str, match_expression: &str) -> Result<u64> {
        match_engine::compile(match_expression)
            .map_err(|e| ControlPlaneError::Validation(format!("匹配表达式不合法: {e}")))?;

        let credential = Credential {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            match_expression: match_expression.to_string(),
            username_enc: self.encryptor.encrypt(username)?,
            password_enc: self.encryptor.encrypt(password)?,
            created_at: chrono::Utc::now(),
        };
        let id = credential.id;
        self.entries.write().insert(id, credential);

        info!(credential_id = id, "凭据已添加");
        self.bus.publish(&CredentialEvent {
            category: LifecycleCategory::Created,
            credential_id: id,
            match_expression: match_expression.to_string(),
        });
        Ok(id)
    }

    /// 删除凭据
    ///
    /// 返回前发布 Deleted 事件，订阅方清除所有解析到该凭据的缓存条目。
    #[instrument(skip(self))]
    pub fn delete(&self, id: u64) -> Result<()> {
        let removed = self.entries.write().remove(&id);
        let Some(credential) = removed else {
            warn!("删除不存在的凭据");
            return Err(ControlPlaneError::not_found("credential", id.to_string()));
        };

        info!("凭据已删除");
        self.bus.publish(&CredentialEvent {
            category: LifecycleCategory::Deleted,
            credential_id: id,
            match_expression: credential.match_expression,
        });
        Ok(())
    }

    pub fn get(&self, id: u64) -> Option<Credential> {
        self.entries.read().get(&id).cloned()
    }

    /// 按创建序号升序列出全部凭据
    pub fn list(&self) -> Vec<Credential> {
        self.entries.read().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// 解密凭据，仅在建立目标连接时调用
    pub fn reveal(&self, credential: &Credential) -> Result<PlainCredential> {
        Ok(PlainCredential {
            username: self.encryptor.decrypt(&credential.username_enc)?,
            password: self.encryptor.decrypt(&credential.password_enc)?,
        })
    }
}
