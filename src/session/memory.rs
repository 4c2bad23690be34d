//! プロセス内メモリのセッションバックエンド
//!
//! プロセスが終了するとデータは失われる。開発・テスト用。

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::debug;
use tokio::sync::Mutex;

use crate::error::Error;

use super::storage::{IdSessionStorage, SessionCookie, SessionIdStorageStrategy};
use super::SessionData;

#[derive(Debug, Clone)]
struct Record {
    data: SessionData,
    expires: Option<DateTime<Utc>>,
}

impl Record {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        matches!(self.expires, Some(expires) if expires <= now)
    }
}

#[derive(Debug, Default)]
struct Inner {
    next_id: AtomicU64,
    records: Mutex<HashMap<String, Record>>,
}

/// メモリ上のマップに保存するバックエンド
///
/// IDは1から始まる連番。cloneしたインスタンスは同じマップを共有する。
#[derive(Debug, Clone, Default)]
pub struct MemoryStrategy {
    inner: Arc<Inner>,
}

impl MemoryStrategy {
    pub fn new() -> Self {
        Self::default()
    }

    /// 保存中のレコード数（期限切れを含む）
    pub async fn len(&self) -> usize {
        self.inner.records.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    fn next_id(&self) -> String {
        (self.inner.next_id.fetch_add(1, Ordering::Relaxed) + 1).to_string()
    }
}

#[async_trait]
impl SessionIdStorageStrategy for MemoryStrategy {
    async fn create_data(&self, data: &SessionData, expires: Option<DateTime<Utc>>) -> Result<String, Error> {
        let mut records = self.inner.records.lock().await;
        loop {
            let id = self.next_id();
            if records.contains_key(&id) {
                continue;
            }
            records.insert(
                id.clone(),
                Record {
                    data: data.clone(),
                    expires,
                },
            );
            return Ok(id);
        }
    }

    async fn read_data(&self, id: &str) -> Result<Option<SessionData>, Error> {
        let mut records = self.inner.records.lock().await;
        let expired = match records.get(id) {
            None => return Ok(None),
            Some(record) => record.is_expired(Utc::now()),
        };
        if expired {
            debug!("Evicting expired in-memory session {}", id);
            records.remove(id);
            return Ok(None);
        }
        Ok(records.get(id).map(|record| record.data.clone()))
    }

    async fn update_data(&self, id: &str, data: &SessionData, expires: Option<DateTime<Utc>>) -> Result<(), Error> {
        self.inner.records.lock().await.insert(
            id.to_string(),
            Record {
                data: data.clone(),
                expires,
            },
        );
        Ok(())
    }

    async fn delete_data(&self, id: &str) -> Result<(), Error> {
        self.inner.records.lock().await.remove(id);
        Ok(())
    }
}

/// メモリバックエンドのセッションストレージ
pub type MemorySessionStorage = IdSessionStorage<MemoryStrategy>;

/// メモリバックエンドのセッションストレージを作成
pub fn create_memory_session_storage(cookie: impl Into<SessionCookie>) -> Result<MemorySessionStorage, Error> {
    Ok(IdSessionStorage::new(cookie.into().into_cookie()?, MemoryStrategy::new()))
}
