//! キーバリューストアのセッションバックエンド
//!
//! 値はセッションデータのJSON文字列。期限はUNIX秒でストア側のTTLに渡す。

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::debug;

use crate::error::Error;

use super::id::{default_id_generator, IdGenerator};
use super::storage::{IdSessionStorage, SessionCookie, SessionIdStorageStrategy};
use super::SessionData;

/// 外部キーバリューストアのクライアント
///
/// 実装側のエラーは `Error::ExternalServiceError` で返すこと。
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait KvNamespace: Send + Sync {
    /// キーの値を取得
    async fn get(&self, key: &str) -> Result<Option<String>, Error>;

    /// 値を保存（`expiration` はUNIX秒の失効時刻）
    async fn put(&self, key: &str, value: String, expiration: Option<i64>) -> Result<(), Error>;

    /// キーを削除
    async fn delete(&self, key: &str) -> Result<(), Error>;
}

/// 失効時刻をUNIX秒に丸める（0.5秒は切り上げ）
fn expiration_seconds(expires: Option<DateTime<Utc>>) -> Option<i64> {
    expires.map(|e| (e.timestamp_millis() + 500).div_euclid(1000))
}

/// KVストアに保存するバックエンド
pub struct KvStrategy<K> {
    kv: K,
    generate_id: IdGenerator,
}

impl<K: KvNamespace> KvStrategy<K> {
    pub fn new(kv: K) -> Self {
        Self {
            kv,
            generate_id: default_id_generator(),
        }
    }

    /// ID生成関数を差し替える
    pub fn with_id_generator(mut self, generate_id: IdGenerator) -> Self {
        self.generate_id = generate_id;
        self
    }

    /// KVクライアント
    pub fn kv(&self) -> &K {
        &self.kv
    }
}

#[async_trait]
impl<K: KvNamespace> SessionIdStorageStrategy for KvStrategy<K> {
    async fn create_data(&self, data: &SessionData, expires: Option<DateTime<Utc>>) -> Result<String, Error> {
        let value = serde_json::to_string(data)?;
        loop {
            let id = (self.generate_id)();
            if self.kv.get(&id).await?.is_some() {
                debug!("Session id {} already in use, retrying", id);
                continue;
            }
            self.kv.put(&id, value, expiration_seconds(expires)).await?;
            return Ok(id);
        }
    }

    async fn read_data(&self, id: &str) -> Result<Option<SessionData>, Error> {
        match self.kv.get(id).await? {
            Some(value) => Ok(Some(serde_json::from_str(&value)?)),
            None => Ok(None),
        }
    }

    async fn update_data(&self, id: &str, data: &SessionData, expires: Option<DateTime<Utc>>) -> Result<(), Error> {
        let value = serde_json::to_string(data)?;
        self.kv.put(id, value, expiration_seconds(expires)).await
    }

    async fn delete_data(&self, id: &str) -> Result<(), Error> {
        // 未保存のセッションには削除するキーがない
        if id.is_empty() {
            return Ok(());
        }
        self.kv.delete(id).await
    }
}

/// KVバックエンドのセッションストレージ
pub type KvSessionStorage<K> = IdSessionStorage<KvStrategy<K>>;

/// KVバックエンドのセッションストレージを作成
pub fn create_kv_session_storage<K: KvNamespace>(
    cookie: impl Into<SessionCookie>,
    kv: K,
) -> Result<KvSessionStorage<K>, Error> {
    Ok(IdSessionStorage::new(cookie.into().into_cookie()?, KvStrategy::new(kv)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cookie::CookieOptions;
    use crate::session::{Session, SessionStorage};
    use mockall::predicate::eq;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn fixed_ids(ids: &'static [&'static str]) -> IdGenerator {
        let next = Arc::new(AtomicUsize::new(0));
        Arc::new(move || ids[next.fetch_add(1, Ordering::SeqCst) % ids.len()].to_string())
    }

    #[test]
    fn test_expiration_seconds_rounds() {
        let at = |ms: i64| DateTime::<Utc>::from_timestamp_millis(ms);
        assert_eq!(expiration_seconds(None), None);
        assert_eq!(expiration_seconds(at(1_000_499)), Some(1000));
        assert_eq!(expiration_seconds(at(1_000_500)), Some(1001));
        assert_eq!(expiration_seconds(at(1_000_000)), Some(1000));
    }

    #[tokio::test]
    async fn test_create_retries_on_collision() {
        let mut kv = MockKvNamespace::new();
        kv.expect_get()
            .with(eq("taken"))
            .times(1)
            .returning(|_| Ok(Some("{}".to_string())));
        kv.expect_get()
            .with(eq("fresh"))
            .times(1)
            .returning(|_| Ok(None));
        kv.expect_put()
            .withf(|key, value, expiration| key == "fresh" && value == r#"{"a":1}"# && expiration.is_none())
            .times(1)
            .returning(|_, _, _| Ok(()));

        let strategy = KvStrategy::new(kv).with_id_generator(fixed_ids(&["taken", "fresh"]));
        let data = json!({"a": 1}).as_object().cloned().unwrap();
        assert_eq!(strategy.create_data(&data, None).await.unwrap(), "fresh");
    }

    #[tokio::test]
    async fn test_update_passes_ttl() {
        let mut kv = MockKvNamespace::new();
        kv.expect_put()
            .withf(|key, _, expiration| key == "abc" && *expiration == Some(2_000_000_000))
            .times(1)
            .returning(|_, _, _| Ok(()));

        let strategy = KvStrategy::new(kv);
        let expires = DateTime::<Utc>::from_timestamp(2_000_000_000, 0);
        strategy.update_data("abc", &SessionData::new(), expires).await.unwrap();
    }

    #[tokio::test]
    async fn test_read_parses_json() {
        let mut kv = MockKvNamespace::new();
        kv.expect_get()
            .with(eq("abc"))
            .returning(|_| Ok(Some(r#"{"user":"alice"}"#.to_string())));
        kv.expect_get().with(eq("missing")).returning(|_| Ok(None));

        let strategy = KvStrategy::new(kv);
        let data = strategy.read_data("abc").await.unwrap().unwrap();
        assert_eq!(data.get("user"), Some(&json!("alice")));
        assert_eq!(strategy.read_data("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_store_errors_propagate() {
        let mut kv = MockKvNamespace::new();
        kv.expect_delete()
            .returning(|_| Err(Error::ExternalServiceError("kv unavailable".to_string())));

        let strategy = KvStrategy::new(kv);
        let err = strategy.delete_data("abc").await.unwrap_err();
        assert_eq!(err.status_code(), 502);
    }

    #[tokio::test]
    async fn test_destroy_unsaved_session_skips_store() {
        let mut kv = MockKvNamespace::new();
        kv.expect_delete().times(0);

        let storage = create_kv_session_storage(CookieOptions::new().with_secrets(["s3cr3t"]), kv).unwrap();
        let expired = storage.destroy_session(&Session::default(), None).await.unwrap();
        assert!(expired.starts_with("__sessionid=;"));
        assert!(expired.contains("Max-Age=0"));
    }

    #[tokio::test]
    async fn test_storage_commit_and_destroy() {
        let mut kv = MockKvNamespace::new();
        kv.expect_get().returning(|_| Ok(None));
        kv.expect_put().times(1).returning(|_, _, _| Ok(()));
        kv.expect_delete().times(1).returning(|_| Ok(()));

        let storage = create_kv_session_storage(CookieOptions::new().with_secrets(["s3cr3t"]), kv).unwrap();
        let mut session = Session::default();
        session.set("a", 1);

        let set_cookie = storage.commit_session(&session, None).await.unwrap();
        assert!(set_cookie.starts_with("__sessionid="));

        let destroyed = storage.destroy_session(&Session::new(SessionData::new(), "abc"), None).await.unwrap();
        assert!(destroyed.contains("Max-Age=0"));
    }
}
