//! セッションとセッションストレージ
//!
//! - [`Session`]: リクエスト中に読み書きするキー/値の入れ物（フラッシュ値つき）
//! - [`SessionStorage`]: Cookieヘッダーからセッションを取り出し、Set-Cookieを返す契約
//! - [`SessionIdStorageStrategy`]: Cookieに載せたIDでデータを外部に保存するバックエンド

pub mod file;
pub mod id;
pub mod kv;
pub mod memory;
pub mod storage;
pub mod warning;

use serde_json::{Map, Value};

pub use file::{create_file_session_storage, FileSessionStorage, FileStrategy};
pub use id::{random_session_id, IdGenerator};
pub use kv::{create_kv_session_storage, KvNamespace, KvSessionStorage, KvStrategy};
pub use memory::{create_memory_session_storage, MemorySessionStorage, MemoryStrategy};
pub use storage::{
    create_cookie_session_storage, create_session_storage, CookieSessionStorage, IdSessionStorage,
    SessionCookie, SessionIdStorageStrategy, SessionStorage, DEFAULT_SESSION_COOKIE_NAME, MAX_COOKIE_SIZE,
};
pub use warning::{LogWarnings, SilentWarnings, WarningSink};

/// セッションデータ（バックエンドやCookieに保存される単位）
pub type SessionData = Map<String, Value>;

/// フラッシュ値を保持するキーの接頭辞
const FLASH_PREFIX: &str = "__flash_";

fn flash_key(name: &str) -> String {
    format!("{}{}", FLASH_PREFIX, name)
}

/// セッション
///
/// フラッシュ値は `get` で一度読むと消える。`has` では消えない。
/// 未読のフラッシュ値は `data()` に `__flash_<name>` のキーで含まれるため、
/// コミットすると次のリクエストに引き継がれる。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Session {
    id: String,
    map: SessionData,
}

impl Session {
    /// 初期データとIDからセッションを作成（IDが空なら未保存）
    pub fn new(initial_data: SessionData, id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            map: initial_data,
        }
    }

    /// セッションID
    pub fn id(&self) -> &str {
        &self.id
    }

    /// 現在のデータのスナップショット
    pub fn data(&self) -> SessionData {
        self.map.clone()
    }

    /// 通常値またはフラッシュ値が存在するか
    pub fn has(&self, name: &str) -> bool {
        self.map.contains_key(name) || self.map.contains_key(&flash_key(name))
    }

    /// 値を取得（フラッシュ値は取得と同時に削除される）
    pub fn get(&mut self, name: &str) -> Option<Value> {
        if let Some(value) = self.map.get(name) {
            return Some(value.clone());
        }
        self.map.remove(&flash_key(name))
    }

    /// 値を設定
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.map.insert(name.into(), value.into());
    }

    /// 一度だけ読めるフラッシュ値を設定
    pub fn flash(&mut self, name: &str, value: impl Into<Value>) {
        self.map.insert(flash_key(name), value.into());
    }

    /// 値を削除
    pub fn unset(&mut self, name: &str) {
        self.map.remove(name);
    }
}
