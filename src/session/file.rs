//! ファイルシステムのセッションバックエンド
//!
//! 1セッション1ファイル。IDの先頭4文字をディレクトリ名、残りをファイル名にする
//! （`dir/0123/456789abcdef`）。ファイルの中身は `{"data": {...}, "expires": "<RFC 3339>"}`。

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::error::Error;

use super::id::{default_id_generator, is_random_session_id, random_session_id, IdGenerator};
use super::storage::{IdSessionStorage, SessionCookie, SessionIdStorageStrategy};
use super::SessionData;

/// ファイルに保存するレコード
#[derive(Debug, Serialize, Deserialize)]
struct StoredRecord {
    #[serde(default)]
    data: SessionData,
    /// 文字列以外（null・欠落）は期限なし
    #[serde(default)]
    expires: Option<Value>,
}

impl StoredRecord {
    fn new(data: &SessionData, expires: Option<DateTime<Utc>>) -> Self {
        Self {
            data: data.clone(),
            expires: expires.map(|e| Value::String(e.to_rfc3339_opts(SecondsFormat::Millis, true))),
        }
    }

    fn expires_at(&self) -> Option<DateTime<Utc>> {
        match &self.expires {
            Some(Value::String(s)) => match DateTime::parse_from_rfc3339(s) {
                Ok(dt) => Some(dt.with_timezone(&Utc)),
                Err(e) => {
                    warn!("Ignoring unparsable session expiry {:?}: {}", s, e);
                    None
                }
            },
            _ => None,
        }
    }
}

/// ディレクトリ配下にセッションを保存するバックエンド
#[derive(Clone)]
pub struct FileStrategy {
    dir: PathBuf,
    generate_id: IdGenerator,
}

impl std::fmt::Debug for FileStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileStrategy").field("dir", &self.dir).finish()
    }
}

impl FileStrategy {
    /// 作成（ディレクトリは最初の書き込み時に作られる）
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            generate_id: default_id_generator(),
        }
    }

    /// ID生成関数を差し替える
    ///
    /// 生成するIDは小文字16進16文字でなければならない。それ以外のIDは読み書きの対象外になる。
    pub fn with_id_generator(mut self, generate_id: IdGenerator) -> Self {
        self.generate_id = generate_id;
        self
    }

    /// 保存先ディレクトリ
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// IDに対応するファイルパス
    fn file_path(&self, id: &str) -> PathBuf {
        self.dir.join(&id[..4]).join(&id[4..])
    }

    async fn ensure_parent(file: &Path) -> Result<(), Error> {
        if let Some(parent) = file.parent() {
            fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    async fn write_contents(handle: &mut fs::File, content: &[u8]) -> Result<(), Error> {
        handle.write_all(content).await?;
        handle.flush().await?;
        Ok(())
    }

    /// 同じディレクトリの一時ファイルに書いてからrenameで置き換える
    ///
    /// 読み込み側は常に書き込み前か書き込み後の完全な内容を見る。
    async fn replace_file(file: &Path, content: &[u8]) -> Result<(), Error> {
        let name = file.file_name().and_then(|n| n.to_str()).unwrap_or_default();
        let tmp = file.with_file_name(format!("{}.{}.tmp", name, random_session_id()));

        let result = match fs::write(&tmp, content).await {
            Ok(()) => fs::rename(&tmp, file).await,
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            let _ = fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        Ok(())
    }
}

#[async_trait]
impl SessionIdStorageStrategy for FileStrategy {
    async fn create_data(&self, data: &SessionData, expires: Option<DateTime<Utc>>) -> Result<String, Error> {
        let content = serde_json::to_vec(&StoredRecord::new(data, expires))?;

        loop {
            let id = (self.generate_id)();
            if !is_random_session_id(&id) {
                return Err(Error::InvalidSessionId(id));
            }
            let file = self.file_path(&id);
            Self::ensure_parent(&file).await?;

            let mut handle = match fs::OpenOptions::new().write(true).create_new(true).open(&file).await {
                Ok(handle) => handle,
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    debug!("Session id {} already in use, retrying", id);
                    continue;
                }
                Err(e) => return Err(e.into()),
            };
            if let Err(e) = Self::write_contents(&mut handle, &content).await {
                // 中身のないファイルを残さない
                drop(handle);
                let _ = fs::remove_file(&file).await;
                return Err(e);
            }
            return Ok(id);
        }
    }

    async fn read_data(&self, id: &str) -> Result<Option<SessionData>, Error> {
        if !is_random_session_id(id) {
            return Ok(None);
        }
        let file = self.file_path(id);
        let content = match fs::read(&file).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let record: StoredRecord = serde_json::from_slice(&content)?;

        match record.expires_at() {
            Some(expires) if expires <= Utc::now() => {
                debug!("Removing expired session file {}", file.display());
                match fs::remove_file(&file).await {
                    Ok(()) => {}
                    Err(e) if e.kind() == ErrorKind::NotFound => {}
                    Err(e) => return Err(e.into()),
                }
                Ok(None)
            }
            _ => Ok(Some(record.data)),
        }
    }

    async fn update_data(&self, id: &str, data: &SessionData, expires: Option<DateTime<Utc>>) -> Result<(), Error> {
        if !is_random_session_id(id) {
            return Err(Error::InvalidSessionId(id.to_string()));
        }
        let content = serde_json::to_vec(&StoredRecord::new(data, expires))?;
        let file = self.file_path(id);
        Self::ensure_parent(&file).await?;
        Self::replace_file(&file, &content).await
    }

    async fn delete_data(&self, id: &str) -> Result<(), Error> {
        // 空のIDでディレクトリを消しにいかない
        if !is_random_session_id(id) {
            return Ok(());
        }
        match fs::remove_file(self.file_path(id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// ファイルバックエンドのセッションストレージ
pub type FileSessionStorage = IdSessionStorage<FileStrategy>;

/// ファイルバックエンドのセッションストレージを作成
pub fn create_file_session_storage(
    cookie: impl Into<SessionCookie>,
    dir: impl Into<PathBuf>,
) -> Result<FileSessionStorage, Error> {
    Ok(IdSessionStorage::new(cookie.into().into_cookie()?, FileStrategy::new(dir)))
}
