//! 環境変数からのセッション設定
//!
//! | 変数 | 内容 | デフォルト |
//! |------|------|-----------|
//! | `SESSION_COOKIE_NAME` | Cookie名 | `__sessionid` |
//! | `SESSION_SECRETS` | 署名用シークレット（カンマ区切り、先頭で署名） | なし |
//! | `SESSION_MAX_AGE` | Max-Age（秒） | なし |
//! | `SESSION_SECURE` | Secure属性 | `false` |
//! | `SESSION_HTTP_ONLY` | HttpOnly属性 | `true` |
//! | `SESSION_SAME_SITE` | `lax` / `strict` / `none` | `lax` |
//! | `SESSION_BACKEND` | `memory` / `file` / `cookie` | `cookie` |
//! | `SESSION_FILE_DIR` | ファイルバックエンドの保存先 | なし（`file` では必須） |

use std::env;
use std::path::PathBuf;

use log::{info, warn};

use crate::common::header::SameSite;
use crate::cookie::{Cookie, CookieOptions};
use crate::error::Error;
use crate::session::{
    CookieSessionStorage, FileStrategy, IdSessionStorage, MemoryStrategy, SessionStorage,
    DEFAULT_SESSION_COOKIE_NAME,
};

/// セッションの保存先
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Memory,
    File,
    Cookie,
}

impl Backend {
    /// 文字列から変換（大文字小文字を区別しない）
    pub fn from_str(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "memory" => Some(Backend::Memory),
            "file" => Some(Backend::File),
            "cookie" => Some(Backend::Cookie),
            _ => None,
        }
    }
}

/// セッション設定
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    pub cookie_name: String,
    pub secrets: Vec<String>,
    pub max_age: Option<i64>,
    pub secure: bool,
    pub http_only: bool,
    pub same_site: SameSite,
    pub backend: Backend,
    pub file_dir: Option<PathBuf>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: DEFAULT_SESSION_COOKIE_NAME.to_string(),
            secrets: Vec::new(),
            max_age: None,
            secure: false,
            http_only: true,
            same_site: SameSite::Lax,
            backend: Backend::Cookie,
            file_dir: None,
        }
    }
}

fn var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_bool(key: &str, default: bool) -> bool {
    match var(key) {
        None => default,
        Some(v) => match v.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" => false,
            _ => {
                warn!("Invalid {} value {:?}, using default {}", key, v, default);
                default
            }
        },
    }
}

impl SessionConfig {
    /// 環境変数から読み込む
    ///
    /// 値の形式が不正な項目は警告を出してデフォルトを使う。
    /// 未知のバックエンド名と、`file` バックエンドで保存先がない場合はエラー。
    pub fn from_env() -> Result<Self, Error> {
        let defaults = Self::default();

        let secrets = var("SESSION_SECRETS")
            .map(|v| {
                v.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let max_age = var("SESSION_MAX_AGE").and_then(|v| match v.trim().parse::<i64>() {
            Ok(seconds) => Some(seconds),
            Err(_) => {
                warn!("Invalid SESSION_MAX_AGE value {:?}, ignoring", v);
                None
            }
        });

        let same_site = match var("SESSION_SAME_SITE") {
            None => defaults.same_site,
            Some(v) => SameSite::from_str(v.trim()).unwrap_or_else(|| {
                warn!("Invalid SESSION_SAME_SITE value {:?}, using Lax", v);
                defaults.same_site
            }),
        };

        let backend = match var("SESSION_BACKEND") {
            None => defaults.backend,
            Some(v) => Backend::from_str(&v).ok_or_else(|| {
                Error::ConfigurationError(format!("Unknown SESSION_BACKEND: {}", v))
            })?,
        };

        let file_dir = var("SESSION_FILE_DIR").map(PathBuf::from);
        if backend == Backend::File && file_dir.is_none() {
            return Err(Error::ConfigurationError(
                "SESSION_FILE_DIR is required for the file backend".to_string(),
            ));
        }

        Ok(Self {
            cookie_name: var("SESSION_COOKIE_NAME").unwrap_or(defaults.cookie_name),
            secrets,
            max_age,
            secure: parse_bool("SESSION_SECURE", defaults.secure),
            http_only: parse_bool("SESSION_HTTP_ONLY", defaults.http_only),
            same_site,
            backend,
            file_dir,
        })
    }

    /// 設定からCookieを作成
    pub fn cookie(&self) -> Result<Cookie, Error> {
        let mut options = CookieOptions::new().with_secrets(self.secrets.iter().cloned());
        let mut attributes = options
            .attributes
            .clone()
            .secure(self.secure)
            .http_only(self.http_only)
            .with_same_site(self.same_site);
        if let Some(max_age) = self.max_age {
            attributes = attributes.with_max_age(max_age);
        }
        options = options.with_attributes(attributes);
        Cookie::try_new(self.cookie_name.clone(), options)
    }

    /// 設定からセッションストレージを作成
    pub fn build_storage(&self) -> Result<Box<dyn SessionStorage>, Error> {
        let cookie = self.cookie()?;
        info!("Using {:?} session backend with cookie {:?}", self.backend, self.cookie_name);
        let storage: Box<dyn SessionStorage> = match self.backend {
            Backend::Memory => Box::new(IdSessionStorage::new(cookie, MemoryStrategy::new())),
            Backend::Cookie => Box::new(CookieSessionStorage::new(cookie)),
            Backend::File => {
                let dir = self.file_dir.clone().ok_or_else(|| {
                    Error::ConfigurationError("SESSION_FILE_DIR is required for the file backend".to_string())
                })?;
                Box::new(IdSessionStorage::new(cookie, FileStrategy::new(dir)))
            }
        };
        Ok(storage)
    }
}
