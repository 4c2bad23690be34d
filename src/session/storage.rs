//! セッションストレージ
//!
//! [`IdSessionStorage`] はCookieにセッションIDだけを載せ、データは
//! [`SessionIdStorageStrategy`] に保存する。[`CookieSessionStorage`] はデータ全体を
//! 署名付きCookieに載せる。

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::debug;
use serde_json::Value;

use crate::common::http::{Request, Response};
use crate::cookie::{Cookie, CookieOptions, CookieParseOptions, CookieSerializeOptions};
use crate::error::Error;

use super::warning::{LogWarnings, WarningSink};
use super::{Session, SessionData};

/// ブラウザが受け付けるSet-Cookieの最大長
pub const MAX_COOKIE_SIZE: usize = 4096;

/// Cookie名を指定しなかった場合のセッションCookie名
pub const DEFAULT_SESSION_COOKIE_NAME: &str = "__sessionid";

/// セッションデータの永続化バックエンド
///
/// - `create_data`: 未使用のIDを割り当てて保存し、IDを返す
/// - `read_data`: IDのデータを返す。期限切れのレコードは削除して `None`
/// - `update_data`: IDのデータを上書き保存する
/// - `delete_data`: IDのデータを削除する。存在しないIDや空のIDでもエラーにしない
#[async_trait]
pub trait SessionIdStorageStrategy: Send + Sync {
    async fn create_data(&self, data: &SessionData, expires: Option<DateTime<Utc>>) -> Result<String, Error>;

    async fn read_data(&self, id: &str) -> Result<Option<SessionData>, Error>;

    async fn update_data(&self, id: &str, data: &SessionData, expires: Option<DateTime<Utc>>) -> Result<(), Error>;

    async fn delete_data(&self, id: &str) -> Result<(), Error>;
}

/// セッションストレージの契約
#[async_trait]
pub trait SessionStorage: Send + Sync {
    /// Cookieヘッダーからセッションを取得する。該当がなければ空のセッションを返す。
    async fn get_session(
        &self,
        cookie_header: Option<&str>,
        options: Option<&CookieParseOptions>,
    ) -> Result<Session, Error>;

    /// セッションを保存し、レスポンスに付けるSet-Cookieヘッダー値を返す。
    async fn commit_session(
        &self,
        session: &Session,
        options: Option<&CookieSerializeOptions>,
    ) -> Result<String, Error>;

    /// セッションを破棄し、Cookieを即時失効させるSet-Cookieヘッダー値を返す。
    async fn destroy_session(
        &self,
        session: &Session,
        options: Option<&CookieSerializeOptions>,
    ) -> Result<String, Error>;

    /// RequestのCookieヘッダーからセッションを取得
    async fn get_session_from_request(&self, req: &Request) -> Result<Session, Error> {
        self.get_session(req.cookie_header(), None).await
    }

    /// セッションを保存し、Set-Cookieを付けたResponseを返す
    async fn commit_to_response(&self, session: &Session, res: Response) -> Result<Response, Error> {
        let set_cookie = self.commit_session(session, None).await?;
        Ok(res.with_set_cookie(set_cookie))
    }
}

/// セッションCookieの指定（作成済みのCookie、または名前と設定）
#[derive(Debug, Clone)]
pub enum SessionCookie {
    Cookie(Cookie),
    Options {
        name: Option<String>,
        options: CookieOptions,
    },
}

impl Default for SessionCookie {
    fn default() -> Self {
        SessionCookie::Options {
            name: None,
            options: CookieOptions::default(),
        }
    }
}

impl From<Cookie> for SessionCookie {
    fn from(cookie: Cookie) -> Self {
        SessionCookie::Cookie(cookie)
    }
}

impl From<CookieOptions> for SessionCookie {
    fn from(options: CookieOptions) -> Self {
        SessionCookie::Options { name: None, options }
    }
}

impl SessionCookie {
    /// 名前と設定から指定
    pub fn named(name: impl Into<String>, options: CookieOptions) -> Self {
        SessionCookie::Options {
            name: Some(name.into()),
            options,
        }
    }

    /// Cookieを確定させる（名前未指定なら `__sessionid`）
    pub fn into_cookie(self) -> Result<Cookie, Error> {
        match self {
            SessionCookie::Cookie(cookie) => Ok(cookie),
            SessionCookie::Options { name, options } => {
                Cookie::try_new(name.unwrap_or_else(|| DEFAULT_SESSION_COOKIE_NAME.to_string()), options)
            }
        }
    }
}

fn warn_if_unsigned(cookie: &Cookie, warnings: &dyn WarningSink) {
    if !cookie.is_signed() {
        warnings.warn(&format!(
            "The \"{}\" cookie is not signed, but session cookies should be signed \
             to prevent tampering on the client before they are sent back to the server.",
            cookie.name()
        ));
    }
}

/// Cookieを即時失効させるSet-Cookieヘッダー値
fn expired_cookie(cookie: &Cookie, options: Option<&CookieSerializeOptions>) -> Result<String, Error> {
    let mut overrides = options.cloned().unwrap_or_default();
    // DateTime<Utc> のデフォルトはUNIXエポック
    overrides.expires = Some(DateTime::<Utc>::default());
    overrides.max_age = Some(0);
    cookie.serialize(&Value::String(String::new()), Some(&overrides))
}

/// IDをCookieに、データをバックエンドに保存するセッションストレージ
pub struct IdSessionStorage<S> {
    cookie: Cookie,
    strategy: S,
}

impl<S: SessionIdStorageStrategy> IdSessionStorage<S> {
    /// 作成（署名なしCookieの場合は `log::warn!` で警告）
    pub fn new(cookie: Cookie, strategy: S) -> Self {
        Self::with_warnings(cookie, strategy, &LogWarnings::new())
    }

    /// 警告の出力先を指定して作成
    pub fn with_warnings(cookie: Cookie, strategy: S, warnings: &dyn WarningSink) -> Self {
        warn_if_unsigned(&cookie, warnings);
        Self { cookie, strategy }
    }

    /// IDを載せるCookie
    pub fn cookie(&self) -> &Cookie {
        &self.cookie
    }

    /// バックエンド
    pub fn strategy(&self) -> &S {
        &self.strategy
    }
}

#[async_trait]
impl<S: SessionIdStorageStrategy> SessionStorage for IdSessionStorage<S> {
    async fn get_session(
        &self,
        cookie_header: Option<&str>,
        options: Option<&CookieParseOptions>,
    ) -> Result<Session, Error> {
        let id = match self.cookie.parse(cookie_header, options) {
            Some(Value::String(id)) if !id.is_empty() => id,
            _ => return Ok(Session::default()),
        };
        let data = self.strategy.read_data(&id).await?;
        if data.is_none() {
            debug!("No session data found for cookie {:?}", self.cookie.name());
        }
        Ok(Session::new(data.unwrap_or_default(), id))
    }

    async fn commit_session(
        &self,
        session: &Session,
        options: Option<&CookieSerializeOptions>,
    ) -> Result<String, Error> {
        let data = session.data();
        let expires = self.cookie.expires();
        let id = if session.id().is_empty() {
            let id = self.strategy.create_data(&data, expires).await?;
            debug!("Created new session {}", id);
            id
        } else {
            self.strategy.update_data(session.id(), &data, expires).await?;
            session.id().to_string()
        };
        self.cookie.serialize(&Value::String(id), options)
    }

    async fn destroy_session(
        &self,
        session: &Session,
        options: Option<&CookieSerializeOptions>,
    ) -> Result<String, Error> {
        self.strategy.delete_data(session.id()).await?;
        expired_cookie(&self.cookie, options)
    }
}

/// バックエンドを指定してセッションストレージを作成
pub fn create_session_storage<S: SessionIdStorageStrategy>(
    cookie: impl Into<SessionCookie>,
    strategy: S,
) -> Result<IdSessionStorage<S>, Error> {
    Ok(IdSessionStorage::new(cookie.into().into_cookie()?, strategy))
}

/// セッションデータ全体を署名付きCookieに保存するストレージ
#[derive(Debug, Clone)]
pub struct CookieSessionStorage {
    cookie: Cookie,
}

impl CookieSessionStorage {
    /// 作成（署名なしCookieの場合は `log::warn!` で警告）
    pub fn new(cookie: Cookie) -> Self {
        Self::with_warnings(cookie, &LogWarnings::new())
    }

    /// 警告の出力先を指定して作成
    pub fn with_warnings(cookie: Cookie, warnings: &dyn WarningSink) -> Self {
        warn_if_unsigned(&cookie, warnings);
        Self { cookie }
    }

    /// データを載せるCookie
    pub fn cookie(&self) -> &Cookie {
        &self.cookie
    }
}

#[async_trait]
impl SessionStorage for CookieSessionStorage {
    async fn get_session(
        &self,
        cookie_header: Option<&str>,
        options: Option<&CookieParseOptions>,
    ) -> Result<Session, Error> {
        let data = match self.cookie.parse(cookie_header, options) {
            Some(Value::Object(data)) => data,
            _ => SessionData::new(),
        };
        Ok(Session::new(data, ""))
    }

    async fn commit_session(
        &self,
        session: &Session,
        options: Option<&CookieSerializeOptions>,
    ) -> Result<String, Error> {
        let serialized = self.cookie.serialize(&Value::Object(session.data()), options)?;
        if serialized.len() > MAX_COOKIE_SIZE {
            return Err(Error::CookieTooLarge(serialized.len()));
        }
        Ok(serialized)
    }

    async fn destroy_session(
        &self,
        _session: &Session,
        options: Option<&CookieSerializeOptions>,
    ) -> Result<String, Error> {
        expired_cookie(&self.cookie, options)
    }
}

/// Cookieにデータを保存するセッションストレージを作成
pub fn create_cookie_session_storage(cookie: impl Into<SessionCookie>) -> Result<CookieSessionStorage, Error> {
    Ok(CookieSessionStorage::new(cookie.into().into_cookie()?))
}
