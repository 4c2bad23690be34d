//! プラットフォームアダプタとやり取りする標準的なRequest/Response型

use std::collections::HashMap;
use std::fmt;
use log::warn;
use super::utils::is_header_value_valid;

/// HTTPメソッド
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Method {
    GET,
    POST,
    PUT,
    DELETE,
    PATCH,
    HEAD,
    OPTIONS,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Method::GET => write!(f, "GET"),
            Method::POST => write!(f, "POST"),
            Method::PUT => write!(f, "PUT"),
            Method::DELETE => write!(f, "DELETE"),
            Method::PATCH => write!(f, "PATCH"),
            Method::HEAD => write!(f, "HEAD"),
            Method::OPTIONS => write!(f, "OPTIONS"),
        }
    }
}

/// HTTPリクエスト
#[derive(Debug, Clone)]
pub struct Request {
    /// HTTPメソッド
    pub method: Method,
    /// リクエストパス
    pub path: String,
    /// HTTPヘッダー（キーは小文字で保持）
    pub headers: HashMap<String, String>,
}

impl Request {
    /// 新しいリクエストを作成
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: HashMap::new(),
        }
    }

    /// ヘッダーを追加（CRLF等を含む値は拒否）
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let key = key.into().to_ascii_lowercase();
        let value = value.into();
        if is_header_value_valid(&value) {
            self.headers.insert(key, value);
        } else {
            warn!("Request::with_header rejected invalid value for header {:?}", key);
        }
        self
    }

    /// ヘッダーを取得（大文字小文字を区別しない）
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    /// Cookieヘッダーを取得
    pub fn cookie_header(&self) -> Option<&str> {
        self.header("cookie")
    }
}

/// HTTPレスポンス
#[derive(Debug, Clone)]
pub struct Response {
    /// HTTPステータスコード
    pub status: u16,
    /// Set-Cookieヘッダー（複数設定可能なため1件ずつ保持）
    pub cookies: Vec<String>,
}

impl Response {
    /// 新しいレスポンスを作成
    pub fn new(status: u16) -> Self {
        Self {
            status,
            cookies: Vec::new(),
        }
    }

    /// 200 OKレスポンスを作成
    pub fn ok() -> Self {
        Self::new(200)
    }

    /// Set-Cookieヘッダーを追加
    pub fn with_set_cookie(mut self, set_cookie: impl Into<String>) -> Self {
        let value = set_cookie.into();
        if is_header_value_valid(&value) {
            self.cookies.push(value);
        } else {
            warn!("Response::with_set_cookie rejected invalid Set-Cookie value");
        }
        self
    }
}
