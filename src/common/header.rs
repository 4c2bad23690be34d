//! Cookie / Set-Cookie ヘッダーの解析と生成

use std::collections::HashMap;
use std::fmt;
use chrono::{DateTime, Utc};
use log::warn;
use crate::error::Error;
use super::utils::{validate_cookie_name_value, is_header_value_valid};

/// Cookie値のデコード関数（Cookieヘッダー解析時に使用）
pub type CookieDecoder = fn(&str) -> String;

/// Cookie値のエンコード関数（Set-Cookie生成時に使用）
pub type CookieEncoder = fn(&str) -> String;

/// SameSite属性
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SameSite {
    Strict,
    Lax,
    None,
}

impl fmt::Display for SameSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SameSite::Strict => write!(f, "Strict"),
            SameSite::Lax => write!(f, "Lax"),
            SameSite::None => write!(f, "None"),
        }
    }
}

impl SameSite {
    /// 文字列からSameSiteに変換（大文字小文字を区別しない）
    pub fn from_str(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "strict" => Some(SameSite::Strict),
            "lax" => Some(SameSite::Lax),
            "none" => Some(SameSite::None),
            _ => None,
        }
    }
}

/// Set-Cookieの属性
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CookieAttributes {
    pub path: Option<String>,
    pub domain: Option<String>,
    pub expires: Option<DateTime<Utc>>,
    /// 秒単位
    pub max_age: Option<i64>,
    pub secure: bool,
    pub http_only: bool,
    pub same_site: Option<SameSite>,
}

impl CookieAttributes {
    /// 属性なしで作成
    pub fn new() -> Self {
        Self::default()
    }

    /// パスを設定
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// ドメインを設定
    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    /// 有効期限を設定
    pub fn with_expires(mut self, expires: DateTime<Utc>) -> Self {
        self.expires = Some(expires);
        self
    }

    /// 最大年齢（秒）を設定
    pub fn with_max_age(mut self, seconds: i64) -> Self {
        self.max_age = Some(seconds);
        self
    }

    /// セキュアフラグを設定
    pub fn secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    /// HttpOnlyフラグを設定
    pub fn http_only(mut self, http_only: bool) -> Self {
        self.http_only = http_only;
        self
    }

    /// SameSite属性を設定
    pub fn with_same_site(mut self, same_site: SameSite) -> Self {
        self.same_site = Some(same_site);
        self
    }
}

/// Set-Cookieヘッダー1件分
#[derive(Debug, Clone)]
pub struct SetCookie {
    pub name: String,
    pub value: String,
    pub attributes: CookieAttributes,
}

impl SetCookie {
    /// 名前と値を検証して作成
    pub fn try_new(name: impl Into<String>, value: impl Into<String>) -> Result<Self, Error> {
        let n = name.into();
        let v = value.into();
        validate_cookie_name_value(&n, &v)?;
        Ok(Self {
            name: n,
            value: v,
            attributes: CookieAttributes::default(),
        })
    }

    /// 属性をまとめて設定
    pub fn with_attributes(mut self, attributes: CookieAttributes) -> Self {
        self.attributes = attributes;
        self
    }

    /// Set-Cookieヘッダー値を生成
    pub fn to_header_value(&self) -> String {
        let attrs = &self.attributes;
        let mut cookie_str = format!("{}={}", self.name, self.value);

        if let Some(max_age) = attrs.max_age {
            cookie_str.push_str(&format!("; Max-Age={}", max_age));
        }

        if let Some(domain) = &attrs.domain {
            if is_header_value_valid(domain) && !domain.contains(';') {
                cookie_str.push_str(&format!("; Domain={}", domain));
            } else {
                warn!("SetCookie::to_header_value skipped invalid Domain value: {:?}", domain);
            }
        }

        if let Some(path) = &attrs.path {
            if is_header_value_valid(path) && !path.contains(';') {
                cookie_str.push_str(&format!("; Path={}", path));
            } else {
                warn!("SetCookie::to_header_value skipped invalid Path value: {:?}", path);
            }
        }

        if let Some(expires) = &attrs.expires {
            cookie_str.push_str(&format!("; Expires={}", expires.format("%a, %d %b %Y %H:%M:%S GMT")));
        }

        if attrs.http_only {
            cookie_str.push_str("; HttpOnly");
        }

        if attrs.secure {
            cookie_str.push_str("; Secure");
        }

        if let Some(same_site) = &attrs.same_site {
            cookie_str.push_str(&format!("; SameSite={}", same_site));
        }

        cookie_str
    }
}

/// Cookieヘッダー（`a=1; b=2`）を名前→値のマップに解析
///
/// 同名のCookieが複数ある場合は最初のものを採用する。
/// 値を囲むダブルクォートは取り除いてから `decode` に渡す。
pub fn parse_cookie_header(header: &str, decode: CookieDecoder) -> HashMap<String, String> {
    let mut cookies = HashMap::new();

    for pair in header.split(';') {
        let Some((key, value)) = pair.split_once('=') else {
            continue;
        };
        let key = key.trim();
        if key.is_empty() || cookies.contains_key(key) {
            continue;
        }
        let mut value = value.trim();
        if value.len() >= 2 && value.starts_with('"') && value.ends_with('"') {
            value = &value[1..value.len() - 1];
        }
        cookies.insert(key.to_string(), decode(value));
    }

    cookies
}
