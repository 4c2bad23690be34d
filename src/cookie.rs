//! 署名付きCookie
//!
//! 名前・署名用シークレット・属性をまとめた単位。値は [`crate::codec`] でエンコードし、
//! シークレットがあれば先頭のシークレットで署名する。検証はすべてのシークレットを順に試すため、
//! シークレットのローテーション中も古いCookieを読み取れる。

use std::fmt;
use std::sync::Arc;
use chrono::{DateTime, Duration, Utc};
use serde_json::Value;

use crate::codec;
use crate::common::header::{parse_cookie_header, CookieAttributes, CookieDecoder, CookieEncoder, SameSite, SetCookie};
use crate::common::utils::{decode_cookie_value, encode_component, is_cookie_name_valid};
use crate::crypto::{HmacSigner, Signer};
use crate::error::Error;

/// Cookieの設定
#[derive(Debug, Clone)]
pub struct CookieOptions {
    /// 署名用シークレット（先頭で署名し、すべてで検証する）
    pub secrets: Vec<String>,
    /// Set-Cookie属性のデフォルト値
    pub attributes: CookieAttributes,
    /// Cookieヘッダー解析時のデコーダ
    pub decode: Option<CookieDecoder>,
    /// Set-Cookie生成時のエンコーダ
    pub encode: Option<CookieEncoder>,
}

impl Default for CookieOptions {
    fn default() -> Self {
        Self {
            secrets: Vec::new(),
            attributes: CookieAttributes::new()
                .with_path("/")
                .with_same_site(SameSite::Lax),
            decode: None,
            encode: None,
        }
    }
}

impl CookieOptions {
    /// デフォルト設定（Path=/、SameSite=Lax、署名なし）
    pub fn new() -> Self {
        Self::default()
    }

    /// 署名用シークレットを設定
    pub fn with_secrets<I, S>(mut self, secrets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.secrets = secrets.into_iter().map(Into::into).collect();
        self
    }

    /// 属性をまとめて設定
    pub fn with_attributes(mut self, attributes: CookieAttributes) -> Self {
        self.attributes = attributes;
        self
    }

    /// デコーダを設定
    pub fn with_decoder(mut self, decode: CookieDecoder) -> Self {
        self.decode = Some(decode);
        self
    }

    /// エンコーダを設定
    pub fn with_encoder(mut self, encode: CookieEncoder) -> Self {
        self.encode = Some(encode);
        self
    }
}

/// parse 呼び出しごとの上書き設定
#[derive(Debug, Clone, Default)]
pub struct CookieParseOptions {
    pub decode: Option<CookieDecoder>,
}

/// serialize 呼び出しごとの上書き設定（指定した項目のみデフォルトを上書きする）
#[derive(Debug, Clone, Default)]
pub struct CookieSerializeOptions {
    pub path: Option<String>,
    pub domain: Option<String>,
    pub expires: Option<DateTime<Utc>>,
    pub max_age: Option<i64>,
    pub secure: Option<bool>,
    pub http_only: Option<bool>,
    pub same_site: Option<SameSite>,
    pub encode: Option<CookieEncoder>,
}

impl CookieSerializeOptions {
    fn merge_into(&self, base: &CookieAttributes) -> CookieAttributes {
        CookieAttributes {
            path: self.path.clone().or_else(|| base.path.clone()),
            domain: self.domain.clone().or_else(|| base.domain.clone()),
            expires: self.expires.or(base.expires),
            max_age: self.max_age.or(base.max_age),
            secure: self.secure.unwrap_or(base.secure),
            http_only: self.http_only.unwrap_or(base.http_only),
            same_site: self.same_site.or(base.same_site),
        }
    }
}

/// 署名付きCookie
#[derive(Clone)]
pub struct Cookie {
    name: String,
    options: CookieOptions,
    signer: Arc<dyn Signer>,
}

impl fmt::Debug for Cookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // シークレットは出力しない
        f.debug_struct("Cookie")
            .field("name", &self.name)
            .field("is_signed", &self.is_signed())
            .field("attributes", &self.options.attributes)
            .finish()
    }
}

impl Cookie {
    /// HMAC-SHA256署名でCookieを作成
    pub fn try_new(name: impl Into<String>, options: CookieOptions) -> Result<Self, Error> {
        Self::with_signer(name, options, Arc::new(HmacSigner))
    }

    /// 任意の署名プロバイダでCookieを作成
    pub fn with_signer(
        name: impl Into<String>,
        options: CookieOptions,
        signer: Arc<dyn Signer>,
    ) -> Result<Self, Error> {
        let name = name.into();
        if !is_cookie_name_valid(&name) {
            return Err(Error::InvalidCookie(format!("cookie name contains invalid characters: {:?}", name)));
        }
        Ok(Self { name, options, signer })
    }

    /// Cookie名
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 署名付きかどうか
    pub fn is_signed(&self) -> bool {
        !self.options.secrets.is_empty()
    }

    /// 有効期限（Max-Ageがあれば現在時刻から算出、なければExpires）
    pub fn expires(&self) -> Option<DateTime<Utc>> {
        match self.options.attributes.max_age {
            Some(max_age) => Some(Utc::now() + Duration::seconds(max_age)),
            None => self.options.attributes.expires,
        }
    }

    /// 設定を取得
    pub fn options(&self) -> &CookieOptions {
        &self.options
    }

    /// Cookieヘッダーからこの名前の値を取り出す
    ///
    /// ヘッダーがない・Cookieがない・署名検証に失敗した場合は `None`。
    /// 空文字の値はデコードせず `""` として返す。
    pub fn parse(&self, cookie_header: Option<&str>, options: Option<&CookieParseOptions>) -> Option<Value> {
        let header = cookie_header.filter(|h| !h.is_empty())?;
        let decode = options
            .and_then(|o| o.decode)
            .or(self.options.decode)
            .unwrap_or(decode_cookie_value);

        let cookies = parse_cookie_header(header, decode);
        let raw = cookies.get(&self.name)?;
        if raw.is_empty() {
            return Some(Value::String(String::new()));
        }
        self.decode_value(raw)
    }

    /// 値をSet-Cookieヘッダー文字列に変換する
    ///
    /// 空文字はエンコード・署名せずそのまま出力する。
    pub fn serialize(&self, value: &Value, options: Option<&CookieSerializeOptions>) -> Result<String, Error> {
        let encoded = match value {
            Value::String(s) if s.is_empty() => String::new(),
            _ => self.encode_value(value),
        };

        let (attributes, encode) = match options {
            Some(o) => (
                o.merge_into(&self.options.attributes),
                o.encode.or(self.options.encode),
            ),
            None => (self.options.attributes.clone(), self.options.encode),
        };
        let encode = encode.unwrap_or(encode_component);

        let set_cookie = SetCookie::try_new(self.name.clone(), encode(&encoded))?
            .with_attributes(attributes);
        Ok(set_cookie.to_header_value())
    }

    fn encode_value(&self, value: &Value) -> String {
        let encoded = codec::encode(value);
        match self.options.secrets.first() {
            Some(secret) => self.signer.sign(&encoded, secret),
            None => encoded,
        }
    }

    fn decode_value(&self, raw: &str) -> Option<Value> {
        if !self.is_signed() {
            return Some(codec::decode(raw));
        }
        self.options
            .secrets
            .iter()
            .find_map(|secret| self.signer.unsign(raw, secret))
            .map(|unsigned| codec::decode(&unsigned))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn cookie_pair(set_cookie: &str) -> &str {
        set_cookie.split(';').next().unwrap_or("")
    }

    /// シークレットを平文で前置するだけのテスト用プロバイダ
    struct PlainSigner;

    impl Signer for PlainSigner {
        fn sign(&self, value: &str, secret: &str) -> String {
            format!("{}:{}", secret, value)
        }

        fn unsign(&self, signed: &str, secret: &str) -> Option<String> {
            signed
                .strip_prefix(secret)
                .and_then(|rest| rest.strip_prefix(':'))
                .map(str::to_string)
        }
    }

    #[test]
    fn test_invalid_name_is_rejected() {
        assert!(matches!(Cookie::try_new("bad name", CookieOptions::new()), Err(Error::InvalidCookie(_))));
        assert!(Cookie::try_new("my-cookie", CookieOptions::new()).is_ok());
    }

    #[test]
    fn test_is_signed() {
        let unsigned = Cookie::try_new("c", CookieOptions::new()).unwrap();
        let signed = Cookie::try_new("c", CookieOptions::new().with_secrets(["s1"])).unwrap();
        assert!(!unsigned.is_signed());
        assert!(signed.is_signed());
        assert_eq!(signed.name(), "c");
    }

    #[test]
    fn test_expires_from_max_age() {
        let cookie = Cookie::try_new(
            "c",
            CookieOptions::new().with_attributes(CookieAttributes::new().with_max_age(60)),
        ).unwrap();
        let expires = cookie.expires().unwrap();
        let delta = expires - Utc::now();
        assert!(delta > Duration::seconds(55) && delta <= Duration::seconds(60));

        let fixed = Utc::now() + Duration::days(1);
        let cookie = Cookie::try_new(
            "c",
            CookieOptions::new().with_attributes(CookieAttributes::new().with_expires(fixed)),
        ).unwrap();
        assert_eq!(cookie.expires(), Some(fixed));

        let cookie = Cookie::try_new("c", CookieOptions::new()).unwrap();
        assert_eq!(cookie.expires(), None);
    }

    #[test]
    fn test_parse_absent() {
        let cookie = Cookie::try_new("my-cookie", CookieOptions::new()).unwrap();
        assert_eq!(cookie.parse(None, None), None);
        assert_eq!(cookie.parse(Some(""), None), None);
        assert_eq!(cookie.parse(Some("other=1"), None), None);
    }

    #[test]
    fn test_default_attributes() {
        let cookie = Cookie::try_new("my-cookie", CookieOptions::new()).unwrap();
        let set_cookie = cookie.serialize(&json!("hello"), None).unwrap();
        assert!(set_cookie.contains("Path=/"));
        assert!(set_cookie.contains("SameSite=Lax"));
    }

    #[test]
    fn test_serialize_overrides_take_precedence() {
        let cookie = Cookie::try_new(
            "my-cookie",
            CookieOptions::new().with_attributes(
                CookieAttributes::new().with_path("/").with_domain("example.com").http_only(true),
            ),
        ).unwrap();
        let overrides = CookieSerializeOptions {
            path: Some("/about".into()),
            http_only: Some(false),
            secure: Some(true),
            ..Default::default()
        };
        let set_cookie = cookie.serialize(&json!("hello"), Some(&overrides)).unwrap();

        assert!(set_cookie.contains("Path=/about"));
        assert!(set_cookie.contains("Domain=example.com"));
        assert!(set_cookie.contains("Secure"));
        assert!(!set_cookie.contains("HttpOnly"));
    }

    #[test]
    fn test_custom_signer_rotation() {
        let old = Cookie::with_signer(
            "c",
            CookieOptions::new().with_secrets(["old"]),
            Arc::new(PlainSigner),
        ).unwrap();
        let header = old.serialize(&json!({"a": 1}), None).unwrap();

        let rotated = Cookie::with_signer(
            "c",
            CookieOptions::new().with_secrets(["new", "old"]),
            Arc::new(PlainSigner),
        ).unwrap();
        assert_eq!(rotated.parse(Some(cookie_pair(&header)), None), Some(json!({"a": 1})));
        assert_ne!(rotated.serialize(&json!({"a": 1}), None).unwrap(), header);
    }

    #[test]
    fn test_parse_with_custom_decoder() {
        let cookie = Cookie::try_new("c", CookieOptions::new()).unwrap();
        let header = cookie.serialize(&json!("abc"), None).unwrap();
        // 壊れたデコーダ → デコード失敗で空マップ
        fn reversed(v: &str) -> String {
            v.chars().rev().collect()
        }
        let options = CookieParseOptions { decode: Some(reversed) };
        assert_eq!(cookie.parse(Some(cookie_pair(&header)), Some(&options)), Some(json!({})));
    }

    #[test]
    fn test_custom_encoder_producing_invalid_value() {
        let cookie = Cookie::try_new(
            "c",
            CookieOptions::new().with_encoder(|v| format!("{};", v)),
        ).unwrap();
        assert!(matches!(cookie.serialize(&json!("x"), None), Err(Error::InvalidCookie(_))));
    }

    #[test]
    fn test_debug_hides_secrets() {
        let cookie = Cookie::try_new("c", CookieOptions::new().with_secrets(["top-secret"])).unwrap();
        let debug = format!("{:?}", cookie);
        assert!(!debug.contains("top-secret"));
        assert!(debug.contains("is_signed: true"));
    }
}
