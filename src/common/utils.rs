//! 共通ユーティリティ関数群（パーセントエンコード、Cookie名/値の検証 等）

use std::borrow::Cow;
use crate::error::Error;

/// encodeURIComponent 相当のエンコード
pub fn encode_component(input: &str) -> String {
    urlencoding::encode(input).into_owned()
}

/// decodeURIComponent 相当のデコード
///
/// 不正なUTF-8列になる場合は `None` を返す
pub fn decode_component(input: &str) -> Option<String> {
    if !input.contains('%') {
        return Some(input.to_string());
    }
    urlencoding::decode(input).ok().map(Cow::into_owned)
}

/// Cookie値のデフォルトデコーダ（失敗時は元の値をそのまま返す）
pub fn decode_cookie_value(input: &str) -> String {
    decode_component(input).unwrap_or_else(|| input.to_string())
}

/// ヘッダー値に使用可能な文字かを判定（CRLF・制御文字を拒否）
pub fn is_header_value_valid(value: &str) -> bool {
    if value.is_empty() {
        return true;
    }
    value.chars().all(|c| {
        let code = c as u32;
        code >= 0x20 && code != 0x7F && c != '\r' && c != '\n'
    })
}

/// Cookie名が安全なトークンか（RFC6265準拠の簡易版）
pub fn is_cookie_name_valid(name: &str) -> bool {
    if name.is_empty() { return false; }
    // tokenと同等: 制御/空白とセパレータを除外
    const FORBIDDEN: &[char] = &['(',')','<','>','@',',',';',':','\\','"','/','[',']','?','{','}','=',' ','\t','\r','\n'];
    name.chars().all(|c| c.is_ascii() && !c.is_ascii_control() && !FORBIDDEN.contains(&c))
}

/// Cookie値が安全か（RFC6265 cookie-octetの簡易版）
/// 許容: 0x21, 0x23-0x2B, 0x2D-0x3A, 0x3C-0x5B, 0x5D-0x7E
pub fn is_cookie_value_valid(value: &str) -> bool {
    value.chars().all(|c| {
        let b = c as u32;
        matches!(b,
            0x21 |
            0x23..=0x2B |
            0x2D..=0x3A |
            0x3C..=0x5B |
            0x5D..=0x7E
        )
    })
}

/// ヘルパー: 無効なCookie名/値ならErrorを返す
pub fn validate_cookie_name_value(name: &str, value: &str) -> Result<(), Error> {
    if !is_cookie_name_valid(name) {
        return Err(Error::InvalidCookie(format!("cookie name contains invalid characters: {:?}", name)));
    }
    if !is_cookie_value_valid(value) {
        return Err(Error::InvalidCookie("cookie value contains invalid characters".into()));
    }
    Ok(())
}
