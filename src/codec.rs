//! Cookie値のコーデック
//!
//! 構造化データを `JSON → URIエンコード → unescape → base64` の順でCookie安全な文字列に変換する。
//! base64はLatin-1のバイト列しか扱えないため、非ASCII文字はURIエンコードでUTF-8バイト列に
//! 分解してから渡す。デコードは逆順で、どの段階で失敗しても空のマップを返す。

use serde_json::{Map, Value};
use crate::common::utils::{decode_component, encode_component};

/// escape でそのまま出力する記号（英数字以外）
const UNESCAPED_SYMBOLS: &[u8] = b"_*+-./@";

/// 値をCookie安全な文字列にエンコード
pub fn encode(value: &Value) -> String {
    let binary = unescape(&encode_component(&value.to_string()));
    // URIエンコード済み文字列の unescape 結果は常に U+0000..=U+00FF に収まる
    let bytes: Vec<u8> = binary
        .chars()
        .filter_map(|c| u8::try_from(u32::from(c)).ok())
        .collect();
    base64::encode(bytes)
}

/// エンコード済み文字列を値に戻す（失敗時は空のマップ）
pub fn decode(encoded: &str) -> Value {
    try_decode(encoded).unwrap_or_else(|| Value::Object(Map::new()))
}

fn try_decode(encoded: &str) -> Option<Value> {
    let bytes = base64::decode(encoded).ok()?;
    let binary: String = bytes.into_iter().map(char::from).collect();
    let json = decode_component(&escape(&binary))?;
    serde_json::from_str(&json).ok()
}

/// 英数字と `_*+-./@` 以外のUTF-16コード単位を `%xx` / `%uXXXX` に置き換える
pub fn escape(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    for unit in input.encode_utf16() {
        match u8::try_from(unit) {
            Ok(b) if b.is_ascii_alphanumeric() || UNESCAPED_SYMBOLS.contains(&b) => {
                result.push(char::from(b));
            }
            Ok(b) => result.push_str(&format!("%{:02x}", b)),
            Err(_) => result.push_str(&format!("%u{:04X}", unit)),
        }
    }
    result
}

/// `%xx` / `%uXXXX` をUTF-16コード単位に戻す（不正なシーケンスはそのまま残す）
pub fn unescape(input: &str) -> String {
    let units: Vec<u16> = input.encode_utf16().collect();
    let mut result: Vec<u16> = Vec::with_capacity(units.len());
    let mut i = 0;

    while i < units.len() {
        let unit = units[i];
        if unit == u16::from(b'%') {
            if units.get(i + 1) == Some(&u16::from(b'u')) {
                if let Some(code) = parse_hex(units.get(i + 2..i + 6)) {
                    result.push(code);
                    i += 6;
                    continue;
                }
            } else if let Some(code) = parse_hex(units.get(i + 1..i + 3)) {
                result.push(code);
                i += 3;
                continue;
            }
        }
        result.push(unit);
        i += 1;
    }

    String::from_utf16_lossy(&result)
}

fn parse_hex(digits: Option<&[u16]>) -> Option<u16> {
    digits?.iter().try_fold(0u16, |acc, &unit| {
        let digit = char::from_u32(u32::from(unit))?.to_digit(16)?;
        Some(acc * 16 + digit as u16)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_escape_table() {
        let cases = [
            ("abcXYZ019", "abcXYZ019"),
            ("_*+-./@", "_*+-./@"),
            (" ", "%20"),
            ("!\"#$%&'", "%21%22%23%24%25%26%27"),
            ("()=,;:~", "%28%29%3d%2c%3b%3a%7e"),
            ("\u{00}\u{7f}", "%00%7f"),
            ("é", "%e9"),
            ("\u{ff}", "%ff"),
            ("\u{100}", "%u0100"),
            ("あ", "%u3042"),
            ("€", "%u20AC"),
            ("😀", "%uD83D%uDE00"),
        ];
        for (input, expected) in cases {
            assert_eq!(escape(input), expected, "escape({:?})", input);
        }
    }

    #[test]
    fn test_unescape_table() {
        let cases = [
            ("abc", "abc"),
            ("%20", " "),
            ("%e9", "é"),
            ("%E9", "é"),
            ("%u3042", "あ"),
            ("%u20ac", "€"),
            ("%uD83D%uDE00", "😀"),
            // 不正なシーケンスはそのまま
            ("%zz", "%zz"),
            ("%u12", "%u12"),
            ("%u12zz", "%u12zz"),
            ("100%", "100%"),
            ("%", "%"),
            ("%2", "%2"),
        ];
        for (input, expected) in cases {
            assert_eq!(unescape(input), expected, "unescape({:?})", input);
        }
    }

    #[test]
    fn test_escape_unescape_inverse() {
        for input in ["hello world", "日本語", "a%b", "😀 emoji", "\u{ff}\u{100}"] {
            assert_eq!(unescape(&escape(input)), input);
        }
    }

    #[test]
    fn test_encode_known_values() {
        assert_eq!(encode(&json!("hello world")), "ImhlbGxvIHdvcmxkIg==");
        assert_eq!(encode(&json!({"hello": "mjackson"})), "eyJoZWxsbyI6Im1qYWNrc29uIn0=");
    }

    #[test]
    fn test_decode_structured_and_non_ascii() {
        assert_eq!(decode("eyJoZWxsbyI6Im1qYWNrc29uIn0="), json!({"hello": "mjackson"}));

        let value = json!({"name": "日本語", "n": 1, "ok": true, "list": [null, 2.5]});
        assert_eq!(decode(&encode(&value)), value);
        assert_eq!(decode(&encode(&json!("日本語"))), json!("日本語"));
    }

    #[test]
    fn test_decode_failures_yield_empty_map() {
        let empty = json!({});
        // base64として不正
        assert_eq!(decode("!!!"), empty);
        // JSONとして不正（"not json"）
        assert_eq!(decode("bm90IGpzb24="), empty);
        // UTF-8として不正（0xFF 0xFE）
        assert_eq!(decode("//4="), empty);
        assert_eq!(decode(""), empty);
    }
}
