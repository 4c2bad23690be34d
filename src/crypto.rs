//! Cookie値の署名と検証
//!
//! 署名済みの値は `value + "." + base64(HMAC-SHA256)` の形式（パディングなし）。

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// 署名プロバイダ
///
/// `unsign` は検証に失敗した場合や入力が不正な場合に `None` を返す。
/// 検証失敗は想定内の結果であり、エラーではない。
pub trait Signer: Send + Sync {
    /// 値に署名する
    fn sign(&self, value: &str, secret: &str) -> String;

    /// 署名を検証し、元の値を返す
    fn unsign(&self, signed: &str, secret: &str) -> Option<String>;
}

/// HMAC-SHA256による署名（デフォルト実装）
#[derive(Debug, Clone, Copy, Default)]
pub struct HmacSigner;

impl HmacSigner {
    fn mac(secret: &str, value: &str) -> HmacSha256 {
        let mut mac = <HmacSha256 as Mac>::new_from_slice(secret.as_bytes())
            .expect("HMAC accepts any key size");
        mac.update(value.as_bytes());
        mac
    }
}

impl Signer for HmacSigner {
    fn sign(&self, value: &str, secret: &str) -> String {
        let tag = Self::mac(secret, value).finalize().into_bytes();
        format!("{}.{}", value, base64::encode_config(tag, base64::STANDARD_NO_PAD))
    }

    fn unsign(&self, signed: &str, secret: &str) -> Option<String> {
        let (value, hash) = signed.rsplit_once('.')?;
        let signature = base64::decode_config(hash, base64::STANDARD_NO_PAD).ok()?;
        // verify_slice は定数時間比較
        Self::mac(secret, value)
            .verify_slice(&signature)
            .ok()
            .map(|_| value.to_string())
    }
}
