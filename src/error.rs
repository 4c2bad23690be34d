//! エラー型の定義

use thiserror::Error;

/// セッション処理のエラー型
///
/// 署名検証の失敗やデコード失敗はエラーとして扱わない（「セッションなし」に縮退する）。
/// ここに含まれるのはリクエスト処理を中断すべき致命的な状況のみ。
#[derive(Error, Debug)]
pub enum Error {
    /// クッキー名・値が不正
    #[error("Invalid cookie: {0}")]
    InvalidCookie(String),

    /// セッションIDの形式が不正
    #[error("Invalid session id: {0}")]
    InvalidSessionId(String),

    /// クッキーセッションがブラウザの上限サイズを超えた
    #[error("Cookie length will exceed browser maximum. Length: {0}")]
    CookieTooLarge(usize),

    /// ストレージI/Oエラー（not found 以外）
    #[error("Storage error: {0}")]
    Storage(String),

    /// 保存済みレコードのシリアライズ/デシリアライズエラー
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// 設定エラー
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// 外部サービス（KVストア）エラー
    #[error("External service error: {0}")]
    ExternalServiceError(String),
}

impl Error {
    /// エラーからHTTPステータスコードを取得
    pub fn status_code(&self) -> u16 {
        match self {
            Error::InvalidCookie(_) => 400,
            Error::InvalidSessionId(_) => 400,
            Error::CookieTooLarge(_) => 500,
            Error::Storage(_) => 500,
            Error::Serialization(_) => 500,
            Error::ConfigurationError(_) => 500,
            Error::ExternalServiceError(_) => 502,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Storage(e.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_code() {
        assert_eq!(Error::InvalidCookie("x".into()).status_code(), 400);
        assert_eq!(Error::CookieTooLarge(5000).status_code(), 500);
        assert_eq!(Error::ExternalServiceError("kv".into()).status_code(), 502);
    }

    #[test]
    fn test_cookie_too_large_message() {
        let e = Error::CookieTooLarge(4097);
        assert_eq!(e.to_string(), "Cookie length will exceed browser maximum. Length: 4097");
    }

    #[test]
    fn test_from_io_error() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let e: Error = io.into();
        assert!(matches!(e, Error::Storage(_)));
    }
}
