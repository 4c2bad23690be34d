//! セッションIDの生成

use std::fmt::Write;
use std::sync::Arc;

/// ランダムIDのバイト数（64bitのID空間）
pub const RANDOM_ID_BYTES: usize = 8;

/// セッションID生成関数
///
/// ファイル/KVストレージで差し替え可能。テストではID空間を狭めて衝突を起こすのに使う。
pub type IdGenerator = Arc<dyn Fn() -> String + Send + Sync>;

/// 8バイトの乱数を16進エンコードしたIDを生成
pub fn random_session_id() -> String {
    let bytes: [u8; RANDOM_ID_BYTES] = rand::random();
    bytes.iter().fold(String::with_capacity(RANDOM_ID_BYTES * 2), |mut id, b| {
        let _ = write!(id, "{:02x}", b);
        id
    })
}

/// デフォルトのID生成関数
pub fn default_id_generator() -> IdGenerator {
    Arc::new(random_session_id)
}

/// `random_session_id` と同じ形式（小文字16進16文字）か
pub fn is_random_session_id(id: &str) -> bool {
    id.len() == RANDOM_ID_BYTES * 2 && id.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_random_session_id_format() {
        let id = random_session_id();
        assert_eq!(id.len(), 16);
        assert!(is_random_session_id(&id));
    }

    #[test]
    fn test_random_session_ids_differ() {
        let ids: HashSet<String> = (0..1000).map(|_| random_session_id()).collect();
        assert_eq!(ids.len(), 1000);
    }

    #[test]
    fn test_is_random_session_id() {
        assert!(is_random_session_id("0123456789abcdef"));
        assert!(!is_random_session_id("0123456789ABCDEF"));
        assert!(!is_random_session_id("0123456789abcde"));
        assert!(!is_random_session_id("../../etc/passwd"));
        assert!(!is_random_session_id(""));
    }
}
