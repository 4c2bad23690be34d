//! 設定上の警告の出力先

use std::collections::HashSet;
use std::sync::Mutex;
use log::warn;

/// 警告の出力先（呼び出し側で差し替え・抑止できる）
pub trait WarningSink: Send + Sync {
    fn warn(&self, message: &str);
}

/// `log::warn!` に出力する。同じメッセージは一度だけ出力する。
#[derive(Debug, Default)]
pub struct LogWarnings {
    seen: Mutex<HashSet<String>>,
}

impl LogWarnings {
    pub fn new() -> Self {
        Self::default()
    }
}

impl WarningSink for LogWarnings {
    fn warn(&self, message: &str) {
        let mut seen = self.seen.lock().unwrap_or_else(|e| e.into_inner());
        if seen.insert(message.to_string()) {
            warn!("{}", message);
        }
    }
}

/// 何も出力しない
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentWarnings;

impl WarningSink for SilentWarnings {
    fn warn(&self, _message: &str) {}
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// 受け取った警告を記録するテスト用の出力先
    #[derive(Default)]
    pub struct RecordingWarnings {
        pub messages: Mutex<Vec<String>>,
    }

    impl WarningSink for RecordingWarnings {
        fn warn(&self, message: &str) {
            self.messages.lock().unwrap().push(message.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_warnings_deduplicates() {
        let sink = LogWarnings::new();
        sink.warn("same");
        sink.warn("same");
        sink.warn("other");
        assert_eq!(sink.seen.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_silent_warnings() {
        SilentWarnings.warn("ignored");
    }
}
