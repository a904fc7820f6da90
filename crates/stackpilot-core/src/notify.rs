//! 通知シンクの共通インターフェース
//!
//! エンジンは進捗・エラーをすべてこの trait 経由で運用者へ届ける。
//! 配送の失敗は実装側で処理する契約であり、呼び出し元へは決して
//! 伝播しない。メッセージには `[label](url)` 形式の軽量リンク記法を
//! 含んでよく、その記法を扱えないシンクは送信前に自分の形式へ変換する。

use async_trait::async_trait;
use std::fmt;

/// 通知メッセージの重要度
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Info,
    Warning,
    Error,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Level::Info => "INFO",
            Level::Warning => "WARNING",
            Level::Error => "ERROR",
        };
        f.write_str(label)
    }
}

/// 運用者向け通知シンク。失敗しない（エラーを返さない）ことが契約
#[async_trait]
pub trait Notify: Send + Sync {
    async fn log(&self, level: Level, message: &str);

    async fn info(&self, message: &str) {
        self.log(Level::Info, message).await;
    }

    async fn warn(&self, message: &str) {
        self.log(Level::Warning, message).await;
    }

    async fn error(&self, message: &str) {
        self.log(Level::Error, message).await;
    }
}

// 参照越しでも使えるようにしておく（テストで共有する際に必要）
#[async_trait]
impl<N: Notify + ?Sized> Notify for &N {
    async fn log(&self, level: Level, message: &str) {
        (**self).log(level, message).await;
    }
}
