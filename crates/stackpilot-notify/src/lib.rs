//! 通知シンクの実装（console / Discord / Slack / Telegram）
//!
//! どのシンクも best-effort で配送する。ネットワーク系シンクの配送失敗は
//! `tracing::warn!` に落とすだけで、呼び出し元へは決して返さない。
//! シンクの選択は設定駆動で、未知の type はコンソールへフォールバック
//! する（選択自体は stackpilot-config 側で解決済み）。

use async_trait::async_trait;
use colored::Colorize;
use regex::Regex;
use stackpilot_config::LoggingConfig;
use stackpilot_core::notify::{Level, Notify};
use std::sync::OnceLock;

/// 設定から構築される通知シンクの閉じた集合
pub enum Notifier {
    Console,
    Discord(DiscordSink),
    Slack(SlackSink),
    Telegram(TelegramSink),
}

impl Notifier {
    pub fn from_config(config: &LoggingConfig) -> Self {
        match config {
            LoggingConfig::Console => Self::Console,
            LoggingConfig::Discord { webhook_url } => {
                Self::Discord(DiscordSink::new(webhook_url.clone()))
            }
            LoggingConfig::Slack { webhook_url } => {
                Self::Slack(SlackSink::new(webhook_url.clone()))
            }
            LoggingConfig::Telegram { bot_token, chat_id } => {
                Self::Telegram(TelegramSink::new(bot_token, chat_id.clone()))
            }
        }
    }
}

#[async_trait]
impl Notify for Notifier {
    async fn log(&self, level: Level, message: &str) {
        match self {
            Self::Console => console_log(level, message),
            Self::Discord(sink) => sink.send(level, message).await,
            Self::Slack(sink) => sink.send(level, message).await,
            Self::Telegram(sink) => sink.send(level, message).await,
        }
    }
}

fn console_log(level: Level, message: &str) {
    let tag = match level {
        Level::Info => "INFO".normal(),
        Level::Warning => "WARNING".yellow(),
        Level::Error => "ERROR".red(),
    };
    println!("[{tag}] {message}");
}

/// Discord の incoming webhook へ JSON `{content}` を POST する
pub struct DiscordSink {
    client: reqwest::Client,
    webhook_url: String,
}

impl DiscordSink {
    pub fn new(webhook_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            webhook_url,
        }
    }

    async fn send(&self, level: Level, message: &str) {
        let payload = serde_json::json!({ "content": format!("[{level}] {message}") });
        let result = async {
            self.client
                .post(&self.webhook_url)
                .json(&payload)
                .send()
                .await?
                .error_for_status()?;
            Ok::<_, reqwest::Error>(())
        }
        .await;

        if let Err(e) = result {
            tracing::warn!("failed to deliver Discord notification: {e}");
        }
    }
}

/// Slack の incoming webhook へ JSON `{text}` を POST する。
/// `[label](url)` 記法は Slack の `<url|label>` 形式へ変換してから送る
pub struct SlackSink {
    client: reqwest::Client,
    webhook_url: String,
}

impl SlackSink {
    pub fn new(webhook_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            webhook_url,
        }
    }

    async fn send(&self, level: Level, message: &str) {
        let text = format!("[{level}] {}", rewrite_links_for_slack(message));
        let payload = serde_json::json!({ "text": text });
        let result = async {
            self.client
                .post(&self.webhook_url)
                .json(&payload)
                .send()
                .await?
                .error_for_status()?;
            Ok::<_, reqwest::Error>(())
        }
        .await;

        if let Err(e) = result {
            tracing::warn!("failed to deliver Slack notification: {e}");
        }
    }
}

/// `[label](url)` → `<url|label>`
fn rewrite_links_for_slack(message: &str) -> String {
    static LINK: OnceLock<Regex> = OnceLock::new();
    let link = LINK.get_or_init(|| Regex::new(r"\[([^\]]+)\]\(([^)]+)\)").unwrap());
    link.replace_all(message, "<$2|$1>").into_owned()
}

/// Telegram Bot API の sendMessage へ form フィールドを POST する
pub struct TelegramSink {
    client: reqwest::Client,
    api_url: String,
    chat_id: String,
}

impl TelegramSink {
    pub fn new(bot_token: &str, chat_id: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url: format!("https://api.telegram.org/bot{bot_token}/sendMessage"),
            chat_id,
        }
    }

    async fn send(&self, level: Level, message: &str) {
        let text = format!("[{level}] {message}");
        let form = [
            ("chat_id", self.chat_id.as_str()),
            ("text", text.as_str()),
            ("parse_mode", "markdown"),
        ];
        let result = async {
            self.client
                .post(&self.api_url)
                .form(&form)
                .send()
                .await?
                .error_for_status()?;
            Ok::<_, reqwest::Error>(())
        }
        .await;

        if let Err(e) = result {
            tracing::warn!("failed to deliver Telegram notification: {e}");
        }
    }
}
