//! stackpilot の設定モデル
//!
//! YAML 設定ファイルを検証済みの構造体へ読み込む。ポリシーフラグの
//! デフォルトはすべてここで適用するため、エンジン側は「キーが無い場合」を
//! 一切考慮しなくてよい。name / host / accessToken だけは意図的に
//! `Option` のまま残している。欠けたインスタンスはエラーにせず、
//! エンジンがそのインスタンスだけをスキップして巡回を続けるためだ。

pub mod error;

pub use error::*;

use serde::Deserialize;
use std::collections::BTreeSet;
use std::path::Path;

/// 設定ファイル全体
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// 管理対象の Portainer インスタンス（宣言順に処理される）
    #[serde(default)]
    pub instances: Vec<InstanceConfig>,

    /// 通知の送り先。未指定ならコンソール
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// 1つの Portainer インスタンスと、その実行ポリシー
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InstanceConfig {
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub host: Option<String>,

    #[serde(default, rename = "accessToken", alias = "access_token")]
    pub access_token: Option<String>,

    #[serde(default, rename = "verifySSL", alias = "verify_ssl")]
    pub verify_ssl: bool,

    /// Portainer 本体の self-update を試みるか
    #[serde(
        default,
        rename = "updatePortainerVersion",
        alias = "update_portainer_version"
    )]
    pub update_portainer_version: bool,

    /// stack 更新後に未使用イメージを削除するか
    #[serde(default, rename = "deleteUnusedImages", alias = "delete_unused_images")]
    pub delete_unused_images: bool,

    // 歴史的事情で "purneServices" という typo キーも受け付ける
    #[serde(
        default,
        rename = "pruneServices",
        alias = "purneServices",
        alias = "prune_services"
    )]
    pub prune_services: bool,

    /// 更新対象から外す stack 名
    #[serde(default, rename = "ignoreStacks", alias = "ignore_stacks")]
    pub ignore_stacks: BTreeSet<String>,

    /// git 連携 stack も更新対象に含めるか
    #[serde(
        default,
        rename = "updateStacksWithGitIntegration",
        alias = "update_stacks_with_git_integration"
    )]
    pub update_stacks_with_git: bool,
}

impl InstanceConfig {
    /// 表示用のインスタンス名。name が無ければ宣言順の番号で呼ぶ
    pub fn display_name(&self, index: usize) -> String {
        match self.name.as_deref() {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => format!("instance #{}", index + 1),
        }
    }

    /// 必須項目 (name / host / accessToken) が揃っていれば接続情報を返す
    pub fn connection(&self) -> Option<(&str, &str)> {
        let name_ok = self.name.as_deref().is_some_and(|s| !s.is_empty());
        match (self.host.as_deref(), self.access_token.as_deref()) {
            (Some(host), Some(token)) if name_ok && !host.is_empty() && !token.is_empty() => {
                Some((host, token))
            }
            _ => None,
        }
    }
}

/// 通知シンクの設定。閉じた集合として表現する
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawLoggingConfig")]
pub enum LoggingConfig {
    #[default]
    Console,
    Discord {
        webhook_url: String,
    },
    Slack {
        webhook_url: String,
    },
    Telegram {
        bot_token: String,
        chat_id: String,
    },
}

/// `logging` セクションの生の形。type ごとの必須項目は TryFrom で検証する
#[derive(Debug, Deserialize)]
struct RawLoggingConfig {
    #[serde(default, rename = "type")]
    kind: Option<String>,

    #[serde(default, rename = "webhookUrl", alias = "webhook_url")]
    webhook_url: Option<String>,

    #[serde(default, rename = "botToken", alias = "bot_token")]
    bot_token: Option<String>,

    #[serde(default, rename = "chatId", alias = "chat_id")]
    chat_id: Option<String>,
}

impl TryFrom<RawLoggingConfig> for LoggingConfig {
    type Error = ConfigError;

    fn try_from(raw: RawLoggingConfig) -> Result<Self> {
        let kind = raw.kind.unwrap_or_default().to_lowercase();
        match kind.as_str() {
            "discord" => Ok(Self::Discord {
                webhook_url: raw.webhook_url.ok_or(ConfigError::MissingLoggerField {
                    logger: "discord",
                    field: "webhookUrl",
                })?,
            }),
            "slack" => Ok(Self::Slack {
                webhook_url: raw.webhook_url.ok_or(ConfigError::MissingLoggerField {
                    logger: "slack",
                    field: "webhookUrl",
                })?,
            }),
            "telegram" => Ok(Self::Telegram {
                bot_token: raw.bot_token.ok_or(ConfigError::MissingLoggerField {
                    logger: "telegram",
                    field: "botToken",
                })?,
                chat_id: raw.chat_id.ok_or(ConfigError::MissingLoggerField {
                    logger: "telegram",
                    field: "chatId",
                })?,
            }),
            // 未知の type はコンソールに落とす
            _ => Ok(Self::Console),
        }
    }
}

/// 設定ファイルを読み込んで検証する
pub fn load(path: &Path) -> Result<Config> {
    let raw = std::fs::read_to_string(path).map_err(|source| {
        if source.kind() == std::io::ErrorKind::NotFound {
            ConfigError::NotFound(path.to_path_buf())
        } else {
            ConfigError::Io(source)
        }
    })?;

    let config: Config = serde_yaml::from_str(&raw)?;

    if config.instances.is_empty() {
        return Err(ConfigError::NoInstances);
    }

    Ok(config)
}
