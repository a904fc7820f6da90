use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error(
        "設定ファイルが見つかりません: {0}\n--config でパスを指定するか、--init-config でサンプル設定を生成してください"
    )]
    NotFound(PathBuf),

    #[error("設定ファイルに instances が1件も定義されていません")]
    NoInstances,

    #[error("{logger} logger には '{field}' の設定が必要です")]
    MissingLoggerField {
        logger: &'static str,
        field: &'static str,
    },

    #[error("設定ファイルを解析できません: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("IO エラー: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
