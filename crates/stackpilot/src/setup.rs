//! --init-config の実装
//!
//! 同梱のサンプル設定を指定パスへ書き出す。既存ファイルは壊さない。

use anyhow::{Context, bail};
use colored::Colorize;
use std::path::Path;

const EXAMPLE_CONFIG: &str = include_str!("../resources/example-config.yml");

pub fn init_config(path: &Path) -> anyhow::Result<()> {
    if path.exists() {
        bail!(
            "'{}' already exists, remove it before generating a new configuration",
            path.display()
        );
    }

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
        && !parent.exists()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory '{}'", parent.display()))?;
    }

    std::fs::write(path, EXAMPLE_CONFIG)
        .with_context(|| format!("failed to write '{}'", path.display()))?;

    println!(
        "{} {}",
        "configuration file created at".green(),
        path.display()
    );
    Ok(())
}
