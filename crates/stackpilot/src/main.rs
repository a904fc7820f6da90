mod setup;

use clap::Parser;
use colored::Colorize;
use stackpilot_core::Reconciler;
use stackpilot_notify::Notifier;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "stackpilot")]
#[command(version, about = "Keep Portainer-managed stacks on their latest images")]
struct Cli {
    /// 設定ファイルのパス
    #[arg(long, value_name = "PATH", default_value = "./config.yml")]
    config: PathBuf,

    /// サンプル設定を書き出して終了する（既存ファイルは上書きしない）
    #[arg(long)]
    init_config: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    if cli.init_config {
        return setup::init_config(&cli.config);
    }

    // 設定エラーだけが致命的。実行中の失敗は engine が内部で捕捉する
    let config = match stackpilot_config::load(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{} {e}", "configuration error:".red().bold());
            std::process::exit(1);
        }
    };

    let sink = Notifier::from_config(&config.logging);
    let reconciler = Reconciler::new(sink);
    let report = reconciler.run(&config.instances).await;

    println!();
    println!("{}", "Run summary".bold());
    println!("  instances processed: {}", report.instances_processed);
    println!("  instances failed:    {}", report.instances_failed);
    println!("  stacks updated:      {}", report.stacks_updated);
    println!("  stacks skipped:      {}", report.stacks_skipped);
    println!("  images deleted:      {}", report.images_deleted);
    if report.errors > 0 {
        println!(
            "  errors:              {}",
            report.errors.to_string().red()
        );
    }

    Ok(())
}
