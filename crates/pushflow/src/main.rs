mod console;

use anyhow::Context;
use clap::{Parser, Subcommand};
use colored::Colorize;
use console::ConsoleSink;
use pushflow_build::{BuildError, DEFAULT_TOOL, ImagePublisher};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "pushflow")]
#[command(about = "コンテナイメージをビルドしてレジストリにプッシュする", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// pushflow.yaml に従ってイメージをビルド＆プッシュ
    Build {
        /// 設定ファイル（省略時は自動検索）
        #[arg(short, long)]
        file: Option<PathBuf>,
        /// ビルドのみ行い、タグ付け・プッシュはしない
        #[arg(long)]
        dry_run: bool,
        /// プッシュをスキップ
        #[arg(long)]
        skip_push: bool,
        /// ビルドツール（docker 互換 CLI）
        #[arg(long, env = "PUSHFLOW_TOOL")]
        tool: Option<String>,
    },
    /// リポジトリURLにタグが含まれていないか検証
    CheckUrl {
        /// 例: registry.example.com:5000/team/app
        url: String,
    },
    /// バージョン情報を表示
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    match cli.command {
        Commands::Build {
            file,
            dry_run,
            skip_push,
            tool,
        } => handle_build(file, dry_run, skip_push, tool).await,
        Commands::CheckUrl { url } => {
            if let Err(e) = pushflow_build::check_repository_url(&url) {
                exit_with(&e);
            }
            println!("{} {}", "✓".green(), url);
            Ok(())
        }
        Commands::Version => {
            println!("pushflow {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

async fn handle_build(
    file: Option<PathBuf>,
    dry_run: bool,
    skip_push: bool,
    tool: Option<String>,
) -> anyhow::Result<()> {
    let path = match file {
        Some(path) => path,
        None => pushflow_config::find_config_file()?,
    };
    tracing::debug!("using config file {}", path.display());

    let definition = pushflow_config::load_definition(&path)
        .with_context(|| format!("設定ファイルの読み込みに失敗しました: {}", path.display()))?;
    let tool = tool
        .or_else(|| definition.tool.clone())
        .unwrap_or_else(|| DEFAULT_TOOL.to_string());
    let request = definition.into_request()?;
    let skip_push = skip_push || request.skip_push;
    let request = request.skip_push(skip_push);

    let sink = Arc::new(ConsoleSink::new(&request.image_name));
    let publisher = ImagePublisher::builder()
        .sink(sink.clone())
        .tool(tool)
        .dry_run(dry_run)
        .build();

    let result = publisher.publish(request).await;
    sink.finish();
    match result {
        Ok(unique_name) => {
            println!("{}", unique_name);
            Ok(())
        }
        Err(e) => exit_with(&e),
    }
}

fn exit_with(error: &BuildError) -> ! {
    eprintln!("{} {}", "Error:".red().bold(), error.user_message());
    std::process::exit(1);
}
