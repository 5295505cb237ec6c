//! 应用程序入口 (Application Entrypoint)
//!
//! 负责 CLI 指令解析、遥测层初始化、依赖装配及取消信号处理。

use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use novel_spider::core::config::AppConfig;
use novel_spider::engine::ScraperService;
use novel_spider::network::FetchEngine;
use novel_spider::sites::{self, ScraperRegistry};

/// 命令行界面脚手架 (CLI Scaffolding)
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 抓取书籍元数据
    Info {
        /// 站点名称 (精确匹配)
        #[arg(short, long)]
        source: String,
        /// 书籍页面地址
        #[arg(short, long)]
        url: String,
    },
    /// 抓取章节目录
    Chapters {
        #[arg(short, long)]
        source: String,
        #[arg(short, long)]
        url: String,
    },
    /// 抓取单章正文
    Content {
        #[arg(short, long)]
        source: String,
        /// 章节页面地址
        #[arg(short, long)]
        url: String,
        #[arg(long, default_value = "-")]
        novel_id: String,
        #[arg(long, default_value_t = 0)]
        chapter: u32,
    },
    /// 列出已注册的站点
    Sources,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 遥测层初始化 (Telemetry Layer Initialization)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let config = AppConfig::load().context("failed to load configuration")?;

    let registry = sites::init_global(ScraperRegistry::from_catalog(
        config.catalog(),
        config.fetch.min_chapter_warning,
    ));

    if let Commands::Sources = cli.command {
        let sources: Vec<_> = registry.sources().collect();
        return print_json(&sources);
    }

    let engine = Arc::new(FetchEngine::new(&config).context("failed to build HTTP client")?);
    let service = ScraperService::new(registry, engine);

    // 信号处理与优雅退出 (Signal Handling)
    let shutdown = CancellationToken::new();
    let token = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            token.cancel();
        }
    });

    tokio::select! {
        _ = shutdown.cancelled() => {
            // 流水线 future 已被丢弃，浏览器会话随之回收
            tracing::warn!("收到中断信号，已取消当前任务");
            tokio::time::sleep(std::time::Duration::from_millis(300)).await;
            Ok(())
        }
        result = run(&service, cli.command) => result,
    }
}

async fn run(service: &ScraperService, command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Info { source, url } => {
            let info = service
                .scrape_novel_info(&url, &source)
                .await
                .map_err(|e| anyhow::anyhow!(e.cause_chain()))?;
            print_json(&info)
        }
        Commands::Chapters { source, url } => {
            let chapters = service
                .scrape_chapters_for_novel(&url, &source)
                .await
                .map_err(|e| anyhow::anyhow!(e.cause_chain()))?;
            print_json(&chapters)
        }
        Commands::Content {
            source,
            url,
            novel_id,
            chapter,
        } => {
            let text = service
                .scrape_chapter_content(&url, &source, &novel_id, chapter)
                .await
                .map_err(|e| anyhow::anyhow!(e.cause_chain()))?;
            print_json(&serde_json::json!({
                "novel_id": novel_id,
                "chapter_number": chapter,
                "url": url,
                "content": text,
            }))
        }
        Commands::Sources => Ok(()),
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
