use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use tokio_util::sync::CancellationToken;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use rswig::{ConfigBuilder, FingerprintStore, Scanner, DEFAULT_USER_AGENT};

#[derive(Parser, Debug, Clone)]
#[command(name = "rswig")]
#[command(version, about = "rswig - Web应用信息收集工具（CMS / 平台 / JS库 / 操作系统识别）", long_about = None)]
#[command(after_help = "警告：本工具只允许在取得授权的前提下用于渗透测试、安全审计等合法场景。")]
struct Cli {
    /// 扫描目标
    #[arg(value_name = "URL")]
    url: Option<String>,

    /// 目标列表文件（每行一个URL）
    #[arg(short = 'l', long = "list", value_name = "FILE")]
    list: Option<PathBuf>,

    /// 并发请求数
    #[arg(short = 't', long, default_value_t = 10)]
    threads: usize,

    /// 每批次的指纹组数
    #[arg(short = 'b', long = "batch-size", default_value_t = 20)]
    batch_size: usize,

    /// 识别到指定数量的CMS后停止
    #[arg(short = 's', long = "stop-after", default_value_t = 1)]
    stop_after: usize,

    /// 跑完全部CMS指纹，不提前停止
    #[arg(short = 'a', long = "run-all")]
    run_all: bool,

    /// 用全部指纹匹配缓存中的所有响应（可能产生误报）
    #[arg(short = 'm', long = "match-all")]
    match_all: bool,

    /// 代理地址，如 http://127.0.0.1:8080 或 socks5://127.0.0.1:1080
    #[arg(long)]
    proxy: Option<String>,

    #[arg(short = 'u', long = "user-agent", default_value = DEFAULT_USER_AGENT)]
    user_agent: String,

    /// 单个请求超时（秒）
    #[arg(long, default_value_t = 10)]
    timeout: u64,

    /// 不加载已保存的缓存
    #[arg(long = "no-cache-load")]
    no_cache_load: bool,

    /// 不保存本次扫描的缓存
    #[arg(long = "no-cache-save")]
    no_cache_save: bool,

    #[arg(long = "cache-dir", value_name = "DIR")]
    cache_dir: Option<PathBuf>,

    /// 指纹库目录
    #[arg(long = "data-dir", value_name = "DIR", default_value = "data")]
    data_dir: PathBuf,

    /// 目标整体重定向时不跟随，直接报错
    #[arg(long = "no-follow-redirect")]
    no_follow_redirect: bool,

    /// 将报告写入JSON文件
    #[arg(short = 'w', long = "write", value_name = "FILE")]
    write: Option<PathBuf>,

    /// 日志详细程度（-v / -vv / -vvv）
    #[arg(short = 'v', action = ArgAction::Count)]
    verbose: u8,
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn read_targets(cli: &Cli) -> Result<Vec<String>> {
    let mut targets: Vec<String> = cli.url.iter().cloned().collect();
    if let Some(list) = &cli.list {
        let content = std::fs::read_to_string(list).with_context(|| format!("读取目标列表失败：{}", list.display()))?;
        targets.extend(
            content
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty() && !line.starts_with('#'))
                .map(str::to_string),
        );
    }
    Ok(targets)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let targets = read_targets(&cli)?;
    if targets.is_empty() {
        eprintln!("未指定扫描目标（URL 或 -l 目标列表）");
        process::exit(2);
    }

    let config = ConfigBuilder::new()
        .threads(cli.threads)
        .batch_size(cli.batch_size)
        .stop_after(cli.stop_after)
        .run_all(cli.run_all)
        .match_all(cli.match_all)
        .proxy(cli.proxy.clone())
        .user_agent(cli.user_agent.clone())
        .timeout(Duration::from_secs(cli.timeout.max(1)))
        .no_cache_load(cli.no_cache_load)
        .no_cache_save(cli.no_cache_save)
        .cache_dir(cli.cache_dir.clone())
        .data_dir(cli.data_dir.clone())
        .follow_redirect(!cli.no_follow_redirect)
        .build();

    let store = Arc::new(FingerprintStore::load(&config.data_dir));

    let cancel = CancellationToken::new();
    let ctrl_c_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("收到中断信号，等待进行中的请求结束");
            ctrl_c_token.cancel();
        }
    });

    let scanner = Scanner::new(config, store).with_cancellation(cancel);
    let reports = scanner.run(&targets).await;

    let mut written = Vec::new();
    let mut failed = 0;
    for (target, result) in reports {
        match result {
            Ok(report) => {
                println!("{}", report);
                written.push(report);
            }
            Err(e) => {
                eprintln!("{}：{}", target, e);
                failed += 1;
            }
        }
    }

    if let Some(path) = &cli.write {
        let json = serde_json::to_string_pretty(&written)?;
        std::fs::write(path, json).with_context(|| format!("写入报告失败：{}", path.display()))?;
    }

    if failed > 0 && written.is_empty() {
        process::exit(1);
    }
    Ok(())
}
