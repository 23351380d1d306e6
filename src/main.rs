use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use kingdom_auth::config::{self, Config};
use kingdom_auth::popup::{AppWindowPopup, PopupController, SystemBrowserPopup};
use kingdom_auth::transport::ReqwestTransport;
use kingdom_auth::{AuthError, SessionManager};

/// Kingdom Auth 命令行客户端
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// 配置文件路径
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Auth 服务地址（覆盖配置文件和环境变量）
    #[arg(long)]
    base_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// 列出可用的身份 Provider
    Providers,

    /// 通过登录窗口登录
    Login {
        provider: String,

        /// 登录后保持运行并输出每次 Token 变化
        #[arg(long)]
        watch: bool,
    },

    /// 输出当前 Token
    Token,

    /// 登出
    Logout,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logger()?;

    let args = Args::parse();
    let config = load_config(&args)?;

    if config.is_placeholder() {
        tracing::warn!(
            "⚠️ 使用默认地址 {}，可通过 --base-url 或 {} 指定",
            config.server.base_url,
            config::BASE_URL_ENV
        );
    }

    let manager = build_manager(&config)?;

    match args.command {
        Command::Providers => {
            let providers = explain(
                manager.try_list_providers().await,
                "加载 Provider 列表失败",
                &manager,
            )?;
            if providers.is_empty() {
                println!("(无可用 Provider)");
            }
            for provider in providers {
                println!("{}", provider);
            }
        }
        Command::Login { provider, watch } => {
            explain(
                manager.authenticate(&provider).await,
                &format!("登录 {} 失败", provider),
                &manager,
            )?;

            match manager.get_token().await {
                Some(_) => println!(
                    "已登录: {} (Token 有效至 {})",
                    manager.email().unwrap_or_default(),
                    manager.expiry()
                ),
                None => anyhow::bail!("登录窗口已关闭，但未获得 Token（可能已取消登录）"),
            }

            if watch {
                watch_token(&manager).await?;
            }
        }
        Command::Token => match manager.get_token().await {
            Some(token) => println!("{}", token),
            None => anyhow::bail!("当前没有有效的 Token"),
        },
        Command::Logout => {
            explain(manager.logout().await, "登出失败", &manager)?;
            println!("已登出");
        }
    }

    Ok(())
}

/// 附加失败说明；网络类错误提示检查服务地址
fn explain<T>(result: Result<T, AuthError>, action: &str, manager: &SessionManager) -> Result<T> {
    result.map_err(|e| {
        let message = if e.is_network() {
            format!("{}（请确认 Auth 服务 {} 可访问）", action, manager.base_url())
        } else {
            action.to_string()
        };
        anyhow::Error::new(e).context(message)
    })
}

fn load_config(args: &Args) -> Result<Config> {
    let mut config = match &args.config {
        Some(path) => config::load_from(path)?,
        None => config::load()?,
    };

    config.apply_env_overrides();
    if let Some(base_url) = &args.base_url {
        config.server.base_url = base_url.clone();
    }

    Ok(config)
}

fn build_manager(config: &Config) -> Result<SessionManager> {
    let transport = Arc::new(ReqwestTransport::new().context("初始化 HTTP 客户端失败")?);

    let popup: Arc<dyn PopupController> = match &config.popup.browser {
        Some(browser) => {
            tracing::debug!("登录窗口使用应用窗口模式: {}", browser);
            Arc::new(AppWindowPopup::new(browser).with_args(config.popup.browser_args.clone()))
        }
        None => Arc::new(SystemBrowserPopup::new()),
    };

    let manager = SessionManager::builder(config.server.base_url.clone(), transport, popup)
        .options(config.session_options()?)
        .build();

    tracing::info!("Auth 服务: {}", manager.base_url());
    Ok(manager)
}

/// 输出 Token 变化，直到 Ctrl+C 或会话结束
async fn watch_token(manager: &SessionManager) -> Result<()> {
    let mut rx = manager.subscribe();
    tracing::info!("监听 Token 变化，按 Ctrl+C 退出");

    loop {
        tokio::select! {
            changed = rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let token = rx.borrow_and_update().clone();
                match token {
                    Some(_) => tracing::info!("🔄 Token 已续期，有效至 {}", manager.expiry()),
                    None => {
                        tracing::warn!("⚠️ 会话已失效");
                        break;
                    }
                }
            }
            signal = tokio::signal::ctrl_c() => {
                signal.context("监听 Ctrl+C 失败")?;
                tracing::info!("收到 Ctrl+C，退出");
                break;
            }
        }
    }

    Ok(())
}

/// 初始化日志系统
fn init_logger() -> Result<()> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "kingdom_auth=debug,info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    Ok(())
}
