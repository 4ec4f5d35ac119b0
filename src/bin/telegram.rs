//! Chessbot Telegram 服务
//!
//! 环境变量:
//! - TELEGRAM_BOT_TOKEN: Bot token（或 CHESSBOT__TELEGRAM__TOKEN / 配置文件 [telegram].token）
//! - CHESSBOT__TELEGRAM__TRANSPORT: polling（默认）或 webhook
//! - CHESSBOT__ENGINE__PATH: UCI 引擎路径（默认 /usr/games/stockfish）
//!
//! 启动: cargo run --bin chessbot-telegram --features telegram

#[cfg(feature = "telegram")]
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    use std::path::PathBuf;
    use std::sync::Arc;
    use std::time::Duration;

    use anyhow::Context;
    use chessbot::config::{load_config, Transport};
    use chessbot::core::{
        run_with_graceful_shutdown, BotBuilder, EnginePoolCleanup, ShutdownCoordinator,
        ShutdownManager,
    };
    use chessbot::integrations::telegram::{create_router, run_polling, TelegramApi, TelegramState};

    chessbot::observability::init();

    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = load_config(config_path).context("Failed to load config")?;

    let token = config
        .telegram
        .token
        .clone()
        .or_else(|| std::env::var("TELEGRAM_BOT_TOKEN").ok())
        .filter(|t| !t.trim().is_empty());
    let Some(token) = token else {
        eprintln!("Error: TELEGRAM_BOT_TOKEN environment variable not set.");
        std::process::exit(1);
    };

    let components = BotBuilder::new(config.clone()).build();
    let state = Arc::new(TelegramState {
        bot: Arc::clone(&components.bot),
        api: TelegramApi::new(&config.telegram.base_url, &token),
        secret_token: config.telegram.secret_token.clone(),
    });

    let shutdown = Arc::new(ShutdownManager::new());
    let mut coordinator = ShutdownCoordinator::new();
    if let Some(engine) = components.uci_engine.clone() {
        coordinator.register(EnginePoolCleanup::new(engine));
    }

    // 定期清理闲置会话
    {
        let sessions = Arc::clone(&components.sessions);
        let cancel = shutdown.token();
        let every = Duration::from_secs(config.app.cleanup_interval_secs.max(1));
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        sessions.cleanup_expired().await;
                    }
                }
            }
        });
    }

    let cancel = shutdown.token();
    let telegram = config.telegram.clone();
    let app = async move {
        match telegram.transport {
            Transport::Polling => {
                tracing::info!("Chessbot Telegram bot running (long polling)");
                run_polling(state, telegram.poll_timeout_secs, cancel).await;
            }
            Transport::Webhook => {
                let addr = std::net::SocketAddr::from(([0, 0, 0, 0], telegram.port));
                let listener = match tokio::net::TcpListener::bind(addr).await {
                    Ok(listener) => listener,
                    Err(e) => {
                        tracing::error!("Failed to bind {}: {}", addr, e);
                        return;
                    }
                };
                tracing::info!("Chessbot Telegram webhook listening on http://{}", addr);
                tracing::info!("Webhook URL: https://YOUR_HOST/webhook (port {})", telegram.port);

                let served = axum::serve(listener, create_router(state))
                    .with_graceful_shutdown(async move { cancel.cancelled().await })
                    .await;
                if let Err(e) = served {
                    tracing::error!("Webhook server error: {}", e);
                }
            }
        }
    };

    run_with_graceful_shutdown(shutdown, app, || async move {
        coordinator.run_cleanup().await;
    })
    .await;

    Ok(())
}

#[cfg(not(feature = "telegram"))]
fn main() {
    eprintln!("请使用 --features telegram 编译: cargo run --bin chessbot-telegram --features telegram");
    std::process::exit(1);
}
