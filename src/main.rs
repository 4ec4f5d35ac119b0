//! Chessbot 本地控制台
//!
//! 在终端里用同一套指令下棋，棋盘图写到 `console.board_path`。
//!
//! 配置：`config/default.toml`（可选）+ `CHESSBOT__*` 环境变量，
//! 或通过第一个命令行参数指定配置文件。

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use chessbot::config::load_config;
use chessbot::core::{BotBuilder, EnginePoolCleanup, ShutdownCoordinator, ShutdownManager};
use chessbot::ui::{run_console, Console};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 日志写 stderr，默认 warn，可通过 RUST_LOG 覆盖
    chessbot::observability::init_stderr();

    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = load_config(config_path).context("Failed to load config")?;
    let board_path = config.console.board_path.clone();

    let components = BotBuilder::new(config).build();
    let console = Console::new(Arc::clone(&components.bot), board_path);

    let shutdown = Arc::new(ShutdownManager::new());
    shutdown.install_signal_handlers();

    let result = run_console(console, shutdown.token()).await;

    let mut coordinator = ShutdownCoordinator::new();
    if let Some(engine) = components.uci_engine.clone() {
        coordinator.register(EnginePoolCleanup::new(engine));
    }
    coordinator.run_cleanup().await;
    result.context("Console run failed")?;

    // stdin 读取占着阻塞线程，被信号打断时直接退出，不等下一行输入
    if shutdown.is_shutdown() {
        std::process::exit(0);
    }
    Ok(())
}
