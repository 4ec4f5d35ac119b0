//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `CHESSBOT__*` 覆盖（双下划线表示嵌套，如 `CHESSBOT__ENGINE__PATH=/usr/bin/stockfish`）。

use std::collections::HashMap;
use std::path::PathBuf;

use serde::Deserialize;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub app: AppSection,
    pub engine: EngineSection,
    pub render: RenderSection,
    pub telegram: TelegramSection,
    pub console: ConsoleSection,
}

/// [app] 段：会话过期与清理周期
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppSection {
    /// 会话闲置多久后丢弃（秒）
    pub session_timeout_secs: u64,
    /// 过期会话清理周期（秒）
    pub cleanup_interval_secs: u64,
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            session_timeout_secs: 24 * 3600,
            cleanup_interval_secs: 600,
        }
    }
}

/// [engine] 段：UCI 引擎可执行文件、进程池、超时余量与 UCI 选项
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineSection {
    pub path: PathBuf,
    /// 启动参数（如用解释器运行脚本引擎）
    pub args: Vec<String>,
    /// 空闲进程池上限；0 表示每次调用都新启进程、用完即关
    pub pool_size: usize,
    /// movetime 之外额外等待 bestmove 的秒数，超出视为 Timeout
    pub grace_secs: u64,
    /// 启动时下发的 `setoption`（如 Threads、Hash）
    pub options: HashMap<String, String>,
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            path: PathBuf::from("/usr/games/stockfish"),
            args: Vec::new(),
            pool_size: 1,
            grace_secs: 30,
            options: HashMap::new(),
        }
    }
}

/// 棋盘图片格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    #[default]
    Png,
    Svg,
}

/// [render] 段：棋盘尺寸、图片格式、着法记录行数
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RenderSection {
    /// 棋盘边长（像素）
    pub size: u32,
    pub format: ImageFormat,
    /// 棋盘下方最多显示的着法行数（每行一回合）
    pub max_history_lines: usize,
    pub font_family: String,
}

impl Default for RenderSection {
    fn default() -> Self {
        Self {
            size: 350,
            format: ImageFormat::Png,
            max_history_lines: 12,
            font_family: "DejaVu Sans, Noto Sans Symbols2, sans-serif".to_string(),
        }
    }
}

/// Telegram 接收更新的方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    /// getUpdates 长轮询，无需公网域名
    #[default]
    Polling,
    /// setWebhook 推送到本服务的 /webhook
    Webhook,
}

/// [telegram] 段
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TelegramSection {
    /// Bot token；未设置时读取环境变量 TELEGRAM_BOT_TOKEN
    pub token: Option<String>,
    pub base_url: String,
    pub transport: Transport,
    /// Webhook 监听端口
    pub port: u16,
    /// getUpdates 长轮询超时（秒）
    pub poll_timeout_secs: u64,
    /// setWebhook 时配置的 secret_token，用于校验请求头
    pub secret_token: Option<String>,
}

impl Default for TelegramSection {
    fn default() -> Self {
        Self {
            token: None,
            base_url: "https://api.telegram.org".to_string(),
            transport: Transport::Polling,
            port: 3002,
            poll_timeout_secs: 30,
            secret_token: None,
        }
    }
}

/// [console] 段：本地控制台把最新棋盘写到哪里
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ConsoleSection {
    pub board_path: PathBuf,
}

impl Default for ConsoleSection {
    fn default() -> Self {
        Self {
            board_path: PathBuf::from("chessboard.png"),
        }
    }
}

/// 从 config 目录加载配置，环境变量 CHESSBOT__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 CHESSBOT__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("CHESSBOT")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}
