//! 机器人构建器：控制台与 Telegram 共用的初始化逻辑
//!
//! 按配置创建会话表、UCI 引擎池与棋盘渲染器；测试时可替换引擎或渲染器。

use std::sync::Arc;

use crate::bot::{ChessBot, SessionManager};
use crate::config::AppConfig;
use crate::engine::{SearchEngine, UciEngine, UciEngineConfig};
use crate::render::{renderer_from_config, BoardRenderer};

/// 构建产物
pub struct BotComponents {
    pub bot: Arc<ChessBot>,
    pub sessions: Arc<SessionManager>,
    /// 使用外部 UCI 引擎时存在（关闭时需要回收进程池）
    pub uci_engine: Option<Arc<UciEngine>>,
}

pub struct BotBuilder {
    config: AppConfig,
    engine: Option<Arc<dyn SearchEngine>>,
    renderer: Option<Arc<dyn BoardRenderer>>,
}

impl BotBuilder {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            engine: None,
            renderer: None,
        }
    }

    /// 替换搜索引擎（默认按 [engine] 配置启动 UCI 进程）
    pub fn with_engine(mut self, engine: Arc<dyn SearchEngine>) -> Self {
        self.engine = Some(engine);
        self
    }

    /// 替换渲染器（默认按 [render] 配置）
    pub fn with_renderer(mut self, renderer: Arc<dyn BoardRenderer>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    pub fn build(self) -> BotComponents {
        let sessions = Arc::new(SessionManager::new(self.config.app.session_timeout_secs));

        let (engine, uci_engine): (Arc<dyn SearchEngine>, Option<Arc<UciEngine>>) = match self.engine {
            Some(engine) => (engine, None),
            None => {
                let uci = Arc::new(UciEngine::new(UciEngineConfig::from(&self.config.engine)));
                tracing::info!(
                    path = %self.config.engine.path.display(),
                    pool_size = self.config.engine.pool_size,
                    "UCI engine configured"
                );
                let engine: Arc<dyn SearchEngine> = uci.clone();
                (engine, Some(uci))
            }
        };

        let renderer = self
            .renderer
            .unwrap_or_else(|| renderer_from_config(&self.config.render));

        let bot = Arc::new(ChessBot::new(Arc::clone(&sessions), engine, renderer));
        BotComponents {
            bot,
            sessions,
            uci_engine,
        }
    }
}
