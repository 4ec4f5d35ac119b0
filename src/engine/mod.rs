//! 搜索引擎抽象
//!
//! 所有后端（UCI 进程 / Mock）实现 SearchEngine：给定局面与预算，返回一步推荐着法。
//! 调用会挂起当前指令直到引擎回答或失败。

pub mod mock;
pub mod uci;

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use shakmaty::uci::UciMove;
use shakmaty::Chess;
use thiserror::Error;

pub use mock::{MockBehavior, MockEngine};
pub use uci::{UciEngine, UciEngineConfig};

/// 引擎调用失败的原因
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("engine executable not found at `{}`", .0.display())]
    NotFound(PathBuf),

    #[error("engine could not be started: {0}")]
    Unavailable(String),

    #[error("engine did not answer within {0:?}")]
    Timeout(Duration),

    #[error("engine protocol error: {0}")]
    Protocol(String),

    #[error("engine I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// 单次搜索的时间 / 棋力预算
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineBudget {
    pub movetime: Duration,
    /// UCI `Skill Level`（0-20）
    pub skill_level: u8,
}

/// 引擎给出的推荐着法
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recommendation {
    pub uci: UciMove,
    /// 引擎自报的名字（`id name`）
    pub engine: String,
}

/// 搜索引擎 trait
#[async_trait]
pub trait SearchEngine: Send + Sync {
    /// `history` 为从初始局面起的全部着法，`position` 为其结果
    async fn recommend(
        &self,
        position: &Chess,
        history: &[UciMove],
        budget: &EngineBudget,
    ) -> Result<Recommendation, EngineError>;
}
