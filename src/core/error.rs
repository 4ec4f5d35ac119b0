//! 对局错误类型
//!
//! 每个错误都会作为一条用户可见的回复发回到指令来源的聊天中；不做自动重试。
//! 引擎相关错误（EngineUnavailable / EngineError）不会改变会话状态，用户可原样重试。

use thiserror::Error;

use crate::engine::EngineError;

/// 会话状态机拒绝一条指令的原因
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// 无法解析为 UCI 着法
    #[error("Invalid move format `{0}`. Use UCI format like `e2e4`.")]
    MalformedMove(String),

    /// 能解析，但在当前局面不合法
    #[error("Invalid move `{0}`. The move is not legal. Try again.")]
    IllegalMove(String),

    /// 格式正确但轮不到该方走棋
    #[error("It's not your turn yet ({turn} to move). Please wait for the other player to move.")]
    WrongTurn { turn: String },

    #[error("Please select a mode using `/play`.")]
    NoActiveMode,

    /// 人机模式下尚未选择难度
    #[error("Please choose the AI difficulty level first.")]
    DifficultyPending,

    #[error("Game over! {0}")]
    GameOver(String),

    /// 难度只对人机对局有意义
    #[error("Difficulty only applies to games against the engine.")]
    SoloGame,

    /// 未知的模式 / 难度选项
    #[error("Unknown choice `{0}`.")]
    InvalidChoice(String),

    /// 引擎可执行文件不存在或无法启动
    #[error("Chess engine unavailable: {0}. Install it (e.g. `sudo apt-get install stockfish`) or set `engine.path`.")]
    EngineUnavailable(String),

    /// 引擎已启动，但失败或返回了不可用的结果
    #[error("Error with AI move: {0}")]
    EngineError(String),
}

impl SessionError {
    /// 是否为引擎侧失败（会话保持不变，可重试）
    pub fn is_engine_failure(&self) -> bool {
        matches!(
            self,
            SessionError::EngineUnavailable(_) | SessionError::EngineError(_)
        )
    }
}

impl From<EngineError> for SessionError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::NotFound(_) | EngineError::Unavailable(_) => {
                SessionError::EngineUnavailable(err.to_string())
            }
            EngineError::Timeout(_) | EngineError::Protocol(_) | EngineError::Io(_) => {
                SessionError::EngineError(err.to_string())
            }
        }
    }
}
