//! 对局事件：状态机每次迁移产出的事件序列，由指令层转成回复（文字 + 棋盘图 + 按钮）

use std::fmt;
use std::str::FromStr;

use shakmaty::uci::UciMove;
use shakmaty::{Color, Outcome};

use super::mode::{Difficulty, DifficultyChoice, GameMode};
use crate::core::SessionError;

/// 谁走的这一步
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mover {
    Human,
    /// 引擎自报的名字
    Engine(String),
}

/// 状态机产出的事件
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameEvent {
    /// 新对局开始（棋盘已重置）
    GameStarted {
        mode: GameMode,
        human_color: Option<Color>,
    },
    /// 人机模式：等待选择难度
    AwaitingDifficulty,
    DifficultySet {
        difficulty: Difficulty,
        /// 由「随机」选项得出
        randomized: bool,
    },
    /// 一步棋已落子
    MovePlayed { by: Mover, uci: UciMove, san: String },
    /// 轮到引擎但调用失败；会话仍在等引擎走棋，可用 /ai 重试
    EngineFailed(SessionError),
    /// 等待人类走棋
    AwaitingMove { turn: Color, mode: GameMode },
    /// 终局
    GameOver { outcome: Outcome, reason: String },
}

/// 按钮交互产生的类型化事件（按钮 id 即 callback data）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiEvent {
    ModeChosen(GameMode),
    DifficultyChosen(DifficultyChoice),
}

impl UiEvent {
    /// 作为按钮 id 的字符串，如 `mode:solo`、`difficulty:random`
    pub fn callback_data(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for UiEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UiEvent::ModeChosen(mode) => write!(f, "mode:{}", mode.as_str()),
            UiEvent::DifficultyChosen(choice) => write!(f, "difficulty:{}", choice.as_str()),
        }
    }
}

impl FromStr for UiEvent {
    type Err = SessionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, value) = s
            .split_once(':')
            .ok_or_else(|| SessionError::InvalidChoice(s.to_string()))?;
        match kind {
            "mode" => value.parse().map(UiEvent::ModeChosen),
            "difficulty" => value.parse().map(UiEvent::DifficultyChosen),
            _ => Err(SessionError::InvalidChoice(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_callback_data_parses_back() {
        let events = [
            UiEvent::ModeChosen(GameMode::Solo),
            UiEvent::ModeChosen(GameMode::VsEngine),
            UiEvent::DifficultyChosen(DifficultyChoice::Random),
            UiEvent::DifficultyChosen(DifficultyChoice::Tier(Difficulty::Peaceful)),
        ];
        for event in events {
            assert_eq!(event.callback_data().parse::<UiEvent>().unwrap(), event);
        }
        assert_eq!(UiEvent::ModeChosen(GameMode::VsEngine).callback_data(), "mode:ai");
    }

    #[test]
    fn test_unknown_callback_data() {
        assert!("resign".parse::<UiEvent>().is_err());
        assert!("color:white".parse::<UiEvent>().is_err());
        assert!("difficulty:extreme".parse::<UiEvent>().is_err());
    }
}
