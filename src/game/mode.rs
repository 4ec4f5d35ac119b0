//! 对局模式与难度
//!
//! 难度按引擎预算单调递增：
//!
//! | 难度     | movetime | Skill Level |
//! |----------|----------|-------------|
//! | peaceful | 1s       | 0           |
//! | easy     | 2s       | 5           |
//! | normal   | 5s       | 10          |
//! | hard     | 10s      | 15          |
//! | hardcore | 20s      | 20          |

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use rand::seq::SliceRandom;
use rand::Rng;

use crate::core::SessionError;
use crate::engine::EngineBudget;

/// 对局模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GameMode {
    /// 双方都是人，严格交替
    Solo,
    /// 人机对弈，人执随机颜色
    VsEngine,
}

impl GameMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            GameMode::Solo => "solo",
            GameMode::VsEngine => "ai",
        }
    }
}

impl fmt::Display for GameMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GameMode {
    type Err = SessionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "solo" | "1v1" | "1v1/solo" => Ok(GameMode::Solo),
            "ai" | "engine" | "bot" => Ok(GameMode::VsEngine),
            _ => Err(SessionError::InvalidChoice(s.to_string())),
        }
    }
}

/// 引擎难度
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum Difficulty {
    Peaceful,
    Easy,
    #[default]
    Normal,
    Hard,
    Hardcore,
}

impl Difficulty {
    pub const ALL: [Difficulty; 5] = [
        Difficulty::Peaceful,
        Difficulty::Easy,
        Difficulty::Normal,
        Difficulty::Hard,
        Difficulty::Hardcore,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Peaceful => "peaceful",
            Difficulty::Easy => "easy",
            Difficulty::Normal => "normal",
            Difficulty::Hard => "hard",
            Difficulty::Hardcore => "hardcore",
        }
    }

    /// 按钮上显示的名字
    pub fn label(&self) -> &'static str {
        match self {
            Difficulty::Peaceful => "Peaceful",
            Difficulty::Easy => "Easy",
            Difficulty::Normal => "Normal",
            Difficulty::Hard => "Hard",
            Difficulty::Hardcore => "Hardcore",
        }
    }

    pub fn budget(&self) -> EngineBudget {
        let (secs, skill_level) = match self {
            Difficulty::Peaceful => (1, 0),
            Difficulty::Easy => (2, 5),
            Difficulty::Normal => (5, 10),
            Difficulty::Hard => (10, 15),
            Difficulty::Hardcore => (20, 20),
        };
        EngineBudget {
            movetime: Duration::from_secs(secs),
            skill_level,
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Difficulty {
    type Err = SessionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        Difficulty::ALL
            .into_iter()
            .find(|d| d.as_str() == lower)
            .ok_or_else(|| SessionError::InvalidChoice(s.to_string()))
    }
}

/// 用户的难度选择：具体档位，或「随机」
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DifficultyChoice {
    Tier(Difficulty),
    Random,
}

impl DifficultyChoice {
    /// 在选择时刻确定档位；随机只掷一次。返回 (档位, 是否随机得出)
    pub fn resolve<R: Rng + ?Sized>(self, rng: &mut R) -> (Difficulty, bool) {
        match self {
            DifficultyChoice::Tier(d) => (d, false),
            DifficultyChoice::Random => {
                let d = Difficulty::ALL
                    .choose(rng)
                    .copied()
                    .unwrap_or_default();
                (d, true)
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DifficultyChoice::Tier(d) => d.as_str(),
            DifficultyChoice::Random => "random",
        }
    }
}

impl FromStr for DifficultyChoice {
    type Err = SessionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("random") {
            return Ok(DifficultyChoice::Random);
        }
        s.parse().map(DifficultyChoice::Tier)
    }
}
