//! 对局：模式、难度、事件与会话状态机

pub mod events;
pub mod mode;
pub mod session;

pub use events::{GameEvent, Mover, UiEvent};
pub use mode::{Difficulty, DifficultyChoice, GameMode};
pub use session::{color_name, san_plus, side_label, GameSession, Hint, Phase, Termination};
