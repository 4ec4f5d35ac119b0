//! 指令层：聊天消息 / 按钮 → 会话状态机 → 回复（与具体平台无关）

pub mod command;
pub mod handler;
pub mod sessions;

pub use command::{parse_command, BotCommand};
pub use handler::{difficulty_buttons, mode_buttons, Button, ChessBot, Reply, GUIDE_TEXT};
pub use sessions::{ChatId, ChatSession, SessionManager, SharedChatSession};
