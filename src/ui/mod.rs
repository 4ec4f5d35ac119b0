//! 本地交互层：控制台下棋（stdin / stdout）

pub mod console;

pub use console::{run_console, Console, CONSOLE_CHAT};
