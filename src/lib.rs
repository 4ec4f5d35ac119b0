//! Chessbot - 聊天平台国际象棋机器人
//!
//! 模块划分：
//! - **bot**: 指令解析、按聊天划分的会话表、指令处理与回复
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 错误类型、构建器、优雅关闭
//! - **engine**: 搜索引擎抽象（UCI 进程池 / Mock）
//! - **game**: 模式、难度、事件与对局状态机
//! - **integrations**: 聊天平台接入（Telegram）
//! - **observability**: tracing 日志初始化
//! - **render**: 棋盘渲染（SVG / PNG）
//! - **ui**: 本地控制台

pub mod bot;
pub mod config;
pub mod core;
pub mod engine;
pub mod game;
pub mod integrations;
pub mod observability;
pub mod render;
pub mod ui;

pub use bot::ChessBot;
pub use game::{GameMode, GameSession};
