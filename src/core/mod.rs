//! 核心层：错误类型、构建器与优雅关闭

pub mod builder;
pub mod error;
pub mod shutdown;

pub use builder::{BotBuilder, BotComponents};
pub use error::SessionError;
pub use shutdown::{
    run_with_graceful_shutdown, EnginePoolCleanup, ShutdownCleanup, ShutdownCoordinator,
    ShutdownManager,
};
