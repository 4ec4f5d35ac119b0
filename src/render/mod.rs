//! 棋盘渲染
//!
//! 先生成 SVG（棋盘、坐标、上一步与将军高亮、着法记录），再按配置直接输出 SVG 或光栅化为 PNG。
//! 渲染是同步 CPU 计算，调用方放进 `spawn_blocking`。

pub mod png;
pub mod svg;

use std::sync::Arc;

use shakmaty::uci::UciMove;
use shakmaty::{Chess, Color};
use thiserror::Error;

use crate::config::{ImageFormat, RenderSection};
use crate::game::GameSession;

pub use png::PngRenderer;
pub use svg::SvgRenderer;

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("invalid board svg: {0}")]
    Svg(String),

    #[error("rasterization failed: {0}")]
    Raster(String),
}

/// 渲染一张棋盘所需的全部信息（自有数据，可跨线程移动）
#[derive(Debug, Clone)]
pub struct BoardView {
    pub position: Chess,
    /// 哪一方在下方
    pub orientation: Color,
    /// 从初始局面起的全部着法
    pub history: Vec<UciMove>,
}

impl BoardView {
    pub fn new(position: Chess, orientation: Color, history: Vec<UciMove>) -> Self {
        Self {
            position,
            orientation,
            history,
        }
    }

    pub fn from_session(session: &GameSession) -> Self {
        Self::new(
            session.position().clone(),
            session.orientation(),
            session.history().to_vec(),
        )
    }

    pub fn last_move(&self) -> Option<&UciMove> {
        self.history.last()
    }
}

/// 渲染结果
#[derive(Debug, Clone)]
pub struct RenderedBoard {
    pub bytes: Vec<u8>,
    pub mime: &'static str,
    pub file_name: &'static str,
}

pub trait BoardRenderer: Send + Sync {
    fn render(&self, view: &BoardView) -> Result<RenderedBoard, RenderError>;
}

/// 按 [render] 配置构造渲染器
pub fn renderer_from_config(config: &RenderSection) -> Arc<dyn BoardRenderer> {
    let svg = SvgRenderer::from_config(config);
    match config.format {
        ImageFormat::Svg => Arc::new(svg),
        ImageFormat::Png => Arc::new(PngRenderer::new(svg)),
    }
}

/// 在阻塞线程池里渲染
pub async fn render_blocking(
    renderer: Arc<dyn BoardRenderer>,
    view: BoardView,
) -> Result<RenderedBoard, RenderError> {
    tokio::task::spawn_blocking(move || renderer.render(&view))
        .await
        .map_err(|e| RenderError::Raster(format!("render task failed: {}", e)))?
}
