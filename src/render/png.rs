//! PNG 棋盘：SVG 经 resvg 光栅化
//!
//! 系统字体只在构造时加载一次，之后所有渲染共享同一个字体库。

use std::sync::Arc;

use resvg::tiny_skia::{Pixmap, Transform};
use resvg::usvg::{self, fontdb};

use super::svg::SvgRenderer;
use super::{BoardRenderer, BoardView, RenderError, RenderedBoard};

pub struct PngRenderer {
    svg: SvgRenderer,
    fontdb: Arc<fontdb::Database>,
}

impl PngRenderer {
    pub fn new(svg: SvgRenderer) -> Self {
        let mut db = fontdb::Database::new();
        db.load_system_fonts();
        tracing::debug!(faces = db.len(), "font database loaded");
        if db.is_empty() {
            tracing::warn!("no system fonts found, pieces and coordinates will not be drawn");
        }
        Self {
            svg,
            fontdb: Arc::new(db),
        }
    }

    pub fn rasterize(&self, svg: &str) -> Result<Vec<u8>, RenderError> {
        let options = usvg::Options {
            fontdb: Arc::clone(&self.fontdb),
            ..Default::default()
        };
        let tree = usvg::Tree::from_str(svg, &options).map_err(|e| RenderError::Svg(e.to_string()))?;

        let size = tree.size().to_int_size();
        let mut pixmap = Pixmap::new(size.width(), size.height()).ok_or_else(|| {
            RenderError::Raster(format!(
                "cannot allocate {}x{} pixmap",
                size.width(),
                size.height()
            ))
        })?;
        resvg::render(&tree, Transform::default(), &mut pixmap.as_mut());

        pixmap
            .encode_png()
            .map_err(|e| RenderError::Raster(e.to_string()))
    }
}

impl BoardRenderer for PngRenderer {
    fn render(&self, view: &BoardView) -> Result<RenderedBoard, RenderError> {
        let svg = self.svg.render_svg(view);
        let bytes = self.rasterize(&svg)?;
        Ok(RenderedBoard {
            bytes,
            mime: "image/png",
            file_name: "chessboard.png",
        })
    }
}
