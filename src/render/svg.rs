//! SVG 棋盘
//!
//! 棋子用 Unicode 棋子字形绘制（白子为白色填充加黑描边），不依赖图片素材。

use shakmaty::uci::UciMove;
use shakmaty::{Chess, Color, File, Position, Rank, Role, Square};

use super::{BoardRenderer, BoardView, RenderError, RenderedBoard};
use crate::config::RenderSection;
use crate::game::san_plus;

const LIGHT_SQUARE: &str = "#f0d9b5";
const DARK_SQUARE: &str = "#b58863";
const BACKGROUND: &str = "#312e2b";
const TEXT: &str = "#e8e6e3";
const LAST_MOVE: &str = "#cdd26a";
const CHECK: &str = "#e04040";

#[derive(Debug, Clone)]
pub struct SvgRenderer {
    size: u32,
    max_history_lines: usize,
    font_family: String,
}

impl SvgRenderer {
    pub fn new(size: u32, max_history_lines: usize, font_family: impl Into<String>) -> Self {
        Self {
            size: size.max(80),
            max_history_lines,
            font_family: font_family.into(),
        }
    }

    pub fn from_config(config: &RenderSection) -> Self {
        Self::new(config.size, config.max_history_lines, config.font_family.clone())
    }

    pub fn render_svg(&self, view: &BoardView) -> String {
        let board = self.size as f32;
        let sq = board / 8.0;
        let margin = (sq * 0.45).round();
        let line_height = (sq * 0.4).round();

        let lines = move_lines(&view.history, self.max_history_lines);
        let history_height = if lines.is_empty() {
            0.0
        } else {
            lines.len() as f32 * line_height + margin * 0.5
        };
        let width = board + margin * 2.0;
        let height = board + margin * 2.0 + history_height;

        let mut out = String::with_capacity(16 * 1024);
        out.push_str(&format!(
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#,
            w = width,
            h = height
        ));
        out.push_str(&format!(
            r#"<rect width="{}" height="{}" fill="{}"/>"#,
            width, height, BACKGROUND
        ));

        let highlighted = last_move_squares(view.last_move());
        let checked_king = if view.position.is_check() {
            view.position.board().king_of(view.position.turn())
        } else {
            None
        };

        for row in 0..8 {
            for col in 0..8 {
                let (fi, ri) = match view.orientation {
                    Color::White => (col, 7 - row),
                    Color::Black => (7 - col, row),
                };
                let square = Square::from_coords(File::ALL[fi], Rank::ALL[ri]);
                let x = margin + col as f32 * sq;
                let y = margin + row as f32 * sq;
                let fill = if (fi + ri) % 2 == 1 {
                    LIGHT_SQUARE
                } else {
                    DARK_SQUARE
                };
                out.push_str(&format!(
                    r#"<rect x="{}" y="{}" width="{}" height="{}" fill="{}"/>"#,
                    x, y, sq, sq, fill
                ));

                if highlighted.contains(&square) {
                    out.push_str(&format!(
                        r#"<rect class="last-move" x="{}" y="{}" width="{}" height="{}" fill="{}" fill-opacity="0.7"/>"#,
                        x, y, sq, sq, LAST_MOVE
                    ));
                }
                if checked_king == Some(square) {
                    out.push_str(&format!(
                        r#"<circle class="check" cx="{}" cy="{}" r="{}" fill="{}" fill-opacity="0.65"/>"#,
                        x + sq / 2.0,
                        y + sq / 2.0,
                        sq * 0.45,
                        CHECK
                    ));
                }

                if let Some(piece) = view.position.board().piece_at(square) {
                    let (fill, stroke) = match piece.color {
                        Color::White => ("#ffffff", "#000000"),
                        Color::Black => ("#000000", "#000000"),
                    };
                    out.push_str(&format!(
                        r#"<text class="piece" x="{}" y="{}" font-size="{}" font-family="{}" text-anchor="middle" fill="{}" stroke="{}" stroke-width="{}">{}</text>"#,
                        x + sq / 2.0,
                        y + sq * 0.8,
                        (sq * 0.82).round(),
                        self.font_family,
                        fill,
                        stroke,
                        (sq / 40.0).max(0.8),
                        glyph(piece.role)
                    ));
                }
            }
        }

        self.push_coordinates(&mut out, view.orientation, margin, sq);

        let font_size = (line_height * 0.75).round();
        for (i, line) in lines.iter().enumerate() {
            out.push_str(&format!(
                r#"<text class="history" x="{}" y="{}" font-size="{}" font-family="{}" fill="{}">{}</text>"#,
                margin,
                board + margin * 2.0 + (i as f32 + 0.8) * line_height,
                font_size,
                self.font_family,
                TEXT,
                line
            ));
        }

        out.push_str("</svg>");
        out
    }

    fn push_coordinates(&self, out: &mut String, orientation: Color, margin: f32, sq: f32) {
        let font_size = (margin * 0.55).round();
        for i in 0..8 {
            let (file, rank) = match orientation {
                Color::White => (File::ALL[i], Rank::ALL[7 - i]),
                Color::Black => (File::ALL[7 - i], Rank::ALL[i]),
            };
            out.push_str(&format!(
                r#"<text class="coord" x="{}" y="{}" font-size="{}" font-family="{}" text-anchor="middle" fill="{}">{}</text>"#,
                margin + (i as f32 + 0.5) * sq,
                margin + 8.0 * sq + margin * 0.7,
                font_size,
                self.font_family,
                TEXT,
                file.char()
            ));
            out.push_str(&format!(
                r#"<text class="coord" x="{}" y="{}" font-size="{}" font-family="{}" text-anchor="middle" fill="{}">{}</text>"#,
                margin / 2.0,
                margin + (i as f32 + 0.6) * sq,
                font_size,
                self.font_family,
                TEXT,
                rank.char()
            ));
        }
    }
}

impl BoardRenderer for SvgRenderer {
    fn render(&self, view: &BoardView) -> Result<RenderedBoard, RenderError> {
        Ok(RenderedBoard {
            bytes: self.render_svg(view).into_bytes(),
            mime: "image/svg+xml",
            file_name: "chessboard.svg",
        })
    }
}

fn glyph(role: Role) -> char {
    match role {
        Role::King => '♚',
        Role::Queen => '♛',
        Role::Rook => '♜',
        Role::Bishop => '♝',
        Role::Knight => '♞',
        Role::Pawn => '♟',
    }
}

fn last_move_squares(last: Option<&UciMove>) -> Vec<Square> {
    match last {
        Some(UciMove::Normal { from, to, .. }) => vec![*from, *to],
        Some(UciMove::Put { to, .. }) => vec![*to],
        _ => Vec::new(),
    }
}

/// 着法记录：每回合一行（`1. e4 e5`），只保留最后 `max_lines` 行。
/// 重放失败（记录与规则库不一致）时停在该处
fn move_lines(history: &[UciMove], max_lines: usize) -> Vec<String> {
    let mut position = Chess::default();
    let mut lines: Vec<String> = Vec::new();
    for (ply, uci) in history.iter().enumerate() {
        let Ok(m) = uci.to_move(&position) else {
            break;
        };
        let san = san_plus(&position, &m);
        position.play_unchecked(&m);
        if ply % 2 == 0 {
            lines.push(format!("{}. {}", ply / 2 + 1, san));
        } else if let Some(line) = lines.last_mut() {
            line.push(' ');
            line.push_str(&san);
        }
    }
    let skip = lines.len().saturating_sub(max_lines);
    lines.split_off(skip)
}
