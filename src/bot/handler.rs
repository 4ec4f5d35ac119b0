//! 指令处理：文本指令 / 按钮 → 会话状态机 → 回复
//!
//! 每条指令在整个处理期间持有所属聊天的会话锁（含引擎调用与渲染）。
//! 所有错误都转成同一聊天里的一条文字回复，不重试。

use std::sync::Arc;

use super::command::{parse_command, BotCommand};
use super::sessions::SessionManager;
use crate::core::SessionError;
use crate::engine::SearchEngine;
use crate::game::{
    color_name, side_label, Difficulty, DifficultyChoice, GameEvent, GameMode, GameSession,
    Mover, Phase, UiEvent,
};
use crate::render::{render_blocking, BoardRenderer, BoardView, RenderedBoard};

pub const GUIDE_TEXT: &str = "Here are the available commands:\n\
`/play` - Choose a game mode with buttons.\n\
`/mode <solo|ai>` - Select the game mode directly.\n\
`/start` - Start a new chess game in the current mode.\n\
`/difficulty <peaceful|easy|normal|hard|hardcore|random>` - Set the AI difficulty.\n\
`/move <e2e4>` - Make a move using UCI format.\n\
`/ai` - Let the AI make a move.\n\
`/hint` - Get a hint for the next best move.\n\
`/board` - Show the current board.\n\
`/exit` - Exit the game.";

const MOVE_USAGE: &str = "Usage: `/move <move>`, e.g. `/move e2e4`.";

/// 回复上的按钮；`data` 即按钮 id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Button {
    pub label: String,
    pub data: String,
}

impl Button {
    pub fn new(label: impl Into<String>, event: UiEvent) -> Self {
        Self {
            label: label.into(),
            data: event.callback_data(),
        }
    }
}

/// 一条回复：文字，可附棋盘图与按钮
#[derive(Debug, Clone)]
pub struct Reply {
    pub text: String,
    pub image: Option<RenderedBoard>,
    pub buttons: Vec<Button>,
}

impl Reply {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            image: None,
            buttons: Vec::new(),
        }
    }

    pub fn with_buttons(mut self, buttons: Vec<Button>) -> Self {
        self.buttons = buttons;
        self
    }

    pub fn with_image(mut self, image: RenderedBoard) -> Self {
        self.image = Some(image);
        self
    }
}

pub fn mode_buttons() -> Vec<Button> {
    vec![
        Button::new("1v1/Solo", UiEvent::ModeChosen(GameMode::Solo)),
        Button::new("AI", UiEvent::ModeChosen(GameMode::VsEngine)),
    ]
}

pub fn difficulty_buttons() -> Vec<Button> {
    Difficulty::ALL
        .iter()
        .map(|d| Button::new(d.label(), UiEvent::DifficultyChosen(DifficultyChoice::Tier(*d))))
        .chain(std::iter::once(Button::new(
            "Random",
            UiEvent::DifficultyChosen(DifficultyChoice::Random),
        )))
        .collect()
}

/// 机器人本体：会话表 + 引擎 + 渲染器，各平台共用
pub struct ChessBot {
    sessions: Arc<SessionManager>,
    engine: Arc<dyn SearchEngine>,
    renderer: Arc<dyn BoardRenderer>,
}

impl ChessBot {
    pub fn new(
        sessions: Arc<SessionManager>,
        engine: Arc<dyn SearchEngine>,
        renderer: Arc<dyn BoardRenderer>,
    ) -> Self {
        Self {
            sessions,
            engine,
            renderer,
        }
    }

    pub fn sessions(&self) -> &Arc<SessionManager> {
        &self.sessions
    }

    /// 处理一条聊天消息；不是指令时返回空
    pub async fn handle_text(&self, chat_id: &str, text: &str) -> Vec<Reply> {
        match parse_command(text) {
            Some(command) => self.handle_command(chat_id, command).await,
            None => Vec::new(),
        }
    }

    /// 处理按钮点击（`data` 为按钮 id）
    pub async fn handle_button(&self, chat_id: &str, data: &str) -> Vec<Reply> {
        match data.parse::<UiEvent>() {
            Ok(event) => self.handle_ui_event(chat_id, event).await,
            Err(e) => {
                tracing::warn!(chat = %chat_id, data = %data, "unknown button id");
                vec![Reply::text(e.to_string())]
            }
        }
    }

    pub async fn handle_ui_event(&self, chat_id: &str, event: UiEvent) -> Vec<Reply> {
        tracing::info!(chat = %chat_id, event = %event, "button pressed");
        let session = self.sessions.get_or_create(chat_id).await;
        let mut session = session.lock().await;
        session.touch();
        let game = &mut session.game;

        let result = match event {
            UiEvent::ModeChosen(mode) => Ok(game.select_mode(mode)),
            UiEvent::DifficultyChosen(choice) => {
                game.select_difficulty(choice, self.engine.as_ref()).await
            }
        };
        self.finish(chat_id, game, result).await
    }

    pub async fn handle_command(&self, chat_id: &str, command: BotCommand) -> Vec<Reply> {
        tracing::info!(chat = %chat_id, command = ?command, "command received");

        // 不涉及会话状态的指令
        match &command {
            BotCommand::Guide => return vec![Reply::text(GUIDE_TEXT)],
            BotCommand::Play | BotCommand::Mode(None) => {
                return vec![Reply::text("Choose a game mode:").with_buttons(mode_buttons())]
            }
            BotCommand::Move(None) => return vec![Reply::text(MOVE_USAGE)],
            _ => {}
        }

        let session = self.sessions.get_or_create(chat_id).await;
        let mut session = session.lock().await;
        session.touch();
        let game = &mut session.game;
        let engine = self.engine.as_ref();

        let result = match command {
            BotCommand::Mode(Some(arg)) => match arg.parse::<GameMode>() {
                Ok(mode) => Ok(game.select_mode(mode)),
                Err(_) => return vec![Reply::text("Invalid mode. Choose `solo` or `ai`.")],
            },
            BotCommand::Start => game.restart(),
            BotCommand::Difficulty(None) => {
                return match game.mode() {
                    None => vec![Reply::text(SessionError::NoActiveMode.to_string())],
                    Some(GameMode::Solo) => vec![Reply::text(SessionError::SoloGame.to_string())],
                    Some(GameMode::VsEngine) => vec![Reply::text(
                        "Please choose the AI difficulty level:",
                    )
                    .with_buttons(difficulty_buttons())],
                };
            }
            BotCommand::Difficulty(Some(arg)) => match arg.parse::<DifficultyChoice>() {
                Ok(choice) => game.select_difficulty(choice, engine).await,
                Err(_) => {
                    return vec![Reply::text(
                        "Invalid difficulty. Choose `peaceful`, `easy`, `normal`, `hard`, `hardcore` or `random`.",
                    )]
                }
            },
            BotCommand::Move(Some(uci)) => game.submit_move(&uci, engine).await,
            BotCommand::Ai => game.engine_move(engine).await,
            BotCommand::Hint => {
                return match game.hint(engine).await {
                    Ok(hint) => vec![Reply::text(format!(
                        "Hint: The best move is `{}` ({}).",
                        hint.uci, hint.san
                    ))],
                    Err(e) => vec![self.error_reply(chat_id, &e)],
                };
            }
            BotCommand::Board => {
                if game.phase() == Phase::NoMode {
                    return vec![Reply::text(SessionError::NoActiveMode.to_string())];
                }
                let reply = Reply::text(status_line(game));
                return match self.render(game).await {
                    Some(image) => vec![reply.with_image(image)],
                    None => vec![reply],
                };
            }
            BotCommand::Exit => {
                game.reset();
                return vec![Reply::text("Exiting the game. Bye!")];
            }
            BotCommand::Guide | BotCommand::Play | BotCommand::Mode(None) | BotCommand::Move(None) => {
                return Vec::new()
            }
        };

        self.finish(chat_id, game, result).await
    }

    /// 事件转回复；棋盘有变化时在最后一条相关回复上附最终局面图
    async fn finish(
        &self,
        chat_id: &str,
        game: &GameSession,
        result: Result<Vec<GameEvent>, SessionError>,
    ) -> Vec<Reply> {
        let events = match result {
            Ok(events) => events,
            Err(e) => return vec![self.error_reply(chat_id, &e)],
        };

        let mut replies = Vec::with_capacity(events.len());
        let mut board_reply = None;
        for event in &events {
            if matches!(event, GameEvent::GameStarted { .. } | GameEvent::MovePlayed { .. }) {
                board_reply = Some(replies.len());
            }
            replies.push(event_reply(event));
        }

        if let Some(index) = board_reply {
            if let Some(image) = self.render(game).await {
                replies[index].image = Some(image);
            }
        }
        replies
    }

    fn error_reply(&self, chat_id: &str, error: &SessionError) -> Reply {
        if error.is_engine_failure() {
            tracing::warn!(chat = %chat_id, error = %error, "engine failure");
        } else {
            tracing::debug!(chat = %chat_id, error = %error, "command rejected");
        }
        Reply::text(error.to_string())
    }

    /// 渲染失败只记日志，回复退化为纯文字
    async fn render(&self, game: &GameSession) -> Option<RenderedBoard> {
        let view = BoardView::from_session(game);
        match render_blocking(Arc::clone(&self.renderer), view).await {
            Ok(image) => Some(image),
            Err(e) => {
                tracing::error!(game = %game.id(), error = %e, "board rendering failed");
                None
            }
        }
    }
}

fn event_reply(event: &GameEvent) -> Reply {
    match event {
        GameEvent::GameStarted { mode, human_color } => match human_color {
            Some(color) => Reply::text(format!(
                "New chess game started in `{}` mode! You are `{}`.",
                mode,
                color_name(*color)
            )),
            None => Reply::text(format!("New chess game started in `{}` mode!", mode)),
        },
        GameEvent::AwaitingDifficulty => {
            Reply::text("Please choose the AI difficulty level:").with_buttons(difficulty_buttons())
        }
        GameEvent::DifficultySet {
            difficulty,
            randomized,
        } => {
            if *randomized {
                Reply::text(format!("Difficulty set to `{}` (random).", difficulty))
            } else {
                Reply::text(format!("Difficulty set to `{}`.", difficulty))
            }
        }
        GameEvent::MovePlayed { by, uci, san } => match by {
            Mover::Human => Reply::text(format!("Move `{}` accepted.", uci)),
            Mover::Engine(name) => Reply::text(format!("{} plays `{}` ({}).", name, uci, san)),
        },
        GameEvent::EngineFailed(error) => {
            Reply::text(format!("{} Use `/ai` to retry.", error))
        }
        GameEvent::AwaitingMove { turn, mode } => match mode {
            GameMode::VsEngine => {
                Reply::text("It's your turn to move! Use `/move <move>` to make a move.")
            }
            GameMode::Solo => Reply::text(format!(
                "{} to move. Use `/move <move>` to make a move.",
                side_label(*turn)
            )),
        },
        GameEvent::GameOver { reason, .. } => Reply::text(format!("Game over! {}", reason)),
    }
}

fn status_line(game: &GameSession) -> String {
    match game.phase() {
        Phase::NoMode => SessionError::NoActiveMode.to_string(),
        Phase::AwaitingDifficulty => "Please choose the AI difficulty level first.".to_string(),
        Phase::GameOver(_) => match game.termination() {
            Some(termination) => format!("Game over! {}", termination.reason()),
            None => "Game over!".to_string(),
        },
        Phase::InProgress(turn) => match game.human_color() {
            Some(human) => format!(
                "{} to move. You are `{}`, difficulty `{}`.",
                side_label(turn),
                color_name(human),
                game.difficulty()
            ),
            None => format!("{} to move.", side_label(turn)),
        },
    }
}
