//! 对局会话状态机
//!
//! 阶段：NoMode → AwaitingDifficulty（仅人机）→ InProgress(turn) → GameOver。
//!
//! 「轮到谁」只从规则库的局面（`position.turn()`）推出，不单独维护回合字段；
//! 着法记录 `history` 只用于引擎请求与棋盘图上的着法列表。
//!
//! 终局除规则库判定的将死、逼和、子力不足外，还包括强制和棋：
//! 75 回合规则（150 个半回合无吃子无兵步）与五次重复局面。
//! 每个会话同一时刻只处理一条指令（由 SessionManager 的会话锁保证），自身不加锁。

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shakmaty::san::SanPlus;
use shakmaty::uci::UciMove;
use shakmaty::zobrist::{Zobrist64, ZobristHash};
use shakmaty::{CastlingMode, Chess, Color, EnPassantMode, Move, Outcome, Position};

use super::events::{GameEvent, Mover};
use super::mode::{Difficulty, DifficultyChoice, GameMode};
use crate::core::SessionError;
use crate::engine::SearchEngine;

/// 会话所处阶段（由状态推导，不存储）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    NoMode,
    AwaitingDifficulty,
    InProgress(Color),
    GameOver(Outcome),
}

/// 75 回合规则对应的半回合数
const SEVENTY_FIVE_MOVE_PLIES: u32 = 150;
/// 同一局面出现这么多次即判和
const FIVEFOLD: usize = 5;

/// 终局原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    Checkmate { winner: Color },
    Stalemate,
    InsufficientMaterial,
    SeventyFiveMoves,
    FivefoldRepetition,
}

impl Termination {
    pub fn outcome(self) -> Outcome {
        match self {
            Termination::Checkmate { winner } => Outcome::Decisive { winner },
            _ => Outcome::Draw,
        }
    }

    /// 面向用户的说明
    pub fn reason(self) -> String {
        match self {
            Termination::Checkmate { winner } => {
                format!("Checkmate! {} wins.", side_label(winner))
            }
            Termination::Stalemate => "Stalemate. The game is a draw.".to_string(),
            Termination::InsufficientMaterial => "Draw by insufficient material.".to_string(),
            Termination::SeventyFiveMoves => "Draw by the 75-move rule.".to_string(),
            Termination::FivefoldRepetition => "Draw by fivefold repetition.".to_string(),
        }
    }
}

/// 提示结果（不改变局面）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hint {
    pub uci: UciMove,
    pub san: String,
    pub engine: String,
}

/// 单个聊天上下文里的一局棋
#[derive(Debug)]
pub struct GameSession {
    id: String,
    mode: Option<GameMode>,
    human_color: Option<Color>,
    difficulty: Difficulty,
    difficulty_pending: bool,
    position: Chess,
    history: Vec<UciMove>,
    /// 开局以来每个局面的哈希（含初始局面），用于重复判定
    seen: Vec<Zobrist64>,
    rng: StdRng,
}

impl GameSession {
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    /// 指定随机源（测试中用固定种子得到确定的执棋颜色）
    pub fn with_rng(rng: StdRng) -> Self {
        Self {
            id: new_game_id(),
            mode: None,
            human_color: None,
            difficulty: Difficulty::default(),
            difficulty_pending: false,
            position: Chess::default(),
            history: Vec::new(),
            seen: vec![start_hash()],
            rng,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn mode(&self) -> Option<GameMode> {
        self.mode
    }

    /// 人机模式下人的颜色；双人模式为 None
    pub fn human_color(&self) -> Option<Color> {
        self.human_color
    }

    pub fn difficulty(&self) -> Difficulty {
        self.difficulty
    }

    pub fn position(&self) -> &Chess {
        &self.position
    }

    pub fn history(&self) -> &[UciMove] {
        &self.history
    }

    pub fn last_move(&self) -> Option<&UciMove> {
        self.history.last()
    }

    /// 轮到哪一方（来自规则库）
    pub fn turn(&self) -> Color {
        self.position.turn()
    }

    /// 棋盘朝向：人机模式朝向人，其余白方在下
    pub fn orientation(&self) -> Color {
        self.human_color.unwrap_or(Color::White)
    }

    pub fn phase(&self) -> Phase {
        if self.mode.is_none() {
            return Phase::NoMode;
        }
        if let Some(termination) = self.termination() {
            return Phase::GameOver(termination.outcome());
        }
        if self.difficulty_pending {
            return Phase::AwaitingDifficulty;
        }
        Phase::InProgress(self.position.turn())
    }

    /// 终局原因；对局未结束时为 None
    pub fn termination(&self) -> Option<Termination> {
        let position = &self.position;
        if position.is_checkmate() {
            return Some(Termination::Checkmate {
                winner: !position.turn(),
            });
        }
        if position.is_insufficient_material() {
            return Some(Termination::InsufficientMaterial);
        }
        if position.is_stalemate() {
            return Some(Termination::Stalemate);
        }
        if position.halfmoves() >= SEVENTY_FIVE_MOVE_PLIES {
            return Some(Termination::SeventyFiveMoves);
        }
        if self.repetitions() >= FIVEFOLD {
            return Some(Termination::FivefoldRepetition);
        }
        None
    }

    fn is_over(&self) -> bool {
        self.termination().is_some()
    }

    /// 当前局面在本局中出现的次数
    fn repetitions(&self) -> usize {
        match self.seen.last() {
            Some(current) => self.seen.iter().filter(|hash| *hash == current).count(),
            None => 0,
        }
    }

    fn clear_board(&mut self) {
        self.position = Chess::default();
        self.history.clear();
        self.seen = vec![start_hash()];
    }

    /// 选择模式：任何阶段都可调用，等同于重开一局
    pub fn select_mode(&mut self, mode: GameMode) -> Vec<GameEvent> {
        self.id = new_game_id();
        self.clear_board();
        self.mode = Some(mode);
        self.difficulty = Difficulty::default();

        let mut events = Vec::with_capacity(2);
        match mode {
            GameMode::Solo => {
                self.human_color = None;
                self.difficulty_pending = false;
                events.push(GameEvent::GameStarted {
                    mode,
                    human_color: None,
                });
                events.push(GameEvent::AwaitingMove {
                    turn: Color::White,
                    mode,
                });
            }
            GameMode::VsEngine => {
                let color = if self.rng.gen_bool(0.5) {
                    Color::White
                } else {
                    Color::Black
                };
                self.human_color = Some(color);
                self.difficulty_pending = true;
                events.push(GameEvent::GameStarted {
                    mode,
                    human_color: Some(color),
                });
                events.push(GameEvent::AwaitingDifficulty);
            }
        }

        tracing::info!(game = %self.id, mode = %mode, human = ?self.human_color, "new game");
        events
    }

    /// `/start`：以当前模式重开
    pub fn restart(&mut self) -> Result<Vec<GameEvent>, SessionError> {
        let mode = self.mode.ok_or(SessionError::NoActiveMode)?;
        Ok(self.select_mode(mode))
    }

    /// 选择难度。随机只在此刻掷一次；若引擎先手则在返回前让引擎走棋
    pub async fn select_difficulty(
        &mut self,
        choice: DifficultyChoice,
        engine: &dyn SearchEngine,
    ) -> Result<Vec<GameEvent>, SessionError> {
        match self.mode {
            None => return Err(SessionError::NoActiveMode),
            Some(GameMode::Solo) => return Err(SessionError::SoloGame),
            Some(GameMode::VsEngine) => {}
        }
        if let Phase::GameOver(_) = self.phase() {
            return Err(self.game_over_error());
        }

        let (difficulty, randomized) = choice.resolve(&mut self.rng);
        let was_pending = self.difficulty_pending;
        self.difficulty = difficulty;
        self.difficulty_pending = false;
        tracing::info!(game = %self.id, difficulty = %difficulty, randomized, "difficulty set");

        let mut events = vec![GameEvent::DifficultySet {
            difficulty,
            randomized,
        }];
        if self.is_engine_turn() {
            events.extend(self.engine_reply(engine).await);
        } else if was_pending {
            events.push(self.awaiting_move());
        }
        Ok(events)
    }

    /// 人类走棋。失败时（格式错误 / 不合法 / 不该你走）局面不变
    pub async fn submit_move(
        &mut self,
        input: &str,
        engine: &dyn SearchEngine,
    ) -> Result<Vec<GameEvent>, SessionError> {
        let turn = self.ensure_in_progress()?;
        if self.mode == Some(GameMode::VsEngine) && self.human_color != Some(turn) {
            return Err(SessionError::WrongTurn {
                turn: color_name(turn).to_string(),
            });
        }

        let uci: UciMove = input
            .parse()
            .map_err(|_| SessionError::MalformedMove(input.to_string()))?;
        let m = uci
            .to_move(&self.position)
            .map_err(|_| SessionError::IllegalMove(input.to_string()))?;

        let mut events = self.apply(&m, Mover::Human);
        if self.is_over() {
            return Ok(events);
        }
        if self.is_engine_turn() {
            events.extend(self.engine_reply(engine).await);
        } else {
            events.push(self.awaiting_move());
        }
        Ok(events)
    }

    /// `/ai`：让引擎走一步。人机模式下只在引擎回合有效；双人模式替当前方走
    pub async fn engine_move(
        &mut self,
        engine: &dyn SearchEngine,
    ) -> Result<Vec<GameEvent>, SessionError> {
        let turn = self.ensure_in_progress()?;
        if self.mode == Some(GameMode::VsEngine) && self.human_color == Some(turn) {
            return Err(SessionError::WrongTurn {
                turn: color_name(turn).to_string(),
            });
        }
        self.run_engine(engine).await
    }

    /// `/hint`：与引擎走棋同样的调用，只报告推荐着法
    pub async fn hint(&self, engine: &dyn SearchEngine) -> Result<Hint, SessionError> {
        self.ensure_in_progress()?;
        let budget = self.difficulty.budget();
        let rec = engine
            .recommend(&self.position, &self.history, &budget)
            .await?;
        let m = self.engine_move_on_board(&rec.uci)?;
        Ok(Hint {
            san: san_plus(&self.position, &m),
            uci: rec.uci,
            engine: rec.engine,
        })
    }

    /// `/exit`：回到 NoMode，丢弃当前局面
    pub fn reset(&mut self) {
        tracing::info!(game = %self.id, "game reset");
        self.mode = None;
        self.human_color = None;
        self.difficulty = Difficulty::default();
        self.difficulty_pending = false;
        self.clear_board();
    }

    fn ensure_in_progress(&self) -> Result<Color, SessionError> {
        match self.phase() {
            Phase::NoMode => Err(SessionError::NoActiveMode),
            Phase::AwaitingDifficulty => Err(SessionError::DifficultyPending),
            Phase::GameOver(_) => Err(self.game_over_error()),
            Phase::InProgress(turn) => Ok(turn),
        }
    }

    fn game_over_error(&self) -> SessionError {
        let reason = self
            .termination()
            .map(Termination::reason)
            .unwrap_or_default();
        SessionError::GameOver(reason)
    }

    fn is_engine_turn(&self) -> bool {
        self.mode == Some(GameMode::VsEngine)
            && !self.difficulty_pending
            && !self.is_over()
            && self.human_color == Some(!self.position.turn())
    }

    fn awaiting_move(&self) -> GameEvent {
        GameEvent::AwaitingMove {
            turn: self.position.turn(),
            mode: self.mode.unwrap_or(GameMode::Solo),
        }
    }

    /// 落子并记录；终局时追加 GameOver 事件
    fn apply(&mut self, m: &Move, by: Mover) -> Vec<GameEvent> {
        let uci = m.to_uci(CastlingMode::Standard);
        let san = san_plus(&self.position, m);
        self.position.play_unchecked(m);
        self.history.push(uci.clone());
        self.seen
            .push(self.position.zobrist_hash(EnPassantMode::Legal));
        tracing::info!(game = %self.id, uci = %uci, san = %san, by = ?by, "move played");

        let mut events = vec![GameEvent::MovePlayed { by, uci, san }];
        if let Some(termination) = self.termination() {
            let outcome = termination.outcome();
            tracing::info!(game = %self.id, outcome = %outcome, ?termination, "game over");
            events.push(GameEvent::GameOver {
                outcome,
                reason: termination.reason(),
            });
        }
        events
    }

    /// 调用引擎并落子；失败时局面不变
    async fn run_engine(
        &mut self,
        engine: &dyn SearchEngine,
    ) -> Result<Vec<GameEvent>, SessionError> {
        let budget = self.difficulty.budget();
        let rec = engine
            .recommend(&self.position, &self.history, &budget)
            .await?;
        let m = self.engine_move_on_board(&rec.uci)?;

        let mut events = self.apply(&m, Mover::Engine(rec.engine));
        if !self.is_over() {
            events.push(self.awaiting_move());
        }
        Ok(events)
    }

    /// 人走完后的引擎应答：失败不回滚人的着法，只报告 EngineFailed
    async fn engine_reply(&mut self, engine: &dyn SearchEngine) -> Vec<GameEvent> {
        match self.run_engine(engine).await {
            Ok(events) => events,
            Err(e) => {
                tracing::warn!(game = %self.id, error = %e, "engine reply failed");
                vec![GameEvent::EngineFailed(e)]
            }
        }
    }

    fn engine_move_on_board(&self, uci: &UciMove) -> Result<Move, SessionError> {
        uci.to_move(&self.position).map_err(|_| {
            SessionError::EngineError(format!("engine suggested an unplayable move `{}`", uci))
        })
    }
}

impl Default for GameSession {
    fn default() -> Self {
        Self::new()
    }
}

fn new_game_id() -> String {
    format!("game_{}", uuid::Uuid::new_v4())
}

fn start_hash() -> Zobrist64 {
    Chess::default().zobrist_hash(EnPassantMode::Legal)
}

/// 首字母大写的颜色名（用于面向用户的文本）
pub fn side_label(color: Color) -> &'static str {
    match color {
        Color::White => "White",
        Color::Black => "Black",
    }
}

pub fn color_name(color: Color) -> &'static str {
    match color {
        Color::White => "white",
        Color::Black => "black",
    }
}

/// 走棋前局面下的 SAN，带 `+` / `#` 后缀
pub fn san_plus(position: &Chess, m: &Move) -> String {
    SanPlus::from_move(position.clone(), m).to_string()
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use shakmaty::fen::Fen;
    use shakmaty::Square;

    use super::*;
    use crate::engine::{MockBehavior, MockEngine};

    fn seeded(seed: u64) -> GameSession {
        GameSession::with_rng(StdRng::seed_from_u64(seed))
    }

    fn solo() -> GameSession {
        let mut session = seeded(1);
        session.select_mode(GameMode::Solo);
        session
    }

    /// 找一个让人执指定颜色的种子
    fn vs_engine(human: Color) -> GameSession {
        for seed in 0..256 {
            let mut session = seeded(seed);
            session.select_mode(GameMode::VsEngine);
            if session.human_color() == Some(human) {
                return session;
            }
        }
        panic!("no seed assigns {:?} to the human", human);
    }

    async fn play_all(session: &mut GameSession, moves: &[&str], engine: &MockEngine) {
        for m in moves {
            session.submit_move(m, engine).await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_no_mode_rejects_everything() {
        let engine = MockEngine::first_legal();
        let mut session = seeded(0);
        assert_eq!(session.phase(), Phase::NoMode);
        assert_eq!(
            session.submit_move("e2e4", &engine).await,
            Err(SessionError::NoActiveMode)
        );
        assert_eq!(
            session.engine_move(&engine).await,
            Err(SessionError::NoActiveMode)
        );
        assert_eq!(session.hint(&engine).await, Err(SessionError::NoActiveMode));
        assert_eq!(session.restart(), Err(SessionError::NoActiveMode));
        assert_eq!(engine.calls(), 0);
    }

    #[tokio::test]
    async fn test_e2e4_accepted_turn_flips() {
        let engine = MockEngine::first_legal();
        let mut session = solo();
        let events = session.submit_move("e2e4", &engine).await.unwrap();

        assert_eq!(session.turn(), Color::Black);
        assert_eq!(session.phase(), Phase::InProgress(Color::Black));
        assert_eq!(session.history().len(), 1);
        assert!(matches!(
            &events[0],
            GameEvent::MovePlayed { by: Mover::Human, uci, san } if uci.to_string() == "e2e4" && san == "e4"
        ));
        assert_eq!(
            events[1],
            GameEvent::AwaitingMove {
                turn: Color::Black,
                mode: GameMode::Solo
            }
        );
        assert_eq!(engine.calls(), 0);
    }

    #[tokio::test]
    async fn test_e2e5_is_illegal_and_state_unchanged() {
        let engine = MockEngine::first_legal();
        let mut session = solo();
        assert_eq!(
            session.submit_move("e2e5", &engine).await,
            Err(SessionError::IllegalMove("e2e5".to_string()))
        );
        assert_eq!(session.turn(), Color::White);
        assert!(session.history().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_moves_leave_state_unchanged() {
        let engine = MockEngine::first_legal();
        let mut session = solo();
        session.submit_move("e2e4", &engine).await.unwrap();
        let board_before = session.position().board().clone();

        for input in ["", "e2", "e9e1", "hello", "e2-e4", "e7e8x", "E2E4", "E7E5"] {
            let result = session.submit_move(input, &engine).await;
            assert_eq!(
                result,
                Err(SessionError::MalformedMove(input.to_string())),
                "input {:?}",
                input
            );
        }
        assert_eq!(session.position().board(), &board_before);
        assert_eq!(session.history().len(), 1);
        assert_eq!(session.turn(), Color::Black);
    }

    #[tokio::test]
    async fn test_every_parsable_non_legal_move_is_illegal() {
        let engine = MockEngine::first_legal();
        let mut session = solo();
        play_all(&mut session, &["e2e4", "e7e5", "g1f3"], &engine).await;

        let legal: HashSet<String> = session
            .position()
            .legal_moves()
            .iter()
            .map(|m| m.to_uci(CastlingMode::Standard).to_string())
            .collect();
        let board_before = session.position().board().clone();

        for from in Square::ALL {
            for to in Square::ALL {
                if from == to {
                    continue;
                }
                let input = format!("{}{}", from, to);
                if legal.contains(&input) {
                    continue;
                }
                assert_eq!(
                    session.submit_move(&input, &engine).await,
                    Err(SessionError::IllegalMove(input.clone()))
                );
            }
        }
        assert_eq!(session.position().board(), &board_before);
        assert_eq!(session.history().len(), 3);
        assert_eq!(session.turn(), Color::Black);
    }

    #[tokio::test]
    async fn test_engine_moves_first_when_human_is_black() {
        let engine = MockEngine::first_legal();
        let mut session = vs_engine(Color::Black);
        assert_eq!(session.phase(), Phase::AwaitingDifficulty);

        let events = session
            .select_difficulty(DifficultyChoice::Tier(Difficulty::Easy), &engine)
            .await
            .unwrap();

        assert_eq!(engine.calls(), 1);
        assert_eq!(engine.last_budget(), Some(Difficulty::Easy.budget()));
        assert_eq!(session.history().len(), 1);
        assert_eq!(session.turn(), Color::Black);
        assert!(matches!(events[0], GameEvent::DifficultySet { difficulty: Difficulty::Easy, randomized: false }));
        assert!(matches!(&events[1], GameEvent::MovePlayed { by: Mover::Engine(_), .. }));
        assert_eq!(
            events[2],
            GameEvent::AwaitingMove {
                turn: Color::Black,
                mode: GameMode::VsEngine
            }
        );
    }

    #[tokio::test]
    async fn test_human_white_then_engine_replies() {
        let engine = MockEngine::with_replies(&["e7e5"]);
        let mut session = vs_engine(Color::White);
        let events = session
            .select_difficulty(DifficultyChoice::Tier(Difficulty::Normal), &engine)
            .await
            .unwrap();
        assert_eq!(engine.calls(), 0);
        assert!(matches!(events.last(), Some(GameEvent::AwaitingMove { turn: Color::White, .. })));

        let events = session.submit_move("e2e4", &engine).await.unwrap();
        assert_eq!(engine.calls(), 1);
        assert_eq!(session.turn(), Color::White);
        let played: Vec<String> = session.history().iter().map(|m| m.to_string()).collect();
        assert_eq!(played, vec!["e2e4", "e7e5"]);
        assert_eq!(events.len(), 3);
    }

    #[tokio::test]
    async fn test_moves_rejected_until_difficulty_chosen() {
        let engine = MockEngine::first_legal();
        let mut session = vs_engine(Color::White);
        assert_eq!(
            session.submit_move("e2e4", &engine).await,
            Err(SessionError::DifficultyPending)
        );
        assert_eq!(
            session.engine_move(&engine).await,
            Err(SessionError::DifficultyPending)
        );
    }

    #[tokio::test]
    async fn test_engine_failure_after_human_move_keeps_awaiting_engine() {
        let engine = MockEngine::first_legal();
        let mut session = vs_engine(Color::White);
        session
            .select_difficulty(DifficultyChoice::Tier(Difficulty::Hard), &engine)
            .await
            .unwrap();

        engine.set_behavior(MockBehavior::Failing);
        let events = session.submit_move("d2d4", &engine).await.unwrap();
        assert!(matches!(events.last(), Some(GameEvent::EngineFailed(SessionError::EngineError(_)))));
        assert_eq!(session.history().len(), 1);
        assert_eq!(session.phase(), Phase::InProgress(Color::Black));

        // 人不能替引擎走
        assert!(matches!(
            session.submit_move("d7d5", &engine).await,
            Err(SessionError::WrongTurn { .. })
        ));

        engine.set_behavior(MockBehavior::FirstLegal);
        session.engine_move(&engine).await.unwrap();
        assert_eq!(session.history().len(), 2);
        assert_eq!(session.turn(), Color::White);
    }

    #[tokio::test]
    async fn test_engine_unavailable_leaves_position_unchanged() {
        let engine = MockEngine::unavailable();
        let mut session = vs_engine(Color::Black);
        let events = session
            .select_difficulty(DifficultyChoice::Tier(Difficulty::Easy), &engine)
            .await
            .unwrap();
        assert!(matches!(events.last(), Some(GameEvent::EngineFailed(SessionError::EngineUnavailable(_)))));
        assert!(session.history().is_empty());

        assert!(matches!(
            session.engine_move(&engine).await,
            Err(SessionError::EngineUnavailable(_))
        ));
        assert!(matches!(
            session.hint(&engine).await,
            Err(SessionError::EngineUnavailable(_))
        ));
        assert!(session.history().is_empty());
        assert_eq!(session.turn(), Color::White);
    }

    #[tokio::test]
    async fn test_engine_move_on_human_turn_is_wrong_turn() {
        let engine = MockEngine::first_legal();
        let mut session = vs_engine(Color::White);
        session
            .select_difficulty(DifficultyChoice::Random, &engine)
            .await
            .unwrap();
        assert_eq!(
            session.engine_move(&engine).await,
            Err(SessionError::WrongTurn {
                turn: "white".to_string()
            })
        );
        assert_eq!(engine.calls(), 0);
    }

    #[tokio::test]
    async fn test_random_difficulty_fixed_for_the_game() {
        let engine = MockEngine::first_legal();
        let mut session = vs_engine(Color::White);
        let events = session
            .select_difficulty(DifficultyChoice::Random, &engine)
            .await
            .unwrap();
        let GameEvent::DifficultySet { difficulty, randomized } = events[0] else {
            panic!("expected DifficultySet, got {:?}", events[0]);
        };
        assert!(randomized);
        assert!(Difficulty::ALL.contains(&difficulty));

        play_all(&mut session, &["a2a3", "h2h3", "b2b3"], &engine).await;
        assert_eq!(engine.calls(), 3);
        assert_eq!(session.difficulty(), difficulty);
        assert_eq!(engine.last_budget(), Some(difficulty.budget()));
    }

    #[tokio::test]
    async fn test_hint_is_read_only() {
        let engine = MockEngine::with_replies(&["g1f3"]);
        let session = solo();
        let hint = session.hint(&engine).await.unwrap();
        assert_eq!(hint.uci.to_string(), "g1f3");
        assert_eq!(hint.san, "Nf3");
        assert!(session.history().is_empty());
        assert_eq!(session.turn(), Color::White);
    }

    #[tokio::test]
    async fn test_unplayable_engine_move_is_engine_error() {
        let engine = MockEngine::with_replies(&["e2e5"]);
        let mut session = solo();
        assert!(matches!(
            session.engine_move(&engine).await,
            Err(SessionError::EngineError(_))
        ));
        assert!(session.history().is_empty());
    }

    #[tokio::test]
    async fn test_solo_engine_move_plays_for_side_to_move() {
        let engine = MockEngine::with_replies(&["e2e4"]);
        let mut session = solo();
        session.engine_move(&engine).await.unwrap();
        assert_eq!(session.turn(), Color::Black);
        session.submit_move("c7c5", &engine).await.unwrap();
        assert_eq!(session.history().len(), 2);
    }

    #[tokio::test]
    async fn test_fools_mate_ends_game() {
        let engine = MockEngine::first_legal();
        let mut session = solo();
        play_all(&mut session, &["f2f3", "e7e5", "g2g4"], &engine).await;
        let events = session.submit_move("d8h4", &engine).await.unwrap();

        assert!(matches!(&events[0], GameEvent::MovePlayed { san, .. } if san == "Qh4#"));
        assert!(matches!(
            &events[1],
            GameEvent::GameOver { outcome: Outcome::Decisive { winner: Color::Black }, reason } if reason == "Checkmate! Black wins."
        ));
        assert!(matches!(session.phase(), Phase::GameOver(_)));
        assert!(matches!(
            session.submit_move("a2a3", &engine).await,
            Err(SessionError::GameOver(_))
        ));
        assert!(matches!(session.hint(&engine).await, Err(SessionError::GameOver(_))));
        assert_eq!(engine.calls(), 0);
    }

    #[tokio::test]
    async fn test_fivefold_repetition_ends_game() {
        let engine = MockEngine::first_legal();
        let mut session = solo();
        let shuffle = ["g1f3", "g8f6", "f3g1", "f6g8"];
        for _ in 0..3 {
            play_all(&mut session, &shuffle, &engine).await;
        }
        play_all(&mut session, &shuffle[..3], &engine).await;
        // 初始局面已出现 4 次
        assert_eq!(session.phase(), Phase::InProgress(Color::Black));

        let events = session.submit_move("f6g8", &engine).await.unwrap();
        assert_eq!(session.termination(), Some(Termination::FivefoldRepetition));
        assert_eq!(session.phase(), Phase::GameOver(Outcome::Draw));
        assert_eq!(
            events.last(),
            Some(&GameEvent::GameOver {
                outcome: Outcome::Draw,
                reason: "Draw by fivefold repetition.".to_string()
            })
        );
        assert_eq!(
            session.submit_move("g1f3", &engine).await,
            Err(SessionError::GameOver("Draw by fivefold repetition.".to_string()))
        );
        assert_eq!(session.history().len(), 16);
    }

    #[tokio::test]
    async fn test_fivefold_repetition_stops_engine_reply() {
        let engine = MockEngine::with_replies(&["g8f6", "f6g8", "g8f6", "f6g8", "g8f6", "f6g8", "g8f6", "f6g8"]);
        let mut session = vs_engine(Color::White);
        session
            .select_difficulty(DifficultyChoice::Tier(Difficulty::Easy), &engine)
            .await
            .unwrap();
        for _ in 0..4 {
            play_all(&mut session, &["g1f3", "f3g1"], &engine).await;
        }
        assert_eq!(session.termination(), Some(Termination::FivefoldRepetition));
        assert_eq!(engine.calls(), 8);
        assert!(matches!(
            session.engine_move(&engine).await,
            Err(SessionError::GameOver(_))
        ));
        assert_eq!(engine.calls(), 8);
    }

    #[tokio::test]
    async fn test_seventy_five_move_rule_ends_game() {
        let engine = MockEngine::first_legal();
        let mut session = solo();
        session.position = Fen::from_ascii(b"4k3/8/8/8/8/8/8/R3K3 w - - 149 120")
            .unwrap()
            .into_position(CastlingMode::Standard)
            .unwrap();
        session.seen = vec![session.position.zobrist_hash(EnPassantMode::Legal)];
        assert_eq!(session.phase(), Phase::InProgress(Color::White));

        let events = session.submit_move("a1a2", &engine).await.unwrap();
        assert_eq!(session.position().halfmoves(), 150);
        assert_eq!(session.termination(), Some(Termination::SeventyFiveMoves));
        assert!(matches!(
            events.last(),
            Some(GameEvent::GameOver { outcome: Outcome::Draw, reason }) if reason == "Draw by the 75-move rule."
        ));
        assert!(matches!(
            session.submit_move("e8d8", &engine).await,
            Err(SessionError::GameOver(_))
        ));
    }

    #[tokio::test]
    async fn test_checkmate_takes_precedence_over_seventy_five_move_rule() {
        let engine = MockEngine::first_legal();
        let mut session = solo();
        session.position = Fen::from_ascii(b"k7/8/1K6/8/8/8/8/7R w - - 149 120")
            .unwrap()
            .into_position(CastlingMode::Standard)
            .unwrap();
        session.submit_move("h1h8", &engine).await.unwrap();
        assert_eq!(
            session.termination(),
            Some(Termination::Checkmate {
                winner: Color::White
            })
        );
    }

    #[test]
    fn test_new_game_clears_repetition_history() {
        let mut session = solo();
        session.seen.extend(std::iter::repeat(start_hash()).take(6));
        assert_eq!(session.termination(), Some(Termination::FivefoldRepetition));
        session.select_mode(GameMode::Solo);
        assert_eq!(session.termination(), None);
        assert_eq!(session.phase(), Phase::InProgress(Color::White));
    }

    #[tokio::test]
    async fn test_castling_recorded_in_standard_notation() {
        let engine = MockEngine::first_legal();
        let mut session = solo();
        play_all(
            &mut session,
            &["e2e4", "e7e5", "g1f3", "b8c6", "f1c4", "g8f6"],
            &engine,
        )
        .await;
        let events = session.submit_move("e1g1", &engine).await.unwrap();
        assert!(matches!(&events[0], GameEvent::MovePlayed { uci, san, .. } if uci.to_string() == "e1g1" && san == "O-O"));
    }

    #[tokio::test]
    async fn test_difficulty_rules() {
        let engine = MockEngine::first_legal();
        let mut session = seeded(3);
        assert_eq!(
            session
                .select_difficulty(DifficultyChoice::Random, &engine)
                .await,
            Err(SessionError::NoActiveMode)
        );
        session.select_mode(GameMode::Solo);
        assert_eq!(
            session
                .select_difficulty(DifficultyChoice::Random, &engine)
                .await,
            Err(SessionError::SoloGame)
        );
    }

    #[test]
    fn test_reset_and_restart() {
        let mut session = seeded(9);
        session.select_mode(GameMode::VsEngine);
        let first_id = session.id().to_string();
        let events = session.restart().unwrap();
        assert!(matches!(events[0], GameEvent::GameStarted { mode: GameMode::VsEngine, .. }));
        assert_ne!(session.id(), first_id);
        assert_eq!(session.phase(), Phase::AwaitingDifficulty);

        session.reset();
        assert_eq!(session.phase(), Phase::NoMode);
        assert_eq!(session.mode(), None);
        assert_eq!(session.human_color(), None);
        assert_eq!(session.orientation(), Color::White);
    }
}
