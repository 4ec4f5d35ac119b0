//! Mock 引擎（用于测试与无引擎环境，无需外部进程）
//!
//! 默认走当前局面的第一步合法着法；可预置若干固定回复，或模拟引擎缺失 / 运行失败。

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use shakmaty::uci::UciMove;
use shakmaty::{CastlingMode, Chess, Position};

use super::{EngineBudget, EngineError, Recommendation, SearchEngine};

/// Mock 引擎的行为
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockBehavior {
    /// 走第一步合法着法（或预置回复）
    FirstLegal,
    /// 模拟可执行文件不存在
    Unavailable,
    /// 模拟引擎运行中出错
    Failing,
}

#[derive(Debug)]
pub struct MockEngine {
    behavior: Mutex<MockBehavior>,
    scripted: Mutex<VecDeque<String>>,
    calls: AtomicUsize,
    last_budget: Mutex<Option<EngineBudget>>,
}

impl MockEngine {
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            behavior: Mutex::new(behavior),
            scripted: Mutex::new(VecDeque::new()),
            calls: AtomicUsize::new(0),
            last_budget: Mutex::new(None),
        }
    }

    pub fn first_legal() -> Self {
        Self::new(MockBehavior::FirstLegal)
    }

    pub fn unavailable() -> Self {
        Self::new(MockBehavior::Unavailable)
    }

    pub fn failing() -> Self {
        Self::new(MockBehavior::Failing)
    }

    /// 先按顺序返回这些着法（不做合法性检查），用完后退回 FirstLegal
    pub fn with_replies(replies: &[&str]) -> Self {
        let engine = Self::first_legal();
        if let Ok(mut scripted) = engine.scripted.lock() {
            scripted.extend(replies.iter().map(|r| r.to_string()));
        }
        engine
    }

    /// 运行中切换行为（如先失败再恢复）
    pub fn set_behavior(&self, behavior: MockBehavior) {
        if let Ok(mut current) = self.behavior.lock() {
            *current = behavior;
        }
    }

    /// 被调用次数
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_budget(&self) -> Option<EngineBudget> {
        self.last_budget.lock().ok().and_then(|b| *b)
    }
}

impl Default for MockEngine {
    fn default() -> Self {
        Self::first_legal()
    }
}

#[async_trait]
impl SearchEngine for MockEngine {
    async fn recommend(
        &self,
        position: &Chess,
        _history: &[UciMove],
        budget: &EngineBudget,
    ) -> Result<Recommendation, EngineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut last) = self.last_budget.lock() {
            *last = Some(*budget);
        }

        let behavior = self
            .behavior
            .lock()
            .map(|b| *b)
            .unwrap_or(MockBehavior::Failing);
        match behavior {
            MockBehavior::Unavailable => {
                return Err(EngineError::NotFound(PathBuf::from("/nonexistent/mock-engine")))
            }
            MockBehavior::Failing => {
                return Err(EngineError::Protocol("mock engine failure".to_string()))
            }
            MockBehavior::FirstLegal => {}
        }

        let scripted = self.scripted.lock().ok().and_then(|mut s| s.pop_front());
        let uci = match scripted {
            Some(reply) => reply
                .parse::<UciMove>()
                .map_err(|_| EngineError::Protocol(format!("unparsable bestmove `{}`", reply)))?,
            None => position
                .legal_moves()
                .first()
                .map(|m| m.to_uci(CastlingMode::Standard))
                .ok_or_else(|| EngineError::Protocol("no legal moves".to_string()))?,
        };

        Ok(Recommendation {
            uci,
            engine: "MockEngine".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    const BUDGET: EngineBudget = EngineBudget {
        movetime: Duration::from_secs(1),
        skill_level: 0,
    };

    #[tokio::test]
    async fn test_scripted_then_first_legal() {
        let engine = MockEngine::with_replies(&["g1f3"]);
        let pos = Chess::default();
        let first = engine.recommend(&pos, &[], &BUDGET).await.unwrap();
        assert_eq!(first.uci.to_string(), "g1f3");
        let second = engine.recommend(&pos, &[], &BUDGET).await.unwrap();
        assert!(second.uci.to_move(&pos).is_ok());
        assert_eq!(engine.calls(), 2);
        assert_eq!(engine.last_budget(), Some(BUDGET));
    }

    #[tokio::test]
    async fn test_failure_modes() {
        let pos = Chess::default();
        let engine = MockEngine::unavailable();
        assert!(matches!(
            engine.recommend(&pos, &[], &BUDGET).await,
            Err(EngineError::NotFound(_))
        ));
        engine.set_behavior(MockBehavior::Failing);
        assert!(matches!(
            engine.recommend(&pos, &[], &BUDGET).await,
            Err(EngineError::Protocol(_))
        ));
    }
}
