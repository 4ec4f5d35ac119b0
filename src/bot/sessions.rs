//! 会话管理
//!
//! 每个聊天（chat id）一局棋，互不干扰。会话各自持有一把锁：
//! 同一聊天的指令串行执行，不同聊天并发。

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{Mutex, RwLock};

use crate::game::GameSession;

/// 聊天 ID（平台侧的会话标识）
pub type ChatId = String;

/// 单个聊天的会话
#[derive(Debug)]
pub struct ChatSession {
    pub game: GameSession,
    pub last_active: Instant,
}

impl ChatSession {
    pub fn new() -> Self {
        Self {
            game: GameSession::new(),
            last_active: Instant::now(),
        }
    }

    pub fn touch(&mut self) {
        self.last_active = Instant::now();
    }

    pub fn is_expired(&self, timeout: Duration) -> bool {
        self.last_active.elapsed() > timeout
    }
}

impl Default for ChatSession {
    fn default() -> Self {
        Self::new()
    }
}

pub type SharedChatSession = Arc<Mutex<ChatSession>>;

/// 会话管理器
pub struct SessionManager {
    sessions: RwLock<HashMap<ChatId, SharedChatSession>>,
    session_timeout: Duration,
}

impl SessionManager {
    pub fn new(session_timeout_secs: u64) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            session_timeout: Duration::from_secs(session_timeout_secs),
        }
    }

    /// 获取或创建聊天的会话
    pub async fn get_or_create(&self, chat_id: &str) -> SharedChatSession {
        if let Some(session) = self.sessions.read().await.get(chat_id) {
            return Arc::clone(session);
        }

        let mut sessions = self.sessions.write().await;
        let session = sessions.entry(chat_id.to_string()).or_insert_with(|| {
            tracing::debug!(chat = %chat_id, "session created");
            Arc::new(Mutex::new(ChatSession::new()))
        });
        Arc::clone(session)
    }

    pub async fn get(&self, chat_id: &str) -> Option<SharedChatSession> {
        self.sessions.read().await.get(chat_id).cloned()
    }

    pub async fn remove(&self, chat_id: &str) -> bool {
        self.sessions.write().await.remove(chat_id).is_some()
    }

    /// 清理过期会话；正在处理指令的会话（锁被占用）不清理
    pub async fn cleanup_expired(&self) -> usize {
        let mut sessions = self.sessions.write().await;
        let expired: Vec<ChatId> = sessions
            .iter()
            .filter(|(_, s)| {
                s.try_lock()
                    .map(|s| s.is_expired(self.session_timeout))
                    .unwrap_or(false)
            })
            .map(|(id, _)| id.clone())
            .collect();

        for chat_id in &expired {
            sessions.remove(chat_id);
        }
        if !expired.is_empty() {
            tracing::info!(count = expired.len(), "expired sessions removed");
        }
        expired.len()
    }

    /// 获取活跃会话数
    pub async fn active_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new(86400)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::{GameMode, Phase};

    #[tokio::test]
    async fn test_sessions_are_per_chat() {
        let manager = SessionManager::default();
        let a = manager.get_or_create("chat-a").await;
        let b = manager.get_or_create("chat-b").await;
        a.lock().await.game.select_mode(GameMode::Solo);

        assert_eq!(b.lock().await.game.phase(), Phase::NoMode);
        let again = manager.get_or_create("chat-a").await;
        assert!(Arc::ptr_eq(&a, &again));
        assert_eq!(manager.active_count().await, 2);
    }

    #[tokio::test]
    async fn test_cleanup_expired() {
        let manager = SessionManager::new(0);
        manager.get_or_create("idle").await;
        let busy = manager.get_or_create("busy").await;
        let _guard = busy.lock().await;
        tokio::time::sleep(Duration::from_millis(5)).await;

        assert_eq!(manager.cleanup_expired().await, 1);
        assert!(manager.get("idle").await.is_none());
        assert!(manager.get("busy").await.is_some());
        assert!(manager.remove("busy").await);
    }
}
