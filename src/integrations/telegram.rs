//! Telegram 集成
//!
//! 两种接收方式：
//! - 长轮询（`getUpdates`，默认，无需公网地址）
//! - Webhook（Telegram 推送到 `POST /webhook`；可校验 `X-Telegram-Bot-Api-Secret-Token`）
//!
//! Webhook 收到更新后立即返回 200，指令处理（可能包含引擎思考）在后台任务中执行。
//! 回复用 `sendMessage` / `sendPhoto`，按钮为 inline keyboard，按钮 id 放在 `callback_data`。

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::bot::{Button, ChessBot, Reply};

const SECRET_HEADER: &str = "x-telegram-bot-api-secret-token";
const BUTTONS_PER_ROW: usize = 3;

/// getUpdates / webhook 推送的一条更新（只取用到的字段）
#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
    pub callback_query: Option<CallbackQuery>,
}

impl Update {
    /// 更新所属的聊天（按钮点击取按钮所在消息的聊天）
    pub fn chat_id(&self) -> Option<i64> {
        self.message
            .as_ref()
            .or_else(|| self.callback_query.as_ref()?.message.as_ref())
            .map(|m| m.chat.id)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub chat: Chat,
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
    #[serde(rename = "type")]
    pub type_: Option<String>,
}

/// 按钮点击
#[derive(Debug, Clone, Deserialize)]
pub struct CallbackQuery {
    pub id: String,
    pub data: Option<String>,
    /// 按钮所在的消息（用于确定聊天）
    pub message: Option<Message>,
}

/// Bot API 统一响应
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Debug, Serialize)]
struct InlineKeyboardButton<'a> {
    text: &'a str,
    callback_data: &'a str,
}

#[derive(Debug, Serialize)]
struct InlineKeyboardMarkup<'a> {
    inline_keyboard: Vec<Vec<InlineKeyboardButton<'a>>>,
}

/// 按钮排成每行 3 个的 inline keyboard；无按钮返回 None
fn inline_keyboard(buttons: &[Button]) -> Option<serde_json::Value> {
    if buttons.is_empty() {
        return None;
    }
    let markup = InlineKeyboardMarkup {
        inline_keyboard: buttons
            .chunks(BUTTONS_PER_ROW)
            .map(|row| {
                row.iter()
                    .map(|b| InlineKeyboardButton {
                        text: &b.label,
                        callback_data: &b.data,
                    })
                    .collect()
            })
            .collect(),
    };
    serde_json::to_value(markup).ok()
}

/// Bot API 客户端
#[derive(Clone)]
pub struct TelegramApi {
    client: reqwest::Client,
    /// `{base_url}/bot{token}`
    endpoint: String,
}

impl TelegramApi {
    pub fn new(base_url: &str, token: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: format!("{}/bot{}", base_url.trim_end_matches('/'), token),
        }
    }

    fn url(&self, method: &str) -> String {
        format!("{}/{}", self.endpoint, method)
    }

    async fn call<T: serde::de::DeserializeOwned>(
        &self,
        method: &str,
        body: &serde_json::Value,
        timeout: Duration,
    ) -> anyhow::Result<T> {
        let resp: ApiResponse<T> = self
            .client
            .post(self.url(method))
            .timeout(timeout)
            .json(body)
            .send()
            .await?
            .json()
            .await?;
        if !resp.ok {
            anyhow::bail!(
                "Telegram {} failed: {}",
                method,
                resp.description.unwrap_or_default()
            );
        }
        resp.result
            .ok_or_else(|| anyhow::anyhow!("Telegram {} returned no result", method))
    }

    /// 长轮询；`timeout_secs` 为服务端挂起时长
    pub async fn get_updates(&self, offset: i64, timeout_secs: u64) -> anyhow::Result<Vec<Update>> {
        let body = serde_json::json!({
            "offset": offset,
            "timeout": timeout_secs,
            "allowed_updates": ["message", "callback_query"],
        });
        self.call("getUpdates", &body, Duration::from_secs(timeout_secs + 10))
            .await
    }

    /// 发送文字；Markdown 解析失败时退回纯文本重发
    pub async fn send_message(&self, chat_id: i64, text: &str, buttons: &[Button]) -> anyhow::Result<()> {
        let mut body = serde_json::json!({
            "chat_id": chat_id,
            "text": text,
            "parse_mode": "Markdown",
        });
        if let Some(markup) = inline_keyboard(buttons) {
            body["reply_markup"] = markup;
        }

        let timeout = Duration::from_secs(30);
        if let Err(e) = self.call::<serde_json::Value>("sendMessage", &body, timeout).await {
            tracing::warn!(chat_id, error = %e, "sendMessage failed, retrying as plain text");
            if let Some(obj) = body.as_object_mut() {
                obj.remove("parse_mode");
            }
            self.call::<serde_json::Value>("sendMessage", &body, timeout)
                .await?;
        }
        Ok(())
    }

    /// 发送棋盘图（PNG 走 sendPhoto，其他格式走 sendDocument），文字作为说明；
    /// 说明文字的 Markdown 解析失败时退回纯文本重发
    pub async fn send_board(&self, chat_id: i64, reply: &Reply) -> anyhow::Result<()> {
        if reply.image.is_none() {
            return self.send_message(chat_id, &reply.text, &reply.buttons).await;
        }
        if let Err(e) = self.post_board(chat_id, reply, true).await {
            tracing::warn!(chat_id, error = %e, "board upload failed, retrying caption as plain text");
            self.post_board(chat_id, reply, false).await?;
        }
        Ok(())
    }

    async fn post_board(&self, chat_id: i64, reply: &Reply, markdown: bool) -> anyhow::Result<()> {
        let Some(image) = &reply.image else {
            return Ok(());
        };
        let (method, field) = if image.mime == "image/png" {
            ("sendPhoto", "photo")
        } else {
            ("sendDocument", "document")
        };

        let part = Part::bytes(image.bytes.clone())
            .file_name(image.file_name)
            .mime_str(image.mime)?;
        let mut form = Form::new()
            .text("chat_id", chat_id.to_string())
            .text("caption", reply.text.clone())
            .part(field, part);
        if markdown {
            form = form.text("parse_mode", "Markdown");
        }
        if let Some(markup) = inline_keyboard(&reply.buttons) {
            form = form.text("reply_markup", markup.to_string());
        }

        let resp: ApiResponse<serde_json::Value> = self
            .client
            .post(self.url(method))
            .timeout(Duration::from_secs(60))
            .multipart(form)
            .send()
            .await?
            .json()
            .await?;
        if !resp.ok {
            anyhow::bail!(
                "Telegram {} failed: {}",
                method,
                resp.description.unwrap_or_default()
            );
        }
        Ok(())
    }

    /// 应答按钮点击（去掉客户端上的加载状态）
    pub async fn answer_callback(&self, callback_id: &str) -> anyhow::Result<()> {
        let body = serde_json::json!({ "callback_query_id": callback_id });
        self.call::<bool>("answerCallbackQuery", &body, Duration::from_secs(10))
            .await?;
        Ok(())
    }
}

/// Telegram 服务状态
pub struct TelegramState {
    pub bot: Arc<ChessBot>,
    pub api: TelegramApi,
    /// Webhook 校验用 secret（setWebhook 时设置的 secret_token）
    pub secret_token: Option<String>,
}

/// 创建 Webhook 路由
pub fn create_router(state: Arc<TelegramState>) -> Router {
    Router::new()
        .route("/webhook", post(webhook_handler))
        .route("/health", get(|| async { "OK" }))
        .with_state(state)
}

fn secret_matches(expected: Option<&str>, headers: &HeaderMap) -> bool {
    match expected {
        None => true,
        Some(expected) => headers
            .get(SECRET_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(|v| v == expected)
            .unwrap_or(false),
    }
}

/// POST /webhook - 校验后立即返回，后台处理
async fn webhook_handler(
    State(state): State<Arc<TelegramState>>,
    headers: HeaderMap,
    Json(update): Json<Update>,
) -> StatusCode {
    if !secret_matches(state.secret_token.as_deref(), &headers) {
        tracing::warn!(update_id = update.update_id, "Telegram webhook: secret token mismatch");
        return StatusCode::UNAUTHORIZED;
    }

    tracing::debug!(update_id = update.update_id, "Telegram webhook: update accepted");
    tokio::spawn(async move {
        dispatch_update(&state, update).await;
    });
    StatusCode::OK
}

/// 按聊天串行的任务队列：同一聊天的任务按提交顺序执行，不同聊天互不等待
#[derive(Default)]
pub struct ChatQueue {
    tails: HashMap<i64, JoinHandle<()>>,
}

impl ChatQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// 提交任务；排在同一聊天上一个任务之后。没有聊天的任务直接执行
    pub fn push<F>(&mut self, chat_id: Option<i64>, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let Some(chat_id) = chat_id else {
            tokio::spawn(task);
            return;
        };
        self.tails.retain(|_, tail| !tail.is_finished());
        let previous = self.tails.remove(&chat_id);
        let tail = tokio::spawn(async move {
            if let Some(previous) = previous {
                // 前一个任务 panic 也不阻塞后续
                let _ = previous.await;
            }
            task.await;
        });
        self.tails.insert(chat_id, tail);
    }

    /// 仍在排队或执行的聊天数
    pub fn pending_chats(&self) -> usize {
        self.tails.values().filter(|tail| !tail.is_finished()).count()
    }
}

/// 长轮询循环，直到 `cancel` 被触发
pub async fn run_polling(state: Arc<TelegramState>, poll_timeout_secs: u64, cancel: CancellationToken) {
    let mut offset = 0i64;
    let mut queue = ChatQueue::new();
    tracing::info!("Telegram polling started");

    loop {
        let updates = tokio::select! {
            _ = cancel.cancelled() => break,
            res = state.api.get_updates(offset, poll_timeout_secs) => res,
        };

        match updates {
            Ok(updates) => {
                for update in updates {
                    offset = offset.max(update.update_id + 1);
                    let state = Arc::clone(&state);
                    queue.push(update.chat_id(), async move {
                        dispatch_update(&state, update).await;
                    });
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "getUpdates failed, retrying");
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(Duration::from_secs(3)) => {}
                }
            }
        }
    }

    tracing::info!("Telegram polling stopped");
}

/// 处理一条更新并发送回复
pub async fn dispatch_update(state: &TelegramState, update: Update) {
    if let Some(query) = update.callback_query {
        if let Err(e) = state.api.answer_callback(&query.id).await {
            tracing::warn!(error = %e, "answerCallbackQuery failed");
        }
        let (Some(message), Some(data)) = (query.message, query.data) else {
            tracing::debug!(update_id = update.update_id, "callback without message or data, ignoring");
            return;
        };
        let chat_id = message.chat.id;
        let replies = state.bot.handle_button(&chat_id.to_string(), &data).await;
        send_replies(state, chat_id, &replies).await;
        return;
    }

    let Some(message) = update.message else {
        return;
    };
    let Some(text) = message.text.as_deref() else {
        return;
    };
    let chat_id = message.chat.id;
    let replies = state.bot.handle_text(&chat_id.to_string(), text).await;
    send_replies(state, chat_id, &replies).await;
}

async fn send_replies(state: &TelegramState, chat_id: i64, replies: &[Reply]) {
    for reply in replies {
        let result = if reply.image.is_some() {
            state.api.send_board(chat_id, reply).await
        } else {
            state
                .api
                .send_message(chat_id, &reply.text, &reply.buttons)
                .await
        };
        if let Err(e) = result {
            tracing::error!(chat_id, error = %e, "failed to send reply");
        }
    }
}
