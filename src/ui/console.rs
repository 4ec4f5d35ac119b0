//! 本地控制台：从 stdin 读指令，回复打印到 stdout，棋盘图写到文件
//!
//! 控制台是一个固定的聊天（`console`）。指令可省略前缀（`move e2e4`）；
//! 上一条带按钮的回复会把按钮编号显示，输入编号即等同于点击该按钮。

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio_util::sync::CancellationToken;

use crate::bot::{parse_command, BotCommand, Button, ChessBot, Reply, GUIDE_TEXT};

pub const CONSOLE_CHAT: &str = "console";

pub struct Console {
    bot: Arc<ChessBot>,
    board_path: PathBuf,
    /// 最近一次显示的按钮
    buttons: Vec<Button>,
}

impl Console {
    pub fn new(bot: Arc<ChessBot>, board_path: PathBuf) -> Self {
        Self {
            bot,
            board_path,
            buttons: Vec::new(),
        }
    }

    /// 处理一行输入，返回要打印的文字
    pub async fn handle_line(&mut self, line: &str) -> anyhow::Result<String> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(String::new());
        }

        let replies = match line.parse::<usize>() {
            Ok(n) if n >= 1 && n <= self.buttons.len() => {
                let data = self.buttons[n - 1].data.clone();
                self.bot.handle_button(CONSOLE_CHAT, &data).await
            }
            Ok(_) if !self.buttons.is_empty() => {
                return Ok(format!("Choose a button between 1 and {}.", self.buttons.len()));
            }
            _ => {
                let text = with_prefix(line);
                let replies = self.bot.handle_text(CONSOLE_CHAT, &text).await;
                if replies.is_empty() {
                    return Ok("Unknown command. Type `guide` for help.".to_string());
                }
                replies
            }
        };
        self.present(&replies).await
    }

    async fn present(&mut self, replies: &[Reply]) -> anyhow::Result<String> {
        // 编号只对最近一次显示的按钮有效；回复不带按钮时作废
        self.buttons = replies
            .iter()
            .rev()
            .find(|r| !r.buttons.is_empty())
            .map(|r| r.buttons.clone())
            .unwrap_or_default();

        let mut out = Vec::new();
        for reply in replies {
            out.push(reply.text.clone());

            if let Some(image) = &reply.image {
                let ext = Path::new(image.file_name)
                    .extension()
                    .unwrap_or_default();
                let path = self.board_path.with_extension(ext);
                tokio::fs::write(&path, &image.bytes).await?;
                out.push(format!("(board saved to {})", path.display()));
            }

            if !reply.buttons.is_empty() {
                let labels: Vec<String> = reply
                    .buttons
                    .iter()
                    .enumerate()
                    .map(|(i, b)| format!("[{}] {}", i + 1, b.label))
                    .collect();
                out.push(format!("  {}", labels.join("  ")));
            }
        }
        Ok(out.join("\n"))
    }
}

/// 未带前缀的输入补上 `/`
fn with_prefix(line: &str) -> String {
    if line.starts_with(['/', '!', '.', '@']) {
        line.to_string()
    } else {
        format!("/{}", line)
    }
}

/// 控制台主循环：EOF、`exit` 或取消时结束
pub async fn run_console(mut console: Console, cancel: CancellationToken) -> anyhow::Result<()> {
    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    stdout
        .write_all(format!("Chess bot console. {}\n> ", GUIDE_TEXT).as_bytes())
        .await?;
    stdout.flush().await?;

    loop {
        let line = tokio::select! {
            _ = cancel.cancelled() => break,
            line = lines.next_line() => line?,
        };
        let Some(line) = line else {
            break;
        };

        let output = console.handle_line(&line).await?;
        if !output.is_empty() {
            stdout.write_all(output.as_bytes()).await?;
            stdout.write_all(b"\n").await?;
        }
        if parse_command(&with_prefix(line.trim())) == Some(BotCommand::Exit) {
            break;
        }
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;
    }

    stdout.flush().await?;
    Ok(())
}
