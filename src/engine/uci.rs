//! UCI 引擎进程
//!
//! 通过 stdin/stdout 与 Stockfish 等引擎对话：`uci` → `uciok`，`isready` → `readyok`，
//! `position startpos moves ...` + `go movetime N` → `bestmove X`。
//!
//! 进程按需启动，调用结束后要么放回空闲池（成功且池未满），要么发送 `quit` 并回收；
//! 进程以 kill_on_drop 启动，调用方 future 被丢弃时子进程也会被杀掉。

use std::io::ErrorKind;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use shakmaty::uci::UciMove;
use shakmaty::Chess;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;

use super::{EngineBudget, EngineError, Recommendation, SearchEngine};
use crate::config::EngineSection;

/// quit 之后等待进程自行退出的时间
const QUIT_WAIT: Duration = Duration::from_millis(500);

/// UciEngine 配置
#[derive(Debug, Clone)]
pub struct UciEngineConfig {
    pub path: std::path::PathBuf,
    pub args: Vec<String>,
    pub pool_size: usize,
    /// movetime 之外的等待余量；握手也以此为上限
    pub grace: Duration,
    pub options: Vec<(String, String)>,
}

impl From<&EngineSection> for UciEngineConfig {
    fn from(section: &EngineSection) -> Self {
        let mut options: Vec<(String, String)> = section
            .options
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        options.sort();
        Self {
            path: section.path.clone(),
            args: section.args.clone(),
            pool_size: section.pool_size,
            grace: Duration::from_secs(section.grace_secs),
            options,
        }
    }
}

impl Default for UciEngineConfig {
    fn default() -> Self {
        Self::from(&EngineSection::default())
    }
}

/// 基于外部进程的 UCI 引擎，带空闲进程池
pub struct UciEngine {
    config: UciEngineConfig,
    idle: Mutex<Vec<UciProcess>>,
}

impl UciEngine {
    pub fn new(config: UciEngineConfig) -> Self {
        Self {
            config,
            idle: Mutex::new(Vec::new()),
        }
    }

    pub fn config(&self) -> &UciEngineConfig {
        &self.config
    }

    /// 当前空闲进程数
    pub async fn idle_count(&self) -> usize {
        self.idle.lock().await.len()
    }

    /// 关闭全部空闲进程，返回关闭数量
    pub async fn drain(&self) -> usize {
        let processes = std::mem::take(&mut *self.idle.lock().await);
        let count = processes.len();
        for process in processes {
            process.shutdown().await;
        }
        count
    }

    async fn acquire(&self) -> Result<UciProcess, EngineError> {
        if let Some(process) = self.idle.lock().await.pop() {
            return Ok(process);
        }
        UciProcess::spawn(&self.config).await
    }

    async fn release(&self, process: UciProcess) {
        let mut idle = self.idle.lock().await;
        if idle.len() < self.config.pool_size {
            idle.push(process);
        } else {
            drop(idle);
            process.shutdown().await;
        }
    }
}

#[async_trait]
impl SearchEngine for UciEngine {
    async fn recommend(
        &self,
        _position: &Chess,
        history: &[UciMove],
        budget: &EngineBudget,
    ) -> Result<Recommendation, EngineError> {
        let mut process = self.acquire().await?;

        let deadline = budget.movetime + self.config.grace;
        let result = match tokio::time::timeout(deadline, process.search(history, budget)).await {
            Ok(result) => result,
            Err(_) => Err(EngineError::Timeout(deadline)),
        };

        match result {
            Ok(uci) => {
                let engine = process.name.clone();
                tracing::debug!(engine = %engine, uci = %uci, "engine answered");
                self.release(process).await;
                Ok(Recommendation { uci, engine })
            }
            Err(e) => {
                tracing::warn!(error = %e, "engine search failed, discarding process");
                process.shutdown().await;
                Err(e)
            }
        }
    }
}

/// 一个已完成握手的引擎进程
struct UciProcess {
    child: Child,
    stdin: ChildStdin,
    lines: Lines<BufReader<ChildStdout>>,
    name: String,
}

impl UciProcess {
    async fn spawn(config: &UciEngineConfig) -> Result<Self, EngineError> {
        let mut child = Command::new(&config.path)
            .args(&config.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound => EngineError::NotFound(config.path.clone()),
                _ => EngineError::Unavailable(format!("{}: {}", config.path.display(), e)),
            })?;

        let (Some(stdin), Some(stdout)) = (child.stdin.take(), child.stdout.take()) else {
            return Err(EngineError::Unavailable("engine pipes not captured".to_string()));
        };

        let mut process = Self {
            child,
            stdin,
            lines: BufReader::new(stdout).lines(),
            name: config.path.display().to_string(),
        };

        match tokio::time::timeout(config.grace, process.handshake(&config.options)).await {
            Ok(Ok(())) => {
                tracing::info!(engine = %process.name, "engine process started");
                Ok(process)
            }
            Ok(Err(e)) => {
                process.shutdown().await;
                Err(e)
            }
            Err(_) => {
                process.shutdown().await;
                Err(EngineError::Timeout(config.grace))
            }
        }
    }

    async fn handshake(&mut self, options: &[(String, String)]) -> Result<(), EngineError> {
        self.send("uci").await?;
        loop {
            let line = self.next_line().await?;
            if let Some(name) = line.strip_prefix("id name ") {
                self.name = name.trim().to_string();
            } else if line.trim() == "uciok" {
                break;
            }
        }
        for (name, value) in options {
            self.send(&format!("setoption name {} value {}", name, value))
                .await?;
        }
        self.sync().await
    }

    async fn search(
        &mut self,
        history: &[UciMove],
        budget: &EngineBudget,
    ) -> Result<UciMove, EngineError> {
        self.send(&format!(
            "setoption name Skill Level value {}",
            budget.skill_level
        ))
        .await?;
        self.send("ucinewgame").await?;
        self.sync().await?;

        self.send(&position_command(history)).await?;
        self.send(&format!("go movetime {}", budget.movetime.as_millis()))
            .await?;

        loop {
            let line = self.next_line().await?;
            if let Some(rest) = line.strip_prefix("bestmove") {
                return parse_bestmove(rest);
            }
        }
    }

    /// isready / readyok 同步点
    async fn sync(&mut self) -> Result<(), EngineError> {
        self.send("isready").await?;
        loop {
            if self.next_line().await?.trim() == "readyok" {
                return Ok(());
            }
        }
    }

    async fn send(&mut self, line: &str) -> Result<(), EngineError> {
        tracing::trace!(engine = %self.name, ">> {}", line);
        self.stdin.write_all(line.as_bytes()).await?;
        self.stdin.write_all(b"\n").await?;
        self.stdin.flush().await?;
        Ok(())
    }

    async fn next_line(&mut self) -> Result<String, EngineError> {
        match self.lines.next_line().await? {
            Some(line) => {
                tracing::trace!(engine = %self.name, "<< {}", line);
                Ok(line)
            }
            None => Err(EngineError::Protocol(
                "engine closed its output".to_string(),
            )),
        }
    }

    /// 发送 quit，等待片刻，仍未退出则强杀
    async fn shutdown(mut self) {
        let _ = self.send("quit").await;
        if tokio::time::timeout(QUIT_WAIT, self.child.wait())
            .await
            .is_err()
        {
            let _ = self.child.kill().await;
        }
    }
}

fn position_command(history: &[UciMove]) -> String {
    let mut cmd = String::from("position startpos");
    if !history.is_empty() {
        cmd.push_str(" moves");
        for m in history {
            cmd.push(' ');
            cmd.push_str(&m.to_string());
        }
    }
    cmd
}

fn parse_bestmove(rest: &str) -> Result<UciMove, EngineError> {
    let token = rest
        .split_whitespace()
        .next()
        .ok_or_else(|| EngineError::Protocol("empty bestmove".to_string()))?;
    if token == "(none)" || token == "0000" {
        return Err(EngineError::Protocol(
            "engine has no move in this position".to_string(),
        ));
    }
    token
        .parse::<UciMove>()
        .map_err(|_| EngineError::Protocol(format!("unparsable bestmove `{}`", token)))
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    fn budget() -> EngineBudget {
        EngineBudget {
            movetime: Duration::from_millis(10),
            skill_level: 5,
        }
    }

    #[test]
    fn test_position_command() {
        assert_eq!(position_command(&[]), "position startpos");
        let history: Vec<UciMove> = ["e2e4", "e7e5"].iter().map(|m| m.parse().unwrap()).collect();
        assert_eq!(position_command(&history), "position startpos moves e2e4 e7e5");
    }

    #[test]
    fn test_parse_bestmove() {
        assert_eq!(parse_bestmove(" e2e4 ponder e7e5").unwrap().to_string(), "e2e4");
        assert_eq!(parse_bestmove(" e7e8q").unwrap().to_string(), "e7e8q");
        assert!(matches!(parse_bestmove(" (none)"), Err(EngineError::Protocol(_))));
        assert!(matches!(parse_bestmove(""), Err(EngineError::Protocol(_))));
        assert!(matches!(parse_bestmove(" xyz"), Err(EngineError::Protocol(_))));
    }

    #[tokio::test]
    async fn test_missing_executable_is_not_found() {
        let engine = UciEngine::new(UciEngineConfig {
            path: PathBuf::from("/nonexistent/stockfish"),
            ..UciEngineConfig::default()
        });
        let err = engine
            .recommend(&Chess::default(), &[], &budget())
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::NotFound(_)));
        assert_eq!(engine.idle_count().await, 0);
    }

    /// 用 sh 脚本模拟引擎；通过解释器启动，避免执行刚写入的文件
    #[cfg(unix)]
    fn scripted_engine(dir: &tempfile::TempDir, go_reply: &str, pool_size: usize) -> UciEngine {
        let script = dir.path().join("fake_engine.sh");
        let body = format!(
            r#"while IFS= read -r line; do
  case "$line" in
    uci) echo "id name FakeFish 1.0"; echo "uciok" ;;
    isready) echo "readyok" ;;
    go*) {go_reply} ;;
    quit) exit 0 ;;
  esac
done
"#
        );
        std::fs::write(&script, body).unwrap();
        UciEngine::new(UciEngineConfig {
            path: PathBuf::from("/bin/sh"),
            args: vec![script.display().to_string()],
            pool_size,
            grace: Duration::from_millis(500),
            options: vec![("Threads".to_string(), "1".to_string())],
        })
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_scripted_engine_returns_bestmove_and_is_pooled() {
        let dir = tempfile::tempdir().unwrap();
        let engine = scripted_engine(&dir, r#"echo "info depth 1"; echo "bestmove e7e5 ponder g1f3""#, 1);
        let history: Vec<UciMove> = vec!["e2e4".parse().unwrap()];

        let rec = engine
            .recommend(&Chess::default(), &history, &budget())
            .await
            .unwrap();
        assert_eq!(rec.uci.to_string(), "e7e5");
        assert_eq!(rec.engine, "FakeFish 1.0");
        assert_eq!(engine.idle_count().await, 1);

        // 第二次调用复用池中进程
        let rec = engine
            .recommend(&Chess::default(), &history, &budget())
            .await
            .unwrap();
        assert_eq!(rec.uci.to_string(), "e7e5");
        assert_eq!(engine.idle_count().await, 1);

        assert_eq!(engine.drain().await, 1);
        assert_eq!(engine.idle_count().await, 0);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_pool_size_zero_tears_down_every_call() {
        let dir = tempfile::tempdir().unwrap();
        let engine = scripted_engine(&dir, r#"echo "bestmove d7d5""#, 0);
        let rec = engine
            .recommend(&Chess::default(), &[], &budget())
            .await
            .unwrap();
        assert_eq!(rec.uci.to_string(), "d7d5");
        assert_eq!(engine.idle_count().await, 0);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_no_move_is_protocol_error_and_process_discarded() {
        let dir = tempfile::tempdir().unwrap();
        let engine = scripted_engine(&dir, r#"echo "bestmove (none)""#, 1);
        let err = engine
            .recommend(&Chess::default(), &[], &budget())
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Protocol(_)));
        assert_eq!(engine.idle_count().await, 0);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_silent_engine_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let engine = scripted_engine(&dir, ":", 1);
        let err = engine
            .recommend(&Chess::default(), &[], &budget())
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Timeout(_)));
        assert_eq!(engine.idle_count().await, 0);
    }
}
