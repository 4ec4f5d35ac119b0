//! 优雅关闭
//!
//! 收到 Ctrl+C 或 SIGTERM 后取消 token：轮询循环、Webhook 服务和控制台读取随之停止，
//! 之后由 [`ShutdownCoordinator`] 回收引擎池里的空闲 UCI 进程。

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::engine::UciEngine;

/// 回收单项资源的默认时限
const DEFAULT_RELEASE_TIMEOUT: Duration = Duration::from_secs(5);

/// 关闭信号：一个可克隆的取消 token 加上系统信号监听
#[derive(Clone, Default)]
pub struct ShutdownManager {
    token: CancellationToken,
}

impl ShutdownManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// 交给长任务（轮询、Webhook、控制台）的取消 token
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn trigger(&self) {
        self.token.cancel();
    }

    pub fn is_shutdown(&self) -> bool {
        self.token.is_cancelled()
    }

    /// 监听 Ctrl+C 与 SIGTERM，任一到达即触发关闭
    pub fn install_signal_handlers(self: &Arc<Self>) {
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Ctrl+C received, stopping chessbot");
                manager.trigger();
            }
        });

        #[cfg(unix)]
        {
            let manager = Arc::clone(self);
            tokio::spawn(async move {
                use tokio::signal::unix::{signal, SignalKind};
                if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
                    sigterm.recv().await;
                    tracing::info!("SIGTERM received, stopping chessbot");
                    manager.trigger();
                }
            });
        }
    }
}

/// 退出前需要释放的资源
#[async_trait::async_trait]
pub trait ShutdownCleanup: Send + Sync {
    async fn cleanup(&self) -> anyhow::Result<()>;

    /// 日志中的资源名
    fn name(&self) -> &'static str;
}

/// 退出时依次释放已登记的资源，每项受同一时限约束
pub struct ShutdownCoordinator {
    resources: Vec<Arc<dyn ShutdownCleanup>>,
    timeout: Duration,
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownCoordinator {
    pub fn new() -> Self {
        Self {
            resources: Vec::new(),
            timeout: DEFAULT_RELEASE_TIMEOUT,
        }
    }

    pub fn register<T: ShutdownCleanup + 'static>(&mut self, resource: T) {
        self.resources.push(Arc::new(resource));
    }

    /// 释放全部资源；失败或超时只记日志，不中断后续项
    pub async fn run_cleanup(&self) {
        for resource in &self.resources {
            let name = resource.name();
            match tokio::time::timeout(self.timeout, resource.cleanup()).await {
                Ok(Ok(())) => tracing::info!(resource = name, "released"),
                Ok(Err(e)) => tracing::warn!(resource = name, error = %e, "release failed"),
                Err(_) => tracing::warn!(
                    resource = name,
                    timeout_secs = self.timeout.as_secs(),
                    "release timed out"
                ),
            }
        }
    }
}

/// 引擎池：向每个空闲 UCI 进程发送 `quit` 并等待退出
pub struct EnginePoolCleanup {
    engine: Arc<UciEngine>,
}

impl EnginePoolCleanup {
    pub fn new(engine: Arc<UciEngine>) -> Self {
        Self { engine }
    }
}

#[async_trait::async_trait]
impl ShutdownCleanup for EnginePoolCleanup {
    async fn cleanup(&self) -> anyhow::Result<()> {
        let drained = self.engine.drain().await;
        tracing::debug!(drained, "idle engine processes stopped");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "engine-pool"
    }
}

/// 运行 `app`，直到它自行结束或收到关闭信号，然后执行 `cleanup`
pub async fn run_with_graceful_shutdown<F, Fut>(
    shutdown: Arc<ShutdownManager>,
    app: F,
    cleanup: impl FnOnce() -> Fut,
) where
    F: Future<Output = ()>,
    Fut: Future<Output = ()>,
{
    shutdown.install_signal_handlers();
    let token = shutdown.token();

    tokio::select! {
        _ = app => tracing::info!("chessbot transport stopped"),
        _ = token.cancelled() => tracing::info!("shutdown requested"),
    }

    cleanup().await;
}
