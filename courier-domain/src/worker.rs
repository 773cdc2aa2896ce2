//! 后台任务（Worker）
//!
//! 统一管理长驻任务的启动、关闭与等待：
//! - `spawn_periodic`：按固定间隔执行的周期任务（错过的 tick 直接跳过）；
//! - `WorkerHandle`：持有取消令牌与任务句柄，`shutdown` 发出协作式取消，`join` 等待退出；
//! - 句柄被丢弃时自动发出取消信号；
//! - `link_tokens`：派生同时响应请求级与应用级取消的令牌。
//!
use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::{CancellationToken, DropGuard};

/// 启动周期任务：每个 tick 执行一次 `f`，直到 `token` 被取消
pub fn spawn_periodic<F, Fut>(token: CancellationToken, interval: Duration, mut f: F) -> JoinHandle<()>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        let mut ticker = time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // interval 的第一个 tick 立即完成，周期任务从一个完整间隔后开始
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = ticker.tick() => f().await,
            }
        }
    })
}

/// 在 `token` 被取消前休眠 `delay`；返回 `false` 表示已取消
pub async fn sleep_or_cancel(token: &CancellationToken, delay: Duration) -> bool {
    tokio::select! {
        _ = token.cancelled() => false,
        _ = time::sleep(delay) => true,
    }
}

/// 派生一个在 `request` 或 `app` 任一被取消时都会取消的令牌
///
/// 返回的守卫在丢弃时取消派生令牌并结束内部的监听任务。需在 tokio 运行时内调用。
pub fn link_tokens(request: &CancellationToken, app: &CancellationToken) -> (CancellationToken, DropGuard) {
    let linked = app.child_token();

    if request.is_cancelled() {
        linked.cancel();
    } else {
        let request = request.clone();
        let watched = linked.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = request.cancelled() => watched.cancel(),
                _ = watched.cancelled() => {}
            }
        });
    }

    let guard = linked.clone().drop_guard();
    (linked, guard)
}

/// 运行句柄：用于优雅关闭与等待任务结束
pub struct WorkerHandle {
    token: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl WorkerHandle {
    pub fn new(token: CancellationToken, tasks: Vec<JoinHandle<()>>) -> Self {
        Self { token, tasks }
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn push(&mut self, task: JoinHandle<()>) {
        self.tasks.push(task);
    }

    pub fn shutdown(&self) {
        self.token.cancel();
    }

    pub async fn join(mut self) {
        let tasks = std::mem::take(&mut self.tasks);

        for t in tasks {
            let _ = t.await;
        }
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}
