//! 内存版事件总线（InMemoryEventBus）
//!
//! 基于 tokio 任务实现的进程内事件总线，满足 `EventBus` 协议：
//! - 每个处理器在独立任务中运行，互不阻塞；
//! - `WaitMode` 仅决定调用方的等待方式，不影响处理器本身的执行；
//! - 处理器收到的取消令牌同时响应发布方取消与应用关闭；
//! - 处理器失败（含 panic）都会上报异常接收器；
//! - 挂载 `EventRecorder` 时，每个被发布的事件都会被额外记录。
//!
//! 注意：`WaitForNone` 为“发后即忘”语义，处理器错误只会记录日志并上报接收器。

use crate::error::{DomainError, DomainResult as Result};
use crate::event::Event;
use crate::eventing::{
    EventBus, EventBusExceptionReceiver, EventHandlerRegistry, EventRecorder,
    NoopEventBusReceiver, WaitMode,
};
use crate::worker::link_tokens;
use async_trait::async_trait;
use futures_util::FutureExt;
use futures_util::future::{BoxFuture, join_all, select_all};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::task::JoinError;
use tokio_util::sync::CancellationToken;

type HandlerOutcome = (String, std::result::Result<anyhow::Result<()>, JoinError>);

/// 进程内事件总线
#[derive(Clone)]
pub struct InMemoryEventBus {
    registry: Arc<EventHandlerRegistry>,
    recorder: Option<Arc<EventRecorder>>,
    receiver: Arc<dyn EventBusExceptionReceiver>,
    shutdown: CancellationToken,
}

impl InMemoryEventBus {
    pub fn new(registry: Arc<EventHandlerRegistry>) -> Self {
        Self {
            registry,
            recorder: None,
            receiver: Arc::new(NoopEventBusReceiver),
            shutdown: CancellationToken::new(),
        }
    }

    /// 挂载测试记录器
    pub fn with_recorder(mut self, recorder: Arc<EventRecorder>) -> Self {
        self.recorder = Some(recorder);
        self
    }

    pub fn with_receiver(mut self, receiver: Arc<dyn EventBusExceptionReceiver>) -> Self {
        self.receiver = receiver;
        self
    }

    /// 绑定应用级关闭信号；处理器令牌派生自它与发布方令牌
    pub fn with_shutdown(mut self, token: CancellationToken) -> Self {
        self.shutdown = token;
        self
    }

    pub fn registry(&self) -> &Arc<EventHandlerRegistry> {
        &self.registry
    }

    fn spawn_handlers<E: Event>(
        &self,
        event: E,
        filter: &(dyn for<'a> Fn(&'a str) -> bool + Send + Sync),
        cancel: &CancellationToken,
    ) -> Vec<BoxFuture<'static, HandlerOutcome>> {
        let handlers: Vec<_> = self
            .registry
            .handlers::<E>()
            .into_iter()
            .filter(|h| filter(h.handler_name()))
            .collect();
        if handlers.is_empty() {
            return Vec::new();
        }

        let event = Arc::new(event);
        // 守卫由全部处理器任务共享，最后一个任务结束时释放监听
        let (token, guard) = link_tokens(cancel, &self.shutdown);
        let guard = Arc::new(guard);

        handlers
            .into_iter()
            .map(|h| {
                let name = h.handler_name().to_string();
                let event = event.clone();
                let token = token.clone();
                let guard = guard.clone();
                let receiver = self.receiver.clone();
                let task_name = name.clone();
                let task = tokio::spawn(async move {
                    let res = match AssertUnwindSafe(h.handle(&event, &token)).catch_unwind().await {
                        Ok(res) => res,
                        Err(_) => Err(anyhow::anyhow!("event handler panicked")),
                    };
                    if let Err(err) = &res {
                        tracing::warn!(event = E::NAME, handler = %task_name, error = %err, "event handler failed");
                        receiver.on_handler_error(E::NAME, &task_name, err).await;
                    }
                    drop(guard);
                    res
                });
                async move { (name, task.await) }.boxed()
            })
            .collect()
    }
}

fn flatten((name, joined): HandlerOutcome) -> (String, Option<String>) {
    match joined {
        Ok(Ok(())) => (name, None),
        Ok(Err(err)) => (name, Some(err.to_string())),
        Err(join_err) => (name, Some(join_err.to_string())),
    }
}

#[async_trait]
impl EventBus for InMemoryEventBus {
    async fn publish_filtered<E>(
        &self,
        event: E,
        mode: WaitMode,
        filter: &(dyn for<'a> Fn(&'a str) -> bool + Send + Sync),
        cancel: &CancellationToken,
    ) -> Result<()>
    where
        E: Event,
    {
        if cancel.is_cancelled() || self.shutdown.is_cancelled() {
            return Err(DomainError::Cancelled);
        }

        if let Some(recorder) = &self.recorder {
            recorder.record(&event);
        }

        let tasks = self.spawn_handlers(event, filter, cancel);
        if tasks.is_empty() {
            return Ok(());
        }

        match mode {
            // 丢弃等待句柄即脱离等待，任务继续运行
            WaitMode::WaitForNone => Ok(()),
            WaitMode::WaitForAny => {
                let (first, _idx, rest) = tokio::select! {
                    biased;
                    out = select_all(tasks) => out,
                    _ = cancel.cancelled() => return Err(DomainError::Cancelled),
                    _ = self.shutdown.cancelled() => return Err(DomainError::Cancelled),
                };
                drop(rest);

                match flatten(first) {
                    (_, None) => Ok(()),
                    (handler, Some(reason)) => Err(DomainError::EventHandler { handler, reason }),
                }
            }
            WaitMode::WaitForAll => {
                let joined = tokio::select! {
                    biased;
                    out = join_all(tasks) => out,
                    _ = cancel.cancelled() => return Err(DomainError::Cancelled),
                    _ = self.shutdown.cancelled() => return Err(DomainError::Cancelled),
                };

                let mut failures: Vec<(String, String)> = joined
                    .into_iter()
                    .map(flatten)
                    .filter_map(|(handler, reason)| reason.map(|r| (handler, r)))
                    .collect();

                match failures.len() {
                    0 => Ok(()),
                    1 => {
                        let (handler, reason) = failures.remove(0);
                        Err(DomainError::EventHandler { handler, reason })
                    }
                    _ => Err(DomainError::EventHandlers { failures }),
                }
            }
        }
    }
}
