use async_trait::async_trait;

/// 进程内事件总线的异常接收器
///
/// 处理器失败（含 panic）时调用，与等待模式无关；
/// `WaitForNone` 下这是调用方之外唯一能观测到处理器错误的途径。
#[async_trait]
pub trait EventBusExceptionReceiver: Send + Sync {
    async fn on_handler_error(&self, _event: &'static str, _handler: &str, _error: &anyhow::Error) {}
}

pub struct NoopEventBusReceiver;

impl EventBusExceptionReceiver for NoopEventBusReceiver {}
