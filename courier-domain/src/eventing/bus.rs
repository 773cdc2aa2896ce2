//! 事件总线（EventBus）协议
//!
//! 定义进程内事件发布的统一抽象：一个事件扇出到零到多个处理器，
//! 调用方按 `WaitMode` 决定是否以及如何等待处理器完成。
//!
use crate::error::DomainResult as Result;
use crate::event::Event;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// 发布方对处理器的等待策略
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum WaitMode {
    /// 立即返回，处理器错误对调用方不可见
    #[default]
    WaitForNone,
    /// 首个处理器完成即返回，其错误向调用方传播；其余处理器继续独立运行
    WaitForAny,
    /// 全部处理器完成后返回；任一失败则在全部结束后汇总报告
    WaitForAll,
}

/// 事件总线：负责将事件分发给已注册的处理器
///
/// 该 trait 带有泛型方法，通常以具体实现类型注入使用。
#[async_trait]
pub trait EventBus: Send + Sync {
    /// 发布事件到全部处理器；没有处理器时直接成功返回
    async fn publish<E>(&self, event: E, mode: WaitMode, cancel: &CancellationToken) -> Result<()>
    where
        E: Event,
    {
        self.publish_filtered(event, mode, &|_: &str| true, cancel)
            .await
    }

    /// 仅发布到 `filter(handler_name)` 为真的处理器
    async fn publish_filtered<E>(
        &self,
        event: E,
        mode: WaitMode,
        filter: &(dyn for<'a> Fn(&'a str) -> bool + Send + Sync),
        cancel: &CancellationToken,
    ) -> Result<()>
    where
        E: Event;
}
