//! 事件处理器（EventHandler）
//!
//! 定义消费某一事件类型的处理逻辑与元信息（名称）。
//!
use crate::event::Event;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// 事件处理器：处理某一类型的事件
#[async_trait]
pub trait EventHandler<E>: Send + Sync
where
    E: Event,
{
    /// 处理器名称（用于过滤发布、失败标记与日志），默认取具体类型名
    fn handler_name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// 处理事件；`cancel` 在发布方取消或应用关闭时触发
    async fn handle(&self, event: &E, cancel: &CancellationToken) -> anyhow::Result<()>;
}
