//! 中枢异常接收器（HubExceptionReceiver）
//!
//! 供外部接入可观测性：存储写入/读取/完成标记失败、清理失败与订阅者驱逐。
//! 所有回调默认空实现；中枢本身不因这些错误终止循环。
//!
use crate::error::DomainError;
use crate::hub::EventRecord;
use async_trait::async_trait;

#[async_trait]
pub trait HubExceptionReceiver: Send + Sync {
    /// 写入记录失败（`attempt` 从 1 开始）
    async fn on_store_event_error(&self, _record: &EventRecord, _attempt: usize, _error: &DomainError) {}

    /// 读取订阅者待投递记录失败
    async fn on_get_next_batch_error(
        &self,
        _subscriber_id: &str,
        _attempt: usize,
        _error: &DomainError,
    ) {
    }

    /// 标记完成失败
    async fn on_mark_complete_error(
        &self,
        _record: &EventRecord,
        _attempt: usize,
        _error: &DomainError,
    ) {
    }

    /// 陈旧记录清理失败
    async fn on_purge_stale_error(&self, _error: &DomainError) {}

    /// 订阅者已被移出广播列表：队列溢出（`QueueOverflow`）或长期无人取数（`StaleSubscriber`）
    async fn on_queue_overflow(&self, _subscriber_id: &str, _error: &DomainError) {}
}

/// 空实现
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopHubReceiver;

impl HubExceptionReceiver for NoopHubReceiver {}
