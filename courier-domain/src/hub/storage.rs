//! 事件存储协议（EventStorage）
//!
//! 由外部实现（关系型、文档型或内存），核心只通过该协议读写记录：
//! - `store_event`：持久化一条记录，容量不足时返回 `DomainError::QueueOverflow`；
//! - `next_batch`：按订阅者取出待投递（未完成、未过期）的记录，保持写入顺序；
//! - `mark_complete`：幂等的完成标记；
//! - `purge_stale`：批量删除陈旧记录（已完成或已过期），其余记录保留；
//! - `stale_subscriber_ids`：长期无人取数的订阅者，由中枢驱逐（可选，默认无）；
//! - `restore_subscriber_ids`：重启后恢复某事件类型的已知订阅者。
//!
use crate::error::DomainResult as Result;
use crate::hub::EventRecord;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// 待投递记录的查询条件
#[derive(Clone, Debug)]
pub struct PendingRecordQuery {
    pub event_type: String,
    pub subscriber_id: String,
    pub limit: usize,
    pub now: DateTime<Utc>,
}

impl PendingRecordQuery {
    pub fn new(event_type: &str, subscriber_id: &str, limit: usize) -> Self {
        Self {
            event_type: event_type.to_string(),
            subscriber_id: subscriber_id.to_string(),
            limit,
            now: Utc::now(),
        }
    }

    pub fn matches(&self, record: &EventRecord) -> bool {
        record.subscriber_id() == self.subscriber_id
            && record.event_type() == self.event_type
            && !record.is_complete()
            && !record.is_expired(self.now)
    }
}

/// 陈旧记录的判定条件：`is_complete || now >= expire_on`
#[derive(Clone, Copy, Debug)]
pub struct StaleRecordFilter {
    pub now: DateTime<Utc>,
}

impl StaleRecordFilter {
    pub fn at(now: DateTime<Utc>) -> Self {
        Self { now }
    }

    pub fn matches(&self, record: &EventRecord) -> bool {
        record.is_stale(self.now)
    }
}

#[async_trait]
pub trait EventStorage: Send + Sync {
    async fn store_event(&self, record: EventRecord) -> Result<()>;

    /// 返回结果须按写入顺序排列，数量不超过 `query.limit`
    async fn next_batch(&self, query: PendingRecordQuery) -> Result<Vec<EventRecord>>;

    async fn mark_complete(&self, record: &EventRecord) -> Result<()>;

    /// 返回被删除的记录数
    async fn purge_stale(&self, filter: StaleRecordFilter) -> Result<usize>;

    /// 长期无人取数的订阅者 ID；不支持该判定的存储返回空
    async fn stale_subscriber_ids(&self, _event_type: &str, _now: DateTime<Utc>) -> Result<Vec<String>> {
        Ok(Vec::new())
    }

    async fn restore_subscriber_ids(&self, event_type: &str) -> Result<Vec<String>>;
}
