//! 内存版事件存储（InMemoryEventStorage）
//!
//! 每个订阅者（按“事件类型 + 订阅者 ID”区分）持有一条独立的 FIFO 队列：
//! - 写入超过 `max_queue_size` 时返回 `QueueOverflow`，由中枢执行驱逐；
//! - `next_batch` 只读取不出队，投递成功后 `mark_complete` 才真正出队；
//! - 清理只删除已完成或已过期的记录；
//! - 队列记录最近一次取数时间，长期无人取数的队列经 `stale_subscriber_ids` 上报，由中枢驱逐其订阅者。
//!
//! 典型用途：测试环境、示例与单实例部署。
use crate::error::{DomainError, DomainResult as Result};
use crate::hub::{EventRecord, EventStorage, PendingRecordQuery, StaleRecordFilter};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use std::collections::VecDeque;

/// 内存存储配置
#[derive(Clone, Copy, Debug)]
pub struct InMemoryEventStorageConfig {
    /// 单个订阅者队列的最大记录数
    pub max_queue_size: usize,
    /// 队列深度超过该值且空闲超过 `idle_limit_with_depth` 视为陈旧
    pub stale_depth: usize,
    pub idle_limit_with_depth: Duration,
    /// 队列非空且空闲超过该值视为陈旧
    pub idle_limit: Duration,
}

impl Default for InMemoryEventStorageConfig {
    fn default() -> Self {
        Self {
            max_queue_size: 10_000,
            stale_depth: 1000,
            idle_limit_with_depth: Duration::hours(1),
            idle_limit: Duration::hours(4),
        }
    }
}

/// 单个订阅者的待投递队列
#[derive(Debug)]
pub struct SubscriberQueue {
    records: VecDeque<EventRecord>,
    last_dequeue_at: DateTime<Utc>,
}

impl SubscriberQueue {
    fn new(now: DateTime<Utc>) -> Self {
        Self {
            records: VecDeque::new(),
            last_dequeue_at: now,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn last_dequeue_at(&self) -> DateTime<Utc> {
        self.last_dequeue_at
    }

    pub fn is_stale(&self, now: DateTime<Utc>, config: &InMemoryEventStorageConfig) -> bool {
        let idle = now - self.last_dequeue_at;
        (self.len() > config.stale_depth && idle > config.idle_limit_with_depth)
            || (!self.is_empty() && idle > config.idle_limit)
    }
}

type QueueKey = (String, String);

#[derive(Default)]
pub struct InMemoryEventStorage {
    queues: DashMap<QueueKey, SubscriberQueue>,
    config: InMemoryEventStorageConfig,
}

impl InMemoryEventStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: InMemoryEventStorageConfig) -> Self {
        Self {
            queues: DashMap::new(),
            config,
        }
    }

    /// 指定单队列上限，其余使用默认配置
    pub fn with_max_queue_size(max_queue_size: usize) -> Self {
        Self::with_config(InMemoryEventStorageConfig {
            max_queue_size,
            ..Default::default()
        })
    }

    /// 某订阅者队列中的记录数（含已过期未清理的记录）
    pub fn queue_len(&self, event_type: &str, subscriber_id: &str) -> usize {
        self.queues
            .get(&(event_type.to_string(), subscriber_id.to_string()))
            .map(|q| q.len())
            .unwrap_or(0)
    }

    pub fn total_records(&self) -> usize {
        self.queues.iter().map(|q| q.len()).sum()
    }

    #[cfg(test)]
    pub(crate) fn backdate(&self, event_type: &str, subscriber_id: &str, at: DateTime<Utc>) {
        if let Some(mut q) = self
            .queues
            .get_mut(&(event_type.to_string(), subscriber_id.to_string()))
        {
            q.last_dequeue_at = at;
        }
    }
}

#[async_trait]
impl EventStorage for InMemoryEventStorage {
    async fn store_event(&self, record: EventRecord) -> Result<()> {
        let key = (
            record.event_type().to_string(),
            record.subscriber_id().to_string(),
        );
        let mut queue = self
            .queues
            .entry(key)
            .or_insert_with(|| SubscriberQueue::new(Utc::now()));

        if queue.len() >= self.config.max_queue_size {
            return Err(DomainError::QueueOverflow {
                subscriber_id: record.subscriber_id().to_string(),
                limit: self.config.max_queue_size,
            });
        }

        queue.records.push_back(record);
        Ok(())
    }

    async fn next_batch(&self, query: PendingRecordQuery) -> Result<Vec<EventRecord>> {
        let key = (query.event_type.clone(), query.subscriber_id.clone());
        let Some(mut queue) = self.queues.get_mut(&key) else {
            return Ok(Vec::new());
        };

        queue.last_dequeue_at = query.now;
        // 队首的过期记录不会再被投递，直接出队
        while queue
            .records
            .front()
            .is_some_and(|r| r.is_stale(query.now))
        {
            queue.records.pop_front();
        }

        Ok(queue
            .records
            .iter()
            .filter(|r| query.matches(r))
            .take(query.limit)
            .cloned()
            .collect())
    }

    async fn mark_complete(&self, record: &EventRecord) -> Result<()> {
        let key = (
            record.event_type().to_string(),
            record.subscriber_id().to_string(),
        );
        if let Some(mut queue) = self.queues.get_mut(&key) {
            if let Some(pos) = queue.records.iter().position(|r| r.id() == record.id()) {
                queue.records.remove(pos);
            }
        }
        Ok(())
    }

    async fn purge_stale(&self, filter: StaleRecordFilter) -> Result<usize> {
        let mut purged = 0;

        for mut queue in self.queues.iter_mut() {
            let before = queue.len();
            queue.records.retain(|r| !filter.matches(r));
            purged += before - queue.len();
        }

        Ok(purged)
    }

    async fn stale_subscriber_ids(&self, event_type: &str, now: DateTime<Utc>) -> Result<Vec<String>> {
        Ok(self
            .queues
            .iter()
            .filter(|e| e.key().0 == event_type && e.value().is_stale(now, &self.config))
            .map(|e| e.key().1.clone())
            .collect())
    }

    async fn restore_subscriber_ids(&self, event_type: &str) -> Result<Vec<String>> {
        Ok(self
            .queues
            .iter()
            .filter(|e| e.key().0 == event_type)
            .map(|e| e.key().1.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Event;
    use serde::{Deserialize, Serialize};

    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    struct Tick(u32);
    impl Event for Tick {
        const NAME: &'static str = "tick";
    }

    fn rec(subscriber: &str, n: u32, expire_on: DateTime<Utc>) -> EventRecord {
        EventRecord::for_subscriber(subscriber, &Tick(n), expire_on).unwrap()
    }

    fn later() -> DateTime<Utc> {
        Utc::now() + Duration::hours(1)
    }

    #[tokio::test]
    async fn batches_preserve_fifo_order_per_subscriber() {
        let storage = InMemoryEventStorage::new();
        for n in 0..5 {
            storage.store_event(rec("a", n, later())).await.unwrap();
            storage.store_event(rec("b", 100 + n, later())).await.unwrap();
        }

        let batch = storage
            .next_batch(PendingRecordQuery::new("tick", "a", 3))
            .await
            .unwrap();
        let ids: Vec<u32> = batch.iter().map(|r| r.to_event::<Tick>().unwrap().0).collect();
        assert_eq!(ids, vec![0, 1, 2]);

        storage.mark_complete(&batch[0]).await.unwrap();
        storage.mark_complete(&batch[0]).await.unwrap();
        let batch = storage
            .next_batch(PendingRecordQuery::new("tick", "a", 10))
            .await
            .unwrap();
        let ids: Vec<u32> = batch.iter().map(|r| r.to_event::<Tick>().unwrap().0).collect();
        assert_eq!(ids, vec![1, 2, 3, 4]);
        assert_eq!(storage.queue_len("tick", "b"), 5);
    }

    #[tokio::test]
    async fn overflow_beyond_max_queue_size() {
        let storage = InMemoryEventStorage::with_max_queue_size(2);
        storage.store_event(rec("a", 1, later())).await.unwrap();
        storage.store_event(rec("a", 2, later())).await.unwrap();

        let err = storage.store_event(rec("a", 3, later())).await.unwrap_err();
        match err {
            DomainError::QueueOverflow {
                subscriber_id,
                limit,
            } => {
                assert_eq!(subscriber_id, "a");
                assert_eq!(limit, 2);
            }
            other => panic!("unexpected {other:?}"),
        }
        // 其他订阅者不受影响
        storage.store_event(rec("b", 3, later())).await.unwrap();
    }

    #[tokio::test]
    async fn expired_records_are_not_delivered() {
        let storage = InMemoryEventStorage::new();
        storage
            .store_event(rec("a", 1, Utc::now() - Duration::seconds(1)))
            .await
            .unwrap();
        storage.store_event(rec("a", 2, later())).await.unwrap();

        let batch = storage
            .next_batch(PendingRecordQuery::new("tick", "a", 10))
            .await
            .unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].to_event::<Tick>().unwrap(), Tick(2));
    }

    #[tokio::test]
    async fn purge_removes_only_stale_records() {
        let storage = InMemoryEventStorage::new();
        let now = Utc::now();
        let live = rec("a", 1, now + Duration::hours(1));
        let mut done = rec("a", 2, now + Duration::hours(1));
        done.mark_complete();
        let expired = rec("a", 3, now - Duration::minutes(1));

        storage.store_event(done).await.unwrap();
        storage.store_event(live.clone()).await.unwrap();
        storage.store_event(expired).await.unwrap();

        let purged = storage.purge_stale(StaleRecordFilter::at(now)).await.unwrap();
        assert_eq!(purged, 2);
        assert_eq!(storage.queue_len("tick", "a"), 1);

        let batch = storage
            .next_batch(PendingRecordQuery::new("tick", "a", 10))
            .await
            .unwrap();
        assert_eq!(batch[0].id(), live.id());
    }

    #[tokio::test]
    async fn purge_keeps_live_records_of_idle_queues() {
        let storage = InMemoryEventStorage::new();
        let now = Utc::now();
        let live = rec("idle", 1, now + Duration::hours(3));
        storage.store_event(live.clone()).await.unwrap();
        storage.store_event(rec("busy", 1, now + Duration::hours(3))).await.unwrap();
        storage.backdate("tick", "idle", now - Duration::hours(5));

        let purged = storage.purge_stale(StaleRecordFilter::at(now)).await.unwrap();
        assert_eq!(purged, 0);
        assert_eq!(storage.queue_len("tick", "idle"), 1);

        let mut ids = storage.restore_subscriber_ids("tick").await.unwrap();
        ids.sort();
        assert_eq!(ids, vec!["busy".to_string(), "idle".to_string()]);
    }

    #[tokio::test]
    async fn idle_non_empty_queue_is_reported_as_stale() {
        let storage = InMemoryEventStorage::new();
        storage.store_event(rec("gone", 1, Utc::now() + Duration::days(1))).await.unwrap();
        storage.store_event(rec("here", 1, Utc::now() + Duration::days(1))).await.unwrap();
        storage.backdate("tick", "gone", Utc::now() - Duration::hours(5));

        let stale = storage
            .stale_subscriber_ids("tick", Utc::now())
            .await
            .unwrap();
        assert_eq!(stale, vec!["gone".to_string()]);
        assert!(storage
            .stale_subscriber_ids("other", Utc::now())
            .await
            .unwrap()
            .is_empty());
    }

    #[test]
    fn queue_staleness_thresholds() {
        let config = InMemoryEventStorageConfig::default();
        let now = Utc::now();
        let mut q = SubscriberQueue::new(now - Duration::hours(2));
        assert!(!q.is_stale(now, &config));

        for n in 0..=config.stale_depth as u32 {
            q.records.push_back(rec("a", n, now + Duration::days(1)));
        }
        assert!(q.is_stale(now, &config));

        q.records.truncate(10);
        assert!(!q.is_stale(now, &config));
        q.last_dequeue_at = now - Duration::hours(5);
        assert!(q.is_stale(now, &config));
    }
}
