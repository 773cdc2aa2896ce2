//! 事件中枢（EventHub）
//!
//! 每个事件类型一个中枢实例，编排“订阅 → 扇出写入 → 逐订阅者投递”：
//! - `subscribe`：登记订阅者并为其启动独立的投递循环；
//! - `broadcast`：为每个已知订阅者各写入一条记录（写时扇出），写入后唤醒其投递循环；
//! - 存储错误：上报异常接收器，固定延迟后重试，循环不会因瞬时错误退出；
//! - 队列溢出或长期无人取数：订阅者被移出广播列表，其他订阅者照常写入；
//! - 循环仅在应用关闭、显式退订或传输断开时结束。
//!
//! 中枢实现了 `EventHandler<E>`，注册到进程内总线后，本地发布即触发远程广播。
//!
use crate::error::DomainError;
use crate::event::Event;
use crate::eventing::EventHandler;
use crate::hub::{
    ChannelSink, EventRecord, EventSink, EventStorage, HubExceptionReceiver, NoopHubReceiver,
    PendingRecordQuery,
};
use crate::worker::{WorkerHandle, sleep_or_cancel, spawn_periodic};
use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use futures_core::stream::BoxStream;
use futures_util::future::join_all;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::marker::PhantomData;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::{Notify, mpsc};
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// 事件中枢配置
#[derive(Clone, Copy, Debug)]
pub struct EventHubConfig {
    /// 每次从存储读取的最大记录数
    pub batch_size: usize,
    /// 未被唤醒时的兜底轮询间隔
    pub poll_interval: Duration,
    /// 存储错误后的重试延迟
    pub storage_retry_delay: Duration,
    /// 记录的存活时间（`ExpireOn = now + record_ttl`）
    pub record_ttl: chrono::Duration,
}

impl Default for EventHubConfig {
    fn default() -> Self {
        Self {
            batch_size: 25,
            poll_interval: Duration::from_secs(1),
            storage_retry_delay: Duration::from_secs(5),
            record_ttl: chrono::Duration::hours(4),
        }
    }
}

struct SubscriberSlot {
    notify: Arc<Notify>,
    // (连接代次, 投递循环的取消令牌)；断开时为 None，订阅者仍保留在广播列表中
    connection: Option<(u64, CancellationToken)>,
}

impl SubscriberSlot {
    fn new() -> Self {
        Self {
            notify: Arc::new(Notify::new()),
            connection: None,
        }
    }
}

pub struct EventHub<E> {
    storage: Arc<dyn EventStorage>,
    receiver: Arc<dyn HubExceptionReceiver>,
    config: EventHubConfig,
    subscribers: DashMap<String, SubscriberSlot>,
    generation: AtomicU64,
    shutdown: CancellationToken,
    _event: PhantomData<fn() -> E>,
}

impl<E> EventHub<E>
where
    E: Event + Serialize + DeserializeOwned,
{
    pub fn new(storage: Arc<dyn EventStorage>) -> Self {
        Self {
            storage,
            receiver: Arc::new(NoopHubReceiver),
            config: EventHubConfig::default(),
            subscribers: DashMap::new(),
            generation: AtomicU64::new(0),
            shutdown: CancellationToken::new(),
            _event: PhantomData,
        }
    }

    pub fn with_receiver(mut self, receiver: Arc<dyn HubExceptionReceiver>) -> Self {
        self.receiver = receiver;
        self
    }

    pub fn with_config(mut self, config: EventHubConfig) -> Self {
        self.config = config;
        self
    }

    /// 绑定应用级关闭信号；所有投递循环都派生自该令牌
    pub fn with_shutdown(mut self, token: CancellationToken) -> Self {
        self.shutdown = token;
        self
    }

    pub fn config(&self) -> &EventHubConfig {
        &self.config
    }

    /// 从存储恢复已知订阅者（处于断开状态，等待重新连接），返回恢复数量
    pub async fn restore(&self) -> crate::error::DomainResult<usize> {
        let ids = self.storage.restore_subscriber_ids(E::NAME).await?;
        let mut restored = 0;
        for id in ids {
            if !self.subscribers.contains_key(&id) {
                self.subscribers.insert(id, SubscriberSlot::new());
                restored += 1;
            }
        }
        info!(event = E::NAME, restored, "restored hub subscribers");
        Ok(restored)
    }

    pub fn subscriber_ids(&self) -> Vec<String> {
        self.subscribers.iter().map(|e| e.key().clone()).collect()
    }

    pub fn is_subscribed(&self, subscriber_id: &str) -> bool {
        self.subscribers.contains_key(subscriber_id)
    }

    pub fn is_connected(&self, subscriber_id: &str) -> bool {
        self.subscribers
            .get(subscriber_id)
            .is_some_and(|slot| slot.connection.is_some())
    }

    /// 订阅：登记订阅者并启动其投递循环
    ///
    /// 同一订阅者重复订阅时，旧的投递循环被取消，新循环从第一条未完成记录继续。
    pub fn subscribe(
        self: &Arc<Self>,
        subscriber_id: impl Into<String>,
        sink: Arc<dyn EventSink<E>>,
    ) -> WorkerHandle {
        let subscriber_id = subscriber_id.into();
        let token = self.shutdown.child_token();
        let generation = self.generation.fetch_add(1, Ordering::Relaxed);

        let notify = {
            let mut slot = self
                .subscribers
                .entry(subscriber_id.clone())
                .or_insert_with(SubscriberSlot::new);
            if let Some((_, previous)) = slot.connection.replace((generation, token.clone())) {
                previous.cancel();
            }
            slot.notify.clone()
        };

        info!(event = E::NAME, subscriber_id = %subscriber_id, "hub subscriber connected");
        let task = tokio::spawn(self.clone().delivery_loop(
            subscriber_id,
            sink,
            notify,
            token.clone(),
            generation,
        ));

        WorkerHandle::new(token, vec![task])
    }

    /// 以 `'static` 事件流的形式订阅，便于直接对接推流传输
    pub fn subscribe_stream(
        self: &Arc<Self>,
        subscriber_id: impl Into<String>,
        buffer: usize,
    ) -> (WorkerHandle, BoxStream<'static, E>) {
        let subscriber_id = subscriber_id.into();
        let (tx, rx) = mpsc::channel(buffer.max(1));
        let sink = Arc::new(ChannelSink::new(subscriber_id.clone(), tx));
        let handle = self.subscribe(subscriber_id, sink);
        (handle, Box::pin(ReceiverStream::new(rx)))
    }

    /// 退订：移出广播列表并停止投递循环
    pub fn unsubscribe(&self, subscriber_id: &str) -> bool {
        match self.subscribers.remove(subscriber_id) {
            Some((_, slot)) => {
                if let Some((_, token)) = slot.connection {
                    token.cancel();
                }
                info!(event = E::NAME, subscriber_id, "hub subscriber removed");
                true
            }
            None => false,
        }
    }

    /// 广播事件：为每个已知订阅者写入一条记录，返回成功写入的数量
    ///
    /// 存储错误由中枢吸收并重试，对发布方不可见。
    pub async fn broadcast(&self, event: &E) -> usize {
        let expire_on = Utc::now() + self.config.record_ttl;
        let targets: Vec<(String, Arc<Notify>)> = self
            .subscribers
            .iter()
            .map(|e| (e.key().clone(), e.value().notify.clone()))
            .collect();

        let writes = targets.into_iter().filter_map(|(subscriber_id, notify)| {
            match EventRecord::for_subscriber(subscriber_id.as_str(), event, expire_on) {
                Ok(record) => Some(async move {
                    let stored = self.store_with_retry(record).await;
                    if stored {
                        notify.notify_one();
                    }
                    stored
                }),
                Err(err) => {
                    warn!(event = E::NAME, error = %err, "event could not be serialized for the hub");
                    None
                }
            }
        });

        join_all(writes).await.into_iter().filter(|ok| *ok).count()
    }

    async fn store_with_retry(&self, record: EventRecord) -> bool {
        let mut attempt = 0;
        loop {
            match self.storage.store_event(record.clone()).await {
                Ok(()) => return true,
                Err(err @ DomainError::QueueOverflow { .. }) => {
                    self.evict(record.subscriber_id(), &err).await;
                    return false;
                }
                Err(err) if !err.is_transient() => {
                    warn!(event = E::NAME, subscriber_id = record.subscriber_id(), error = %err, "event record rejected by storage");
                    self.receiver.on_store_event_error(&record, attempt + 1, &err).await;
                    return false;
                }
                Err(err) => {
                    attempt += 1;
                    warn!(event = E::NAME, subscriber_id = record.subscriber_id(), attempt, error = %err, "storing event record failed, retrying");
                    self.receiver.on_store_event_error(&record, attempt, &err).await;
                    if !sleep_or_cancel(&self.shutdown, self.config.storage_retry_delay).await {
                        return false;
                    }
                }
            }
        }
    }

    async fn evict(&self, subscriber_id: &str, err: &DomainError) {
        if let Some((_, slot)) = self.subscribers.remove(subscriber_id) {
            if let Some((_, token)) = slot.connection {
                token.cancel();
            }
        }
        warn!(event = E::NAME, subscriber_id, error = %err, "subscriber removed from broadcast");
        self.receiver.on_queue_overflow(subscriber_id, err).await;
    }

    /// 驱逐存储判定为陈旧的订阅者，返回驱逐数量
    ///
    /// 只断开订阅并移出广播列表，队列中的记录保留到过期后由清理任务删除。
    pub async fn evict_stale_subscribers(&self) -> usize {
        let ids = match self.storage.stale_subscriber_ids(E::NAME, Utc::now()).await {
            Ok(ids) => ids,
            Err(err) => {
                warn!(event = E::NAME, error = %err, "looking up stale subscribers failed");
                self.receiver.on_purge_stale_error(&err).await;
                return 0;
            }
        };

        let mut evicted = 0;
        for subscriber_id in ids {
            if !self.subscribers.contains_key(&subscriber_id) {
                continue;
            }
            let err = DomainError::StaleSubscriber {
                subscriber_id: subscriber_id.clone(),
            };
            self.evict(&subscriber_id, &err).await;
            evicted += 1;
        }
        evicted
    }

    /// 按 `interval` 周期驱逐陈旧订阅者，生命周期绑定到中枢的关闭信号
    pub fn start_stale_eviction(self: &Arc<Self>, interval: Duration) -> WorkerHandle {
        let token = self.shutdown.child_token();
        let hub = self.clone();
        let task = spawn_periodic(token.clone(), interval, move || {
            let hub = hub.clone();
            async move {
                let evicted = hub.evict_stale_subscribers().await;
                if evicted > 0 {
                    info!(event = E::NAME, evicted, "stale hub subscribers evicted");
                }
            }
        });
        WorkerHandle::new(token, vec![task])
    }

    async fn delivery_loop(
        self: Arc<Self>,
        subscriber_id: String,
        sink: Arc<dyn EventSink<E>>,
        notify: Arc<Notify>,
        token: CancellationToken,
        generation: u64,
    ) {
        let mut fetch_attempt = 0;

        'deliver: loop {
            if token.is_cancelled() {
                break;
            }

            let query = PendingRecordQuery::new(E::NAME, &subscriber_id, self.config.batch_size);
            let batch = match self.storage.next_batch(query).await {
                Ok(batch) => {
                    fetch_attempt = 0;
                    batch
                }
                Err(err) => {
                    fetch_attempt += 1;
                    warn!(event = E::NAME, subscriber_id = %subscriber_id, attempt = fetch_attempt, error = %err, "fetching pending records failed, retrying");
                    self.receiver
                        .on_get_next_batch_error(&subscriber_id, fetch_attempt, &err)
                        .await;
                    if !sleep_or_cancel(&token, self.config.storage_retry_delay).await {
                        break;
                    }
                    continue;
                }
            };

            if batch.is_empty() {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = notify.notified() => {},
                    _ = tokio::time::sleep(self.config.poll_interval) => {},
                }
                continue;
            }

            for record in batch {
                match record.to_event::<E>() {
                    Ok(event) => {
                        let sent = tokio::select! {
                            _ = token.cancelled() => break 'deliver,
                            sent = sink.send(event) => sent,
                        };
                        if let Err(err) = sent {
                            debug!(event = E::NAME, subscriber_id = %subscriber_id, error = %err, "transport closed");
                            break 'deliver;
                        }
                    }
                    // 无法还原的记录不会自愈，标记完成以免阻塞后续记录
                    Err(err) => {
                        warn!(event = E::NAME, subscriber_id = %subscriber_id, record_id = %record.id(), error = %err, "skipping undecodable event record");
                    }
                }

                if !self.mark_complete_with_retry(&record, &token).await {
                    break 'deliver;
                }
            }
        }

        if let Some(mut slot) = self.subscribers.get_mut(&subscriber_id) {
            if slot.connection.as_ref().is_some_and(|(g, _)| *g == generation) {
                slot.connection = None;
            }
        }
        info!(event = E::NAME, subscriber_id = %subscriber_id, "hub subscriber disconnected");
    }

    async fn mark_complete_with_retry(&self, record: &EventRecord, token: &CancellationToken) -> bool {
        let mut attempt = 0;
        loop {
            match self.storage.mark_complete(record).await {
                Ok(()) => return true,
                Err(err) => {
                    attempt += 1;
                    warn!(event = E::NAME, subscriber_id = record.subscriber_id(), record_id = %record.id(), attempt, error = %err, "marking record complete failed, retrying");
                    self.receiver.on_mark_complete_error(record, attempt, &err).await;
                    if !sleep_or_cancel(token, self.config.storage_retry_delay).await {
                        return false;
                    }
                }
            }
        }
    }
}

#[async_trait]
impl<E> EventHandler<E> for EventHub<E>
where
    E: Event + Serialize + DeserializeOwned,
{
    fn handler_name(&self) -> &str {
        "event-hub"
    }

    async fn handle(&self, event: &E, _cancel: &CancellationToken) -> anyhow::Result<()> {
        let stored = self.broadcast(event).await;
        debug!(event = E::NAME, stored, "event broadcast to hub subscribers");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DomainResult;
    use crate::hub::{InMemoryEventStorage, StaleRecordFilter};
    use futures_util::StreamExt;
    use serde::Deserialize;
    use std::sync::Mutex;
    use std::sync::atomic::AtomicUsize;

    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    struct StockMoved {
        seq: u32,
    }
    impl Event for StockMoved {
        const NAME: &'static str = "stock.moved";
    }

    fn fast_config() -> EventHubConfig {
        EventHubConfig {
            batch_size: 10,
            poll_interval: Duration::from_millis(20),
            storage_retry_delay: Duration::from_millis(10),
            ..Default::default()
        }
    }

    #[derive(Default)]
    struct CountingReceiver {
        store_errors: AtomicUsize,
        fetch_errors: AtomicUsize,
        complete_errors: AtomicUsize,
        overflowed: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl HubExceptionReceiver for CountingReceiver {
        async fn on_store_event_error(&self, _r: &EventRecord, _a: usize, _e: &DomainError) {
            self.store_errors.fetch_add(1, Ordering::SeqCst);
        }
        async fn on_get_next_batch_error(&self, _s: &str, _a: usize, _e: &DomainError) {
            self.fetch_errors.fetch_add(1, Ordering::SeqCst);
        }
        async fn on_mark_complete_error(&self, _r: &EventRecord, _a: usize, _e: &DomainError) {
            self.complete_errors.fetch_add(1, Ordering::SeqCst);
        }
        async fn on_queue_overflow(&self, subscriber_id: &str, _e: &DomainError) {
            self.overflowed.lock().unwrap().push(subscriber_id.to_string());
        }
    }

    /// 前若干次写入、读取与完成标记失败的存储
    #[derive(Default)]
    struct FlakyStorage {
        inner: InMemoryEventStorage,
        store_failures: AtomicUsize,
        fetch_failures: AtomicUsize,
        complete_failures: AtomicUsize,
    }

    fn fail_once_more(remaining: &AtomicUsize) -> bool {
        remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    #[async_trait]
    impl EventStorage for FlakyStorage {
        async fn store_event(&self, record: EventRecord) -> DomainResult<()> {
            if fail_once_more(&self.store_failures) {
                return Err(DomainError::storage("connection reset"));
            }
            self.inner.store_event(record).await
        }
        async fn next_batch(&self, query: PendingRecordQuery) -> DomainResult<Vec<EventRecord>> {
            if fail_once_more(&self.fetch_failures) {
                return Err(DomainError::storage("timeout"));
            }
            self.inner.next_batch(query).await
        }
        async fn mark_complete(&self, record: &EventRecord) -> DomainResult<()> {
            if fail_once_more(&self.complete_failures) {
                return Err(DomainError::storage("deadlock detected"));
            }
            self.inner.mark_complete(record).await
        }
        async fn purge_stale(&self, filter: StaleRecordFilter) -> DomainResult<usize> {
            self.inner.purge_stale(filter).await
        }
        async fn restore_subscriber_ids(&self, event_type: &str) -> DomainResult<Vec<String>> {
            self.inner.restore_subscriber_ids(event_type).await
        }
    }

    async fn collect(stream: &mut BoxStream<'static, StockMoved>, n: usize) -> Vec<u32> {
        let mut out = Vec::new();
        let _ = tokio::time::timeout(Duration::from_secs(3), async {
            while out.len() < n {
                match stream.next().await {
                    Some(ev) => out.push(ev.seq),
                    None => break,
                }
            }
        })
        .await;
        out
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn broadcast_fans_out_to_every_subscriber_in_order() {
        let storage = Arc::new(InMemoryEventStorage::new());
        let hub = Arc::new(EventHub::<StockMoved>::new(storage.clone()).with_config(fast_config()));
        let (_h1, mut s1) = hub.subscribe_stream("s-1", 8);
        let (_h2, mut s2) = hub.subscribe_stream("s-2", 8);

        for seq in 0..5 {
            assert_eq!(hub.broadcast(&StockMoved { seq }).await, 2);
        }

        assert_eq!(collect(&mut s1, 5).await, vec![0, 1, 2, 3, 4]);
        assert_eq!(collect(&mut s2, 5).await, vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn broadcast_without_subscribers_stores_nothing() {
        let storage = Arc::new(InMemoryEventStorage::new());
        let hub = EventHub::<StockMoved>::new(storage.clone());
        assert_eq!(hub.broadcast(&StockMoved { seq: 1 }).await, 0);
        assert_eq!(storage.total_records(), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn overflow_evicts_only_the_overflowing_subscriber() {
        let storage = Arc::new(InMemoryEventStorage::with_max_queue_size(3));
        let receiver = Arc::new(CountingReceiver::default());
        let hub = Arc::new(
            EventHub::<StockMoved>::new(storage.clone())
                .with_config(fast_config())
                .with_receiver(receiver.clone()),
        );
        // 断开状态的订阅者：记录只进不出
        hub.subscribers.insert("idle".to_string(), SubscriberSlot::new());
        let (_h, mut active) = hub.subscribe_stream("active", 64);

        for seq in 0..5 {
            hub.broadcast(&StockMoved { seq }).await;
            tokio::time::sleep(Duration::from_millis(30)).await;
        }

        assert!(!hub.is_subscribed("idle"));
        assert!(hub.is_subscribed("active"));
        assert_eq!(*receiver.overflowed.lock().unwrap(), vec!["idle".to_string()]);
        assert_eq!(collect(&mut active, 5).await, vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn transient_storage_errors_are_retried() {
        let storage = Arc::new(FlakyStorage {
            store_failures: AtomicUsize::new(2),
            fetch_failures: AtomicUsize::new(2),
            ..Default::default()
        });
        let receiver = Arc::new(CountingReceiver::default());
        let hub = Arc::new(
            EventHub::<StockMoved>::new(storage)
                .with_config(fast_config())
                .with_receiver(receiver.clone()),
        );
        let (_h, mut stream) = hub.subscribe_stream("s-1", 8);

        assert_eq!(hub.broadcast(&StockMoved { seq: 7 }).await, 1);
        assert_eq!(collect(&mut stream, 1).await, vec![7]);
        assert_eq!(receiver.store_errors.load(Ordering::SeqCst), 2);
        assert_eq!(receiver.fetch_errors.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn reconnect_resumes_from_first_undelivered_record() {
        let storage = Arc::new(InMemoryEventStorage::new());
        let hub = Arc::new(EventHub::<StockMoved>::new(storage.clone()).with_config(fast_config()));

        let (handle, mut stream) = hub.subscribe_stream("s-1", 1);
        hub.broadcast(&StockMoved { seq: 0 }).await;
        assert_eq!(collect(&mut stream, 1).await, vec![0]);
        handle.shutdown();
        handle.join().await;
        drop(stream);
        assert!(hub.is_subscribed("s-1"));
        assert!(!hub.is_connected("s-1"));

        // 断开期间继续写入
        hub.broadcast(&StockMoved { seq: 1 }).await;
        hub.broadcast(&StockMoved { seq: 2 }).await;

        let (_h, mut stream) = hub.subscribe_stream("s-1", 8);
        assert_eq!(collect(&mut stream, 2).await, vec![1, 2]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn unsubscribe_stops_future_broadcasts() {
        let storage = Arc::new(InMemoryEventStorage::new());
        let hub = Arc::new(EventHub::<StockMoved>::new(storage.clone()).with_config(fast_config()));
        let (_h, mut stream) = hub.subscribe_stream("s-1", 8);

        assert!(hub.unsubscribe("s-1"));
        assert_eq!(hub.broadcast(&StockMoved { seq: 1 }).await, 0);
        assert!(collect(&mut stream, 1).await.is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn restore_relearns_known_subscribers() {
        let storage = Arc::new(InMemoryEventStorage::new());
        let first = EventHub::<StockMoved>::new(storage.clone());
        first.subscribers.insert("s-9".to_string(), SubscriberSlot::new());
        first.broadcast(&StockMoved { seq: 1 }).await;

        let second = EventHub::<StockMoved>::new(storage.clone());
        assert_eq!(second.restore().await.unwrap(), 1);
        assert_eq!(second.subscriber_ids(), vec!["s-9".to_string()]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn failed_completion_is_retried_without_redelivery_gaps() {
        let storage = Arc::new(FlakyStorage {
            complete_failures: AtomicUsize::new(3),
            ..Default::default()
        });
        let receiver = Arc::new(CountingReceiver::default());
        let hub = Arc::new(
            EventHub::<StockMoved>::new(storage.clone())
                .with_config(fast_config())
                .with_receiver(receiver.clone()),
        );
        let (_h, mut stream) = hub.subscribe_stream("s-1", 8);

        hub.broadcast(&StockMoved { seq: 1 }).await;
        hub.broadcast(&StockMoved { seq: 2 }).await;
        assert_eq!(collect(&mut stream, 2).await, vec![1, 2]);

        tokio::time::timeout(Duration::from_secs(2), async {
            while storage.inner.queue_len(StockMoved::NAME, "s-1") > 0 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();
        assert_eq!(receiver.complete_errors.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn stale_subscribers_are_evicted_but_keep_their_records() {
        let storage = Arc::new(InMemoryEventStorage::new());
        let receiver = Arc::new(CountingReceiver::default());
        let hub = Arc::new(
            EventHub::<StockMoved>::new(storage.clone())
                .with_config(fast_config())
                .with_receiver(receiver.clone()),
        );
        hub.subscribers.insert("idle".to_string(), SubscriberSlot::new());
        hub.subscribers.insert("fresh".to_string(), SubscriberSlot::new());
        hub.broadcast(&StockMoved { seq: 1 }).await;
        storage.backdate(StockMoved::NAME, "idle", Utc::now() - chrono::Duration::hours(5));

        assert_eq!(hub.evict_stale_subscribers().await, 1);
        assert!(!hub.is_subscribed("idle"));
        assert!(hub.is_subscribed("fresh"));
        assert_eq!(*receiver.overflowed.lock().unwrap(), vec!["idle".to_string()]);

        // 清理只删除已完成或已过期的记录
        storage.purge_stale(StaleRecordFilter::at(Utc::now())).await.unwrap();
        assert_eq!(storage.queue_len(StockMoved::NAME, "idle"), 1);

        // 已不在广播列表中的陈旧订阅者不会被重复驱逐
        assert_eq!(hub.evict_stale_subscribers().await, 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn periodic_stale_eviction_stops_with_the_hub() {
        let storage = Arc::new(InMemoryEventStorage::new());
        let shutdown = CancellationToken::new();
        let hub = Arc::new(
            EventHub::<StockMoved>::new(storage.clone())
                .with_config(fast_config())
                .with_shutdown(shutdown.clone()),
        );
        hub.subscribers.insert("idle".to_string(), SubscriberSlot::new());
        hub.broadcast(&StockMoved { seq: 1 }).await;
        storage.backdate(StockMoved::NAME, "idle", Utc::now() - chrono::Duration::hours(5));

        let worker = hub.start_stale_eviction(Duration::from_millis(10));
        tokio::time::timeout(Duration::from_secs(2), async {
            while hub.is_subscribed("idle") {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(2), worker.join())
            .await
            .unwrap();
    }
}
