//! 作业队列引擎（JobQueue）
//!
//! - `register::<C>()`：为命令登记一个队列（队列 ID = `C::NAME`），执行时经命令总线路由到处理器；
//! - `queue_job`：持久化作业并唤醒对应轮询器，返回追踪 ID；
//! - `start`：每个队列一个轮询器，按批读取到期作业并发执行，外加周期清理任务；
//! - `cancel`：标记完成且不再执行，正在执行的作业收到取消信号，其结果被丢弃；
//! - `job_result::<C>`：读取带返回值命令的执行结果。
//!
//! 存储错误上报异常接收器后固定延迟重试；轮询器只在应用关闭时退出。
//!
//! 处理器上下文：`correlation_id` 为追踪 ID，`causation_id` 为作业记录 ID，
//! `idempotency_key` 在同一作业的每次重试中保持不变。
//!
use crate::command::Command;
use crate::command_bus::CommandBus;
use crate::context::AppContext;
use crate::error::AppError;
use crate::inmemory_command_bus::InMemoryCommandBus;
use crate::jobs::{
    JobExceptionReceiver, JobFailure, JobQueueConfig, JobRecord, JobStorage, NoopJobReceiver,
    PendingJobQuery,
};
use bon::Builder;
use chrono::{DateTime, Utc};
use courier_domain::error::{DomainError, DomainResult};
use courier_domain::worker::{WorkerHandle, sleep_or_cancel, spawn_periodic};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures_util::future::join_all;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::{Notify, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

type JobFuture = Pin<Box<dyn Future<Output = Result<Value, AppError>> + Send>>;

type JobExecFn = Arc<dyn Fn(Value, AppContext) -> JobFuture + Send + Sync>;

/// 入队选项；未指定时立即可执行，过期时间为 `execute_after + job_ttl`
#[derive(Clone, Debug, Default, Builder)]
pub struct JobOptions {
    pub execute_after: Option<DateTime<Utc>>,
    pub expire_on: Option<DateTime<Utc>>,
    /// 调用方指定的追踪 ID，缺省自动生成
    pub tracking_id: Option<Uuid>,
}

impl JobOptions {
    pub fn delayed(execute_after: DateTime<Utc>) -> Self {
        Self {
            execute_after: Some(execute_after),
            ..Default::default()
        }
    }
}

#[derive(Clone)]
struct QueueSlot {
    exec: JobExecFn,
    notify: Arc<Notify>,
}

// 存储操作种类，决定上报到哪个异常接收器方法
#[derive(Clone, Copy)]
enum StorageOp<'a> {
    Store(&'a JobRecord),
    Fetch(&'a str),
    MarkComplete(&'a JobRecord),
    FailureHook(&'a JobRecord),
    StoreResult(&'a JobRecord),
}

impl StorageOp<'_> {
    fn name(&self) -> &'static str {
        match self {
            StorageOp::Store(_) => "store_job",
            StorageOp::Fetch(_) => "next_batch",
            StorageOp::MarkComplete(_) => "mark_complete",
            StorageOp::FailureHook(_) => "on_handler_execution_failure",
            StorageOp::StoreResult(_) => "store_job_result",
        }
    }
}

pub struct JobQueue {
    bus: Arc<InMemoryCommandBus>,
    storage: Arc<dyn JobStorage>,
    receiver: Arc<dyn JobExceptionReceiver>,
    config: JobQueueConfig,
    queues: DashMap<&'static str, QueueSlot>,
    // 正在执行的作业：追踪 ID → 取消令牌
    in_flight: DashMap<Uuid, CancellationToken>,
    // 已请求取消的追踪 ID 及请求时间，避免“已读取未执行”的作业被执行
    cancelled: DashMap<Uuid, DateTime<Utc>>,
    shutdown: CancellationToken,
}

impl JobQueue {
    pub fn new(bus: Arc<InMemoryCommandBus>, storage: Arc<dyn JobStorage>) -> Self {
        Self {
            bus,
            storage,
            receiver: Arc::new(NoopJobReceiver),
            config: JobQueueConfig::default(),
            queues: DashMap::new(),
            in_flight: DashMap::new(),
            cancelled: DashMap::new(),
            shutdown: CancellationToken::new(),
        }
    }

    pub fn with_receiver(mut self, receiver: Arc<dyn JobExceptionReceiver>) -> Self {
        self.receiver = receiver;
        self
    }

    pub fn with_config(mut self, config: JobQueueConfig) -> Self {
        self.config = config;
        self
    }

    /// 绑定应用级关闭信号；轮询器与正在执行的作业都派生自该令牌
    pub fn with_shutdown(mut self, token: CancellationToken) -> Self {
        self.shutdown = token;
        self
    }

    pub fn config(&self) -> &JobQueueConfig {
        &self.config
    }

    /// 为命令登记作业队列（需在 `start` 之前调用）
    ///
    /// 命令处理器必须已注册到命令总线。
    pub fn register<C>(&self) -> Result<(), AppError>
    where
        C: Command + Serialize + DeserializeOwned,
        C::Output: Serialize,
    {
        if !self.bus.has_handler::<C>() {
            return Err(AppError::HandlerNotFound(C::NAME));
        }

        let bus = self.bus.clone();
        let exec: JobExecFn = Arc::new(move |payload: Value, ctx: AppContext| -> JobFuture {
            let bus = bus.clone();
            Box::pin(async move {
                let cmd: C = serde_json::from_value(payload)?;
                let output = bus.execute(&ctx, cmd).await?;
                Ok(serde_json::to_value(output)?)
            })
        });

        match self.queues.entry(C::NAME) {
            Entry::Occupied(_) => Err(AppError::AlreadyRegisteredJob { command: C::NAME }),
            Entry::Vacant(slot) => {
                slot.insert(QueueSlot {
                    exec,
                    notify: Arc::new(Notify::new()),
                });
                debug!(queue = C::NAME, "job queue registered");
                Ok(())
            }
        }
    }

    /// 持久化一条作业并返回追踪 ID
    ///
    /// 瞬时存储错误在内部重试，直至成功或应用关闭。
    pub async fn queue_job<C>(&self, cmd: &C, options: JobOptions) -> Result<Uuid, AppError>
    where
        C: Command + Serialize,
    {
        let Some(notify) = self.queues.get(C::NAME).map(|q| q.notify.clone()) else {
            return Err(AppError::HandlerNotFound(C::NAME));
        };

        let execute_after = options.execute_after.unwrap_or_else(Utc::now);
        let expire_on = options
            .expire_on
            .unwrap_or(execute_after + self.config.job_ttl);
        if expire_on <= execute_after {
            return Err(AppError::Validation(format!(
                "job expires before it becomes due: command={}",
                C::NAME
            )));
        }

        let job = JobRecord::builder()
            .queue_id(C::NAME)
            .tracking_id(options.tracking_id.unwrap_or_else(Uuid::new_v4))
            .command(serde_json::to_value(cmd)?)
            .execute_after(execute_after)
            .expire_on(expire_on)
            .build();
        let tracking_id = job.tracking_id();

        self.retry_storage(&self.shutdown, StorageOp::Store(&job), || {
            self.storage.store_job(job.clone())
        })
        .await?;

        debug!(queue = C::NAME, tracking_id = %tracking_id, execute_after = %execute_after, "job queued");
        notify.notify_one();
        Ok(tracking_id)
    }

    /// 按追踪 ID 取消作业；返回是否找到待执行或执行中的作业
    ///
    /// 已在执行的作业只收到协作式取消信号，其结果会被丢弃且不再重试。
    pub async fn cancel(&self, tracking_id: Uuid) -> Result<bool, AppError> {
        self.cancelled.insert(tracking_id, Utc::now());

        let pending = self.storage.cancel_job(tracking_id).await?;
        let running = match self.in_flight.get(&tracking_id) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        };

        info!(tracking_id = %tracking_id, pending, running, "job cancelled");
        Ok(pending || running)
    }

    /// 读取作业结果；尚未完成时返回 `None`
    pub async fn job_result<C>(&self, tracking_id: Uuid) -> Result<Option<C::Output>, AppError>
    where
        C: Command,
        C::Output: DeserializeOwned,
    {
        match self.storage.get_job_result(tracking_id).await {
            Ok(Some(value)) => Ok(Some(serde_json::from_value(value)?)),
            Ok(None) => Ok(None),
            Err(DomainError::Unsupported { .. }) => {
                Err(AppError::JobResultUnavailable { tracking_id })
            }
            Err(err) => Err(err.into()),
        }
    }

    /// 启动所有已登记队列的轮询器与清理任务
    pub fn start(self: &Arc<Self>) -> WorkerHandle {
        if !self.storage.supports_distributed_polling() {
            warn!("job storage does not support distributed polling; run a single engine instance");
        }

        let token = self.shutdown.child_token();
        let limiter = Arc::new(Semaphore::new(self.config.max_concurrency.max(1)));
        let mut handle = WorkerHandle::new(token.clone(), Vec::new());

        let slots: Vec<(&'static str, QueueSlot)> = self
            .queues
            .iter()
            .map(|e| (*e.key(), e.value().clone()))
            .collect();
        for (queue_id, slot) in slots {
            let queue = self.clone();
            let token = token.clone();
            let limiter = limiter.clone();
            handle.push(tokio::spawn(async move {
                queue.poll_loop(queue_id, slot.notify, limiter, token).await;
            }));
        }

        let queue = self.clone();
        handle.push(spawn_periodic(
            token.clone(),
            self.config.purge_interval,
            move || {
                let queue = queue.clone();
                async move {
                    queue.purge_once().await;
                }
            },
        ));

        info!(
            queues = self.queues.len(),
            max_concurrency = self.config.max_concurrency,
            "job queue started"
        );
        handle
    }

    /// 执行一次陈旧作业清理，返回删除数量；错误被吸收
    pub async fn purge_once(&self) -> usize {
        let now = Utc::now();
        self.cancelled
            .retain(|_, requested_at| now - *requested_at < self.config.job_ttl);

        match self.storage.purge_stale(now).await {
            Ok(purged) => {
                debug!(purged, "stale jobs purged");
                purged
            }
            Err(err) => {
                warn!(error = %err, "purging stale jobs failed");
                self.receiver.on_purge_stale_error(&err).await;
                0
            }
        }
    }

    async fn poll_loop(
        self: Arc<Self>,
        queue_id: &'static str,
        notify: Arc<Notify>,
        limiter: Arc<Semaphore>,
        token: CancellationToken,
    ) {
        debug!(queue = queue_id, "job poller started");

        while !token.is_cancelled() {
            let batch = match self
                .retry_storage(&token, StorageOp::Fetch(queue_id), || {
                    self.storage
                        .next_batch(PendingJobQuery::new(queue_id, self.config.batch_limit))
                })
                .await
            {
                Ok(batch) => batch,
                Err(err) => {
                    if token.is_cancelled() {
                        break;
                    }
                    warn!(queue = queue_id, error = %err, "fetching jobs rejected by storage; backing off");
                    if !sleep_or_cancel(&token, self.config.storage_retry_delay).await {
                        break;
                    }
                    continue;
                }
            };

            if batch.is_empty() {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = notify.notified() => {}
                    _ = tokio::time::sleep(self.config.poll_interval) => {}
                }
                continue;
            }

            // 等待整批结束再读取下一批，避免未完成的作业被重复读取
            let mut running = Vec::with_capacity(batch.len());
            for job in batch {
                let permit = tokio::select! {
                    _ = token.cancelled() => break,
                    permit = limiter.clone().acquire_owned() => match permit {
                        Ok(permit) => permit,
                        Err(_) => break,
                    },
                };
                let queue = self.clone();
                let token = token.clone();
                running.push(tokio::spawn(async move {
                    queue.run_job(job, &token).await;
                    drop(permit);
                }));
            }
            join_all(running).await;
        }

        debug!(queue = queue_id, "job poller stopped");
    }

    async fn run_job(&self, job: JobRecord, token: &CancellationToken) {
        let tracking_id = job.tracking_id();
        let job_token = token.child_token();
        self.in_flight.insert(tracking_id, job_token.clone());

        if self.cancelled.contains_key(&tracking_id) {
            self.in_flight.remove(&tracking_id);
            debug!(tracking_id = %tracking_id, "skipping cancelled job");
            return;
        }

        let Some(exec) = self.queues.get(job.queue_id()).map(|q| q.exec.clone()) else {
            self.in_flight.remove(&tracking_id);
            return;
        };

        let ctx = AppContext::builder()
            .correlation_id(tracking_id.to_string())
            .causation_id(job.id().to_string())
            .idempotency_key(format!("{}:{}", job.queue_id(), tracking_id))
            .cancellation(job_token.clone())
            .build();
        let outcome = self.execute(&job, exec(job.command().clone(), ctx), &job_token).await;
        self.in_flight.remove(&tracking_id);

        if job_token.is_cancelled() {
            if token.is_cancelled() {
                // 应用关闭：作业保持未完成，下次启动后重新执行
                debug!(tracking_id = %tracking_id, "job abandoned on shutdown");
            } else {
                debug!(tracking_id = %tracking_id, "cancelled job finished; outcome discarded");
            }
            return;
        }

        match outcome {
            Ok(result) => {
                if !result.is_null() {
                    let _ = self
                        .retry_storage(token, StorageOp::StoreResult(&job), || {
                            self.storage.store_job_result(&job, result.clone())
                        })
                        .await;
                }
                let _ = self
                    .retry_storage(token, StorageOp::MarkComplete(&job), || {
                        self.storage.mark_complete(&job)
                    })
                    .await;
                debug!(queue = job.queue_id(), tracking_id = %tracking_id, "job completed");
            }
            Err(err) => {
                let attempt = job.attempts() + 1;
                warn!(
                    queue = job.queue_id(),
                    tracking_id = %tracking_id,
                    attempt,
                    error = %err,
                    "job handler failed; rescheduling"
                );
                self.receiver
                    .on_handler_execution_error(&job, attempt, &err)
                    .await;

                let failure = JobFailure {
                    error: err.to_string(),
                    attempt,
                    retry_at: Utc::now() + self.config.retry_backoff,
                };
                let _ = self
                    .retry_storage(token, StorageOp::FailureHook(&job), || {
                        self.storage.on_handler_execution_failure(&job, &failure)
                    })
                    .await;
            }
        }
    }

    async fn execute(
        &self,
        job: &JobRecord,
        fut: JobFuture,
        job_token: &CancellationToken,
    ) -> Result<Value, AppError> {
        let limited = async {
            match self.config.execution_time_limit {
                Some(limit) => tokio::time::timeout(limit, fut)
                    .await
                    .unwrap_or_else(|_| {
                        Err(AppError::Timeout {
                            command: job.queue_id().to_string(),
                            limit,
                        })
                    }),
                None => fut.await,
            }
        };

        tokio::select! {
            _ = job_token.cancelled() => Err(AppError::Cancelled),
            outcome = limited => outcome,
        }
    }

    async fn retry_storage<T, F, Fut>(
        &self,
        token: &CancellationToken,
        op: StorageOp<'_>,
        mut call: F,
    ) -> DomainResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = DomainResult<T>>,
    {
        let mut attempt = 0u32;
        loop {
            let err = match call().await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };
            attempt += 1;
            warn!(operation = op.name(), attempt, error = %err, "job storage operation failed");
            self.report(op, attempt, &err).await;

            if !err.is_transient() {
                return Err(err);
            }
            if !sleep_or_cancel(token, self.config.storage_retry_delay).await {
                return Err(DomainError::Cancelled);
            }
        }
    }

    async fn report(&self, op: StorageOp<'_>, attempt: u32, err: &DomainError) {
        let receiver = &self.receiver;
        match op {
            StorageOp::Store(job) => receiver.on_store_job_error(job, attempt, err).await,
            StorageOp::Fetch(queue_id) => {
                receiver.on_get_next_batch_error(queue_id, attempt, err).await
            }
            StorageOp::MarkComplete(job) => receiver.on_mark_complete_error(job, attempt, err).await,
            StorageOp::FailureHook(job) => {
                receiver
                    .on_handler_failure_hook_error(job, attempt, err)
                    .await
            }
            StorageOp::StoreResult(job) => receiver.on_store_result_error(job, attempt, err).await,
        }
    }
}
