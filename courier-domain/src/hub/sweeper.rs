//! 陈旧记录清理（StaleSweeper）
//!
//! 单个后台任务按固定间隔（默认每小时）请求存储删除满足
//! `is_complete || now >= expire_on` 的记录。清理是尽力而为的：
//! 出错时仅上报并等待下一个周期，不影响投递。
//!
use crate::hub::{EventStorage, HubExceptionReceiver, NoopHubReceiver, StaleRecordFilter};
use crate::worker::{WorkerHandle, spawn_periodic};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Clone)]
pub struct StaleSweeper {
    storage: Arc<dyn EventStorage>,
    receiver: Arc<dyn HubExceptionReceiver>,
    interval: Duration,
}

impl StaleSweeper {
    pub fn new(storage: Arc<dyn EventStorage>) -> Self {
        Self {
            storage,
            receiver: Arc::new(NoopHubReceiver),
            interval: Duration::from_secs(60 * 60),
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_receiver(mut self, receiver: Arc<dyn HubExceptionReceiver>) -> Self {
        self.receiver = receiver;
        self
    }

    /// 执行一次清理，返回删除的记录数；错误被吸收
    pub async fn sweep_once(&self) -> usize {
        match self.storage.purge_stale(StaleRecordFilter::at(Utc::now())).await {
            Ok(purged) => {
                tracing::debug!(purged, "stale event records purged");
                purged
            }
            Err(err) => {
                tracing::warn!(error = %err, "purging stale event records failed");
                self.receiver.on_purge_stale_error(&err).await;
                0
            }
        }
    }

    /// 启动周期清理，生命周期绑定到 `shutdown`
    pub fn start(&self, shutdown: &CancellationToken) -> WorkerHandle {
        let token = shutdown.child_token();
        let sweeper = self.clone();
        let task = spawn_periodic(token.clone(), self.interval, move || {
            let sweeper = sweeper.clone();
            async move {
                sweeper.sweep_once().await;
            }
        });
        WorkerHandle::new(token, vec![task])
    }
}
