use crate::error::AppError;
use crate::jobs::JobRecord;
use async_trait::async_trait;
use courier_domain::error::DomainError;

/// 作业队列异常接收器
///
/// 所有方法默认空实现，按需覆写用于观测；`attempt` 从 1 开始。
#[async_trait]
pub trait JobExceptionReceiver: Send + Sync {
    async fn on_store_job_error(&self, _job: &JobRecord, _attempt: u32, _error: &DomainError) {}

    async fn on_get_next_batch_error(&self, _queue_id: &str, _attempt: u32, _error: &DomainError) {}

    async fn on_mark_complete_error(&self, _job: &JobRecord, _attempt: u32, _error: &DomainError) {}

    async fn on_handler_execution_error(&self, _job: &JobRecord, _attempt: u32, _error: &AppError) {}

    async fn on_handler_failure_hook_error(
        &self,
        _job: &JobRecord,
        _attempt: u32,
        _error: &DomainError,
    ) {
    }

    async fn on_store_result_error(&self, _job: &JobRecord, _attempt: u32, _error: &DomainError) {}

    async fn on_purge_stale_error(&self, _error: &DomainError) {}
}

pub struct NoopJobReceiver;

impl JobExceptionReceiver for NoopJobReceiver {}
